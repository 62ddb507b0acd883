use anyhow::Result;
use async_trait::async_trait;
use rand::Rng;
use sqlx::any::Any;
use sqlx::Pool;

use crate::models::City;

#[async_trait]
pub trait CityStoreApi: Send + Sync {
    async fn get_city_by_name(&self, name: &str) -> Result<Option<City>>;

    /// Picks a city whose name starts with `letter` (case-insensitive) and
    /// has not yet been used in `session_id`, chosen pseudo-randomly among
    /// the matching candidates. `None` if no candidate remains.
    async fn pick_unused_city_by_letter(&self, session_id: i64, letter: &str) -> Result<Option<City>>;

    async fn is_city_used(&self, session_id: i64, city_id: i64) -> Result<bool>;
    async fn mark_city_used(&self, session_id: i64, city_id: i64) -> Result<()>;
    async fn list_used_cities(&self, session_id: i64) -> Result<Vec<City>>;
}

pub struct CityStore {
    pool: Pool<Any>,
}

impl CityStore {
    pub fn new(pool: Pool<Any>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CityStoreApi for CityStore {
    async fn get_city_by_name(&self, name: &str) -> Result<Option<City>> {
        let city = sqlx::query_as::<Any, City>(
            "SELECT id, name FROM cities WHERE LOWER(name) = LOWER($1)",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(city)
    }

    async fn pick_unused_city_by_letter(&self, session_id: i64, letter: &str) -> Result<Option<City>> {
        let pattern = format!("{letter}%");
        let count: i64 = sqlx::query_scalar::<Any, i64>(
            "SELECT COUNT(*) FROM cities c
             WHERE LOWER(c.name) LIKE LOWER($1)
               AND c.id NOT IN (SELECT city_id FROM used_cities WHERE game_session_id = $2)",
        )
        .bind(&pattern)
        .bind(session_id)
        .fetch_one(&self.pool)
        .await?;

        if count == 0 {
            return Ok(None);
        }

        let offset = rand::thread_rng().gen_range(0..count);

        let city = sqlx::query_as::<Any, City>(
            "SELECT id, name FROM cities c
             WHERE LOWER(c.name) LIKE LOWER($1)
               AND c.id NOT IN (SELECT city_id FROM used_cities WHERE game_session_id = $2)
             LIMIT 1 OFFSET $3",
        )
        .bind(&pattern)
        .bind(session_id)
        .bind(offset)
        .fetch_optional(&self.pool)
        .await?;
        Ok(city)
    }

    async fn is_city_used(&self, session_id: i64, city_id: i64) -> Result<bool> {
        let count: i64 = sqlx::query_scalar::<Any, i64>(
            "SELECT COUNT(*) FROM used_cities WHERE game_session_id = $1 AND city_id = $2",
        )
        .bind(session_id)
        .bind(city_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    async fn mark_city_used(&self, session_id: i64, city_id: i64) -> Result<()> {
        if self.is_city_used(session_id, city_id).await? {
            return Ok(());
        }
        sqlx::query("INSERT INTO used_cities (game_session_id, city_id) VALUES ($1, $2)")
            .bind(session_id)
            .bind(city_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_used_cities(&self, session_id: i64) -> Result<Vec<City>> {
        let cities = sqlx::query_as::<Any, City>(
            "SELECT c.id, c.name FROM cities c
             JOIN used_cities u ON u.city_id = c.id
             WHERE u.game_session_id = $1
             ORDER BY u.id",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(cities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_pool;

    async fn seed_cities(pool: &Pool<Any>) {
        for name in ["Архангельск", "Астрахань", "Анапа", "Калуга"] {
            sqlx::query("INSERT INTO cities (name) VALUES ($1)")
                .bind(name)
                .execute(pool)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn pick_unused_city_never_repeats() {
        let pool = test_pool().await;
        seed_cities(&pool).await;
        let store = CityStore::new(pool);

        let mut picked = std::collections::HashSet::new();
        for _ in 0..3 {
            let city = store.pick_unused_city_by_letter(1, "А").await.unwrap().unwrap();
            assert!(picked.insert(city.id), "city {} drawn twice", city.name);
            store.mark_city_used(1, city.id).await.unwrap();
        }

        assert!(store.pick_unused_city_by_letter(1, "А").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn mark_city_used_is_idempotent() {
        let pool = test_pool().await;
        seed_cities(&pool).await;
        let store = CityStore::new(pool);

        let city = store.get_city_by_name("Калуга").await.unwrap().unwrap();
        store.mark_city_used(1, city.id).await.unwrap();
        store.mark_city_used(1, city.id).await.unwrap();

        let used = store.list_used_cities(1).await.unwrap();
        assert_eq!(used.len(), 1);
    }
}
