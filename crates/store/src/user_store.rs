use anyhow::Result;
use async_trait::async_trait;
use sqlx::any::Any;
use sqlx::Pool;

use crate::models::User;

#[async_trait]
pub trait UserStoreApi: Send + Sync {
    /// Inserts the user if absent (`ON CONFLICT DO NOTHING`), then returns
    /// the row either way — idempotent under at-least-once redelivery.
    async fn create_user(&self, id: i64, username: &str) -> Result<User>;
    async fn get_user(&self, id: i64) -> Result<Option<User>>;
    /// Adds `delta` to the user's lifetime point total.
    async fn add_total_points(&self, id: i64, delta: i32) -> Result<()>;
}

pub struct UserStore {
    pool: Pool<Any>,
}

impl UserStore {
    pub fn new(pool: Pool<Any>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStoreApi for UserStore {
    async fn create_user(&self, id: i64, username: &str) -> Result<User> {
        sqlx::query("INSERT INTO users (id, username, total_point) VALUES ($1, $2, 0) ON CONFLICT (id) DO NOTHING")
            .bind(id)
            .bind(username)
            .execute(&self.pool)
            .await?;

        let user = sqlx::query_as::<Any, User>("SELECT id, username, total_point FROM users WHERE id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(user)
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<Any, User>("SELECT id, username, total_point FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn add_total_points(&self, id: i64, delta: i32) -> Result<()> {
        sqlx::query("UPDATE users SET total_point = total_point + $1 WHERE id = $2")
            .bind(delta)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_pool;

    #[tokio::test]
    async fn create_user_is_idempotent() {
        let pool = test_pool().await;
        let store = UserStore::new(pool);

        let first = store.create_user(1, "alice").await.unwrap();
        let second = store.create_user(1, "alice-renamed").await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.username, "alice", "ON CONFLICT DO NOTHING keeps the original row");
    }

    #[tokio::test]
    async fn add_total_points_accumulates() {
        let pool = test_pool().await;
        let store = UserStore::new(pool);
        store.create_user(1, "alice").await.unwrap();

        store.add_total_points(1, 3).await.unwrap();
        store.add_total_points(1, 2).await.unwrap();

        let user = store.get_user(1).await.unwrap().unwrap();
        assert_eq!(user.total_point, 5);
    }
}
