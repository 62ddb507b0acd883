use anyhow::Result;
use async_trait::async_trait;
use sqlx::any::Any;
use sqlx::Pool;
use tokio::sync::RwLock;

use crate::models::GameSettings;

#[async_trait]
pub trait GameSettingsApi: Send + Sync {
    /// Returns the process-wide settings singleton, seeding row id=1 with
    /// `defaults` on first call and caching the result in memory thereafter.
    async fn get(&self) -> Result<GameSettings>;
}

pub struct GameSettingsStore {
    pool: Pool<Any>,
    defaults: GameSettings,
    cache: RwLock<Option<GameSettings>>,
}

impl GameSettingsStore {
    pub fn new(pool: Pool<Any>, defaults: GameSettings) -> Self {
        Self {
            pool,
            defaults,
            cache: RwLock::new(None),
        }
    }
}

#[async_trait]
impl GameSettingsApi for GameSettingsStore {
    async fn get(&self) -> Result<GameSettings> {
        if let Some(cached) = *self.cache.read().await {
            return Ok(cached);
        }

        let mut guard = self.cache.write().await;
        if let Some(cached) = *guard {
            return Ok(cached);
        }

        let existing = sqlx::query_as::<Any, GameSettings>(
            "SELECT response_time, anonymous_poll, poll_time, life FROM game_settings WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        let settings = match existing {
            Some(s) => s,
            None => {
                sqlx::query(
                    "INSERT INTO game_settings (id, response_time, anonymous_poll, poll_time, life)
                     VALUES (1, $1, $2, $3, $4)
                     ON CONFLICT (id) DO NOTHING",
                )
                .bind(self.defaults.response_time)
                .bind(self.defaults.anonymous_poll)
                .bind(self.defaults.poll_time)
                .bind(self.defaults.life)
                .execute(&self.pool)
                .await?;
                self.defaults
            }
        };

        *guard = Some(settings);
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_pool;

    #[tokio::test]
    async fn get_seeds_defaults_once_and_caches() {
        let pool = test_pool().await;
        let defaults = GameSettings {
            response_time: 20,
            anonymous_poll: false,
            poll_time: 12,
            life: 4,
        };
        let store = GameSettingsStore::new(pool, defaults);

        let first = store.get().await.unwrap();
        assert_eq!(first.response_time, 20);
        assert_eq!(first.life, 4);

        let second = store.get().await.unwrap();
        assert_eq!(second.response_time, first.response_time);
    }
}
