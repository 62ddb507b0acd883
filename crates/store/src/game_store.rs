use anyhow::Result;
use async_trait::async_trait;
use sqlx::any::Any;
use sqlx::Pool;

use crate::models::{GameKind, GameSession};

#[async_trait]
pub trait GameSessionStoreApi: Send + Sync {
    /// The single active session for a chat, if any (at most one, I1).
    async fn get_active_by_chat(&self, chat_id: i64) -> Result<Option<GameSession>>;

    /// Falls back to the most recently ended session for a chat — used by
    /// `/stat` right after a game finishes.
    async fn get_latest_by_chat(&self, chat_id: i64) -> Result<Option<GameSession>>;

    async fn get(&self, id: i64) -> Result<Option<GameSession>>;
    async fn get_by_poll_id(&self, poll_id: &str) -> Result<Option<GameSession>>;

    async fn create(
        &self,
        kind: GameKind,
        chat_id: i64,
        creator_id: Option<i64>,
        response_time: i32,
        anonymous_poll: bool,
        poll_time: i32,
        life: i32,
    ) -> Result<GameSession>;

    async fn set_active(&self, id: i64, is_active: bool) -> Result<()>;
    async fn set_next_user(&self, id: i64, next_user_id: Option<i64>) -> Result<()>;
    async fn set_next_start_letter(&self, id: i64, letter: Option<&str>) -> Result<()>;
    async fn set_current_poll_id(&self, id: i64, poll_id: Option<&str>) -> Result<()>;
    async fn set_winner(&self, id: i64, winner_id: i64) -> Result<()>;
}

pub struct GameSessionStore {
    pool: Pool<Any>,
}

impl GameSessionStore {
    pub fn new(pool: Pool<Any>) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = "id, game_type, chat_id, words, next_user_id, creator_id, winner_id, \
     is_active, next_start_letter, current_poll_id, response_time, anonymous_poll, poll_time, life";

#[async_trait]
impl GameSessionStoreApi for GameSessionStore {
    async fn get_active_by_chat(&self, chat_id: i64) -> Result<Option<GameSession>> {
        let query = format!(
            "SELECT {SELECT_COLUMNS} FROM game_sessions WHERE chat_id = $1 AND is_active = 1"
        );
        let session = sqlx::query_as::<Any, GameSession>(&query)
            .bind(chat_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(session)
    }

    async fn get_latest_by_chat(&self, chat_id: i64) -> Result<Option<GameSession>> {
        let query = format!(
            "SELECT {SELECT_COLUMNS} FROM game_sessions WHERE chat_id = $1 ORDER BY id DESC LIMIT 1"
        );
        let session = sqlx::query_as::<Any, GameSession>(&query)
            .bind(chat_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(session)
    }

    async fn get(&self, id: i64) -> Result<Option<GameSession>> {
        let query = format!("SELECT {SELECT_COLUMNS} FROM game_sessions WHERE id = $1");
        let session = sqlx::query_as::<Any, GameSession>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(session)
    }

    async fn get_by_poll_id(&self, poll_id: &str) -> Result<Option<GameSession>> {
        let query = format!("SELECT {SELECT_COLUMNS} FROM game_sessions WHERE current_poll_id = $1");
        let session = sqlx::query_as::<Any, GameSession>(&query)
            .bind(poll_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(session)
    }

    async fn create(
        &self,
        kind: GameKind,
        chat_id: i64,
        creator_id: Option<i64>,
        response_time: i32,
        anonymous_poll: bool,
        poll_time: i32,
        life: i32,
    ) -> Result<GameSession> {
        let id: i64 = sqlx::query_scalar::<Any, i64>(
            "INSERT INTO game_sessions
                (game_type, chat_id, creator_id, is_active, response_time, anonymous_poll, poll_time, life)
             VALUES ($1, $2, $3, 1, $4, $5, $6, $7)
             RETURNING id",
        )
        .bind(kind.as_str())
        .bind(chat_id)
        .bind(creator_id)
        .bind(response_time)
        .bind(anonymous_poll)
        .bind(poll_time)
        .bind(life)
        .fetch_one(&self.pool)
        .await?;

        self.get(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("game session {id} vanished right after insert"))
    }

    async fn set_active(&self, id: i64, is_active: bool) -> Result<()> {
        sqlx::query("UPDATE game_sessions SET is_active = $1 WHERE id = $2")
            .bind(is_active)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_next_user(&self, id: i64, next_user_id: Option<i64>) -> Result<()> {
        sqlx::query("UPDATE game_sessions SET next_user_id = $1 WHERE id = $2")
            .bind(next_user_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_next_start_letter(&self, id: i64, letter: Option<&str>) -> Result<()> {
        sqlx::query("UPDATE game_sessions SET next_start_letter = $1 WHERE id = $2")
            .bind(letter)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_current_poll_id(&self, id: i64, poll_id: Option<&str>) -> Result<()> {
        sqlx::query("UPDATE game_sessions SET current_poll_id = $1 WHERE id = $2")
            .bind(poll_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_winner(&self, id: i64, winner_id: i64) -> Result<()> {
        sqlx::query("UPDATE game_sessions SET winner_id = $1 WHERE id = $2")
            .bind(winner_id)
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
    async fn at_most_one_active_session_per_chat() {
        let pool = test_pool().await;
        let store = GameSessionStore::new(pool);

        let session = store
            .create(GameKind::Single, 42, Some(1), 15, true, 15, 3)
            .await
            .unwrap();
        assert!(store.get_active_by_chat(42).await.unwrap().is_some());

        store.set_active(session.id, false).await.unwrap();
        assert!(store.get_active_by_chat(42).await.unwrap().is_none());
        assert!(store.get_latest_by_chat(42).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn poll_lock_round_trips() {
        let pool = test_pool().await;
        let store = GameSessionStore::new(pool);
        let session = store
            .create(GameKind::Group, 7, None, 15, true, 15, 3)
            .await
            .unwrap();

        store.set_current_poll_id(session.id, Some("1234")).await.unwrap();
        let reloaded = store.get(session.id).await.unwrap().unwrap();
        assert_eq!(reloaded.current_poll_id.as_deref(), Some("1234"));

        let by_poll = store.get_by_poll_id("1234").await.unwrap().unwrap();
        assert_eq!(by_poll.id, session.id);

        store.set_current_poll_id(session.id, None).await.unwrap();
        assert!(store.get_by_poll_id("1234").await.unwrap().is_none());
    }
}
