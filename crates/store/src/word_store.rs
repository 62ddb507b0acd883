use anyhow::Result;
use async_trait::async_trait;
use sqlx::any::Any;
use sqlx::Pool;

use crate::models::Word;

#[async_trait]
pub trait WordStoreApi: Send + Sync {
    async fn get_word_by_word(&self, word: &str) -> Result<Option<Word>>;

    /// Inserts the word (global, capitalized by the caller) if absent, then
    /// returns the row either way.
    async fn add_word(&self, word: &str) -> Result<Word>;

    async fn is_word_used_in_game(&self, session_id: i64, word_id: i64) -> Result<bool>;
    async fn mark_word_used(&self, session_id: i64, word_id: i64) -> Result<()>;
    async fn list_used_words(&self, session_id: i64) -> Result<Vec<Word>>;
}

pub struct WordStore {
    pool: Pool<Any>,
}

impl WordStore {
    pub fn new(pool: Pool<Any>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WordStoreApi for WordStore {
    async fn get_word_by_word(&self, word: &str) -> Result<Option<Word>> {
        let row = sqlx::query_as::<Any, Word>("SELECT id, word FROM words WHERE word = $1")
            .bind(word)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn add_word(&self, word: &str) -> Result<Word> {
        sqlx::query("INSERT INTO words (word) VALUES ($1) ON CONFLICT (word) DO NOTHING")
            .bind(word)
            .execute(&self.pool)
            .await?;
        let row = sqlx::query_as::<Any, Word>("SELECT id, word FROM words WHERE word = $1")
            .bind(word)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    async fn is_word_used_in_game(&self, session_id: i64, word_id: i64) -> Result<bool> {
        let count: i64 = sqlx::query_scalar::<Any, i64>(
            "SELECT COUNT(*) FROM words_in_game WHERE game_session_id = $1 AND word_id = $2",
        )
        .bind(session_id)
        .bind(word_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    async fn mark_word_used(&self, session_id: i64, word_id: i64) -> Result<()> {
        if self.is_word_used_in_game(session_id, word_id).await? {
            return Ok(());
        }
        sqlx::query("INSERT INTO words_in_game (game_session_id, word_id) VALUES ($1, $2)")
            .bind(session_id)
            .bind(word_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_used_words(&self, session_id: i64) -> Result<Vec<Word>> {
        let rows = sqlx::query_as::<Any, Word>(
            "SELECT w.id, w.word FROM words w
             JOIN words_in_game g ON g.word_id = w.id
             WHERE g.game_session_id = $1
             ORDER BY g.id",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_pool;

    #[tokio::test]
    async fn add_word_is_idempotent_and_global() {
        let pool = test_pool().await;
        let store = WordStore::new(pool);

        let a = store.add_word("Кот").await.unwrap();
        let b = store.add_word("Кот").await.unwrap();
        assert_eq!(a.id, b.id);
    }

    #[tokio::test]
    async fn mark_word_used_is_per_session() {
        let pool = test_pool().await;
        let store = WordStore::new(pool);
        let word = store.add_word("Кот").await.unwrap();

        store.mark_word_used(1, word.id).await.unwrap();
        assert!(store.is_word_used_in_game(1, word.id).await.unwrap());
        assert!(!store.is_word_used_in_game(2, word.id).await.unwrap());
    }
}
