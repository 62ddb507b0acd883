use anyhow::Result;
use async_trait::async_trait;
use sqlx::any::Any;
use sqlx::Pool;

use crate::models::{TeamMember, UserGameSession};

#[async_trait]
pub trait TeamStoreApi: Send + Sync {
    /// Idempotent join: `ON CONFLICT DO NOTHING` on (session, player).
    async fn add_to_team(&self, session_id: i64, player_id: i64, starting_life: i32) -> Result<()>;

    async fn get(&self, session_id: i64, player_id: i64) -> Result<Option<UserGameSession>>;

    /// Alive players (`life > 0`) grouped by player with their lowest
    /// `round_`, so players who have played fewer rounds come first.
    async fn alive_team(&self, session_id: i64) -> Result<Vec<TeamMember>>;

    async fn remove_life(&self, session_id: i64, player_id: i64) -> Result<()>;
    async fn add_point_and_round(&self, session_id: i64, player_id: i64, point_delta: i32, round_delta: i32) -> Result<()>;
    async fn set_poll_answer(&self, session_id: i64, player_id: i64, answer: bool) -> Result<()>;

    /// `(player_id, username, point)` rows for the end-of-game summary.
    async fn player_scores(&self, session_id: i64) -> Result<Vec<(i64, String, i32)>>;

    /// Tally of `poll_answer` votes recorded by players for a non-anonymous poll.
    async fn poll_answer_tally(&self, session_id: i64) -> Result<(i64, i64)>;
    async fn clear_poll_answers(&self, session_id: i64) -> Result<()>;
}

pub struct TeamStore {
    pool: Pool<Any>,
}

impl TeamStore {
    pub fn new(pool: Pool<Any>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TeamStoreApi for TeamStore {
    async fn add_to_team(&self, session_id: i64, player_id: i64, starting_life: i32) -> Result<()> {
        sqlx::query(
            "INSERT INTO user_game_sessions (game_session_id, player_id, life, round_, point)
             VALUES ($1, $2, $3, 0, 0)
             ON CONFLICT (game_session_id, player_id) DO NOTHING",
        )
        .bind(session_id)
        .bind(player_id)
        .bind(starting_life)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, session_id: i64, player_id: i64) -> Result<Option<UserGameSession>> {
        let row = sqlx::query_as::<Any, UserGameSession>(
            "SELECT id, game_session_id, player_id, life, round_, point, poll_answer
             FROM user_game_sessions WHERE game_session_id = $1 AND player_id = $2",
        )
        .bind(session_id)
        .bind(player_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn alive_team(&self, session_id: i64) -> Result<Vec<TeamMember>> {
        let rows: Vec<(i64, i32, i32)> = sqlx::query_as(
            "SELECT player_id, life, round_ FROM user_game_sessions
             WHERE game_session_id = $1 AND life > 0
             ORDER BY round_ ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(player_id, life, round_)| TeamMember { player_id, life, round_ })
            .collect())
    }

    async fn remove_life(&self, session_id: i64, player_id: i64) -> Result<()> {
        sqlx::query(
            "UPDATE user_game_sessions SET life = life - 1
             WHERE game_session_id = $1 AND player_id = $2 AND life > 0",
        )
        .bind(session_id)
        .bind(player_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn add_point_and_round(&self, session_id: i64, player_id: i64, point_delta: i32, round_delta: i32) -> Result<()> {
        sqlx::query(
            "UPDATE user_game_sessions SET point = point + $1, round_ = round_ + $2
             WHERE game_session_id = $3 AND player_id = $4",
        )
        .bind(point_delta)
        .bind(round_delta)
        .bind(session_id)
        .bind(player_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_poll_answer(&self, session_id: i64, player_id: i64, answer: bool) -> Result<()> {
        sqlx::query(
            "UPDATE user_game_sessions SET poll_answer = $1
             WHERE game_session_id = $2 AND player_id = $3",
        )
        .bind(answer)
        .bind(session_id)
        .bind(player_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn player_scores(&self, session_id: i64) -> Result<Vec<(i64, String, i32)>> {
        let rows: Vec<(i64, String, i32)> = sqlx::query_as(
            "SELECT u.id, u.username, t.point FROM user_game_sessions t
             JOIN users u ON u.id = t.player_id
             WHERE t.game_session_id = $1
             ORDER BY t.point DESC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn poll_answer_tally(&self, session_id: i64) -> Result<(i64, i64)> {
        let yes: i64 = sqlx::query_scalar::<Any, i64>(
            "SELECT COUNT(*) FROM user_game_sessions WHERE game_session_id = $1 AND poll_answer = 1",
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await?;
        let no: i64 = sqlx::query_scalar::<Any, i64>(
            "SELECT COUNT(*) FROM user_game_sessions WHERE game_session_id = $1 AND poll_answer = 0",
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await?;
        Ok((yes, no))
    }

    async fn clear_poll_answers(&self, session_id: i64) -> Result<()> {
        sqlx::query("UPDATE user_game_sessions SET poll_answer = NULL WHERE game_session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_pool;

    async fn seed_users(pool: &Pool<Any>, ids: &[i64]) {
        for id in ids {
            sqlx::query("INSERT INTO users (id, username, total_point) VALUES ($1, $2, 0)")
                .bind(id)
                .bind(format!("user{id}"))
                .execute(pool)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn add_to_team_is_idempotent() {
        let pool = test_pool().await;
        seed_users(&pool, &[1]).await;
        let store = TeamStore::new(pool);

        store.add_to_team(1, 1, 3).await.unwrap();
        store.add_to_team(1, 1, 3).await.unwrap();
        store.remove_life(1, 1).await.unwrap();

        let row = store.get(1, 1).await.unwrap().unwrap();
        assert_eq!(row.life, 2, "second join must not reset life");
    }

    #[tokio::test]
    async fn alive_team_excludes_exhausted_players() {
        let pool = test_pool().await;
        seed_users(&pool, &[1, 2]).await;
        let store = TeamStore::new(pool);

        store.add_to_team(1, 1, 1).await.unwrap();
        store.add_to_team(1, 2, 3).await.unwrap();
        store.remove_life(1, 1).await.unwrap();

        let alive = store.alive_team(1).await.unwrap();
        assert_eq!(alive.len(), 1);
        assert_eq!(alive[0].player_id, 2);
    }

    #[tokio::test]
    async fn remove_life_never_goes_negative() {
        let pool = test_pool().await;
        seed_users(&pool, &[1]).await;
        let store = TeamStore::new(pool);
        store.add_to_team(1, 1, 1).await.unwrap();

        store.remove_life(1, 1).await.unwrap();
        store.remove_life(1, 1).await.unwrap();

        let row = store.get(1, 1).await.unwrap().unwrap();
        assert_eq!(row.life, 0);
    }
}
