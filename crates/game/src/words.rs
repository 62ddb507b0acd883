//! Multi-player "Words" game: Pending (team assembly) -> Playing -> Ended,
//! with democratic polls arbitrating words the dictionary doesn't know.

use citywords_proto::{KeyboardKind, PollOutcome, SenderCommand, WorkerEvent};
use citywords_store::{GameKind, GameSession};
use rand::seq::SliceRandom;
use tracing::info;

use crate::engine::{Effect, GameEngine};
use crate::error::GameResult;
use crate::letters::{next_start_letter, starts_with_letter};

/// Placeholder written to `current_poll_id` the instant a word-admission
/// poll is opened, before the sender reports back the real Telegram poll
/// id — it still satisfies the "paused while non-null" lock (I2).
const POLL_PENDING: &str = "pending";

impl GameEngine {
    /// `/play` in a group chat: opens the team-assembly window.
    pub async fn start_word_game(&self, creator_id: i64, creator_username: &str, chat_id: i64) -> GameResult<Vec<Effect>> {
        if self.sessions.get_active_by_chat(chat_id).await?.is_some() {
            return Ok(vec![Effect::Send(message(chat_id, "Игра уже идёт."))]);
        }

        self.users.create_user(creator_id, creator_username).await?;
        let settings = self.settings.get().await?;
        let session = self
            .sessions
            .create(
                GameKind::Group,
                chat_id,
                Some(creator_id),
                settings.response_time,
                settings.anonymous_poll,
                settings.poll_time,
                settings.life,
            )
            .await?;
        self.team.add_to_team(session.id, creator_id, settings.life).await?;

        Ok(vec![Effect::Send(SenderCommand::MessageKeyboard {
            chat_id,
            text: "Собираем команду! Жмите «Я в деле», пока открыто.".to_string(),
            keyboard: KeyboardKind::JoinTeam,
            live_time: 5,
        })])
    }

    /// The `/yes` ("join team") callback button.
    pub async fn join_team(&self, chat_id: i64, user_id: i64, username: &str, callback_id: &str) -> GameResult<Vec<Effect>> {
        let session = match self.sessions.get_active_by_chat(chat_id).await? {
            Some(s) => s,
            None => return Ok(vec![]),
        };
        self.users.create_user(user_id, username).await?;
        self.team.add_to_team(session.id, user_id, session.life).await?;
        Ok(vec![Effect::Send(SenderCommand::CallbackAlert {
            callback_id: callback_id.to_string(),
            text: "Вы в игре!".to_string(),
        })])
    }

    /// The sender reports the join keyboard has been removed: team
    /// assembly is over, start the first turn.
    pub async fn begin_play(&self, chat_id: i64) -> GameResult<Vec<Effect>> {
        let session = match self.sessions.get_active_by_chat(chat_id).await? {
            Some(s) => s,
            None => return Ok(vec![]),
        };
        self.pick_leader(&session, None, None).await
    }

    async fn pick_leader(&self, session: &GameSession, forced: Option<i64>, exclude: Option<i64>) -> GameResult<Vec<Effect>> {
        let mut alive = self.team.alive_team(session.id).await?;

        if alive.len() == 1 {
            return self.end_group_game(session, Some(alive[0].player_id)).await;
        }
        if alive.len() > 1 {
            if let Some(excluded) = exclude {
                alive.retain(|m| m.player_id != excluded);
            }
        }
        if alive.is_empty() {
            return self.end_group_game(session, None).await;
        }

        let chosen = match forced {
            Some(player_id) => player_id,
            None => alive.choose(&mut rand::thread_rng()).expect("non-empty").player_id,
        };
        self.sessions.set_next_user(session.id, Some(chosen)).await?;

        let user = self
            .users
            .get_user(chosen)
            .await?
            .ok_or_else(|| anyhow::anyhow!("player {chosen} has no user row"))?;
        let letter = session.next_start_letter.clone();
        let text = match &letter {
            Some(l) => format!("@{}, назови слово на букву {l}", user.username),
            None => format!("@{}, назови слово", user.username),
        };
        let round_ = alive
            .iter()
            .find(|m| m.player_id == chosen)
            .map(|m| m.round_)
            .unwrap_or(0);

        info!(session_id = session.id, player = chosen, "new leader chosen");

        Ok(vec![
            Effect::Send(SenderCommand::Message {
                chat_id: session.chat_id,
                text,
                force_reply: true,
            }),
            Effect::SelfEvent {
                event: WorkerEvent::SlowPlayer {
                    game_id: session.id,
                    user_id: chosen,
                    round: round_,
                },
                delay_ms: Some(session.response_time as u64 * 1000),
            },
        ])
    }

    /// A `slow_player` timeout fired. Dropped (idempotently) if the session
    /// is paused by a poll, someone else already answered, or this player
    /// already played since the timeout was scheduled (P5).
    pub async fn handle_slow_player(&self, game_id: i64, user_id: i64, captured_round: i32) -> GameResult<Vec<Effect>> {
        let session = match self.sessions.get(game_id).await? {
            Some(s) => s,
            None => return Ok(vec![]),
        };
        if session.current_poll_id.is_some() {
            return Ok(vec![]);
        }
        if session.next_user_id != Some(user_id) {
            return Ok(vec![]);
        }
        let member = match self.team.get(session.id, user_id).await? {
            Some(m) => m,
            None => return Ok(vec![]),
        };
        if member.round_ != captured_round {
            return Ok(vec![]);
        }

        self.team.remove_life(session.id, user_id).await?;
        self.pick_leader(&session, None, Some(user_id)).await
    }

    /// A word submitted by a group chat member.
    pub async fn check_word(&self, chat_id: i64, author_id: i64, word: &str) -> GameResult<Vec<Effect>> {
        let session = match self.sessions.get_active_by_chat(chat_id).await? {
            Some(s) => s,
            None => return Ok(vec![]),
        };
        if session.current_poll_id.is_some() {
            return Ok(vec![]);
        }

        if session.next_user_id != Some(author_id) {
            self.team.remove_life(session.id, author_id).await?;
            return Ok(vec![Effect::Send(message(chat_id, "Не твоя очередь, теряешь жизнь."))]);
        }

        let word = capitalize(word);

        if let Some(letter) = session.next_start_letter.as_ref().and_then(|s| s.chars().next()) {
            if !starts_with_letter(&word, letter) {
                let mut effects = vec![Effect::Send(message(
                    chat_id,
                    &format!("Нужна буква {letter}, а не {}.", word.chars().next().unwrap_or(' ')),
                ))];
                effects.extend(self.pick_leader(&session, Some(author_id), None).await?);
                return Ok(effects);
            }
        }

        if let Some(existing) = self.words.get_word_by_word(&word).await? {
            if self.words.is_word_used_in_game(session.id, existing.id).await? {
                let mut effects = vec![Effect::Send(message(chat_id, "Это слово уже называли."))];
                effects.extend(self.pick_leader(&session, Some(author_id), None).await?);
                return Ok(effects);
            }
        }

        if self.dictionary.is_noun(&word).await? {
            return self.right_word(&session, &word).await;
        }

        self.sessions.set_current_poll_id(session.id, Some(POLL_PENDING)).await?;
        Ok(vec![Effect::Send(SenderCommand::SendPoll {
            chat_id,
            question: format!("{word} — считать слово?"),
            options: vec!["Yes".to_string(), "No".to_string()],
            anonymous: session.anonymous_poll,
            period: session.poll_time as u32,
            word: word.clone(),
        })])
    }

    async fn right_word(&self, session: &GameSession, word: &str) -> GameResult<Vec<Effect>> {
        let player = session
            .next_user_id
            .ok_or_else(|| anyhow::anyhow!("right_word called with no leader set"))?;

        let word_row = self.words.add_word(word).await?;
        self.words.mark_word_used(session.id, word_row.id).await?;
        self.team.add_point_and_round(session.id, player, 1, 1).await?;

        let next_letter = next_start_letter(word);
        self.sessions
            .set_next_start_letter(session.id, next_letter.map(String::from).as_deref())
            .await?;

        self.pick_leader(session, None, None).await
    }

    /// The sender reports back the Telegram-assigned id of a just-opened poll.
    pub async fn record_poll_id(&self, chat_id: i64, poll_id: &str) -> GameResult<Vec<Effect>> {
        if let Some(session) = self.sessions.get_active_by_chat(chat_id).await? {
            self.sessions.set_current_poll_id(session.id, Some(poll_id)).await?;
        }
        Ok(vec![])
    }

    /// A non-anonymous poll vote from `poll_answer`; contributes to the tally
    /// used when the poll closes.
    pub async fn record_poll_answer(&self, poll_id: &str, user_id: i64, answer: bool) -> GameResult<Vec<Effect>> {
        if let Some(session) = self.sessions.get_by_poll_id(poll_id).await? {
            self.team.set_poll_answer(session.id, user_id, answer).await?;
        }
        Ok(vec![])
    }

    /// The sender closed the poll and reports the outcome.
    pub async fn handle_poll_result(
        &self,
        poll_id: &str,
        reported: PollOutcome,
        word: &str,
    ) -> GameResult<Vec<Effect>> {
        // Idempotency rule (iv): a duplicate poll_result finds no session
        // once the id has already been cleared, and is a no-op.
        let session = match self.sessions.get_by_poll_id(poll_id).await? {
            Some(s) => s,
            None => return Ok(vec![]),
        };
        self.sessions.set_current_poll_id(session.id, None).await?;

        let outcome = if session.anonymous_poll {
            reported
        } else {
            let (yes, no) = self.team.poll_answer_tally(session.id).await?;
            if yes + no == 0 {
                reported
            } else if yes > no {
                PollOutcome::Yes
            } else {
                PollOutcome::No
            }
        };
        self.team.clear_poll_answers(session.id).await?;

        match outcome {
            PollOutcome::Yes => self.right_word(&session, word).await,
            PollOutcome::No => {
                let previous = session.next_user_id;
                if let Some(player) = previous {
                    self.team.remove_life(session.id, player).await?;
                }
                let mut effects = vec![Effect::Send(message(
                    session.chat_id,
                    &format!("{word} — нет такого слова."),
                ))];
                effects.extend(self.pick_leader(&session, None, previous).await?);
                Ok(effects)
            }
        }
    }

    /// `/stop` in a group chat.
    pub async fn stop_word_game(&self, chat_id: i64) -> GameResult<Vec<Effect>> {
        match self.sessions.get_active_by_chat(chat_id).await? {
            Some(session) => self.end_group_game(&session, None).await,
            None => Ok(vec![Effect::Send(message(chat_id, "Игра не идёт."))]),
        }
    }

    async fn end_group_game(&self, session: &GameSession, winner_id: Option<i64>) -> GameResult<Vec<Effect>> {
        self.sessions.set_active(session.id, false).await?;
        if let Some(winner_id) = winner_id {
            self.sessions.set_winner(session.id, winner_id).await?;
        }
        let scores = self.team.player_scores(session.id).await?;
        for (player_id, _, point) in &scores {
            if *point != 0 {
                self.users.add_total_points(*player_id, *point).await?;
            }
        }

        let lines: Vec<String> = scores
            .iter()
            .map(|(_, username, point)| format!("@{username} - {point}"))
            .collect();
        let anonymity = if session.anonymous_poll { "анонимное" } else { "открытое" };
        let winner_line = match winner_id {
            Some(id) => match self.users.get_user(id).await? {
                Some(u) => format!("Победитель: @{}\n", u.username),
                None => String::new(),
            },
            None => String::new(),
        };
        let text = format!(
            "Игра окончена!\n{winner_line}{}\nНастройки: время ответа {}с, голосование {} ({}с).",
            if lines.is_empty() { "Никто не сыграл ни одного слова.".to_string() } else { lines.join("\n") },
            session.response_time,
            anonymity,
            session.poll_time,
        );
        Ok(vec![Effect::Send(message(session.chat_id, &text))])
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn message(chat_id: i64, text: &str) -> SenderCommand {
    SenderCommand::Message {
        chat_id,
        text: text.to_string(),
        force_reply: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::DictionaryApi;
    use async_trait::async_trait;
    use citywords_store::test_support::test_pool;
    use citywords_store::{
        CityStore, GameSessionStore, GameSessionStoreApi, GameSettings, GameSettingsStore, TeamStore,
        TeamStoreApi, UserStore, UserStoreApi, WordStore,
    };
    use sqlx::any::Any;
    use sqlx::Pool;
    use std::sync::Arc;

    struct FixedDictionary(bool);

    #[async_trait]
    impl DictionaryApi for FixedDictionary {
        async fn is_noun(&self, _word: &str) -> anyhow::Result<bool> {
            Ok(self.0)
        }
    }

    async fn engine(pool: Pool<Any>, dictionary_accepts: bool) -> GameEngine {
        GameEngine::new(
            Arc::new(UserStore::new(pool.clone())),
            Arc::new(GameSessionStore::new(pool.clone())),
            Arc::new(TeamStore::new(pool.clone())),
            Arc::new(CityStore::new(pool.clone())),
            Arc::new(WordStore::new(pool.clone())),
            Arc::new(GameSettingsStore::new(
                pool,
                GameSettings {
                    response_time: 15,
                    anonymous_poll: true,
                    poll_time: 15,
                    life: 3,
                },
            )),
            Arc::new(FixedDictionary(dictionary_accepts)),
        )
    }

    #[tokio::test]
    async fn dictionary_hit_awards_point_and_advances() {
        let pool = test_pool().await;
        let engine = engine(pool, true).await;

        engine.start_word_game(1, "leader", 100).await.unwrap();
        let session = engine.sessions.get_active_by_chat(100).await.unwrap().unwrap();
        engine.team.add_to_team(session.id, 2, 3).await.unwrap();
        engine.users.create_user(2, "second").await.unwrap();

        engine.begin_play(100).await.unwrap();
        let session = engine.sessions.get(session.id).await.unwrap().unwrap();
        let leader = session.next_user_id.unwrap();

        engine.check_word(100, leader, "кот").await.unwrap();

        let member = engine.team.get(session.id, leader).await.unwrap().unwrap();
        assert_eq!(member.point, 1);
        assert_eq!(member.round_, 1);
    }

    #[tokio::test]
    async fn wrong_turn_costs_a_life_without_advancing() {
        let pool = test_pool().await;
        let engine = engine(pool, true).await;

        engine.start_word_game(1, "leader", 100).await.unwrap();
        let session = engine.sessions.get_active_by_chat(100).await.unwrap().unwrap();
        engine.team.add_to_team(session.id, 2, 3).await.unwrap();
        engine.users.create_user(2, "second").await.unwrap();
        engine.begin_play(100).await.unwrap();

        let session = engine.sessions.get(session.id).await.unwrap().unwrap();
        let leader = session.next_user_id.unwrap();
        let impostor = if leader == 1 { 2 } else { 1 };

        engine.check_word(100, impostor, "кот").await.unwrap();

        let member = engine.team.get(session.id, impostor).await.unwrap().unwrap();
        assert_eq!(member.life, 2);
        let reloaded = engine.sessions.get(session.id).await.unwrap().unwrap();
        assert_eq!(reloaded.next_user_id, Some(leader), "turn must not advance");
    }

    #[tokio::test]
    async fn stale_slow_player_after_round_advanced_is_a_noop() {
        let pool = test_pool().await;
        let engine = engine(pool, true).await;

        engine.start_word_game(1, "leader", 100).await.unwrap();
        let session = engine.sessions.get_active_by_chat(100).await.unwrap().unwrap();
        engine.team.add_to_team(session.id, 2, 3).await.unwrap();
        engine.users.create_user(2, "second").await.unwrap();
        engine.begin_play(100).await.unwrap();

        let session = engine.sessions.get(session.id).await.unwrap().unwrap();
        let leader = session.next_user_id.unwrap();

        engine.check_word(100, leader, "кот").await.unwrap();
        // The slow_player timeout captured round 0; the player has since
        // advanced to round 1, so this must be dropped (P5).
        let effects = engine.handle_slow_player(session.id, leader, 0).await.unwrap();
        assert!(effects.is_empty());

        let member = engine.team.get(session.id, leader).await.unwrap().unwrap();
        assert_eq!(member.life, 3, "stale timeout must not cost a life");
    }

    #[tokio::test]
    async fn dictionary_miss_opens_a_poll_and_locks_turns() {
        let pool = test_pool().await;
        let engine = engine(pool, false).await;

        engine.start_word_game(1, "leader", 100).await.unwrap();
        let session = engine.sessions.get_active_by_chat(100).await.unwrap().unwrap();
        engine.team.add_to_team(session.id, 2, 3).await.unwrap();
        engine.users.create_user(2, "second").await.unwrap();
        engine.begin_play(100).await.unwrap();

        let session = engine.sessions.get(session.id).await.unwrap().unwrap();
        let leader = session.next_user_id.unwrap();

        let effects = engine.check_word(100, leader, "кракозябра").await.unwrap();
        assert!(matches!(effects[0], Effect::Send(SenderCommand::SendPoll { .. })));

        let locked = engine.sessions.get(session.id).await.unwrap().unwrap();
        assert!(locked.current_poll_id.is_some());

        // A slow_player for the same leader must be dropped while the poll is open.
        let effects = engine.handle_slow_player(session.id, leader, 0).await.unwrap();
        assert!(effects.is_empty());
    }

    #[tokio::test]
    async fn poll_result_yes_awards_point_and_clears_lock() {
        let pool = test_pool().await;
        let engine = engine(pool, false).await;

        engine.start_word_game(1, "leader", 100).await.unwrap();
        let session = engine.sessions.get_active_by_chat(100).await.unwrap().unwrap();
        engine.team.add_to_team(session.id, 2, 3).await.unwrap();
        engine.users.create_user(2, "second").await.unwrap();
        engine.begin_play(100).await.unwrap();
        let session = engine.sessions.get(session.id).await.unwrap().unwrap();
        let leader = session.next_user_id.unwrap();

        engine.check_word(100, leader, "кракозябра").await.unwrap();
        engine.record_poll_id(100, "poll-1").await.unwrap();
        engine
            .handle_poll_result("poll-1", PollOutcome::Yes, "Кракозябра")
            .await
            .unwrap();

        let member = engine.team.get(session.id, leader).await.unwrap().unwrap();
        assert_eq!(member.point, 1);
        let reloaded = engine.sessions.get(session.id).await.unwrap().unwrap();
        assert!(reloaded.current_poll_id.is_none());

        // duplicate delivery after the lock cleared is a no-op (rule iv)
        let effects = engine
            .handle_poll_result("poll-1", PollOutcome::Yes, "Кракозябра")
            .await
            .unwrap();
        assert!(effects.is_empty());
    }
}
