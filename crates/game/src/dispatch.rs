//! Routes decoded inbound traffic to the right `GameEngine` operation:
//! plain-text commands (by first token + chat kind), callback queries, and
//! poll answers.

use citywords_proto::{SenderCommand, WorkerEvent};
use teloxide::types::{CallbackQuery, PollAnswer, Update, UpdateKind};

use crate::engine::{Effect, GameEngine};
use crate::error::GameResult;

fn message(chat_id: i64, text: &str) -> SenderCommand {
    SenderCommand::Message {
        chat_id,
        text: text.to_string(),
        force_reply: false,
    }
}

const HELP_PRIVATE: &str = "Игра в города: напиши /play и называй города по очереди с ботом. /stop завершает игру, /last напомнит букву, /stat покажет счёт.";

const HELP_GROUP_FMT: &str = "Игра в слова: /play собирает команду, каждый жмёт «Я в деле». \
На ответ даётся {response_time} с, жизней на старте — {life}. \
/stop завершает игру, /last напомнит букву, /stat покажет счёт.";

impl GameEngine {
    /// Entry point for whatever the `poller` routing key delivered.
    pub async fn handle_update(&self, update: Update) -> GameResult<Vec<Effect>> {
        match update.kind {
            UpdateKind::Message(msg) => {
                let chat_id = msg.chat.id.0;
                let is_group = !msg.chat.is_private();
                let Some(text) = msg.text().map(str::to_string) else { return Ok(vec![]) };
                let Some(user) = msg.from.as_ref() else { return Ok(vec![]) };
                let user_id = user.id.0 as i64;
                let username = user.username.clone().unwrap_or_default();
                self.dispatch_text(chat_id, user_id, &username, is_group, &text).await
            }
            UpdateKind::CallbackQuery(query) => self.handle_callback(query).await,
            UpdateKind::PollAnswer(answer) => self.handle_poll_answer(answer).await,
            _ => Ok(vec![]),
        }
    }

    async fn dispatch_text(
        &self,
        chat_id: i64,
        user_id: i64,
        username: &str,
        is_group: bool,
        text: &str,
    ) -> GameResult<Vec<Effect>> {
        let mut parts = text.split_whitespace();
        let command = parts.next().unwrap_or("");

        match command {
            "/play" if !is_group => self.start_city_game(user_id, username, chat_id).await,
            "/play" if is_group => self.start_word_game(user_id, username, chat_id).await,
            "/stop" if !is_group => self.stop_city_game(chat_id).await,
            "/stop" if is_group => self.stop_word_game(chat_id).await,
            "/ping" => Ok(vec![Effect::Send(message(chat_id, "/pong"))]),
            "/help" | "/faq" => Ok(vec![Effect::Send(message(chat_id, &self.faq_text(is_group).await?))]),
            "/last" => self.send_last_letter(chat_id).await,
            "/stat" => self.send_stats(chat_id, is_group).await,
            _ if !is_group => self.check_city(chat_id, text).await,
            _ if is_group => self.check_word(chat_id, user_id, text).await,
            _ => Ok(vec![]),
        }
    }

    async fn handle_callback(&self, query: CallbackQuery) -> GameResult<Vec<Effect>> {
        if query.data.as_deref() != Some("/yes") {
            return Ok(vec![]);
        }
        let Some(msg) = &query.message else { return Ok(vec![]) };
        let chat_id = msg.chat().id.0;
        let username = query.from.username.clone().unwrap_or_default();
        self.join_team(chat_id, query.from.id.0 as i64, &username, &query.id).await
    }

    async fn handle_poll_answer(&self, answer: PollAnswer) -> GameResult<Vec<Effect>> {
        // Telegram reports the chosen option indices; by convention option 0
        // is "Yes" and option 1 is "No" for word-admission polls.
        let Some(vote) = answer.option_ids.first() else { return Ok(vec![]) };
        let yes = *vote == 0;
        self.record_poll_answer(&answer.poll_id, answer.user.id.0 as i64, yes).await
    }

    /// A `worker`-routed self-event (timeouts, poll bindings, poll results).
    pub async fn handle_event(&self, event: WorkerEvent) -> GameResult<Vec<Effect>> {
        match event {
            WorkerEvent::PickLeader { chat_id } => self.begin_play(chat_id).await,
            WorkerEvent::SlowPlayer { game_id, user_id, round } => {
                self.handle_slow_player(game_id, user_id, round).await
            }
            WorkerEvent::PollId { poll_id, chat_id } => self.record_poll_id(chat_id, &poll_id).await,
            WorkerEvent::PollResult { poll_id, poll_result, word, .. } => {
                self.handle_poll_result(&poll_id, poll_result, &word).await
            }
        }
    }

    async fn faq_text(&self, is_group: bool) -> GameResult<String> {
        if !is_group {
            return Ok(HELP_PRIVATE.to_string());
        }
        let settings = self.settings.get().await.map_err(crate::error::GameError::Store)?;
        Ok(HELP_GROUP_FMT
            .replace("{response_time}", &settings.response_time.to_string())
            .replace("{life}", &settings.life.to_string()))
    }

    async fn send_last_letter(&self, chat_id: i64) -> GameResult<Vec<Effect>> {
        let session = self
            .sessions
            .get_active_by_chat(chat_id)
            .await
            .map_err(crate::error::GameError::Store)?;
        let text = match session.and_then(|s| s.next_start_letter) {
            Some(letter) => format!("Нужна буква {letter}."),
            None => "Буква ещё не определена.".to_string(),
        };
        Ok(vec![Effect::Send(message(chat_id, &text))])
    }

    /// `/stat`: active session first, falling back to the most recently
    /// ended one so results are still visible right after a game finishes.
    async fn send_stats(&self, chat_id: i64, is_group: bool) -> GameResult<Vec<Effect>> {
        let session = self
            .sessions
            .get_active_by_chat(chat_id)
            .await
            .map_err(crate::error::GameError::Store)?
            .or(self
                .sessions
                .get_latest_by_chat(chat_id)
                .await
                .map_err(crate::error::GameError::Store)?);

        let Some(session) = session else {
            return Ok(vec![Effect::Send(message(chat_id, "Игр ещё не было."))]);
        };

        let text = if is_group {
            let scores = self.team.player_scores(session.id).await.map_err(crate::error::GameError::Store)?;
            let lines: Vec<String> = scores.iter().map(|(_, username, point)| format!("@{username} - {point}")).collect();
            let anonymity = if session.anonymous_poll { "анонимное" } else { "открытое" };
            format!(
                "{}\nНастройки: время ответа {}с, голосование {} ({}с).",
                if lines.is_empty() { "Пока без счёта.".to_string() } else { lines.join("\n") },
                session.response_time,
                anonymity,
                session.poll_time,
            )
        } else {
            let used = self.cities.list_used_cities(session.id).await.map_err(crate::error::GameError::Store)?;
            if used.is_empty() {
                "Города ещё не называли.".to_string()
            } else {
                format!("Сыграно городов: {}", used.len())
            }
        };
        Ok(vec![Effect::Send(message(chat_id, &text))])
    }
}
