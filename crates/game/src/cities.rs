//! Single-player "Cities" chain game: Idle -> Active -> Ended, a strict
//! player-turn / bot-turn alternation.

use citywords_store::GameKind;
use rand::seq::SliceRandom;
use tracing::info;

use crate::engine::{Effect, GameEngine};
use crate::error::GameResult;
use crate::letters::{next_start_letter, starts_with_letter};

/// Letters no Russian city realistically starts with are left out so a cold
/// start never stalls on an empty candidate pool.
const STARTING_LETTERS: &[char] = &[
    'А', 'Б', 'В', 'Г', 'Д', 'Е', 'Ж', 'З', 'И', 'К', 'Л', 'М', 'Н', 'О', 'П', 'Р', 'С', 'Т', 'У',
    'Х', 'Ч', 'Ш', 'Э', 'Ю', 'Я',
];

impl GameEngine {
    /// `/play` in a private chat. Refuses if a session is already active.
    pub async fn start_city_game(&self, user_id: i64, username: &str, chat_id: i64) -> GameResult<Vec<Effect>> {
        if self.sessions.get_active_by_chat(chat_id).await?.is_some() {
            return Ok(vec![Effect::Send(message(chat_id, "Игра уже идёт."))]);
        }

        self.users.create_user(user_id, username).await?;
        let settings = self.settings.get().await?;
        let session = self
            .sessions
            .create(
                GameKind::Single,
                chat_id,
                Some(user_id),
                settings.response_time,
                settings.anonymous_poll,
                settings.poll_time,
                settings.life,
            )
            .await?;

        let mut effects = vec![Effect::Send(message(chat_id, "Начинаем игру в города!"))];
        let letter = *STARTING_LETTERS
            .choose(&mut rand::thread_rng())
            .expect("STARTING_LETTERS is non-empty");
        effects.extend(self.pick_city(session.id, chat_id, letter).await?);
        Ok(effects)
    }

    /// The bot's turn: draw an unused city starting with `letter`.
    async fn pick_city(&self, session_id: i64, chat_id: i64, letter: char) -> GameResult<Vec<Effect>> {
        match self
            .cities
            .pick_unused_city_by_letter(session_id, &letter.to_string())
            .await?
        {
            Some(city) => {
                self.cities.mark_city_used(session_id, city.id).await?;
                let next = next_start_letter(&city.name);
                self.sessions
                    .set_next_start_letter(session_id, next.map(String::from).as_deref())
                    .await?;
                info!(session_id, city = %city.name, "bot played city");
                let text = match next {
                    Some(letter) => format!("{}. Тебе на {}", city.name, letter),
                    None => format!("{}. Придумай город на любую букву.", city.name),
                };
                Ok(vec![Effect::Send(message(chat_id, &text))])
            }
            None => {
                self.sessions.set_active(session_id, false).await?;
                Ok(vec![Effect::Send(message(
                    chat_id,
                    "Города закончились, я проиграл!",
                ))])
            }
        }
    }

    /// The player's turn: validate and score a submitted city name.
    pub async fn check_city(&self, chat_id: i64, submitted: &str) -> GameResult<Vec<Effect>> {
        let session = match self.sessions.get_active_by_chat(chat_id).await? {
            Some(s) => s,
            None => return Ok(vec![]),
        };

        let city = match self.cities.get_city_by_name(submitted).await? {
            Some(c) => c,
            None => return Ok(vec![Effect::Send(message(chat_id, "Такого города нет."))]),
        };

        if self.cities.is_city_used(session.id, city.id).await? {
            return Ok(vec![Effect::Send(message(chat_id, "Этот город уже был."))]);
        }

        if let Some(required) = session.next_start_letter.as_ref().and_then(|s| s.chars().next()) {
            if !starts_with_letter(&city.name, required) {
                return Ok(vec![Effect::Send(message(
                    chat_id,
                    &format!("Нужна буква {required}, а не {}.", city.name.chars().next().unwrap_or(' ')),
                ))]);
            }
        }

        self.cities.mark_city_used(session.id, city.id).await?;
        let next = next_start_letter(&city.name);
        self.sessions
            .set_next_start_letter(session.id, next.map(String::from).as_deref())
            .await?;

        let accept = Effect::Send(message(chat_id, "Принято!"));
        let letter = next.unwrap_or('А');
        let mut effects = vec![accept];
        effects.extend(self.pick_city(session.id, chat_id, letter).await?);
        Ok(effects)
    }

    /// `/stop` in a private chat: ends the session and lists the cities played.
    pub async fn stop_city_game(&self, chat_id: i64) -> GameResult<Vec<Effect>> {
        let session = match self.sessions.get_active_by_chat(chat_id).await? {
            Some(s) => s,
            None => return Ok(vec![Effect::Send(message(chat_id, "Игра не идёт."))]),
        };

        self.sessions.set_active(session.id, false).await?;
        let used = self.cities.list_used_cities(session.id).await?;
        let names: Vec<&str> = used.iter().map(|c| c.name.as_str()).collect();
        let text = if names.is_empty() {
            "Игра окончена. Города не назывались.".to_string()
        } else {
            format!("Игра окончена. Сыграно городов: {}", names.join(", "))
        };
        Ok(vec![Effect::Send(message(chat_id, &text))])
    }
}

fn message(chat_id: i64, text: &str) -> citywords_proto::SenderCommand {
    citywords_proto::SenderCommand::Message {
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
        CityStore, GameSessionStore, GameSettings, GameSettingsStore, TeamStore, UserStore, WordStore,
    };
    use sqlx::any::Any;
    use sqlx::Pool;
    use std::sync::Arc;

    struct NoopDictionary;

    #[async_trait]
    impl DictionaryApi for NoopDictionary {
        async fn is_noun(&self, _word: &str) -> anyhow::Result<bool> {
            Ok(true)
        }
    }

    async fn engine_with_cities(pool: Pool<Any>, names: &[&str]) -> GameEngine {
        for name in names {
            sqlx::query("INSERT INTO cities (name) VALUES ($1)")
                .bind(name)
                .execute(&pool)
                .await
                .unwrap();
        }
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
            Arc::new(NoopDictionary),
        )
    }

    #[tokio::test]
    async fn starting_twice_is_rejected() {
        let pool = test_pool().await;
        let engine = engine_with_cities(pool, &["Архангельск"]).await;

        engine.start_city_game(1, "alice", 1).await.unwrap();
        let effects = engine.start_city_game(1, "alice", 1).await.unwrap();

        assert_eq!(effects.len(), 1);
        match &effects[0] {
            Effect::Send(citywords_proto::SenderCommand::Message { text, .. }) => {
                assert!(text.contains("уже"));
            }
            _ => panic!("expected a message effect"),
        }
    }

    #[tokio::test]
    async fn duplicate_city_is_rejected_without_penalty() {
        let pool = test_pool().await;
        let engine = engine_with_cities(pool, &["Архангельск", "Калуга"]).await;
        engine.start_city_game(1, "alice", 1).await.unwrap();

        // Whatever the bot opened with, re-submit the same city it used.
        let used = engine.cities.list_used_cities(1).await.unwrap();
        let city_name = used[0].name.clone();

        let effects = engine.check_city(1, &city_name).await.unwrap();
        let text = match &effects[0] {
            Effect::Send(citywords_proto::SenderCommand::Message { text, .. }) => text.clone(),
            _ => panic!("expected message"),
        };
        assert!(text.contains("уже был"));
    }

    #[tokio::test]
    async fn bot_loses_when_no_city_remains() {
        let pool = test_pool().await;
        // Only one city for letter К, already guaranteed to be consumed on start.
        let engine = engine_with_cities(pool, &["Калуга"]).await;

        // Force the session to look for a letter with zero candidates.
        let effects = engine.pick_city(999, 1, 'Ъ').await.unwrap();
        match &effects[0] {
            Effect::Send(citywords_proto::SenderCommand::Message { text, .. }) => {
                assert!(text.contains("проиграл"));
            }
            _ => panic!("expected a loss message"),
        }
    }
}
