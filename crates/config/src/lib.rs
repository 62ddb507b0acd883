//! Environment-driven configuration. One immutable `AppConfig` built once at
//! startup and threaded through constructors — no global mutable state.

use anyhow::{anyhow, Result};
use citywords_broker::BrokerConfig;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bot_token: String,
    pub yandex_dict_token: String,
    pub database_url: String,
    pub broker: BrokerConfig,
    pub session_key: String,
    pub game_defaults: GameDefaults,
}

/// Seeds the `GameSettings` singleton row on first run.
#[derive(Debug, Clone, Copy)]
pub struct GameDefaults {
    pub response_time_secs: i32,
    pub anonymous_poll: bool,
    pub poll_time_secs: i32,
    pub life: i32,
}

impl Default for GameDefaults {
    fn default() -> Self {
        Self {
            response_time_secs: 15,
            anonymous_poll: true,
            poll_time_secs: 15,
            life: 3,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let bot_token = env_var("BOT_TOKEN_TG")?;
        let yandex_dict_token = env_var("YANDEX_DICT_TOKEN")?;
        let database_url = env_var("DATABASE_URL")?;
        let session_key = std::env::var("SESSION_KEY").unwrap_or_else(|_| "dev-session-key".to_string());

        let broker = BrokerConfig {
            host: std::env::var("RABBITMQ_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("RABBITMQ_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5672),
            user: std::env::var("RABBITMQ_USER").unwrap_or_else(|_| "guest".to_string()),
            password: std::env::var("RABBITMQ_PASSWORD").unwrap_or_else(|_| "guest".to_string()),
            vhost: std::env::var("RABBITMQ_VHOST").unwrap_or_default(),
        };

        let game_defaults = GameDefaults {
            response_time_secs: env_parse("GAME_RESPONSE_TIME_SECS", 15),
            anonymous_poll: env_parse("GAME_ANONYMOUS_POLL", true),
            poll_time_secs: env_parse("GAME_POLL_TIME_SECS", 15),
            life: env_parse("GAME_LIFE", 3),
        };

        Ok(Self {
            bot_token,
            yandex_dict_token,
            database_url,
            broker,
            session_key,
            game_defaults,
        })
    }
}

fn env_var(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| anyhow!("{name} environment variable is required"))
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
