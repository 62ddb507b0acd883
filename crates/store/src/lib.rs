pub mod city_store;
pub mod game_store;
pub mod migrations;
pub mod models;
pub mod settings_store;
pub mod team_store;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;
pub mod user_store;
pub mod word_store;

pub use city_store::{CityStore, CityStoreApi};
pub use game_store::{GameSessionStore, GameSessionStoreApi};
pub use models::{City, GameKind, GameSession, GameSettings, TeamMember, User, UserGameSession, Word};
pub use settings_store::{GameSettingsApi, GameSettingsStore};
pub use team_store::{TeamStore, TeamStoreApi};
pub use user_store::{UserStore, UserStoreApi};
pub use word_store::{WordStore, WordStoreApi};

use sqlx::any::{Any, AnyPoolOptions};
use sqlx::Pool;

/// Connects and runs migrations — the single entry point each binary uses
/// to get a ready-to-use pool.
pub async fn connect(database_url: &str) -> Result<Pool<Any>, sqlx::Error> {
    sqlx::any::install_default_drivers();
    let pool = AnyPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    migrations::run(&pool).await?;
    Ok(pool)
}
