pub mod cities;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod letters;
pub mod words;

pub use engine::{DictionaryApi, Effect, GameEngine};
pub use error::{GameError, GameResult};
