use thiserror::Error;

#[derive(Debug, Error)]
pub enum GameError {
    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

pub type GameResult<T> = Result<T, GameError>;
