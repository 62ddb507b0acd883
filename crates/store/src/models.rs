use sqlx::any::AnyRow;
use sqlx::Row;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameKind {
    Single,
    Group,
}

impl GameKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameKind::Single => "single",
            GameKind::Group => "group",
        }
    }
}

impl std::str::FromStr for GameKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(GameKind::Single),
            "group" => Ok(GameKind::Group),
            other => Err(anyhow::anyhow!("unknown game_type: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub total_point: i32,
}

impl<'r> sqlx::FromRow<'r, AnyRow> for User {
    fn from_row(row: &'r AnyRow) -> Result<Self, sqlx::Error> {
        Ok(User {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            total_point: row.try_get("total_point")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct GameSession {
    pub id: i64,
    pub game_type: GameKind,
    pub chat_id: i64,
    /// Comma-joined list of words played, group games only (stats convenience).
    pub words: Option<String>,
    pub next_user_id: Option<i64>,
    pub creator_id: Option<i64>,
    pub winner_id: Option<i64>,
    pub is_active: bool,
    pub next_start_letter: Option<String>,
    pub current_poll_id: Option<String>,
    pub response_time: i32,
    pub anonymous_poll: bool,
    pub poll_time: i32,
    pub life: i32,
}

impl<'r> sqlx::FromRow<'r, AnyRow> for GameSession {
    fn from_row(row: &'r AnyRow) -> Result<Self, sqlx::Error> {
        let game_type: String = row.try_get("game_type")?;
        let game_type = game_type.parse().map_err(|e: anyhow::Error| {
            sqlx::Error::ColumnDecode {
                index: "game_type".to_string(),
                source: Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
            }
        })?;
        Ok(GameSession {
            id: row.try_get("id")?,
            game_type,
            chat_id: row.try_get("chat_id")?,
            words: row.try_get("words")?,
            next_user_id: row.try_get("next_user_id")?,
            creator_id: row.try_get("creator_id")?,
            winner_id: row.try_get("winner_id")?,
            is_active: row.try_get("is_active")?,
            next_start_letter: row.try_get("next_start_letter")?,
            current_poll_id: row.try_get("current_poll_id")?,
            response_time: row.try_get("response_time")?,
            anonymous_poll: row.try_get("anonymous_poll")?,
            poll_time: row.try_get("poll_time")?,
            life: row.try_get("life")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct UserGameSession {
    pub id: i64,
    pub game_session_id: i64,
    pub player_id: i64,
    pub life: i32,
    pub round_: i32,
    pub point: i32,
    pub poll_answer: Option<bool>,
}

impl<'r> sqlx::FromRow<'r, AnyRow> for UserGameSession {
    fn from_row(row: &'r AnyRow) -> Result<Self, sqlx::Error> {
        Ok(UserGameSession {
            id: row.try_get("id")?,
            game_session_id: row.try_get("game_session_id")?,
            player_id: row.try_get("player_id")?,
            life: row.try_get("life")?,
            round_: row.try_get("round_")?,
            point: row.try_get("point")?,
            poll_answer: row.try_get("poll_answer")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct City {
    pub id: i64,
    pub name: String,
}

impl<'r> sqlx::FromRow<'r, AnyRow> for City {
    fn from_row(row: &'r AnyRow) -> Result<Self, sqlx::Error> {
        Ok(City {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word {
    pub id: i64,
    pub word: String,
}

impl<'r> sqlx::FromRow<'r, AnyRow> for Word {
    fn from_row(row: &'r AnyRow) -> Result<Self, sqlx::Error> {
        Ok(Word {
            id: row.try_get("id")?,
            word: row.try_get("word")?,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GameSettings {
    pub response_time: i32,
    pub anonymous_poll: bool,
    pub poll_time: i32,
    pub life: i32,
}

impl<'r> sqlx::FromRow<'r, AnyRow> for GameSettings {
    fn from_row(row: &'r AnyRow) -> Result<Self, sqlx::Error> {
        Ok(GameSettings {
            response_time: row.try_get("response_time")?,
            anonymous_poll: row.try_get("anonymous_poll")?,
            poll_time: row.try_get("poll_time")?,
            life: row.try_get("life")?,
        })
    }
}

/// A player still alive (`life > 0`) in a session — used to pick the next
/// leader fairly among those who have played the fewest rounds.
#[derive(Debug, Clone)]
pub struct TeamMember {
    pub player_id: i64,
    pub life: i32,
    pub round_: i32,
}
