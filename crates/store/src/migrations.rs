use sqlx::any::Any;
use sqlx::Pool;

/// Forward-only, idempotent schema migrations. Each statement is its own
/// migration so history stays legible; run once at process startup before
/// the pool is handed to the stores.
const MIGRATIONS: &[&str] = &[
    // base tables
    r#"CREATE TABLE IF NOT EXISTS users (
        id BIGINT PRIMARY KEY,
        username TEXT NOT NULL,
        total_point INTEGER NOT NULL DEFAULT 0
    )"#,
    r#"CREATE TABLE IF NOT EXISTS game_sessions (
        id INTEGER PRIMARY KEY,
        game_type TEXT NOT NULL,
        chat_id BIGINT NOT NULL,
        words TEXT,
        next_user_id BIGINT,
        creator_id BIGINT,
        winner_id BIGINT,
        is_active BOOLEAN NOT NULL DEFAULT 0,
        next_start_letter TEXT,
        current_poll_id TEXT,
        response_time INTEGER NOT NULL DEFAULT 15,
        anonymous_poll BOOLEAN NOT NULL DEFAULT 1,
        poll_time INTEGER NOT NULL DEFAULT 15,
        life INTEGER NOT NULL DEFAULT 3
    )"#,
    r#"CREATE TABLE IF NOT EXISTS user_game_sessions (
        id INTEGER PRIMARY KEY,
        game_session_id INTEGER NOT NULL,
        player_id BIGINT NOT NULL,
        life INTEGER NOT NULL DEFAULT 3,
        round_ INTEGER NOT NULL DEFAULT 0,
        point INTEGER NOT NULL DEFAULT 0,
        poll_answer BOOLEAN
    )"#,
    r#"CREATE TABLE IF NOT EXISTS cities (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS used_cities (
        id INTEGER PRIMARY KEY,
        game_session_id INTEGER NOT NULL,
        city_id INTEGER NOT NULL
    )"#,
    // words + per-game usage
    r#"CREATE TABLE IF NOT EXISTS words (
        id INTEGER PRIMARY KEY,
        word TEXT NOT NULL UNIQUE
    )"#,
    r#"CREATE TABLE IF NOT EXISTS words_in_game (
        id INTEGER PRIMARY KEY,
        game_session_id INTEGER NOT NULL,
        word_id INTEGER NOT NULL
    )"#,
    // singleton settings row, seeded by the caller on first read
    r#"CREATE TABLE IF NOT EXISTS game_settings (
        id INTEGER PRIMARY KEY,
        response_time INTEGER NOT NULL DEFAULT 15,
        anonymous_poll BOOLEAN NOT NULL DEFAULT 1,
        poll_time INTEGER NOT NULL DEFAULT 15,
        life INTEGER NOT NULL DEFAULT 3
    )"#,
    // idempotent-join / invariant-backing unique indexes
    r#"CREATE UNIQUE INDEX IF NOT EXISTS ux_user_game_sessions_session_player
        ON user_game_sessions (game_session_id, player_id)"#,
    r#"CREATE UNIQUE INDEX IF NOT EXISTS ux_used_cities_session_city
        ON used_cities (game_session_id, city_id)"#,
    r#"CREATE UNIQUE INDEX IF NOT EXISTS ux_words_in_game_session_word
        ON words_in_game (game_session_id, word_id)"#,
];

pub async fn run(pool: &Pool<Any>) -> Result<(), sqlx::Error> {
    for statement in MIGRATIONS {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
