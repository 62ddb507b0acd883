#![cfg(any(test, feature = "test-utils"))]

use sqlx::any::{Any, AnyPoolOptions};
use sqlx::Pool;

/// Builds an in-memory sqlite pool with the schema applied. Exposed under
/// the `test-utils` feature so downstream crates (e.g. `citywords-game`)
/// can exercise the store layer without standing up a real database.
pub async fn test_pool() -> Pool<Any> {
    sqlx::any::install_default_drivers();
    let pool = AnyPoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite pool");
    crate::migrations::run(&pool).await.expect("run migrations");
    pool
}
