//! Test utilities shared by the unit tests.

use crate::config::{Config, DatabaseConfig, PoolSettings};
use crate::schema::{ResourceSchema, builtin_resources};
use axum_test::TestServer;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

/// A private in-memory database.
///
/// Every connection to `sqlite::memory:` gets its own database, so the pool is held to a single
/// connection that is never recycled.
pub async fn test_pool() -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database")
}

pub fn create_test_config() -> Config {
    Config {
        database: DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            create_if_missing: true,
            pool: PoolSettings {
                max_connections: 1,
                min_connections: 1,
                idle_timeout_secs: 0,
                max_lifetime_secs: 0,
                ..Default::default()
            },
        },
        seed_sample_data: false,
        ..Default::default()
    }
}

/// An application on `pool` with the built-in resources and no sample data.
pub async fn create_test_app(pool: SqlitePool) -> TestServer {
    let config = create_test_config();

    let app = crate::Application::new_with_pool(config, pool)
        .await
        .expect("Failed to create application");

    app.into_test_server()
}

/// One of the built-in resource schemas, by name.
pub fn schema_named(name: &str) -> ResourceSchema {
    builtin_resources()
        .into_iter()
        .find(|s| s.name == name)
        .unwrap_or_else(|| panic!("no built-in resource named {name}"))
}
