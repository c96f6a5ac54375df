//! # pantry: schema-driven CRUD service
//!
//! `pantry` serves a set of small REST resources (recipes, fridge items, nutrition facts and
//! scores out of the box) from a single generic implementation. Each resource is described by a
//! [`schema::ResourceSchema`] in the configuration; the same validator, repository and handlers
//! serve all of them.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for the HTTP layer and
//! uses SQLite through SQLx for persistence, one table per resource.
//!
//! A request to `POST /api/<resource>/create` flows through:
//!
//! 1. the **handler** ([`api::handlers::records`]), which decodes the JSON body,
//! 2. the **validator** ([`validation`]), which checks it against the resource's fields,
//! 3. the **repository** ([`db::handlers::Records`]), which persists it in a per-request
//!    transaction,
//!
//! and the stored record is serialized back as JSON. Errors from any step are converted into
//! `{"message": ...}` responses by [`errors::Error`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use pantry::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = pantry::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     pantry::telemetry::init_telemetry()?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.
pub mod api;
pub mod config;
pub mod db;
pub mod errors;
pub mod schema;
pub mod seed;
pub mod telemetry;
pub mod types;
pub mod validation;

#[cfg(test)]
pub mod test_utils;

use crate::api::handlers::records::{ResourceState, router as resource_router};
use crate::config::CorsOrigin;
use crate::db::tables::ensure_table;
use axum::{
    Router,
    extract::State,
    http::{HeaderValue, Method, header},
    routing::get,
};
use bon::Builder;
pub use config::Config;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::{str::FromStr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};

/// Application state shared by the top-level routes.
///
/// Resource routes carry their own [`ResourceState`], built from this state and one schema.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .db(pool)
///     .config(config)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Config,
}

/// Open the connection pool described by the configuration
async fn setup_database(config: &Config) -> anyhow::Result<SqlitePool> {
    let settings = &config.database.pool;
    let options = SqliteConnectOptions::from_str(&config.database.url)?.create_if_missing(config.database.create_if_missing);

    let seconds = |secs: u64| (secs > 0).then(|| Duration::from_secs(secs));
    let pool = SqlitePoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
        .idle_timeout(seconds(settings.idle_timeout_secs))
        .max_lifetime(seconds(settings.max_lifetime_secs))
        .connect_with(options)
        .await?;

    info!("Connected to database at {}", config.database.url);

    Ok(pool)
}

/// Create missing tables and, if enabled, seed empty built-in tables
#[instrument(skip_all, err)]
pub async fn prepare_resources(pool: &SqlitePool, config: &Config) -> anyhow::Result<()> {
    let mut conn = pool.acquire().await?;
    for schema in &config.resources {
        ensure_table(&mut conn, schema).await?;
    }
    drop(conn);

    if config.seed_sample_data {
        seed::seed_sample_data(pool, &config.resources).await?;
    }

    Ok(())
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    if config.cors.allowed_origins.iter().any(|o| matches!(o, CorsOrigin::Wildcard)) {
        cors = cors.allow_origin(Any);
    } else {
        let mut origins = Vec::new();
        for origin in &config.cors.allowed_origins {
            if let CorsOrigin::Url(url) = origin {
                // Origins never carry the trailing slash that Url adds to bare hosts
                origins.push(url.as_str().trim_end_matches('/').parse::<HeaderValue>()?);
            }
        }
        cors = cors.allow_origin(origins);
    }

    if let Some(max_age) = config.cors.max_age {
        cors = cors.max_age(Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Liveness and database check
async fn healthz(State(state): State<AppState>) -> errors::Result<&'static str> {
    sqlx::query("SELECT 1")
        .execute(&state.db)
        .await
        .map_err(|e| errors::Error::Database(e.into()))?;
    Ok("OK")
}

/// Build the application router: one set of routes per configured resource, `/healthz`, CORS
/// and request tracing.
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    let mut router = Router::new().route("/healthz", get(healthz)).with_state(state.clone());

    for schema in &state.config.resources {
        debug!("Mounting routes for /api/{}", schema.name);
        router = router.merge(resource_router(ResourceState {
            db: state.db.clone(),
            schema: Arc::new(schema.clone()),
        }));
    }

    let router = router.layer(create_cors_layer(&state.config)?).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

pub struct Application {
    router: Router,
    config: Config,
    pool: SqlitePool,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting pantry with configuration: {:#?}", config);

        let pool = setup_database(&config).await?;
        Self::new_with_pool(config, pool).await
    }

    /// Create an application on an existing pool
    pub async fn new_with_pool(config: Config, pool: SqlitePool) -> anyhow::Result<Self> {
        prepare_resources(&pool, &config).await?;

        let app_state = AppState::builder().db(pool.clone()).config(config.clone()).build();
        let router = build_router(&app_state)?;

        Ok(Self { router, config, pool })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "pantry listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        // Run the server with graceful shutdown
        axum::serve(listener, self.router).with_graceful_shutdown(shutdown).await?;

        // Close database connections
        info!("Closing database connections...");
        self.pool.close().await;

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::schema::{FieldSpec, ResourceSchema};
    use crate::test_utils::*;
    use axum::http::StatusCode;
    use serde_json::{Value, json};

    #[test_log::test(tokio::test)]
    async fn test_healthz() {
        let server = create_test_app(test_pool().await).await;

        let response = server.get("/healthz").await;
        response.assert_status_ok();
        response.assert_text("OK");
    }

    #[test_log::test(tokio::test)]
    async fn test_sample_data_is_served_when_enabled() {
        let config = Config {
            seed_sample_data: true,
            ..create_test_config()
        };
        let app = Application::new_with_pool(config, test_pool().await).await.unwrap();
        let server = app.into_test_server();

        let recipes: Vec<Value> = server.get("/api/recipes/").await.json();
        assert_eq!(recipes.len(), 12);
        assert_eq!(
            recipes[0],
            json!({
                "id": 1,
                "name": "Avocado Toast",
                "link": "https://californiaavocado.com/recipes",
                "type": "Breakfast",
                "calories": 100
            })
        );

        let scores: Vec<Value> = server.get("/api/scores/").await.json();
        assert_eq!(scores.len(), 5);
    }

    #[test_log::test(tokio::test)]
    async fn test_configured_resources_replace_builtins() {
        let config = Config {
            resources: vec![
                ResourceSchema::new(
                    "pantry_items",
                    vec![FieldSpec::text("name", 2), FieldSpec::integer("quantity")],
                )
                .with_unique_key("name"),
            ],
            ..create_test_config()
        };
        let app = Application::new_with_pool(config, test_pool().await).await.unwrap();
        let server = app.into_test_server();

        let response = server
            .post("/api/pantry_items/create")
            .json(&json!({"name": "Flour", "quantity": 2}))
            .await;
        response.assert_status_ok();
        response.assert_json(&json!({"id": 1, "name": "Flour", "quantity": 2}));

        let response = server
            .post("/api/pantry_items/create")
            .json(&json!({"name": "Flour", "quantity": "two"}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(&json!({"message": "quantity must be an integer"}));

        server.get("/api/recipes/").await.assert_status(StatusCode::NOT_FOUND);
    }

    #[test_log::test(tokio::test)]
    async fn test_records_survive_restart_with_file_database() {
        let path = std::env::temp_dir().join(format!("pantry-test-{}-restart.db", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let mut config = create_test_config();
        config.database.url = format!("sqlite://{}", path.display());

        let first = Application::new(config.clone()).await.unwrap();
        let pool = first.pool.clone();
        let server = first.into_test_server();
        server
            .post("/api/scores/create")
            .json(&json!({"name": "Lina", "score": "3"}))
            .await
            .assert_status_ok();
        drop(server);
        pool.close().await;

        let second = Application::new(config).await.unwrap();
        let pool = second.pool.clone();
        let server = second.into_test_server();
        let scores: Vec<Value> = server.get("/api/scores/").await.json();
        assert_eq!(scores, vec![json!({"id": 1, "name": "Lina", "score": "3"})]);
        drop(server);
        pool.close().await;

        let _ = std::fs::remove_file(&path);
    }

    #[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
    async fn test_concurrent_writes_on_file_database() {
        use crate::api::handlers::records::{create_record, update_record};
        use axum::{
            Json,
            extract::{Path, State},
            response::IntoResponse,
        };
        use tokio::task::JoinSet;

        let path = std::env::temp_dir().join(format!("pantry-test-{}-concurrent.db", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let mut config = create_test_config();
        config.database.url = format!("sqlite://{}", path.display());
        config.database.pool.max_connections = 8;
        config.database.pool.min_connections = 0;

        let app = Application::new(config).await.unwrap();
        let pool = app.pool.clone();
        let state = |name: &str| ResourceState {
            db: pool.clone(),
            schema: Arc::new(schema_named(name)),
        };

        // Same natural key from many requests at once: exactly one wins
        let scores = state("scores");
        let mut tasks = JoinSet::new();
        for i in 0..20 {
            let scores = scores.clone();
            tasks.spawn(async move {
                create_record(State(scores), Ok(Json(json!({"name": "Lina", "score": i.to_string()}))))
                    .await
                    .into_response()
                    .status()
            });
        }
        let mut statuses = Vec::new();
        while let Some(status) = tasks.join_next().await {
            statuses.push(status.unwrap());
        }
        assert_eq!(statuses.iter().filter(|s| **s == StatusCode::OK).count(), 1);
        assert_eq!(statuses.iter().filter(|s| **s == StatusCode::BAD_REQUEST).count(), 19);

        // Concurrent partial updates of one record all succeed
        let nutritions = state("nutritions");
        let Json(apple) = create_record(
            State(nutritions.clone()),
            Ok(Json(json!({"name": "Apple", "calories": "94 cal", "fat": "0.31g", "carbs": "20.77 g"}))),
        )
        .await
        .unwrap();

        let mut tasks = JoinSet::new();
        for i in 0..20 {
            let nutritions = nutritions.clone();
            let id = apple.id;
            tasks.spawn(async move {
                update_record(State(nutritions), Ok(Path(id)), Ok(Json(json!({"fat": format!("{i} g")}))))
                    .await
                    .into_response()
                    .status()
            });
        }
        while let Some(status) = tasks.join_next().await {
            assert_eq!(status.unwrap(), StatusCode::OK);
        }

        let server = app.into_test_server();
        let stored: Value = server.get(&format!("/api/nutritions/{}", apple.id)).await.json();
        assert_eq!(stored["calories"], "94 cal");
        assert!(stored["fat"].as_str().unwrap().ends_with(" g"));
        drop(server);
        pool.close().await;

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_cors_layer_accepts_configured_origins() {
        let mut config = create_test_config();
        config.cors.allowed_origins = vec![CorsOrigin::Url(url::Url::parse("https://app.example.com").unwrap())];
        assert!(create_cors_layer(&config).is_ok());

        config.cors.allowed_origins.push(CorsOrigin::Wildcard);
        assert!(create_cors_layer(&config).is_ok());
    }
}
