//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `PANTRY_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `PANTRY_` override YAML values
//! 3. **DATABASE_URL** - Special case: overrides `database.url` if set
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `PANTRY_DATABASE__POOL__MAX_CONNECTIONS=2` sets `database.pool.max_connections`.
//!
//! ## Configuration Structure
//!
//! - **Server**: `host`, `port` - HTTP server binding configuration
//! - **Database**: `database.url`, `database.pool` - SQLite connection settings
//! - **CORS**: `cors.allowed_origins` - Origins allowed to call the API from a browser
//! - **Sample data**: `seed_sample_data` - Fill empty built-in tables on startup
//! - **Resources**: `resources` - The served resources and their schemas (see [`crate::schema`])
//!
//! When `resources` is not given, the built-in recipes, fridges, nutritions and scores
//! resources are served.
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! # Override server port
//! PANTRY_PORT=8080
//!
//! # Set database connection (preferred method)
//! DATABASE_URL="sqlite:///var/lib/pantry/pantry.db"
//!
//! # Or use PANTRY_DATABASE__URL
//! PANTRY_DATABASE__URL="sqlite://pantry.db"
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use url::Url;

use crate::errors::Error;
use crate::schema::{ResourceSchema, builtin_resources};

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "PANTRY_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// All fields have defaults defined in the `Default` implementation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Set from the raw `DATABASE_URL` environment variable; moved into `database.url` on load
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    pub database: DatabaseConfig,
    pub cors: CorsConfig,
    /// Insert the sample rows into empty built-in tables on startup
    pub seed_sample_data: bool,
    /// Resources to serve, each under `/api/<name>`
    pub resources: Vec<ResourceSchema>,
}

/// SQLite database settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Connection URL, e.g. `sqlite://pantry.db` or `sqlite::memory:`
    pub url: String,
    /// Create the database file if it does not exist
    pub create_if_missing: bool,
    pub pool: PoolSettings,
}

/// Individual pool configuration with all SQLx parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolSettings {
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of idle connections to maintain
    pub min_connections: u32,
    /// Maximum time to wait for a connection (seconds)
    pub acquire_timeout_secs: u64,
    /// Time before idle connections are closed (seconds, 0 = never)
    pub idle_timeout_secs: u64,
    /// Maximum lifetime of a connection (seconds, 0 = never)
    pub max_lifetime_secs: u64,
}

/// CORS (Cross-Origin Resource Sharing) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins for CORS requests
    pub allowed_origins: Vec<CorsOrigin>,
    /// Cache preflight requests for this many seconds
    pub max_age: Option<u64>,
}

/// CORS origin specification.
///
/// Can be either a wildcard (`*`) to allow all origins, or a specific URL.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CorsOrigin {
    /// Allow all origins (`*`)
    #[serde(deserialize_with = "parse_wildcard", serialize_with = "serialize_wildcard")]
    Wildcard,
    /// Specific origin URL (e.g., `https://app.example.com`)
    #[serde(deserialize_with = "parse_url")]
    Url(Url),
}

fn parse_wildcard<'de, D>(deserializer: D) -> Result<(), D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    if s == "*" {
        Ok(())
    } else {
        Err(serde::de::Error::custom("Expected '*'"))
    }
}

fn serialize_wildcard<S>(serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str("*")
}

fn parse_url<'de, D>(deserializer: D) -> Result<Url, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Url::parse(&s).map_err(serde::de::Error::custom)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8086,
            database_url: None,
            database: DatabaseConfig::default(),
            cors: CorsConfig::default(),
            seed_sample_data: true,
            resources: builtin_resources(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://pantry.db".to_string(),
            create_if_missing: true,
            pool: PoolSettings::default(),
        }
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 5,
            min_connections: 0,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 600,  // 10 minutes
            max_lifetime_secs: 1800, // 30 minutes
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![CorsOrigin::Wildcard],
            max_age: Some(3600), // Cache preflight for 1 hour
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let mut config: Self = Self::figment(args).extract()?;

        // if DATABASE_URL is set, it wins over database.url
        if let Some(url) = config.database_url.take() {
            config.database.url = url;
        }

        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        if self.database.url.is_empty() {
            return Err(Error::Internal {
                operation: "Config validation: database.url cannot be empty".to_string(),
            });
        }

        let pool = &self.database.pool;
        if pool.max_connections == 0 {
            return Err(Error::Internal {
                operation: "Config validation: database.pool.max_connections must be at least 1".to_string(),
            });
        }
        if pool.min_connections > pool.max_connections {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: database.pool.min_connections ({}) cannot be greater than max_connections ({})",
                    pool.min_connections, pool.max_connections
                ),
            });
        }

        if self.cors.allowed_origins.is_empty() {
            return Err(Error::Internal {
                operation: "Config validation: CORS allowed_origins cannot be empty. Add at least one allowed origin.".to_string(),
            });
        }

        let mut names = HashSet::new();
        for resource in &self.resources {
            resource.check().map_err(|reason| Error::Internal {
                operation: format!("Config validation: {reason}"),
            })?;
            if !names.insert(resource.name.as_str()) {
                return Err(Error::Internal {
                    operation: format!("Config validation: resource '{}' is declared twice", resource.name),
                });
            }
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values
            // (PANTRY_CONFIG names the file itself and is not a config key)
            .merge(Env::prefixed("PANTRY_").ignore(&["config"]).split("__"))
            // Common DATABASE_URL pattern
            .merge(Env::raw().only(&["DATABASE_URL"]))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn resource(&self, name: &str) -> Option<&ResourceSchema> {
        self.resources.iter().find(|r| r.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldKind;
    use figment::Jail;

    fn args() -> Args {
        Args {
            config: "test.yaml".to_string(),
            validate: false,
        }
    }

    #[test]
    fn test_defaults_serve_builtin_resources() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "port: 9000\n")?;

            let config = Config::load(&args())?;

            assert_eq!(config.port, 9000);
            assert_eq!(config.host, "0.0.0.0");
            assert!(config.seed_sample_data);
            let names: Vec<&str> = config.resources.iter().map(|r| r.name.as_str()).collect();
            assert_eq!(names, vec!["recipes", "fridges", "nutritions", "scores"]);

            Ok(())
        });
    }

    #[test]
    fn test_shipped_config_matches_builtins() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", include_str!("../config.yaml"))?;

            let config = Config::load(&args())?;

            assert_eq!(config.resources, builtin_resources());
            assert_eq!(config.database.url, "sqlite://pantry.db");

            Ok(())
        });
    }

    #[test]
    fn test_custom_resources_from_yaml() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
seed_sample_data: false
resources:
  - name: pantry_items
    fields:
      - name: name
      - name: quantity
        kind: integer
        required: false
      - name: note
        min_length: 5
        required: false
    unique_key: name
    allow_delete: true
"#,
            )?;

            let config = Config::load(&args())?;

            assert_eq!(config.resources.len(), 1);
            let items = config.resource("pantry_items").unwrap();
            assert_eq!(items.fields[0].min_length, 2);
            assert!(items.fields[0].required);
            assert_eq!(items.fields[1].kind, FieldKind::Integer);
            assert_eq!(items.fields[2].min_length, 5);
            assert_eq!(items.unique_key.as_deref(), Some("name"));
            assert!(items.allow_delete);
            assert!(items.authenticate.is_none());

            Ok(())
        });
    }

    #[test]
    fn test_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "port: 9000\n")?;
            jail.set_env("PANTRY_PORT", "9100");
            jail.set_env("PANTRY_DATABASE__POOL__MAX_CONNECTIONS", "2");

            let config = Config::load(&args())?;

            assert_eq!(config.port, 9100);
            assert_eq!(config.database.pool.max_connections, 2);

            Ok(())
        });
    }

    #[test]
    fn test_database_url_env_wins() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
database:
  url: sqlite://from-file.db
"#,
            )?;
            jail.set_env("DATABASE_URL", "sqlite://from-env.db");

            let config = Config::load(&args())?;

            assert_eq!(config.database.url, "sqlite://from-env.db");
            assert!(config.database_url.is_none());

            Ok(())
        });
    }

    #[test]
    fn test_cors_origins() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
cors:
  allowed_origins:
    - "*"
    - https://app.example.com
"#,
            )?;

            let config = Config::load(&args())?;

            assert!(matches!(config.cors.allowed_origins[0], CorsOrigin::Wildcard));
            match &config.cors.allowed_origins[1] {
                CorsOrigin::Url(url) => assert_eq!(url.as_str(), "https://app.example.com/"),
                other => panic!("expected url, got {other:?}"),
            }

            Ok(())
        });
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "prot: 9000\n")?;
            assert!(Config::load(&args()).is_err());
            Ok(())
        });
    }

    #[test]
    fn test_invalid_resources_are_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
resources:
  - name: scores
    fields:
      - name: name
    authenticate:
      key_field: name
      secret_field: score
"#,
            )?;
            let err = Config::load(&args()).unwrap_err();
            assert!(err.to_string().contains("unique_key"));
            Ok(())
        });
    }

    #[test]
    fn test_duplicate_resource_names_are_rejected() {
        let mut config = Config::default();
        config.resources.push(config.resources[0].clone());

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("declared twice"));
    }

    #[test]
    fn test_pool_bounds_are_checked() {
        let mut config = Config::default();
        config.database.pool.min_connections = 10;
        config.database.pool.max_connections = 2;
        assert!(config.validate().is_err());
    }
}
