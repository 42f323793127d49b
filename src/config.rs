// ==================== CONFIGURATION ====================
// Lida uma vez no startup a partir do ambiente (.env via dotenv)

use std::env;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_MAX_POOL_SIZE: u32 = 10;
const DEFAULT_TASKS_LIMIT: i64 = 100;
const DEFAULT_RECONCILE_INTERVAL_SECS: u64 = 3600;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub max_pool_size: u32,
    /// Limit applied to `GET /tasks` when the request has none. `0` disables it.
    pub tasks_default_limit: Option<i64>,
    /// Period of the reconcile job. `None` runs only the startup pass.
    pub reconcile_interval: Option<Duration>,
    /// Empty means any origin.
    pub cors_allowed_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let database_url = var("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let tasks_default_limit: i64 =
            parse_or(var("TASKS_DEFAULT_LIMIT"), "TASKS_DEFAULT_LIMIT", DEFAULT_TASKS_LIMIT)?;
        let reconcile_secs: u64 = parse_or(
            var("RECONCILE_INTERVAL_SECS"),
            "RECONCILE_INTERVAL_SECS",
            DEFAULT_RECONCILE_INTERVAL_SECS,
        )?;

        Ok(Self {
            host: var("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_or(var("PORT"), "PORT", DEFAULT_PORT)?,
            database_url,
            max_pool_size: parse_or(
                var("MONGODB_MAX_POOL_SIZE"),
                "MONGODB_MAX_POOL_SIZE",
                DEFAULT_MAX_POOL_SIZE,
            )?,
            tasks_default_limit: (tasks_default_limit > 0).then_some(tasks_default_limit),
            reconcile_interval: (reconcile_secs > 0).then(|| Duration::from_secs(reconcile_secs)),
            cors_allowed_origins: var("CORS_ALLOWED_ORIGINS")
                .map(|raw| {
                    raw.split(',')
                        .map(|origin| origin.trim().to_string())
                        .filter(|origin| !origin.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T: std::str::FromStr>(
    raw: Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}
