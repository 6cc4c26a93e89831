use secrecy::Secret;
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct GreetingConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: String,
    pub service_name: String,
    pub storage: StorageConfig,
    pub batch: BatchConfig,
    pub bootstrap: BootstrapConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" | "in-memory" => Ok(StorageBackend::Memory),
            other => Err(AppError::ConfigError(anyhow::anyhow!(
                "unknown storage backend '{}', expected 'postgres' or 'memory'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Required when `backend` is postgres.
    pub database_url: Option<Secret<String>>,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Schedules for the greeting batch jobs. All durations are milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchConfig {
    pub enabled: bool,
    pub fixed_rate_ms: u64,
    pub fixed_delay_ms: u64,
    pub initial_delay_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            fixed_rate_ms: 15_000,
            fixed_delay_ms: 15_000,
            initial_delay_ms: 5_000,
        }
    }
}

/// Initial account created at startup when no account with `username` exists yet.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BootstrapConfig {
    pub username: Option<String>,
    pub password: Option<Secret<String>>,
}

impl GreetingConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let is_prod = environment == "prod";

        let backend: StorageBackend = get_env("STORAGE_BACKEND", Some("memory"), is_prod)?.parse()?;
        let database_url = match backend {
            StorageBackend::Postgres => Some(Secret::new(get_env("DATABASE_URL", None, is_prod)?)),
            StorageBackend::Memory => None,
        };

        let defaults = BatchConfig::default();

        Ok(GreetingConfig {
            common: common_config,
            environment,
            service_name: "greeting-service".to_string(),
            storage: StorageConfig {
                backend,
                database_url,
                max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 10)?,
                min_connections: parse_var("DATABASE_MIN_CONNECTIONS", 1)?,
            },
            batch: BatchConfig {
                enabled: parse_var("BATCH_ENABLED", defaults.enabled)?,
                fixed_rate_ms: positive_ms(
                    "BATCH_FIXED_RATE_MS",
                    parse_var("BATCH_FIXED_RATE_MS", defaults.fixed_rate_ms)?,
                )?,
                fixed_delay_ms: positive_ms(
                    "BATCH_FIXED_DELAY_MS",
                    parse_var("BATCH_FIXED_DELAY_MS", defaults.fixed_delay_ms)?,
                )?,
                initial_delay_ms: parse_var("BATCH_INITIAL_DELAY_MS", defaults.initial_delay_ms)?,
            },
            bootstrap: BootstrapConfig {
                username: env::var("BOOTSTRAP_USERNAME").ok().filter(|v| !v.is_empty()),
                password: env::var("BOOTSTRAP_PASSWORD")
                    .ok()
                    .filter(|v| !v.is_empty())
                    .map(Secret::new),
            },
        })
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

/// Optional typed variable. Unset falls back to `default`; a malformed value is an error.
fn parse_var<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => parse_value(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| {
        AppError::ConfigError(anyhow::anyhow!("{} has invalid value '{}': {}", key, raw, e))
    })
}

fn positive_ms(key: &str, ms: u64) -> Result<u64, AppError> {
    if ms == 0 {
        return Err(AppError::ConfigError(anyhow::anyhow!(
            "{} must be greater than zero",
            key
        )));
    }
    Ok(ms)
}
