use std::{env, fmt::Display, fs::read_to_string, str::FromStr, sync::Arc};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable {0} is required")]
    Missing(&'static str),

    #[error("Invalid {key} value: {info}")]
    Invalid { key: &'static str, info: String },

    #[error("Failed to read {key} from {path}: {source}")]
    SecretFile {
        key: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    pub session_secret: Arc<Vec<u8>>,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            port: try_load(&lookup, "PORT", "8000")?,
            database_url: require(&lookup, "DATABASE_URL")?,
            database_max_connections: try_load(&lookup, "DATABASE_MAX_CONNECTIONS", "5")?,
            session_secret: Arc::new(read_secret(&lookup, "SESSION_SECRET")?.into_bytes()),
        })
    }
}

fn require<F>(lookup: &F, key: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|value| !value.trim().is_empty())
        .ok_or(ConfigError::Missing(key))
}

fn try_load<F, T>(lookup: &F, key: &'static str, default: &str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    lookup(key)
        .unwrap_or_else(|| {
            log::info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e: T::Err| ConfigError::Invalid {
            key,
            info: e.to_string(),
        })
}

/// Reads `key` directly, or from the file named by `{key}_FILE`.
fn read_secret<F>(lookup: &F, key: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(secret) = lookup(key).filter(|value| !value.is_empty()) {
        return Ok(secret);
    }

    let Some(path) = lookup(format!("{key}_FILE").as_str()) else {
        return Err(ConfigError::Missing(key));
    };

    let secret = read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|source| ConfigError::SecretFile {
            key,
            path: path.clone(),
            source,
        })?;

    if secret.is_empty() {
        return Err(ConfigError::Missing(key));
    }

    Ok(secret)
}
