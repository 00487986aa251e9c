use thiserror::Error;

pub const DEFAULT_DATABASE_PATH: &str = "georeview.db";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5000;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("PORT must be a number between 1 and 65535, got '{0}'")]
    InvalidPort(String),
}

/// Runtime settings, read from the environment (and an optional `.env`).
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database_path: String,
    pub host: String,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            database_path: DEFAULT_DATABASE_PATH.to_string(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is fine; real environment variables still apply.
        if let Ok(path) = dotenvy::dotenv() {
            tracing::info!("[CONFIG] Loaded environment from {}", path.display());
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = AppConfig::default();

        let port = match get("PORT") {
            Some(raw) => match raw.trim().parse::<u16>() {
                Ok(port) if port > 0 => port,
                _ => return Err(ConfigError::InvalidPort(raw)),
            },
            None => defaults.port,
        };

        Ok(AppConfig {
            database_path: get("DATABASE_PATH").unwrap_or(defaults.database_path),
            host: get("HOST").unwrap_or(defaults.host),
            port,
        })
    }

    pub fn bind_addr(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }
}

/// Install the global tracing subscriber; `RUST_LOG` overrides the level.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Ignore the error if a subscriber was already installed.
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
