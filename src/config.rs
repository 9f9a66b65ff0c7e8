use serde::{Deserialize, Serialize};
use std::time::Duration;
use crate::ws::SyncSettings;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Environment (dev, staging, prod)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// CORS allowed origins, comma separated. Unset allows any origin.
    pub cors_origins: Option<String>,

    /// Log filter used when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_service_name")]
    pub cloud_service_name: String,

    /// Database URL. Without it documents are kept in memory only.
    pub db_url: Option<String>,

    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// Quiet period after the last edit before a document is saved
    #[serde(default = "default_save_debounce_ms")]
    pub save_debounce_ms: u64,

    /// Versions kept per document
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    /// Chat lines kept per document
    #[serde(default = "default_chat_history_cap")]
    pub chat_history_cap: usize,

    /// Idle time after which in-memory sync state of a document is dropped
    #[serde(default = "default_doc_idle_ttl_secs")]
    pub doc_idle_ttl_secs: u64,

    /// Messages queued per connection before a slow client is dropped
    #[serde(default = "default_outbox_capacity")]
    pub outbox_capacity: usize,
}

impl Config {
    /// Load configuration from environment variables or app.env file
    ///
    /// Runs before tracing is installed, so it reports through its result only.
    pub fn load() -> Result<Self, ConfigError> {
        // Try to load from app.env file first
        if std::path::Path::new("app.env").exists() {
            dotenvy::from_filename("app.env").ok();
        } else {
            // Fallback to .env file
            dotenvy::dotenv().ok();
        }

        Self::from_vars(std::env::vars())
    }

    /// Build and validate a configuration from `NAME=value` pairs
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config: Config = envy::from_iter(vars)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_history == 0 {
            return Err(ConfigError::Invalid("MAX_HISTORY must be at least 1".to_string()));
        }
        if self.chat_history_cap == 0 {
            return Err(ConfigError::Invalid("CHAT_HISTORY_CAP must be at least 1".to_string()));
        }
        if self.outbox_capacity == 0 {
            return Err(ConfigError::Invalid("OUTBOX_CAPACITY must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Get the full server address
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if running in development mode
    pub fn is_development(&self) -> bool {
        self.environment.to_lowercase() == "dev" || self.environment.to_lowercase() == "development"
    }

    /// Sync engine settings derived from this configuration
    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            save_debounce: Duration::from_millis(self.save_debounce_ms),
            max_history: self.max_history,
            chat_history_cap: self.chat_history_cap,
            doc_idle_ttl: Duration::from_secs(self.doc_idle_ttl_secs),
            outbox_capacity: self.outbox_capacity,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            environment: default_environment(),
            log_level: default_log_level(),
            cors_origins: None,
            cloud_service_name: default_service_name(),
            db_url: None,
            db_max_connections: default_db_max_connections(),
            save_debounce_ms: default_save_debounce_ms(),
            max_history: default_max_history(),
            chat_history_cap: default_chat_history_cap(),
            doc_idle_ttl_secs: default_doc_idle_ttl_secs(),
            outbox_capacity: default_outbox_capacity(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Environment variable error: {0}")]
    EnvError(#[from] envy::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "colabri_sync=debug,tower_http=debug,info".to_string()
}

fn default_service_name() -> String {
    "colabri-sync".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_db_max_connections() -> u32 {
    20
}

fn default_save_debounce_ms() -> u64 {
    1200
}

fn default_max_history() -> usize {
    6000
}

fn default_chat_history_cap() -> usize {
    200
}

fn default_doc_idle_ttl_secs() -> u64 {
    30 * 60
}

fn default_outbox_capacity() -> usize {
    256
}
