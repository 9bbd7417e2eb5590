//! Configuration management with file persistence

use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::store::{sqlite, DocumentStore, HttpStore, MemoryStore, SqliteStore};
use crate::{Error, Result};

/// Parley configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub store: StoreConfig,
}

/// Which backing store to open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local map; nothing survives exit
    Memory,
    /// SQLite file (the default)
    #[default]
    Sqlite,
    /// Hosted realtime database over REST
    Http,
}

impl StoreBackend {
    /// Parse from a config/env string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "memory" => Some(StoreBackend::Memory),
            "sqlite" => Some(StoreBackend::Sqlite),
            "http" => Some(StoreBackend::Http),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// SQLite database file; defaults next to the config file when unset
    pub path: Option<PathBuf>,
    /// Base URL of the hosted store; required for the http backend
    pub endpoint: Option<String>,
    /// Bound on every remote request
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: None,
            endpoint: None,
            timeout_secs: 30,
        }
    }
}

/// Default location of the config file
pub fn config_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        config_dir.join("parley").join("config.toml")
    } else {
        PathBuf::from("parley.toml")
    }
}

impl Config {
    /// Load from the default location, falling back to defaults when the
    /// file does not exist, then apply `PARLEY_*` environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    /// Load from an explicit path (defaults + env overrides as in `load`)
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let mut config = if path.exists() {
            let raw = fs::read_to_string(path)?;
            toml::from_str(&raw).map_err(|e| Error::Config(format!("{}: {e}", path.display())))?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    /// Persist to the default location
    pub fn save(&self) -> Result<()> {
        let path = config_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        fs::write(&path, raw)?;
        Ok(())
    }

    fn apply_env(&mut self) {
        if let Ok(backend) = env::var("PARLEY_STORE_BACKEND") {
            if let Some(parsed) = StoreBackend::parse(&backend) {
                self.store.backend = parsed;
            }
        }
        if let Ok(path) = env::var("PARLEY_STORE_PATH") {
            self.store.path = Some(PathBuf::from(path));
        }
        if let Ok(endpoint) = env::var("PARLEY_STORE_ENDPOINT") {
            self.store.endpoint = Some(endpoint);
        }
        if let Ok(timeout) = env::var("PARLEY_STORE_TIMEOUT_SECS") {
            if let Ok(secs) = timeout.parse() {
                self.store.timeout_secs = secs;
            }
        }
    }

    /// Open the configured backing store
    pub async fn open_store(&self) -> Result<Arc<dyn DocumentStore>> {
        match self.store.backend {
            StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
            StoreBackend::Sqlite => {
                let path = self
                    .store
                    .path
                    .clone()
                    .unwrap_or_else(sqlite::default_database_path);
                Ok(Arc::new(SqliteStore::open(path).await?))
            }
            StoreBackend::Http => {
                let endpoint = self.store.endpoint.as_ref().ok_or_else(|| {
                    Error::Config("http backend requires store.endpoint".to_string())
                })?;
                Ok(Arc::new(HttpStore::with_timeout(
                    endpoint,
                    self.store.timeout_secs,
                )?))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pick_sqlite() {
        let config = Config::default();
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(config.store.timeout_secs, 30);
        assert!(config.store.path.is_none());
    }

    #[test]
    fn round_trips_through_toml() {
        let mut config = Config::default();
        config.store.backend = StoreBackend::Http;
        config.store.endpoint = Some("https://example-db.firebaseio.com".to_string());

        let raw = toml::to_string_pretty(&config).unwrap();
        let back: Config = toml::from_str(&raw).unwrap();
        assert_eq!(back.store.backend, StoreBackend::Http);
        assert_eq!(back.store.endpoint, config.store.endpoint);
    }

    #[test]
    fn backend_parse_accepts_known_names() {
        assert_eq!(StoreBackend::parse("memory"), Some(StoreBackend::Memory));
        assert_eq!(StoreBackend::parse("sqlite"), Some(StoreBackend::Sqlite));
        assert_eq!(StoreBackend::parse("http"), Some(StoreBackend::Http));
        assert_eq!(StoreBackend::parse("mongodb"), None);
    }

    #[tokio::test]
    async fn open_store_memory() {
        let mut config = Config::default();
        config.store.backend = StoreBackend::Memory;
        let store = config.open_store().await.unwrap();
        assert!(store.load("anything").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn http_backend_without_endpoint_is_a_config_error() {
        let mut config = Config::default();
        config.store.backend = StoreBackend::Http;
        let err = config.open_store().await.err().unwrap();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn load_from_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
    }
}
