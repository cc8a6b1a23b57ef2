use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use tokio::io::AsyncReadExt;

use spotex::config::ExchangeConfig;
use spotex::keys::KeyContext;
use spotex::saved_search::{RedisSavedSearchStore, SavedSearchService};
use spotex::search::{IndexDefinition, opportunity_index};

use crate::output::OutputManager;

/// Looked up in the working directory when `--config` is not given.
const DEFAULT_CONFIG_FILE: &str = "spotex.toml";

/// Loaded configuration shared by every command
pub struct AppContext {
    pub config: ExchangeConfig,
}

impl AppContext {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
        let path = match path {
            Some(path) => Some(path),
            None if fallback.exists() => Some(fallback.as_path()),
            None => None,
        };
        let config = ExchangeConfig::load_or_default(path).context("Failed to load configuration")?;
        Ok(Self { config })
    }

    pub fn keys(&self) -> KeyContext<'_> {
        KeyContext::new(&self.config.redis.key_prefix)
    }

    pub fn index(&self) -> IndexDefinition {
        opportunity_index(&self.keys(), &self.config.search.index_name)
    }

    pub async fn connect(&self, output: &OutputManager) -> Result<ConnectionManager> {
        output.progress("Connecting to Redis");
        let client = redis::Client::open(self.config.redis.url.as_str()).context("Failed to create Redis client")?;
        let conn = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;
        output.clear_line();
        output.verbose(&format!("Connected to {}", self.config.redis.url));
        Ok(conn)
    }

    pub fn saved_searches(&self, conn: ConnectionManager) -> SavedSearchService<RedisSavedSearchStore> {
        let store = RedisSavedSearchStore::new(conn, self.config.redis.key_prefix.clone());
        SavedSearchService::new(store, self.config.saved_search_limits())
    }
}

/// Read a JSON document from a file, or from stdin when `source` is `-`.
pub async fn read_json(source: &str) -> Result<serde_json::Value> {
    let content = if source == "-" {
        let mut buffer = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buffer)
            .await
            .context("Failed to read stdin")?;
        buffer
    } else {
        tokio::fs::read_to_string(source)
            .await
            .with_context(|| format!("Failed to read {source}"))?
    };
    serde_json::from_str(&content).with_context(|| format!("{source} is not valid JSON"))
}
