use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::SearchError;
use crate::saved_search::{DEFAULT_MAX_NAME_LENGTH, DEFAULT_MAX_PER_USER, SavedSearchLimits};
use crate::search::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, SearchSettings};

pub const REDIS_URL_ENV: &str = "SPOTEX_REDIS_URL";
pub const KEY_PREFIX_ENV: &str = "SPOTEX_KEY_PREFIX";

/// Settings read from `spotex.toml`. Every section and field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExchangeConfig {
    #[serde(default)]
    pub redis: RedisSettings,
    #[serde(default)]
    pub search: SearchSection,
    #[serde(default)]
    pub saved_searches: SavedSearchSection,
    #[serde(default)]
    pub rate_limit: RateLimitSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedisSettings {
    #[serde(default = "default_redis_url")]
    pub url: String,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            key_prefix: default_key_prefix(),
        }
    }
}

fn default_redis_url() -> String {
    "redis://127.0.0.1/".to_string()
}

fn default_key_prefix() -> String {
    "spotex".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSection {
    #[serde(default = "default_index_name")]
    pub index_name: String,
    #[serde(default = "default_per_page")]
    pub default_per_page: u64,
    #[serde(default = "default_max_per_page")]
    pub max_per_page: u64,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            index_name: default_index_name(),
            default_per_page: default_per_page(),
            max_per_page: default_max_per_page(),
        }
    }
}

fn default_index_name() -> String {
    "spotex:idx:opportunities".to_string()
}

fn default_per_page() -> u64 {
    DEFAULT_PAGE_SIZE
}

fn default_max_per_page() -> u64 {
    MAX_PAGE_SIZE
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedSearchSection {
    #[serde(default = "default_max_per_user")]
    pub max_per_user: usize,
    #[serde(default = "default_max_name_length")]
    pub max_name_length: usize,
}

impl Default for SavedSearchSection {
    fn default() -> Self {
        Self {
            max_per_user: default_max_per_user(),
            max_name_length: default_max_name_length(),
        }
    }
}

fn default_max_per_user() -> usize {
    DEFAULT_MAX_PER_USER
}

fn default_max_name_length() -> usize {
    DEFAULT_MAX_NAME_LENGTH
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitSection {
    #[serde(default = "default_max_requests")]
    pub max_requests: u64,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

impl Default for RateLimitSection {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
        }
    }
}

fn default_max_requests() -> u64 {
    120
}

fn default_window_secs() -> u64 {
    60
}

impl ExchangeConfig {
    /// Read `path`, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, SearchError> {
        let content = std::fs::read_to_string(path).map_err(|err| SearchError::Config {
            message: format!("failed to read {}: {err}", path.display()),
        })?;
        let mut config = Self::from_toml(&content)?;
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, SearchError> {
        match path {
            Some(path) if path.exists() => Self::load(path),
            Some(path) => Err(SearchError::Config {
                message: format!("config file {} does not exist", path.display()),
            }),
            None => {
                let mut config = Self::default();
                config.apply_overrides(|name| std::env::var(name).ok());
                Ok(config)
            }
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, SearchError> {
        let mut config: Self = toml::from_str(content).map_err(|err| SearchError::Config {
            message: format!("failed to parse config: {err}"),
        })?;
        config.clamp();
        Ok(config)
    }

    /// Apply `SPOTEX_*` overrides using `lookup` to resolve variable names.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(REDIS_URL_ENV).filter(|value| !value.trim().is_empty()) {
            self.redis.url = url.trim().to_string();
        }
        if let Some(prefix) = lookup(KEY_PREFIX_ENV).filter(|value| !value.trim().is_empty()) {
            self.redis.key_prefix = prefix.trim().to_string();
        }
    }

    fn clamp(&mut self) {
        self.search.max_per_page = self.search.max_per_page.clamp(1, MAX_PAGE_SIZE);
        self.search.default_per_page = self.search.default_per_page.clamp(1, self.search.max_per_page);
        self.rate_limit.window_secs = self.rate_limit.window_secs.max(1);
    }

    pub fn search_settings(&self) -> SearchSettings {
        SearchSettings {
            default_per_page: self.search.default_per_page,
            max_per_page: self.search.max_per_page,
        }
    }

    pub fn saved_search_limits(&self) -> SavedSearchLimits {
        SavedSearchLimits {
            max_per_user: self.saved_searches.max_per_user,
            max_name_length: self.saved_searches.max_name_length,
        }
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit.window_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn empty_file_yields_defaults() {
        let config = ExchangeConfig::from_toml("").expect("parse");
        assert_eq!(config, ExchangeConfig::default());
        assert_eq!(config.redis.key_prefix, "spotex");
        assert_eq!(config.search_settings().default_per_page, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = ExchangeConfig::from_toml(
            r#"
            [search]
            max_per_page = 500
            default_per_page = 250

            [saved_searches]
            max_per_user = 3
            "#,
        )
        .expect("parse");
        assert_eq!(config.search.max_per_page, MAX_PAGE_SIZE);
        assert_eq!(config.search.default_per_page, MAX_PAGE_SIZE);
        assert_eq!(config.saved_search_limits().max_per_user, 3);
        assert_eq!(config.saved_search_limits().max_name_length, DEFAULT_MAX_NAME_LENGTH);
        assert_eq!(config.rate_limit.window_secs, 60);
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let err = ExchangeConfig::from_toml("[redis\nurl = 1").expect_err("bad toml");
        assert!(matches!(err, SearchError::Config { .. }));
    }

    #[test]
    fn overrides_replace_redis_settings() {
        let mut config = ExchangeConfig::default();
        config.apply_overrides(|name| match name {
            REDIS_URL_ENV => Some("redis://cache:6380/2".to_string()),
            KEY_PREFIX_ENV => Some("  ".to_string()),
            _ => None,
        });
        assert_eq!(config.redis.url, "redis://cache:6380/2");
        assert_eq!(config.redis.key_prefix, "spotex");
    }

    #[test]
    #[serial]
    fn load_reads_file_and_environment() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "[redis]\nkey_prefix = \"exchange\"\n\n[rate_limit]\nmax_requests = 10").expect("write");

        // SAFETY: serialized with every other test touching the process environment.
        unsafe { std::env::set_var(REDIS_URL_ENV, "redis://10.0.0.5/") };
        let loaded = ExchangeConfig::load(file.path());
        unsafe { std::env::remove_var(REDIS_URL_ENV) };

        let config = loaded.expect("load");
        assert_eq!(config.redis.url, "redis://10.0.0.5/");
        assert_eq!(config.redis.key_prefix, "exchange");
        assert_eq!(config.rate_limit.max_requests, 10);
    }

    #[test]
    #[serial]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = ExchangeConfig::load_or_default(Some(&dir.path().join("absent.toml"))).expect_err("missing");
        assert!(matches!(err, SearchError::Config { .. }));
    }
}
