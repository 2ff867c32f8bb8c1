use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub listing: ListingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the remote catalog API
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Request timeout in seconds (transport-level only, no retries)
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            request_timeout: default_request_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.bitechx.com".to_string()
}

fn default_user_agent() -> String {
    format!("curatr/{}", env!("CARGO_PKG_VERSION"))
}

fn default_request_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Directory where the session file is persisted
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Staleness window for the category listing in seconds (default: 30 minutes)
    #[serde(default = "default_categories_stale_secs")]
    pub categories_stale_secs: u64,
    /// Staleness window for paginated product listings in seconds (default: 5 minutes)
    #[serde(default = "default_listing_stale_secs")]
    pub listing_stale_secs: u64,
    /// Staleness window for search results in seconds (default: 3 minutes)
    #[serde(default = "default_search_stale_secs")]
    pub search_stale_secs: u64,
    /// Staleness window for single products by slug in seconds (default: 10 minutes)
    #[serde(default = "default_product_stale_secs")]
    pub product_stale_secs: u64,
    /// Idle time after which an entry is evicted from memory (default: 1 hour)
    #[serde(default = "default_gc_horizon_secs")]
    pub gc_horizon_secs: u64,
    /// Interval between eviction sweeps in seconds (default: 5 minutes)
    #[serde(default = "default_gc_interval_secs")]
    pub gc_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            categories_stale_secs: default_categories_stale_secs(),
            listing_stale_secs: default_listing_stale_secs(),
            search_stale_secs: default_search_stale_secs(),
            product_stale_secs: default_product_stale_secs(),
            gc_horizon_secs: default_gc_horizon_secs(),
            gc_interval_secs: default_gc_interval_secs(),
        }
    }
}

impl CacheConfig {
    pub fn categories_stale(&self) -> Duration {
        Duration::from_secs(self.categories_stale_secs)
    }

    pub fn listing_stale(&self) -> Duration {
        Duration::from_secs(self.listing_stale_secs)
    }

    pub fn search_stale(&self) -> Duration {
        Duration::from_secs(self.search_stale_secs)
    }

    pub fn product_stale(&self) -> Duration {
        Duration::from_secs(self.product_stale_secs)
    }

    pub fn gc_horizon(&self) -> Duration {
        Duration::from_secs(self.gc_horizon_secs)
    }

    pub fn gc_interval(&self) -> Duration {
        Duration::from_secs(self.gc_interval_secs)
    }
}

fn default_categories_stale_secs() -> u64 {
    30 * 60
}

fn default_listing_stale_secs() -> u64 {
    5 * 60
}

fn default_search_stale_secs() -> u64 {
    3 * 60
}

fn default_product_stale_secs() -> u64 {
    10 * 60
}

fn default_gc_horizon_secs() -> u64 {
    60 * 60
}

fn default_gc_interval_secs() -> u64 {
    5 * 60
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListingConfig {
    /// Fixed page size for the paginated product listing
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,
    /// Quiet period before a search commits, in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            page_limit: default_page_limit(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl ListingConfig {
    pub fn debounce_delay(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

fn default_page_limit() -> u32 {
    20
}

fn default_debounce_ms() -> u64 {
    500
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| "Failed to parse configuration file")?;
            Ok(config)
        } else {
            info!("No config file found, using defaults");
            Ok(Config::default())
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            session: SessionConfig::default(),
            cache: CacheConfig::default(),
            listing: ListingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
