use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub store: StoreConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Prepended to every store path, e.g. `devnote`
    pub root_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub default_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig {
                root_prefix: String::new(),
            },
            cache: CacheConfig { capacity: 256 },
            logging: LoggingConfig {
                default_filter: "info".to_string(),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let capacity = env::var("SNAPSHOT_CACHE_CAPACITY")
            .unwrap_or_else(|_| "256".to_string())
            .parse::<usize>()
            .map_err(|e| anyhow::anyhow!("SNAPSHOT_CACHE_CAPACITY: {}", e))?;
        if capacity == 0 {
            anyhow::bail!("SNAPSHOT_CACHE_CAPACITY must be greater than zero");
        }

        Ok(Self {
            store: StoreConfig {
                root_prefix: env::var("STORE_ROOT_PREFIX")
                    .unwrap_or_default()
                    .trim_matches('/')
                    .to_string(),
            },
            cache: CacheConfig { capacity },
            logging: LoggingConfig {
                default_filter: env::var("LOG_FILTER").unwrap_or_else(|_| "info".to_string()),
            },
        })
    }

    pub fn with_root_prefix(mut self, prefix: &str) -> Self {
        self.store.root_prefix = prefix.trim_matches('/').to_string();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.store.root_prefix, "");
        assert_eq!(config.cache.capacity, 256);
        assert_eq!(config.logging.default_filter, "info");
    }

    #[test]
    fn test_root_prefix_is_trimmed() {
        let config = Config::default().with_root_prefix("/devnote/");
        assert_eq!(config.store.root_prefix, "devnote");
    }
}
