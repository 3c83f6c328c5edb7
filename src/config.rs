use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::harness::RetryPolicy;
use crate::model::UserContext;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarnessConfig {
    pub catalog: CatalogConfig,
    pub retry: RetryConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub base_url: Option<String>,
    pub api_token: Option<String>,
    pub user: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Search calls a write stays invisible to search
    pub index_lag: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_token: None,
            user: "harness".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay_ms: 100,
            max_delay_ms: 5_000,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3010,
            index_lag: 2,
        }
    }
}

impl HarnessConfig {
    /// Load configuration from defaults, an optional `harness` file and `HARNESS__*` variables
    pub fn load() -> anyhow::Result<Self> {
        let mut config = config::Config::builder();

        config = config.add_source(config::Config::try_from(&HarnessConfig::default())?);

        config = config.add_source(config::File::with_name("harness").required(false));

        // HARNESS__RETRY__MAX_ATTEMPTS=5 -> retry.max_attempts
        config = config.add_source(
            config::Environment::with_prefix("HARNESS")
                .prefix_separator("__")
                .separator("__"),
        );

        let config = config.build()?;
        let harness_config: HarnessConfig = config.try_deserialize()?;

        Ok(harness_config)
    }

    /// Catalog base URL from config, then `CATALOG_BASE_URL`, then the local mock server
    pub fn base_url(&self) -> String {
        if let Some(base_url) = &self.catalog.base_url {
            return base_url.clone();
        }

        if let Ok(url) = std::env::var("CATALOG_BASE_URL") {
            return url;
        }

        format!("http://localhost:{}", ServerConfig::default().port)
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn user(&self) -> UserContext {
        UserContext::with_token(self.catalog.user.clone(), self.catalog.api_token.clone())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.catalog.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            initial_delay: Duration::from_millis(self.retry.initial_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
        }
    }
}
