use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub scraper: ScraperConfig,
    pub scheduler: SchedulerConfig,
    pub notifications: NotificationsConfig,
    pub sites: Vec<SiteEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub base_url: String,
    pub request_timeout: u64,
    pub shutdown_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    /// Upper bound on domain buckets scanned concurrently within one cycle.
    pub max_concurrent_domains: usize,
    pub request_timeout: u64,
    pub user_agent: String,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts per product per cycle before a terminal skip.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    /// Uniformly random extra delay in [0, jitter_ms] added to each backoff.
    pub jitter_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub scan_interval_minutes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    pub smtp: SmtpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: Option<String>,
    pub from_name: String,
    pub use_tls: bool,
}

/// One supported-site table row: which host, how to find its price element,
/// and how to pull a stable product code out of its URLs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteEntry {
    pub host: String,
    pub price_selector: String,
    pub id_pattern: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with default configuration
            .add_source(File::with_name("config/default"))
            // Add environment-specific config
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local config (ignored by git)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables with prefix "WARDEN_"
            .add_source(Environment::with_prefix("WARDEN").separator("__"))
            .build()?;

        let config: AppConfig = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Message(
                "Server port must be greater than 0".into(),
            ));
        }

        if Url::parse(&self.server.base_url).is_err() {
            return Err(ConfigError::Message("Invalid base URL format".into()));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Message(
                "Database max_connections must be greater than 0".into(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Message(
                "Database min_connections cannot exceed max_connections".into(),
            ));
        }

        if self.scraper.max_concurrent_domains == 0 {
            return Err(ConfigError::Message(
                "Scraper max_concurrent_domains must be greater than 0".into(),
            ));
        }

        if self.scraper.retry.max_attempts == 0 {
            return Err(ConfigError::Message(
                "Retry max_attempts must be greater than 0".into(),
            ));
        }

        if self.scheduler.scan_interval_minutes == 0 {
            return Err(ConfigError::Message(
                "Scheduler scan_interval_minutes must be greater than 0".into(),
            ));
        }

        if self.notifications.smtp.port == 0 {
            return Err(ConfigError::Message(
                "SMTP port must be greater than 0".into(),
            ));
        }

        if self.sites.is_empty() {
            return Err(ConfigError::Message(
                "At least one supported site must be configured".into(),
            ));
        }

        for site in &self.sites {
            if site.host.trim().is_empty() || site.price_selector.trim().is_empty() {
                return Err(ConfigError::Message(format!(
                    "Site entry must have a host and price_selector: {:?}",
                    site.host
                )));
            }
        }

        Ok(())
    }
}
