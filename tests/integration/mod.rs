// Integration tests for Price Warden
// These tests verify that the scan engine, ingestion path and API surface
// work together correctly.

pub mod scheduler_tests;

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;

use pricewarden::config::{
    AppConfig, DatabaseConfig, NotificationsConfig, RetryConfig, SchedulerConfig, ScraperConfig,
    ServerConfig, SiteEntry, SmtpConfig,
};
use pricewarden::extractor::PriceExtractor;
use pricewarden::fetch::{PageFetcher, UrlExpander};
use pricewarden::models::TrackedProduct;
use pricewarden::monitor::ScanMonitor;
use pricewarden::notifier::Notifier;
use pricewarden::product_manager::ProductManager;
use pricewarden::registry::SiteRegistry;
use pricewarden::resolver::UrlResolver;
use pricewarden::scheduler::ScanScheduler;
use pricewarden::store::ProductStore;
use pricewarden::utils::error::AppError;
use pricewarden::web::AppState;

/// Test configuration with millisecond backoff floors so retry paths run
/// in test time.
pub fn get_test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0, // Random port for testing
            base_url: "http://localhost".to_string(),
            request_timeout: 10,
            shutdown_timeout: 5,
        },
        database: DatabaseConfig {
            // Single connection so the in-memory database is shared by all queries.
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            acquire_timeout: 10,
        },
        scraper: ScraperConfig {
            max_concurrent_domains: 4,
            request_timeout: 5,
            user_agent: "PriceWarden-Test/1.0".to_string(),
            retry: RetryConfig {
                max_attempts: 3,
                base_delay_ms: 50,
                jitter_ms: 20,
            },
        },
        scheduler: SchedulerConfig {
            scan_interval_minutes: 60,
        },
        notifications: NotificationsConfig {
            smtp: SmtpConfig {
                host: "localhost".to_string(),
                port: 2525,
                username: None,
                password: None,
                from_address: None,
                from_name: "Price Warden Test".to_string(),
                use_tls: false,
            },
        },
        sites: vec![
            SiteEntry {
                host: "shop.example".to_string(),
                price_selector: ".price".to_string(),
                id_pattern: None,
            },
            SiteEntry {
                host: "other.example".to_string(),
                price_selector: ".price".to_string(),
                id_pattern: None,
            },
        ],
    }
}

/// One scripted answer for a fetched URL.
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    /// Page containing a `.price` element with this text.
    Price(&'static str),
    /// Page without any price element (provokes a scrape miss).
    MissingPrice,
    /// Network-level failure.
    NetworkError,
}

/// Fetcher that answers from per-URL scripts. The last entry of a script
/// repeats once the queue drains, so "always fails" is a one-entry script.
#[derive(Default)]
pub struct ScriptedFetcher {
    scripts: Mutex<HashMap<String, VecDeque<ScriptedResponse>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn script(&self, url: &str, responses: Vec<ScriptedResponse>) {
        self.scripts
            .lock()
            .await
            .insert(url.to_string(), responses.into());
    }

    pub async fn calls_for(&self, url: &str) -> usize {
        self.calls.lock().await.iter().filter(|u| *u == url).count()
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        self.calls.lock().await.push(url.to_string());

        let mut scripts = self.scripts.lock().await;
        let queue = scripts
            .get_mut(url)
            .ok_or_else(|| AppError::Fetch(format!("no script for {}", url)))?;

        let response = if queue.len() > 1 {
            queue.pop_front().expect("script queue checked non-empty")
        } else {
            queue
                .front()
                .cloned()
                .ok_or_else(|| AppError::Fetch(format!("script drained for {}", url)))?
        };

        match response {
            ScriptedResponse::Price(price) => Ok(format!(
                r#"<html><body><span class="price">{}</span></body></html>"#,
                price
            )),
            ScriptedResponse::MissingPrice => {
                Ok(r#"<html><body><div class="spinner">loading</div></body></html>"#.to_string())
            }
            ScriptedResponse::NetworkError => {
                Err(AppError::Fetch("scripted network failure".to_string()))
            }
        }
    }
}

/// Expander that never finds a redirect.
pub struct IdentityExpander;

#[async_trait]
impl UrlExpander for IdentityExpander {
    async fn expand(&self, url: &str) -> Result<String, AppError> {
        Ok(url.to_string())
    }
}

/// Notifier that records every alert it is asked to send.
#[derive(Default)]
pub struct RecordingNotifier {
    alerts: Mutex<Vec<TrackedProduct>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn alert_count(&self) -> usize {
        self.alerts.lock().await.len()
    }

    pub async fn alerted_sids(&self) -> Vec<String> {
        self.alerts.lock().await.iter().map(|p| p.sid.clone()).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_price_alert(&self, product: &TrackedProduct) {
        self.alerts.lock().await.push(product.clone());
    }
}

pub struct TestHarness {
    pub store: ProductStore,
    pub fetcher: Arc<ScriptedFetcher>,
    pub notifier: Arc<RecordingNotifier>,
    pub monitor: Arc<ScanMonitor>,
    pub manager: Arc<ProductManager>,
    pub config: AppConfig,
}

/// Wires the whole engine against scripted collaborators and an in-memory
/// database.
pub async fn create_test_harness() -> anyhow::Result<TestHarness> {
    let config = get_test_config();

    let registry = Arc::new(SiteRegistry::from_entries(&config.sites)?);
    let fetcher = Arc::new(ScriptedFetcher::new());
    let notifier = Arc::new(RecordingNotifier::new());

    let store = ProductStore::connect(&config.database).await?;

    let extractor = Arc::new(PriceExtractor::new(
        Arc::clone(&registry),
        fetcher.clone() as Arc<dyn PageFetcher>,
    ));
    let monitor = Arc::new(ScanMonitor::new(
        store.clone(),
        extractor,
        notifier.clone() as Arc<dyn Notifier>,
        &config.scraper,
    ));

    let resolver = UrlResolver::new(Arc::clone(&registry), Arc::new(IdentityExpander));
    let manager = Arc::new(ProductManager::new(
        store.clone(),
        resolver,
        registry,
        Arc::clone(&monitor),
    ));

    Ok(TestHarness {
        store,
        fetcher,
        notifier,
        monitor,
        manager,
        config,
    })
}

/// Full app state for API tests, scheduler included.
pub async fn create_test_app_state() -> anyhow::Result<(AppState, TestHarness)> {
    let harness = create_test_harness().await?;

    let scheduler = ScanScheduler::new(
        Arc::clone(&harness.monitor),
        harness.config.scheduler.clone(),
    )
    .await?;

    let state = AppState {
        manager: Arc::clone(&harness.manager),
        scheduler: Arc::new(tokio::sync::Mutex::new(scheduler)),
        config: harness.config.clone(),
    };

    Ok((state, harness))
}

pub fn tracked_product(sid: &str, url: &str, target: &str) -> TrackedProduct {
    let site = url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default();

    TrackedProduct::new(
        sid.to_string(),
        site,
        url.to_string(),
        "user@example.com".to_string(),
        target.parse().expect("test price literal"),
    )
}

/// Polls a condition until it holds or the timeout elapses.
pub async fn wait_for_condition<F, Fut>(mut condition: F, timeout_ms: u64) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = std::time::Instant::now();
    let timeout = std::time::Duration::from_millis(timeout_ms);

    while start.elapsed() < timeout {
        if condition().await {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    false
}
