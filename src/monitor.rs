use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_retry::RetryIf;
use url::Url;

use crate::config::{RetryConfig, ScraperConfig};
use crate::evaluator::{evaluate, PriceDecision};
use crate::extractor::PriceExtractor;
use crate::models::TrackedProduct;
use crate::notifier::Notifier;
use crate::store::ProductStore;
use crate::utils::error::{AppError, Result};

/// Products sharing one source host, processed by a single task in list order.
#[derive(Debug, Clone)]
pub struct DomainBucket {
    pub host: String,
    pub products: Vec<TrackedProduct>,
}

/// Stable partition of the tracked set. Products whose stored URL no longer
/// parses land in `invalid` and are never dispatched.
#[derive(Debug, Default)]
pub struct Partition {
    pub buckets: Vec<DomainBucket>,
    pub invalid: Vec<TrackedProduct>,
}

/// Buckets products by host, keeping bucket order by first occurrence and
/// product order within each bucket as given.
pub fn partition_by_host(products: Vec<TrackedProduct>) -> Partition {
    let mut partition = Partition::default();
    let mut index: HashMap<String, usize> = HashMap::new();

    for product in products {
        let host = Url::parse(&product.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string));

        match host {
            Some(host) => {
                let slot = *index.entry(host.clone()).or_insert_with(|| {
                    partition.buckets.push(DomainBucket {
                        host,
                        products: Vec::new(),
                    });
                    partition.buckets.len() - 1
                });
                partition.buckets[slot].products.push(product);
            }
            None => partition.invalid.push(product),
        }
    }

    partition
}

/// Delay sequence for in-place scrape-miss retries: fixed base plus a
/// uniformly random extra, yielding one delay per retry. A configured cap of
/// N attempts means N-1 delays.
pub struct ScrapeBackoff {
    base: Duration,
    jitter_ms: u64,
    remaining: u32,
}

impl ScrapeBackoff {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            base: Duration::from_millis(config.base_delay_ms),
            jitter_ms: config.jitter_ms,
            remaining: config.max_attempts.saturating_sub(1),
        }
    }
}

impl Iterator for ScrapeBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let extra = if self.jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=self.jitter_ms)
        };
        Some(self.base + Duration::from_millis(extra))
    }
}

/// Result of a single successful product check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductCheck {
    pub price: rust_decimal::Decimal,
    pub notified: bool,
}

/// Per-domain tally for one cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomainOutcome {
    pub host: String,
    pub checked: usize,
    pub alerts: usize,
    /// Products abandoned after exhausting scrape-miss retries.
    pub skipped: usize,
    /// Products that hit a terminal failure this cycle.
    pub failed: usize,
}

/// Whole-cycle tally.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CycleOutcome {
    pub domains: usize,
    pub invalid_discarded: usize,
    pub checked: usize,
    pub alerts: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl CycleOutcome {
    fn absorb(&mut self, domain: &DomainOutcome) {
        self.domains += 1;
        self.checked += domain.checked;
        self.alerts += domain.alerts;
        self.skipped += domain.skipped;
        self.failed += domain.failed;
    }
}

/// The scan engine: lists the tracked set, partitions it by host and drives
/// one bounded-concurrency task per domain. Scan-path failures never leave
/// this type. Clones share the store pool, collaborators and the domain
/// semaphore.
#[derive(Clone)]
pub struct ScanMonitor {
    store: ProductStore,
    extractor: Arc<PriceExtractor>,
    notifier: Arc<dyn Notifier>,
    retry: RetryConfig,
    domain_limit: Arc<Semaphore>,
}

impl ScanMonitor {
    pub fn new(
        store: ProductStore,
        extractor: Arc<PriceExtractor>,
        notifier: Arc<dyn Notifier>,
        config: &ScraperConfig,
    ) -> Self {
        Self {
            store,
            extractor,
            notifier,
            retry: config.retry.clone(),
            domain_limit: Arc::new(Semaphore::new(config.max_concurrent_domains)),
        }
    }

    /// One full scan: fetch, partition, dispatch, and wait for every domain
    /// task of this cycle to finish.
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        let products = self.store.list_all().await?;
        let total = products.len();
        let partition = partition_by_host(products);

        for product in &partition.invalid {
            tracing::warn!("Discarding product {} with unparseable URL: {}", product.id, product.url);
        }

        tracing::info!(
            "Scan cycle: {} products across {} domains ({} invalid)",
            total,
            partition.buckets.len(),
            partition.invalid.len()
        );

        let mut outcome = CycleOutcome {
            invalid_discarded: partition.invalid.len(),
            ..CycleOutcome::default()
        };

        let mut tasks = JoinSet::new();
        for bucket in partition.buckets {
            let monitor = self.clone();
            tasks.spawn(async move {
                let _permit = monitor.domain_limit.clone().acquire_owned().await.ok();
                monitor.run_domain(bucket).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(domain) => outcome.absorb(&domain),
                Err(e) => tracing::error!("Domain task did not complete: {}", e),
            }
        }

        Ok(outcome)
    }

    /// Processes one domain's products strictly in order. A scrape miss
    /// retries the same product in place with jittered backoff until the
    /// attempt cap; every other failure is terminal for this cycle and the
    /// runner advances.
    pub async fn run_domain(&self, bucket: DomainBucket) -> DomainOutcome {
        tracing::info!("Starting checks for domain: {}", bucket.host);
        let mut outcome = DomainOutcome {
            host: bucket.host.clone(),
            ..DomainOutcome::default()
        };

        for product in &bucket.products {
            tracing::debug!("Checking price for: {}", product.sid);

            let result = RetryIf::spawn(
                ScrapeBackoff::new(&self.retry),
                || self.check_product(product),
                |e: &AppError| e.is_transient(),
            )
            .await;

            match result {
                Ok(check) => {
                    outcome.checked += 1;
                    if check.notified {
                        outcome.alerts += 1;
                    }
                }
                Err(e) if e.is_transient() => {
                    tracing::warn!(
                        "Giving up on {} after {} attempts: {}",
                        product.sid,
                        self.retry.max_attempts,
                        e
                    );
                    outcome.skipped += 1;
                }
                Err(e) => {
                    tracing::warn!("Failed price check for {}: {}", product.url, e);
                    outcome.failed += 1;
                }
            }
        }

        tracing::info!(
            "Finished domain {}: {} checked, {} alerts, {} skipped, {} failed",
            outcome.host,
            outcome.checked,
            outcome.alerts,
            outcome.skipped,
            outcome.failed
        );
        outcome
    }

    /// One attempt: extract, decide, then dispatch the alert if due.
    pub async fn check_product(&self, product: &TrackedProduct) -> Result<ProductCheck> {
        let price = self.extractor.extract(&product.url, &product.site).await?;
        tracing::debug!("Current price {} for {}", price, product.sid);

        let notified = match evaluate(product, price) {
            PriceDecision::Alert => {
                self.notifier.send_price_alert(product).await;
                true
            }
            PriceDecision::Hold => false,
        };

        Ok(ProductCheck { price, notified })
    }
}
