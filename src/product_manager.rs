use rust_decimal::Decimal;
use std::sync::Arc;
use validator::Validate;

use crate::models::{ProductView, TrackRequest, TrackedProduct};
use crate::monitor::ScanMonitor;
use crate::registry::SiteRegistry;
use crate::resolver::UrlResolver;
use crate::store::ProductStore;
use crate::utils::error::{AppError, Result};

/// Ingestion and on-demand operations over the tracked set. The scheduled
/// scan path lives in [`ScanMonitor`]; this type serves the API surface.
pub struct ProductManager {
    store: ProductStore,
    resolver: UrlResolver,
    registry: Arc<SiteRegistry>,
    monitor: Arc<ScanMonitor>,
}

impl ProductManager {
    pub fn new(
        store: ProductStore,
        resolver: UrlResolver,
        registry: Arc<SiteRegistry>,
        monitor: Arc<ScanMonitor>,
    ) -> Self {
        Self {
            store,
            resolver,
            registry,
            monitor,
        }
    }

    /// Resolve, dedupe and persist a new tracked product.
    pub async fn track(&self, request: TrackRequest) -> Result<ProductView> {
        request.validate()?;
        if request.target_price <= Decimal::ZERO {
            return Err(AppError::Validation(
                "Target price must be greater than zero".to_string(),
            ));
        }

        let resolved = self.resolver.resolve(&request.url).await?;

        if self.store.exists_sid(&resolved.sid).await? {
            return Err(AppError::DuplicateProduct { sid: resolved.sid });
        }

        let product = TrackedProduct::new(
            resolved.sid,
            resolved.site,
            resolved.url,
            request.user_email,
            request.target_price,
        );

        let saved = self.store.save(product).await?;
        tracing::info!(
            "Tracking new product {} on {} for target {}",
            saved.sid,
            saved.site,
            saved.target_price
        );
        Ok(ProductView::from(&saved))
    }

    pub async fn list(&self) -> Result<Vec<ProductView>> {
        let products = self.store.list_all().await?;
        Ok(products.iter().map(ProductView::from).collect())
    }

    pub async fn find(&self, id: &str) -> Result<Option<ProductView>> {
        let product = self.store.find_by_id(id).await?;
        Ok(product.as_ref().map(ProductView::from))
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.store.delete_by_id(id).await?;
        tracing::info!("Stopped tracking product {}", id);
        Ok(())
    }

    pub fn supported_sites(&self) -> Vec<String> {
        self.registry.supported_hosts().to_vec()
    }

    /// Immediate single-product check, same path as a scheduled check
    /// (including the alert dispatch when the threshold is met).
    pub async fn check_price(&self, id: &str) -> Result<Decimal> {
        let product = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound {
                resource: format!("product {}", id),
            })?;

        let check = self.monitor.check_product(&product).await?;
        Ok(check.price)
    }
}
