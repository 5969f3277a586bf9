use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::generate_id;

/// A product under price surveillance. Records are immutable once created;
/// the scan cycle reads them and notifies, it never writes them back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackedProduct {
    pub id: String,
    /// Stable per-site product code (e.g. catalog number), unique across
    /// all tracked products. Derived once at ingestion.
    pub sid: String,
    /// Source host, e.g. "www.amazon.in".
    pub site: String,
    /// Canonical absolute URL: protocol + host + path, query and fragment stripped.
    pub url: String,
    pub user_email: String,
    pub target_price: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Ingestion request submitted by a user.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TrackRequest {
    #[validate(url(message = "must be a valid URL"))]
    pub url: String,
    #[validate(email(message = "must be a valid e-mail address"))]
    pub user_email: String,
    pub target_price: Decimal,
}

/// Response shape for tracked products. The alert address stays private.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductView {
    pub id: String,
    pub sid: String,
    pub site: String,
    pub url: String,
    pub target_price: Decimal,
}

impl TrackedProduct {
    pub fn new(
        sid: String,
        site: String,
        url: String,
        user_email: String,
        target_price: Decimal,
    ) -> Self {
        Self {
            id: generate_id(),
            sid,
            site,
            url,
            user_email,
            target_price,
            created_at: Utc::now(),
        }
    }
}

impl From<&TrackedProduct> for ProductView {
    fn from(product: &TrackedProduct) -> Self {
        Self {
            id: product.id.clone(),
            sid: product.sid.clone(),
            site: product.site.clone(),
            url: product.url.clone(),
            target_price: product.target_price,
        }
    }
}
