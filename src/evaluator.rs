use rust_decimal::Decimal;

use crate::models::TrackedProduct;

/// Outcome of comparing a scraped price against a product's threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceDecision {
    /// Current price is at or below the target; an alert is due.
    Alert,
    /// Still above target; nothing to do.
    Hold,
}

/// Pure threshold check. Dispatching the alert is the caller's job.
pub fn evaluate(product: &TrackedProduct, current_price: Decimal) -> PriceDecision {
    if current_price <= product.target_price {
        PriceDecision::Alert
    } else {
        PriceDecision::Hold
    }
}
