use rust_decimal::Decimal;
use scraper::{Html, Selector};
use std::sync::Arc;

use crate::fetch::PageFetcher;
use crate::registry::SiteRegistry;
use crate::utils::error::{AppError, Result};

/// Pulls the current numeric price for a product page using the site's
/// registered selector rule.
pub struct PriceExtractor {
    registry: Arc<SiteRegistry>,
    fetcher: Arc<dyn PageFetcher>,
}

impl PriceExtractor {
    pub fn new(registry: Arc<SiteRegistry>, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { registry, fetcher }
    }

    pub async fn extract(&self, url: &str, site: &str) -> Result<Decimal> {
        let rule = self
            .registry
            .rule_for(site)
            .ok_or_else(|| AppError::UnsupportedSite {
                host: site.to_string(),
            })?;

        let body = self.fetcher.fetch(url).await?;

        // Html is parsed and dropped inside this block; nothing non-Send
        // survives across an await point.
        let price_text = {
            let document = Html::parse_document(&body);
            let selector = Selector::parse(&rule.price_selector).map_err(|e| {
                AppError::Internal(format!(
                    "Selector '{}' failed to parse: {:?}",
                    rule.price_selector, e
                ))
            })?;

            let element =
                document
                    .select(&selector)
                    .next()
                    .ok_or_else(|| AppError::ScrapeMiss {
                        selector: rule.price_selector.clone(),
                    })?;

            element.text().collect::<Vec<_>>().join(" ").trim().to_string()
        };

        parse_price(&price_text, &rule.price_selector)
    }
}

/// Strips everything but digits and dots, then parses a positive decimal.
/// A miss here is still the transient class: the element was present but its
/// text was not a price yet.
fn parse_price(text: &str, selector: &str) -> Result<Decimal> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    cleaned
        .parse::<Decimal>()
        .ok()
        .filter(|price| *price > Decimal::ZERO)
        .ok_or_else(|| AppError::ScrapeMiss {
            selector: selector.to_string(),
        })
}
