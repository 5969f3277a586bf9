use regex::Regex;
use scraper::Selector;
use std::collections::HashMap;

use crate::config::SiteEntry;
use crate::utils::error::{AppError, Result};

/// How to handle one supported site: where its price lives in the page and
/// how to derive a stable product code from its URLs.
#[derive(Debug, Clone)]
pub struct SiteRule {
    pub host: String,
    pub price_selector: String,
    pub id_pattern: Option<Regex>,
}

/// The supported-site table, compiled once at startup and shared read-only
/// by the resolver and the extractor.
#[derive(Debug, Clone)]
pub struct SiteRegistry {
    rules: HashMap<String, SiteRule>,
    // Hosts in configuration order, for user-facing listings.
    hosts: Vec<String>,
}

impl SiteRegistry {
    pub fn from_entries(entries: &[SiteEntry]) -> Result<Self> {
        let mut rules = HashMap::new();
        let mut hosts = Vec::new();

        for entry in entries {
            // Reject selectors that scraper cannot parse before they reach a scan.
            Selector::parse(&entry.price_selector).map_err(|e| {
                AppError::Internal(format!(
                    "Invalid price selector '{}' for {}: {:?}",
                    entry.price_selector, entry.host, e
                ))
            })?;

            let id_pattern = match &entry.id_pattern {
                Some(pattern) => Some(Regex::new(pattern).map_err(|e| {
                    AppError::Internal(format!(
                        "Invalid id pattern '{}' for {}: {}",
                        pattern, entry.host, e
                    ))
                })?),
                None => None,
            };

            if rules
                .insert(
                    entry.host.clone(),
                    SiteRule {
                        host: entry.host.clone(),
                        price_selector: entry.price_selector.clone(),
                        id_pattern,
                    },
                )
                .is_none()
            {
                hosts.push(entry.host.clone());
            }
        }

        Ok(Self { rules, hosts })
    }

    pub fn rule_for(&self, host: &str) -> Option<&SiteRule> {
        self.rules.get(host)
    }

    pub fn is_supported(&self, host: &str) -> bool {
        self.rules.contains_key(host)
    }

    pub fn supported_hosts(&self) -> &[String] {
        &self.hosts
    }
}
