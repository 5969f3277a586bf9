use std::sync::Arc;
use url::Url;

use crate::fetch::UrlExpander;
use crate::registry::{SiteRegistry, SiteRule};
use crate::utils::error::{AppError, Result};

/// Outcome of resolving a raw submission URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Canonical URL: protocol + host + path, query and fragment dropped.
    pub url: String,
    /// Source host, key into the site registry.
    pub site: String,
    /// Stable per-site product code.
    pub sid: String,
}

/// Maps a raw (possibly shortened) URL to a supported site and a stable
/// product identifier.
pub struct UrlResolver {
    registry: Arc<SiteRegistry>,
    expander: Arc<dyn UrlExpander>,
}

impl UrlResolver {
    pub fn new(registry: Arc<SiteRegistry>, expander: Arc<dyn UrlExpander>) -> Self {
        Self { registry, expander }
    }

    pub async fn resolve(&self, raw_url: &str) -> Result<Resolved> {
        let expanded = self.expander.expand(raw_url).await?;
        let parsed = Url::parse(&expanded)?;

        let host = parsed
            .host_str()
            .ok_or_else(|| AppError::MalformedUrl(format!("URL has no host: {}", expanded)))?
            .to_string();

        let canonical = canonicalize(&parsed);

        let rule = self
            .registry
            .rule_for(&host)
            .ok_or(AppError::UnsupportedSite { host: host.clone() })?;

        let sid = extract_sid(rule, &canonical)?;

        Ok(Resolved {
            url: canonical,
            site: host,
            sid,
        })
    }
}

fn canonicalize(url: &Url) -> String {
    format!(
        "{}://{}{}",
        url.scheme(),
        url.host_str().unwrap_or_default(),
        url.path()
    )
}

/// Site-specific product code, falling back to the final path segment when
/// the site has no pattern or the pattern does not match.
fn extract_sid(rule: &SiteRule, canonical_url: &str) -> Result<String> {
    if let Some(pattern) = &rule.id_pattern {
        if let Some(captures) = pattern.captures(canonical_url) {
            if let Some(code) = captures.get(1) {
                return Ok(code.as_str().to_string());
            }
        }
    }

    canonical_url
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .map(|segment| segment.to_string())
        .ok_or_else(|| AppError::MalformedUrl(format!("No product id in URL: {}", canonical_url)))
}
