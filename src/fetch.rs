use async_trait::async_trait;
use reqwest::redirect::Policy;
use std::time::Duration;

use crate::config::ScraperConfig;
use crate::utils::error::{AppError, Result};

/// Document fetch collaborator: one GET, body on 2xx, `Fetch` otherwise.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// URL-expansion collaborator: follows at most one redirect hop. A 3xx
/// response with a `Location` header yields the redirected URL, anything
/// else yields the original.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UrlExpander: Send + Sync {
    async fn expand(&self, url: &str) -> Result<String>;
}

pub struct HttpClient {
    // Follows redirects like a browser would; product pages often bounce
    // through regional variants before settling.
    fetch_client: reqwest::Client,
    // Redirects disabled so the single hop stays observable.
    expand_client: reqwest::Client,
}

impl HttpClient {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.request_timeout);

        let fetch_client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        let expand_client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(timeout)
            .redirect(Policy::none())
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            fetch_client,
            expand_client,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpClient {
    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self.fetch_client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Fetch(format!("{} returned {}", url, status)));
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl UrlExpander for HttpClient {
    async fn expand(&self, url: &str) -> Result<String> {
        let response = self.expand_client.get(url).send().await?;

        if response.status().is_redirection() {
            if let Some(location) = response.headers().get(reqwest::header::LOCATION) {
                let redirected = location
                    .to_str()
                    .map_err(|e| AppError::Fetch(format!("Bad Location header: {}", e)))?;
                tracing::debug!("Expanded {} -> {}", url, redirected);
                return Ok(redirected.to_string());
            }
        }

        // Anything other than a redirect means the URL was not shortened.
        Ok(url.to_string())
    }
}
