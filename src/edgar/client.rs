// src/edgar/client.rs
use crate::edgar::models::{Cik, CompanySubmission, TickerRegistry};
use crate::edgar::retry::{retry_with_backoff, RetryPolicy};
use crate::utils::error::EdgarError;
use reqwest::header;
use std::time::Duration;

pub const DEFAULT_REGISTRY_URL: &str = "https://www.sec.gov/files/company_tickers.json";
pub const DEFAULT_SUBMISSIONS_BASE: &str = "https://data.sec.gov/submissions";
pub const DEFAULT_ARCHIVES_BASE: &str = "https://www.sec.gov/Archives/edgar/data";

/// Network policy and endpoints for EDGAR access.
#[derive(Debug, Clone)]
pub struct EdgarConfig {
    /// Contact string sent as User-Agent. EDGAR rejects anonymous clients.
    pub user_agent: String,
    pub registry_url: String,
    pub submissions_base: String,
    pub archives_base: String,
    /// SEC asks for 10 requests/second max, so every request waits this long first.
    pub request_delay: Duration,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl EdgarConfig {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            submissions_base: DEFAULT_SUBMISSIONS_BASE.to_string(),
            archives_base: DEFAULT_ARCHIVES_BASE.to_string(),
            request_delay: Duration::from_millis(150),
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

/// Thin EDGAR client: one configured reqwest client shared by every request.
#[derive(Debug, Clone)]
pub struct EdgarClient {
    http: reqwest::Client,
    config: EdgarConfig,
}

impl EdgarClient {
    pub fn new(config: EdgarConfig) -> Result<Self, EdgarError> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone()) // Set the required User-Agent
            .timeout(config.timeout)
            .build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &EdgarConfig {
        &self.config
    }

    /// Downloads and parses the ticker registry snapshot.
    pub async fn fetch_registry(&self) -> Result<TickerRegistry, EdgarError> {
        let body = self.get_text(&self.config.registry_url, "application/json").await?;
        let registry = TickerRegistry::from_snapshot(&body)
            .map_err(|e| EdgarError::Parse(format!("registry snapshot: {}", e)))?;
        tracing::debug!("Loaded {} registry entries", registry.len());
        Ok(registry)
    }

    /// Fetches the company submission data for a given CIK
    pub async fn fetch_submissions(&self, cik: Cik) -> Result<CompanySubmission, EdgarError> {
        let url = format!(
            "{}/CIK{}.json",
            self.config.submissions_base.trim_end_matches('/'),
            cik
        );
        let body = self.get_text(&url, "application/json").await?;
        serde_json::from_str(&body)
            .map_err(|e| EdgarError::Parse(format!("submissions for CIK {}: {}", cik, e)))
    }

    /// Downloads a specific filing document from its URL.
    pub async fn download_filing_doc(&self, url: &str) -> Result<String, EdgarError> {
        // SEC uses various content types, but often text/html for filings
        self.get_text(url, "application/xml,text/html,text/plain,*/*").await
    }

    async fn get_text(&self, url: &str, accept: &str) -> Result<String, EdgarError> {
        retry_with_backoff(self.config.retry, url, || self.get_once(url, accept)).await
    }

    async fn get_once(&self, url: &str, accept: &str) -> Result<String, EdgarError> {
        // --- Basic Rate Limiting ---
        tokio::time::sleep(self.config.request_delay).await;

        tracing::debug!("GET {} (User-Agent: {})", url, self.config.user_agent);
        let response = self
            .http
            .get(url)
            .header(header::ACCEPT, accept)
            .send()
            .await?; // Propagates reqwest::Error as EdgarError::Network

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("HTTP error status: {} for URL: {}", status, url);
            if status == reqwest::StatusCode::FORBIDDEN || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(EdgarError::RateLimited);
            }
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(EdgarError::FilingDocNotFound(url.to_string()));
            }
            return Err(EdgarError::Http(status));
        }

        let body = response.text().await?;
        tracing::debug!("Downloaded {} bytes from {}", body.len(), url);
        Ok(body)
    }
}
