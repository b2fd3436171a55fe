//! External draft generation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use seoflow_core::{DraftContent, PageType};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::retry::retry_with_backoff;

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("no draft generator is configured")]
    Unconfigured,

    #[error("invalid generator endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("generator returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("generator response is not a draft: {0}")]
    Deserialize(#[source] serde_json::Error),
}

/// Everything the generator needs to write one page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DraftRequest {
    pub topic_id: Uuid,
    pub org: String,
    pub site_slug: String,
    pub base_url: String,
    pub title: String,
    pub page_type: PageType,
    pub primary_keyword: String,
    pub secondary_keywords: Vec<String>,
    pub target_url: String,
    /// Local places the page should mention.
    pub local_entities: Vec<String>,
}

#[async_trait]
pub trait DraftGenerator: Send + Sync {
    fn name(&self) -> &'static str;

    async fn generate(&self, request: &DraftRequest) -> Result<DraftContent, GeneratorError>;
}

/// Fails every request. Used when no generator URL is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredGenerator;

#[async_trait]
impl DraftGenerator for UnconfiguredGenerator {
    fn name(&self) -> &'static str {
        "unconfigured"
    }

    async fn generate(&self, _request: &DraftRequest) -> Result<DraftContent, GeneratorError> {
        Err(GeneratorError::Unconfigured)
    }
}

/// POSTs a [`DraftRequest`] as JSON and expects a [`DraftContent`] back.
pub struct HttpDraftGenerator {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl HttpDraftGenerator {
    /// # Errors
    ///
    /// [`GeneratorError::InvalidEndpoint`] for an unparseable URL and
    /// [`GeneratorError::Http`] if the client cannot be built.
    pub fn new(endpoint: &str, timeout_secs: u64) -> Result<Self, GeneratorError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("seoflow/0.1 (draft-generation)")
            .build()?;
        let endpoint = Url::parse(endpoint).map_err(|e| GeneratorError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            client,
            endpoint,
            api_key: None,
            max_retries: 2,
            backoff_base_ms: 1_000,
        })
    }

    #[must_use]
    pub fn with_retry(mut self, max_retries: u32, backoff_base_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.backoff_base_ms = backoff_base_ms;
        self
    }

    /// Sent as a bearer token on every request.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    async fn post_once(&self, request: &DraftRequest) -> Result<DraftContent, GeneratorError> {
        let mut builder = self.client.post(self.endpoint.clone()).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(GeneratorError::Status {
                status: status.as_u16(),
                body: truncate(&body, 200),
            });
        }
        serde_json::from_str(&body).map_err(GeneratorError::Deserialize)
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[async_trait]
impl DraftGenerator for HttpDraftGenerator {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn generate(&self, request: &DraftRequest) -> Result<DraftContent, GeneratorError> {
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || self.post_once(request)).await
    }
}
