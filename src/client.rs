//! Search API client.
//!
//! [`SearchApi`] is the seam between the orchestration layers and the
//! network. [`HttpSearchClient`] is the production implementation: one
//! `POST {api_base}/search/` per call, JSON body, optional bearer token,
//! no retries.
//!
//! # Errors
//!
//! | Failure | Variant |
//! |---------|---------|
//! | connection refused, timeout, TLS | [`SearchError::Transport`] |
//! | non-2xx status | [`SearchError::Status`] |
//! | 2xx with a body that is not a search response | [`SearchError::Decode`] |
//!
//! An empty result list is a success, never an error.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::config::Config;
use crate::models::{SearchRequest, SearchResponse};

/// Failure of a single search call.
///
/// `Clone` so that one failed network call can be handed to every caller
/// that was coalesced onto it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    #[error("search request failed: {0}")]
    Transport(String),
    #[error("search API returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid search response: {0}")]
    Decode(String),
}

impl SearchError {
    /// HTTP status code, when the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            SearchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Anything that can answer a search request.
#[async_trait]
pub trait SearchApi: Send + Sync {
    /// Issue exactly one search. `token`, when present, is sent as a bearer
    /// credential.
    async fn search(
        &self,
        request: &SearchRequest,
        token: Option<&str>,
    ) -> Result<SearchResponse, SearchError>;
}

/// `reqwest`-backed [`SearchApi`].
#[derive(Clone)]
pub struct HttpSearchClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSearchClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let user_agent = config
            .api
            .user_agent
            .clone()
            .unwrap_or_else(|| format!("catsearch/{}", env!("CARGO_PKG_VERSION")));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api.timeout_secs))
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            client,
            endpoint: config.search_endpoint(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl SearchApi for HttpSearchClient {
    async fn search(
        &self,
        request: &SearchRequest,
        token: Option<&str>,
    ) -> Result<SearchResponse, SearchError> {
        let mut builder = self.client.post(&self.endpoint).json(request);
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| SearchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SearchError::Transport(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| SearchError::Decode(e.to_string()))
    }
}
