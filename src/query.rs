//! Search query binding.
//!
//! [`SearchQuery`] ties a [`RequestKey`] to a [`SearchApi`] through the shared
//! [`QueryCache`]. It never lets a search failure escape as an `Err`: failures
//! are logged and folded into [`QueryState::Error`], alongside whatever data
//! the cache still holds for the key.
//!
//! Blank queries are never sent and never create a cache entry.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::cache::{QueryCache, QueryStatus};
use crate::client::{SearchApi, SearchError};
use crate::config::Config;
use crate::models::{RequestKey, SearchResponse};

/// Observable state of a search.
#[derive(Debug, Clone)]
pub enum QueryState {
    /// No searchable key, or the key has never been requested.
    Idle,
    /// Request in flight and no data yet.
    Pending,
    Success(Arc<SearchResponse>),
    /// The last request failed. `data` is the last successful response for
    /// the key, if any.
    Error {
        error: SearchError,
        data: Option<Arc<SearchResponse>>,
    },
}

impl QueryState {
    pub fn data(&self) -> Option<&Arc<SearchResponse>> {
        match self {
            QueryState::Success(data) => Some(data),
            QueryState::Error { data, .. } => data.as_ref(),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&SearchError> {
        match self {
            QueryState::Error { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, QueryState::Pending)
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Re-run the current search when the window regains focus. Off by
    /// default: relevance scoring is expensive and results do not change
    /// between tab switches.
    pub refetch_on_focus: bool,
}

#[derive(Clone)]
pub struct SearchQuery {
    cache: Arc<QueryCache>,
    api: Arc<dyn SearchApi>,
    token: Option<String>,
    options: QueryOptions,
    key: Option<RequestKey>,
}

impl SearchQuery {
    pub fn new(
        cache: Arc<QueryCache>,
        api: Arc<dyn SearchApi>,
        token: Option<String>,
        options: QueryOptions,
    ) -> Self {
        Self {
            cache,
            api,
            token,
            options,
            key: None,
        }
    }

    pub fn from_config(
        config: &Config,
        cache: Arc<QueryCache>,
        api: Arc<dyn SearchApi>,
        token: Option<String>,
    ) -> Self {
        Self::new(
            cache,
            api,
            token,
            QueryOptions {
                refetch_on_focus: config.search.refetch_on_focus,
            },
        )
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    /// Bind a new key. Blank queries unbind.
    pub fn set_key(&mut self, key: RequestKey) {
        self.key = key.is_searchable().then_some(key);
    }

    pub fn key(&self) -> Option<&RequestKey> {
        self.key.as_ref()
    }

    /// Current state of the bound key as seen by the cache.
    pub fn state(&self) -> QueryState {
        let Some(key) = &self.key else {
            return QueryState::Idle;
        };
        let Some(entry) = self.cache.get(key) else {
            return QueryState::Idle;
        };
        match entry.status {
            QueryStatus::Pending => QueryState::Pending,
            QueryStatus::Success => match entry.data {
                Some(data) => QueryState::Success(data),
                None => QueryState::Pending,
            },
            QueryStatus::Error => QueryState::Error {
                error: entry
                    .error
                    .unwrap_or_else(|| SearchError::Transport("unknown failure".to_string())),
                data: entry.data,
            },
        }
    }

    /// Load the bound key, using fresh cached data when available.
    pub async fn run(&self) -> QueryState {
        match &self.key {
            Some(key) => self.fetch(key).await,
            None => QueryState::Idle,
        }
    }

    /// Force a new request for the bound key.
    pub async fn refetch(&self) -> QueryState {
        match &self.key {
            Some(key) => self.load(key, true).await,
            None => QueryState::Idle,
        }
    }

    /// Window focus hook; does nothing unless `refetch_on_focus` is set.
    pub async fn on_focus(&self) -> Option<QueryState> {
        if !self.options.refetch_on_focus {
            debug!("refetch on focus disabled");
            return None;
        }
        Some(self.refetch().await)
    }

    /// Load an arbitrary key without binding it.
    pub async fn fetch(&self, key: &RequestKey) -> QueryState {
        self.load(key, false).await
    }

    pub async fn refetch_key(&self, key: &RequestKey) -> QueryState {
        self.load(key, true).await
    }

    async fn load(&self, key: &RequestKey, force: bool) -> QueryState {
        if !key.is_searchable() {
            return QueryState::Idle;
        }

        let api = self.api.clone();
        let token = self.token.clone();
        let request = key.to_request();
        let fetcher = move || async move { api.search(&request, token.as_deref()).await };

        let result = if force {
            self.cache.refetch(key, fetcher).await
        } else {
            self.cache.fetch(key, fetcher).await
        };

        match result {
            Ok(data) => QueryState::Success(data),
            Err(error) => {
                warn!(query = %key.query, offset = key.offset, error = %error, "search failed");
                let data = self.cache.get(key).and_then(|entry| entry.data);
                QueryState::Error { error, data }
            }
        }
    }
}
