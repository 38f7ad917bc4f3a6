//! Fixtures shared by the unit tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::client::{SearchApi, SearchError};
use crate::models::{HitPayload, SearchHit, SearchRequest, SearchResponse};

/// A response echoing `query` with `hits` result rows.
pub fn response(query: &str, hits: usize) -> SearchResponse {
    SearchResponse {
        query: query.to_string(),
        results: (0..hits)
            .map(|i| SearchHit {
                id: format!("{}-{}", query, i),
                score: 1.0 - i as f64 * 0.1,
                payload: HitPayload {
                    name: Some(format!("{}-{}", query, i)),
                    namespace: Some("geo".to_string()),
                    tag: Some("default".to_string()),
                    description: None,
                    extra: Default::default(),
                },
            })
            .collect(),
        namespace_hits: Vec::new(),
        limit: 10,
        offset: 0,
    }
}

/// In-process [`SearchApi`] that records every request.
///
/// Queries listed in `failing` are answered with a transport error; queries
/// with a configured delay sleep before answering. Everything else gets
/// `hits_per_query` rows (0 for queries listed in `empty`).
pub struct FakeApi {
    pub calls: AtomicUsize,
    pub requests: Mutex<Vec<(SearchRequest, Option<String>)>>,
    pub failing: Vec<String>,
    pub empty: Vec<String>,
    pub delays: Vec<(String, Duration)>,
    pub hits_per_query: usize,
}

impl Default for FakeApi {
    fn default() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            failing: Vec::new(),
            empty: Vec::new(),
            delays: Vec::new(),
            hits_per_query: 1,
        }
    }
}

impl FakeApi {
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(r, _)| r.query.clone())
            .collect()
    }
}

#[async_trait]
impl SearchApi for FakeApi {
    async fn search(
        &self,
        request: &SearchRequest,
        token: Option<&str>,
    ) -> Result<SearchResponse, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap()
            .push((request.clone(), token.map(str::to_string)));

        if let Some((_, delay)) = self.delays.iter().find(|(q, _)| *q == request.query) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing.contains(&request.query) {
            return Err(SearchError::Transport("connection refused".to_string()));
        }

        let hits = if self.empty.contains(&request.query) {
            0
        } else {
            self.hits_per_query
        };
        let mut resp = response(&request.query, hits);
        resp.limit = request.limit.unwrap_or(10);
        resp.offset = request.offset.unwrap_or(0);
        Ok(resp)
    }
}
