//! Core data models used throughout catalog-search.
//!
//! These types mirror the JSON exchanged with the catalog's `POST /search/`
//! endpoint, plus the [`RequestKey`] that identifies a search in the cache.

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// Request body for `POST {api_base}/search/`.
///
/// Optional fields are omitted from the JSON entirely when `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_threshold: Option<f64>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            limit: None,
            offset: None,
            score_threshold: None,
        }
    }
}

/// A single result hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub payload: HitPayload,
}

/// Descriptive fields of a hit. Fields the client does not know about are
/// kept verbatim in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HitPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SearchHit {
    /// `namespace/name:tag`, falling back to the hit id when the payload
    /// carries no name.
    pub fn registry_path(&self) -> String {
        let Some(name) = self.payload.name.as_deref() else {
            return self.id.clone();
        };
        let mut path = match self.payload.namespace.as_deref() {
            Some(ns) => format!("{}/{}", ns, name),
            None => name.to_string(),
        };
        if let Some(tag) = self.payload.tag.as_deref() {
            path.push(':');
            path.push_str(tag);
        }
        path
    }
}

/// Response body of `POST {api_base}/search/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    #[serde(default)]
    pub results: Vec<SearchHit>,
    #[serde(default)]
    pub namespace_hits: Vec<String>,
    #[serde(default)]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

impl SearchResponse {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty() && self.namespace_hits.is_empty()
    }
}

/// Identity of a search: the tuple that produced (or will produce) a result.
///
/// The threshold is compared by bit pattern so the key can be hashed.
#[derive(Debug, Clone)]
pub struct RequestKey {
    pub query: String,
    pub limit: u64,
    pub offset: u64,
    pub score_threshold: Option<f64>,
}

impl RequestKey {
    pub fn new(query: impl Into<String>, limit: u64, offset: u64) -> Self {
        Self {
            query: query.into(),
            limit,
            offset,
            score_threshold: None,
        }
    }

    pub fn with_threshold(mut self, threshold: Option<f64>) -> Self {
        self.score_threshold = threshold;
        self
    }

    /// Empty (after trimming) queries never reach the network.
    pub fn is_searchable(&self) -> bool {
        !self.query.trim().is_empty()
    }

    pub fn to_request(&self) -> SearchRequest {
        SearchRequest {
            query: self.query.clone(),
            limit: Some(self.limit),
            offset: Some(self.offset),
            score_threshold: self.score_threshold,
        }
    }

    fn threshold_bits(&self) -> Option<u64> {
        self.score_threshold.map(f64::to_bits)
    }
}

impl PartialEq for RequestKey {
    fn eq(&self, other: &Self) -> bool {
        self.query == other.query
            && self.limit == other.limit
            && self.offset == other.offset
            && self.threshold_bits() == other.threshold_bits()
    }
}

impl Eq for RequestKey {}

impl Hash for RequestKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.query.hash(state);
        self.limit.hash(state);
        self.offset.hash(state);
        self.threshold_bits().hash(state);
    }
}
