//! In-process mock of the catalog's `POST /search/` endpoint.
//!
//! Behaviour is keyed on the query text:
//!
//! | Query | Response |
//! |-------|----------|
//! | `boom` | 500 |
//! | `garbage` | 200 with a non-JSON body |
//! | `empty` | no results, no namespace hits |
//! | `cellline` | one result, no namespace hits |
//! | `slow` | two results after 300ms |
//! | anything else | two results and one namespace hit |

#![allow(dead_code)]

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub body: Value,
    pub authorization: Option<String>,
}

#[derive(Default)]
pub struct MockState {
    pub calls: AtomicUsize,
    pub requests: Mutex<Vec<RecordedRequest>>,
}

impl MockState {
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

fn hit(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "score": 0.8,
        "payload": { "name": name, "namespace": "encode", "tag": "default" }
    })
}

async fn handle_search(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.calls.fetch_add(1, Ordering::SeqCst);
    state.requests.lock().unwrap().push(RecordedRequest {
        body: body.clone(),
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    });

    let query = body["query"].as_str().unwrap_or_default().to_string();
    let limit = body["limit"].as_u64().unwrap_or(10);
    let offset = body["offset"].as_u64().unwrap_or(0);

    let (results, namespace_hits) = match query.as_str() {
        "boom" => {
            return (StatusCode::INTERNAL_SERVER_ERROR, "relevance engine down").into_response()
        }
        "garbage" => return (StatusCode::OK, "<html>not json</html>").into_response(),
        "empty" => (vec![], vec![]),
        "cellline" => (vec![hit("1", "k562")], vec![]),
        "slow" => {
            tokio::time::sleep(Duration::from_millis(300)).await;
            (vec![hit("1", "slow-a"), hit("2", "slow-b")], vec![])
        }
        _ => (
            vec![hit("1", "first"), hit("2", "second")],
            vec!["encode".to_string()],
        ),
    };

    Json(json!({
        "query": query,
        "results": results,
        "namespace_hits": namespace_hits,
        "limit": limit,
        "offset": offset,
    }))
    .into_response()
}

/// Start the mock on an ephemeral port. Returns the API base URL.
pub async fn spawn_mock() -> (String, Arc<MockState>) {
    let state = Arc::new(MockState::default());
    let app = Router::new()
        .route("/api/v1/search/", post(handle_search))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}/api/v1", addr), state)
}

/// A base URL nothing is listening on.
pub fn closed_base_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    format!("http://127.0.0.1:{}/api/v1", port)
}
