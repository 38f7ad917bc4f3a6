//! # catalog-search
//!
//! Debounced, cache-coalesced search over a biological-metadata catalog's
//! REST API.
//!
//! The crate is the search orchestration of the catalog's browser front-end
//! expressed as a library: raw input is debounced, turned into a request
//! key, served through a shared de-duplicating cache, and applied to a page
//! state machine that never shows a stale response.
//!
//! ## Architecture
//!
//! ```text
//!  input ──▶ Debouncer ──▶ SearchSession ──PendingSearch──▶ SearchQuery
//!                              ▲   │                           │
//!                    Completion│   └──▶ UrlState             QueryCache
//!                              │                               │
//!                              └──────────── SearchApi ◀───────┘
//!                                         (HttpSearchClient)
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Request/response types and the request key |
//! | [`debounce`] | Quiet-window state machine and debounced callbacks |
//! | [`client`] | `POST /search/` client and error taxonomy |
//! | [`cache`] | Injectable query cache with in-flight coalescing |
//! | [`query`] | Binds request keys to the client through the cache |
//! | [`session`] | Search page state machine |
//! | [`url_state`] | `query`/`offset` URL parameters |
//! | [`render`] | Plain-text page rendering |
//! | [`search`] | One-shot CLI search |
//! | [`interactive`] | Line-driven interactive CLI search |

pub mod cache;
pub mod client;
pub mod config;
pub mod debounce;
pub mod interactive;
pub mod models;
pub mod query;
pub mod render;
pub mod search;
pub mod session;
pub mod url_state;

#[cfg(test)]
pub(crate) mod test_support;
