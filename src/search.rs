//! One-shot search (`catsearch search`).
//!
//! Runs a single search through the same session, cache and client stack
//! the interactive mode uses, then prints the rendered page (or the raw
//! response as JSON).

use anyhow::{bail, Result};
use std::sync::Arc;

use crate::cache::QueryCache;
use crate::client::HttpSearchClient;
use crate::config::Config;
use crate::query::SearchQuery;
use crate::render::render;
use crate::session::SearchSession;
use crate::url_state::UrlState;

/// Options for a one-shot search. `None` fields fall back to `[search]`
/// in the config.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub limit: Option<u64>,
    pub offset: u64,
    pub score_threshold: Option<f64>,
    pub json: bool,
}

pub async fn run_search(
    config: &Config,
    token: Option<String>,
    query: &str,
    options: SearchOptions,
) -> Result<()> {
    if query.trim().is_empty() {
        print!("{}", render(&SearchSession::new(&config.search).view()));
        return Ok(());
    }

    let mut search_config = config.search.clone();
    if let Some(limit) = options.limit {
        if limit < 1 {
            bail!("--limit must be >= 1");
        }
        search_config.limit = limit;
    }
    if let Some(threshold) = options.score_threshold {
        if !(0.0..=1.0).contains(&threshold) {
            bail!("--threshold must be in [0.0, 1.0]");
        }
        search_config.score_threshold = Some(threshold);
    }

    let api = Arc::new(HttpSearchClient::new(config)?);
    let cache = QueryCache::from_config(&config.search);
    let search = SearchQuery::from_config(config, cache, api, token);

    let (mut session, pending) =
        SearchSession::mount(&search_config, &UrlState::new(query, options.offset));
    let Some(pending) = pending else {
        return Ok(());
    };

    let completion = pending.run(&search).await;
    session.apply(completion);
    let view = session.view();

    if let Some(error) = &view.error {
        bail!("{}", error);
    }

    if options.json {
        if let Some(results) = &view.results {
            println!("{}", serde_json::to_string_pretty(results.as_ref())?);
        }
        return Ok(());
    }

    print!("{}", render(&view));
    Ok(())
}
