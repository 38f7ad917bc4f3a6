//! Navigable URL state.
//!
//! The current search lives in the `query` and `offset` parameters of the
//! page URL so a search can be shared, bookmarked, or restored by back and
//! forward navigation. Other parameters on the URL are left untouched.

use anyhow::{Context, Result};
use url::Url;

const QUERY_PARAM: &str = "query";
const OFFSET_PARAM: &str = "offset";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlState {
    pub query: Option<String>,
    pub offset: u64,
}

impl UrlState {
    pub fn new(query: impl Into<String>, offset: u64) -> Self {
        let query = query.into();
        Self {
            query: (!query.is_empty()).then_some(query),
            offset,
        }
    }

    /// Parse a full URL (`https://host/search?query=foo`) or a bare query
    /// string (`?query=foo&offset=20`). A malformed offset reads as 0.
    pub fn parse(input: &str) -> Result<Self> {
        let url = if input.contains("://") {
            Url::parse(input).with_context(|| format!("invalid URL: {}", input))?
        } else {
            let base = Url::parse("http://localhost/search")?;
            let relative = if input.starts_with('?') {
                input.to_string()
            } else {
                format!("?{}", input)
            };
            base.join(&relative)
                .with_context(|| format!("invalid query string: {}", input))?
        };
        Ok(Self::from_url(&url))
    }

    pub fn from_url(url: &Url) -> Self {
        let mut state = UrlState::default();
        for (name, value) in url.query_pairs() {
            match name.as_ref() {
                QUERY_PARAM if !value.is_empty() => state.query = Some(value.into_owned()),
                OFFSET_PARAM => state.offset = value.parse().unwrap_or(0),
                _ => {}
            }
        }
        state
    }

    /// `query=...&offset=...`, or an empty string when there is no query.
    pub fn to_query_string(&self) -> String {
        let Some(query) = &self.query else {
            return String::new();
        };
        url::form_urlencoded::Serializer::new(String::new())
            .append_pair(QUERY_PARAM, query)
            .append_pair(OFFSET_PARAM, &self.offset.to_string())
            .finish()
    }

    /// Write this state into `url`, replacing any previous `query`/`offset`.
    pub fn write_into(&self, url: &mut Url) {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(name, _)| name != QUERY_PARAM && name != OFFSET_PARAM)
            .map(|(n, v)| (n.into_owned(), v.into_owned()))
            .collect();

        if kept.is_empty() && self.query.is_none() {
            url.set_query(None);
            return;
        }

        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        for (name, value) in &kept {
            pairs.append_pair(name, value);
        }
        if let Some(query) = &self.query {
            pairs.append_pair(QUERY_PARAM, query);
            pairs.append_pair(OFFSET_PARAM, &self.offset.to_string());
        }
    }
}
