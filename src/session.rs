//! Search session: the state machine behind the search page.
//!
//! ```text
//!            input                 quiet window elapses
//!   Idle ─────────────▶ Typing ───────────────────────────▶ Searching
//!    ▲                    │  submit (bypasses the window)      │
//!    │ blank query        └───────────────────────────────────▶│
//!    │                                                         │
//!    │                       success, ≥1 hit ◀─────────────────┤
//!    │                       success, 0 hits ◀─────────────────┤
//!    │                       failure: previous display + error ┘
//! ```
//!
//! The session owns the raw input, a [`Debouncer`] producing the debounced
//! query, pagination, and the [`UrlState`] mirror. It does no I/O itself:
//! every search it wants to run comes out as a [`PendingSearch`], which the
//! caller executes (usually on a spawned task) and hands back through
//! [`SearchSession::apply`].
//!
//! Each pending search carries a [`RequestTicket`]. Issuing a newer search,
//! clearing the query, cancelling, or dropping the session makes every older
//! ticket stale, and results for stale tickets are discarded. The display
//! therefore always follows the newest request, whatever order responses
//! arrive in.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::client::SearchError;
use crate::config::SearchConfig;
use crate::debounce::Debouncer;
use crate::models::{RequestKey, SearchResponse};
use crate::query::{QueryState, SearchQuery};
use crate::url_state::UrlState;

/// Page state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing searched yet (or the query was cleared).
    Idle,
    /// Input changed and has not settled.
    Typing,
    /// A request for the current key is in flight.
    Searching,
    Results,
    /// A search resolved with nothing in it.
    NoResults,
}

/// Handle identifying one issued search. Stale once the session has moved on.
#[derive(Debug, Clone)]
pub struct RequestTicket {
    id: u64,
    current: Arc<AtomicU64>,
}

impl RequestTicket {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_stale(&self) -> bool {
        self.current.load(Ordering::Acquire) != self.id
    }
}

/// A search the session wants executed.
#[derive(Debug, Clone)]
pub struct PendingSearch {
    pub key: RequestKey,
    pub ticket: RequestTicket,
    /// Bypass cache freshness and go to the network.
    pub refresh: bool,
}

/// Outcome of a [`PendingSearch`], ready for [`SearchSession::apply`].
#[derive(Debug, Clone)]
pub struct Completion {
    pub ticket: RequestTicket,
    pub state: QueryState,
}

impl PendingSearch {
    /// Run the search through `query`. A ticket that is already stale is not
    /// sent to the network at all.
    pub async fn run(self, query: &SearchQuery) -> Completion {
        if self.ticket.is_stale() {
            return Completion {
                ticket: self.ticket,
                state: QueryState::Idle,
            };
        }
        let state = if self.refresh {
            query.refetch_key(&self.key).await
        } else {
            query.fetch(&self.key).await
        };
        Completion {
            ticket: self.ticket,
            state,
        }
    }

    /// Run on a tokio task and deliver the completion on `tx`. Send failures
    /// (the receiver is gone) are ignored.
    pub fn spawn(self, query: SearchQuery, tx: mpsc::UnboundedSender<Completion>) {
        tokio::spawn(async move {
            let completion = self.run(&query).await;
            let _ = tx.send(completion);
        });
    }
}

/// Read-only snapshot of a session for rendering.
#[derive(Debug, Clone)]
pub struct SessionView {
    pub phase: Phase,
    pub input: String,
    pub query: String,
    pub limit: u64,
    pub offset: u64,
    /// Last successfully applied response.
    pub results: Option<Arc<SearchResponse>>,
    /// Set when the last applied search failed.
    pub error: Option<SearchError>,
    /// What the last resolved search left on the page: `Idle`, `Results` or
    /// `NoResults`. Stays put while the user types or a search runs.
    pub display: Phase,
}

pub struct SearchSession {
    input: String,
    debounced: String,
    limit: u64,
    offset: u64,
    score_threshold: Option<f64>,
    debouncer: Debouncer<String>,
    phase: Phase,
    /// What the page shows when no input or request is outstanding.
    display: Phase,
    last_good: Option<Arc<SearchResponse>>,
    error: Option<SearchError>,
    in_flight: Option<RequestKey>,
    current: Arc<AtomicU64>,
    next_id: u64,
    url: UrlState,
}

impl SearchSession {
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            input: String::new(),
            debounced: String::new(),
            limit: config.limit,
            offset: 0,
            score_threshold: config.score_threshold,
            debouncer: Debouncer::trailing(config.debounce()),
            phase: Phase::Idle,
            display: Phase::Idle,
            last_good: None,
            error: None,
            in_flight: None,
            current: Arc::new(AtomicU64::new(0)),
            next_id: 0,
            url: UrlState::default(),
        }
    }

    /// Create a session seeded from the page URL.
    ///
    /// A query carried by the URL counts as already settled, so the initial
    /// search is returned right away instead of waiting on the debouncer.
    pub fn mount(config: &SearchConfig, url: &UrlState) -> (Self, Option<PendingSearch>) {
        let mut session = Self::new(config);
        session.offset = url.offset;
        let Some(query) = url.query.clone() else {
            return (session, None);
        };
        session.input = query.clone();
        session.debounced = query;
        if session.debounced.trim().is_empty() {
            return (session, None);
        }
        debug!(query = %session.debounced, offset = session.offset, "restoring search from URL");
        let pending = session.issue();
        (session, Some(pending))
    }

    /// Record an input event (the full current text).
    pub fn input(&mut self, text: impl Into<String>, now: Instant) {
        let text = text.into();
        self.input = text.clone();
        self.debouncer.schedule(text, now);
        self.phase = Phase::Typing;
    }

    /// When [`poll`](Self::poll) should next be called, if input is pending.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.debouncer.deadline()
    }

    /// Advance the debouncer; returns a search when the input has settled.
    pub fn poll(&mut self, now: Instant) -> Option<PendingSearch> {
        let settled = self.debouncer.poll(now)?;
        self.settle(settled)
    }

    /// Search for the current input now (Search button or Enter).
    pub fn submit(&mut self) -> Option<PendingSearch> {
        self.debouncer.cancel();
        self.settle(self.input.clone())
    }

    /// Re-run the current query at another offset.
    pub fn set_offset(&mut self, offset: u64) -> Option<PendingSearch> {
        self.offset = offset;
        if self.debounced.trim().is_empty() {
            return None;
        }
        Some(self.issue())
    }

    pub fn next_page(&mut self) -> Option<PendingSearch> {
        self.set_offset(self.offset.saturating_add(self.limit))
    }

    /// Re-run the current search, bypassing cached data.
    pub fn refresh(&mut self) -> Option<PendingSearch> {
        if self.debounced.trim().is_empty() {
            return None;
        }
        let mut pending = self.issue();
        pending.refresh = true;
        Some(pending)
    }

    pub fn prev_page(&mut self) -> Option<PendingSearch> {
        if self.offset == 0 {
            return None;
        }
        self.set_offset(self.offset.saturating_sub(self.limit))
    }

    fn settle(&mut self, text: String) -> Option<PendingSearch> {
        if text.trim().is_empty() {
            self.clear();
            return None;
        }

        if text != self.debounced {
            self.debounced = text;
            self.offset = 0;
        }

        let key = self.key();
        if self.in_flight.as_ref() == Some(&key) {
            // same search already running; keep waiting on it
            self.phase = Phase::Searching;
            return None;
        }
        Some(self.issue())
    }

    fn clear(&mut self) {
        self.cancel();
        self.debounced.clear();
        self.offset = 0;
        self.phase = Phase::Idle;
        self.display = Phase::Idle;
        self.last_good = None;
        self.error = None;
        self.url = UrlState::default();
    }

    fn key(&self) -> RequestKey {
        RequestKey::new(self.debounced.clone(), self.limit, self.offset)
            .with_threshold(self.score_threshold)
    }

    fn issue(&mut self) -> PendingSearch {
        self.next_id += 1;
        self.current.store(self.next_id, Ordering::Release);

        let key = self.key();
        self.phase = Phase::Searching;
        self.in_flight = Some(key.clone());
        self.url = UrlState::new(self.debounced.clone(), self.offset);
        info!(query = %key.query, offset = key.offset, ticket = self.next_id, "searching");

        PendingSearch {
            key,
            ticket: RequestTicket {
                id: self.next_id,
                current: self.current.clone(),
            },
            refresh: false,
        }
    }

    /// Apply a finished search. Returns `false` when the result was stale
    /// and discarded.
    pub fn apply(&mut self, completion: Completion) -> bool {
        if completion.ticket.is_stale() {
            debug!(ticket = completion.ticket.id(), "discarding stale search result");
            return false;
        }
        self.in_flight = None;

        match completion.state {
            QueryState::Success(data) => {
                self.display = if data.is_empty() {
                    Phase::NoResults
                } else {
                    Phase::Results
                };
                self.last_good = Some(data);
                self.error = None;
            }
            QueryState::Error { error, .. } => {
                self.error = Some(error);
            }
            QueryState::Idle | QueryState::Pending => {}
        }

        self.phase = if self.debouncer.is_pending() {
            Phase::Typing
        } else {
            self.display
        };
        true
    }

    /// Make every outstanding ticket stale.
    pub fn cancel(&mut self) {
        self.current.store(0, Ordering::Release);
        self.in_flight = None;
        self.debouncer.cancel();
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn url_state(&self) -> &UrlState {
        &self.url
    }

    pub fn input_text(&self) -> &str {
        &self.input
    }

    pub fn debounced_query(&self) -> &str {
        &self.debounced
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn is_searching(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            phase: self.phase,
            input: self.input.clone(),
            query: self.debounced.clone(),
            limit: self.limit,
            offset: self.offset,
            results: self.last_good.clone(),
            error: self.error.clone(),
            display: self.display,
        }
    }
}

impl Drop for SearchSession {
    fn drop(&mut self) {
        self.current.store(0, Ordering::Release);
    }
}
