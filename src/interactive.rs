//! Interactive search (`catsearch interactive`).
//!
//! Each line read from stdin is one input event carrying the full text of
//! the search box, so piping a burst of lines behaves like fast typing: only
//! text that stays unchanged for the debounce window is searched. Lines that
//! start with `:` are page actions:
//!
//! | Line | Action |
//! |------|--------|
//! | `:search` | search the current text now (Enter / Search button) |
//! | `:next`, `:prev` | page forward / back |
//! | `:offset N` | jump to offset `N` |
//! | `:refresh` | re-run the current search, bypassing the cache |
//! | `:url` | print the navigable URL state |
//! | `:quit` | exit |
//!
//! At end of input the loop waits for the pending input to settle and for
//! the last search to land, then exits.

use anyhow::Result;
use std::io::ErrorKind;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::warn;

use crate::cache::QueryCache;
use crate::client::HttpSearchClient;
use crate::config::Config;
use crate::query::SearchQuery;
use crate::render::render;
use crate::session::{PendingSearch, SearchSession};
use crate::url_state::UrlState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Input(String),
    Submit,
    Next,
    Prev,
    Offset(u64),
    Refresh,
    Url,
    Quit,
}

impl Command {
    /// Parse one stdin line. Unknown `:` actions are treated as input text.
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        match trimmed {
            ":search" => return Command::Submit,
            ":next" => return Command::Next,
            ":prev" => return Command::Prev,
            ":refresh" => return Command::Refresh,
            ":url" => return Command::Url,
            ":quit" | ":q" => return Command::Quit,
            _ => {}
        }
        if let Some(rest) = trimmed.strip_prefix(":offset") {
            if let Ok(offset) = rest.trim().parse() {
                return Command::Offset(offset);
            }
        }
        Command::Input(line.to_string())
    }
}

/// Read the next command, skipping lines that are not valid UTF-8.
/// `None` at end of input.
pub async fn next_command<R>(lines: &mut Lines<R>) -> Result<Option<Command>>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        match lines.next_line().await {
            Ok(line) => return Ok(line.as_deref().map(Command::parse)),
            Err(err) if err.kind() == ErrorKind::InvalidData => {
                warn!(error = %err, "skipping input line that is not valid UTF-8");
            }
            Err(err) => return Err(err.into()),
        }
    }
}

pub async fn run_interactive(
    config: &Config,
    token: Option<String>,
    start_url: Option<&str>,
) -> Result<()> {
    let url = match start_url {
        Some(raw) => UrlState::parse(raw)?,
        None => UrlState::default(),
    };

    let api = Arc::new(HttpSearchClient::new(config)?);
    let cache = QueryCache::from_config(&config.search);
    let query = SearchQuery::from_config(config, cache, api, token);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let dispatch = |pending: Option<PendingSearch>| {
        if let Some(pending) = pending {
            pending.spawn(query.clone(), tx.clone());
        }
    };

    let (mut session, initial) = SearchSession::mount(&config.search, &url);
    if initial.is_none() {
        print!("{}", render(&session.view()));
    }
    dispatch(initial);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        let deadline = session.next_deadline();

        tokio::select! {
            command = next_command(&mut lines), if stdin_open => {
                match command? {
                    None => stdin_open = false,
                    Some(Command::Input(text)) => session.input(text, Instant::now()),
                    Some(Command::Submit) => dispatch(session.submit()),
                    Some(Command::Next) => dispatch(session.next_page()),
                    Some(Command::Prev) => dispatch(session.prev_page()),
                    Some(Command::Offset(offset)) => dispatch(session.set_offset(offset)),
                    Some(Command::Refresh) => dispatch(session.refresh()),
                    Some(Command::Url) => println!("?{}", session.url_state().to_query_string()),
                    Some(Command::Quit) => break,
                }
            }
            _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                dispatch(session.poll(Instant::now()));
            }
            Some(completion) = rx.recv() => {
                if session.apply(completion) {
                    print!("{}", render(&session.view()));
                }
            }
        }

        if !stdin_open && session.next_deadline().is_none() && !session.is_searching() {
            break;
        }
    }

    Ok(())
}
