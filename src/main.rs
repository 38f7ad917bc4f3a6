//! # catsearch
//!
//! Command-line front end for a biological-metadata catalog's search API.
//!
//! ## Usage
//!
//! ```bash
//! catsearch --config ./config/catsearch.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `catsearch search "<query>"` | Run one search and print the results |
//! | `catsearch interactive` | Drive a debounced search session from stdin |
//! | `catsearch url "<query>"` | Print the shareable URL state for a search |
//!
//! ## Examples
//!
//! ```bash
//! # Search with the configured defaults
//! catsearch search "cellline"
//!
//! # Second page, only confident matches, raw JSON
//! catsearch search "cellline" --offset 10 --threshold 0.5 --json
//!
//! # Restore a shared search and keep typing
//! catsearch interactive --url "?query=k562&offset=20"
//! ```

use anyhow::Result;
use catalog_search::config::{self, Config};
use catalog_search::interactive::run_interactive;
use catalog_search::search::{run_search, SearchOptions};
use catalog_search::url_state::UrlState;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// catsearch: search a biological-metadata catalog from the terminal.
///
/// All commands read a TOML configuration file (`--config`). When the file
/// does not exist, `--api-url` alone is enough to run.
#[derive(Parser)]
#[command(name = "catsearch", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/catsearch.toml")]
    config: PathBuf,

    /// Catalog API base URL; overrides `[api].base_url`.
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Bearer token. Without one, only public records are returned.
    #[arg(long, global = true, env = "CATSEARCH_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single search and print the results.
    Search {
        /// Search text.
        query: String,

        /// Maximum number of results (defaults to `[search].limit`).
        #[arg(long)]
        limit: Option<u64>,

        /// Pagination offset.
        #[arg(long, default_value_t = 0)]
        offset: u64,

        /// Minimum relevance score in [0.0, 1.0].
        #[arg(long)]
        threshold: Option<f64>,

        /// Print the raw response as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Drive a debounced search session from stdin, one input event per line.
    ///
    /// Lines starting with `:` are actions (`:search`, `:next`, `:prev`,
    /// `:offset N`, `:refresh`, `:url`, `:quit`).
    Interactive {
        /// Page URL or query string to restore (e.g. `?query=foo&offset=20`).
        #[arg(long)]
        url: Option<String>,
    },

    /// Print the navigable URL state for a search.
    Url {
        /// Search text.
        query: String,

        /// Pagination offset.
        #[arg(long, default_value_t = 0)]
        offset: u64,

        /// Page URL to write the state into.
        #[arg(long)]
        page: Option<String>,
    },
}

fn load(cli: &Cli) -> Result<Config> {
    let mut cfg = match (&cli.api_url, cli.config.exists()) {
        (Some(api_url), false) => Config::minimal(api_url.clone()),
        _ => config::load_config(&cli.config)?,
    };
    if let Some(api_url) = &cli.api_url {
        cfg.api.base_url = api_url.clone();
    }
    config::validate(&cfg)?;
    Ok(cfg)
}

fn init_logging(cfg: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.log.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Commands that don't require config
    if let Commands::Url {
        query,
        offset,
        page,
    } = &cli.command
    {
        let state = UrlState::new(query.clone(), *offset);
        match page {
            Some(page) => {
                let mut url = url::Url::parse(page)?;
                state.write_into(&mut url);
                println!("{}", url);
            }
            None => println!("?{}", state.to_query_string()),
        }
        return Ok(());
    }

    let cfg = load(&cli)?;
    init_logging(&cfg);
    let token = cli.token.clone().filter(|t| !t.is_empty());

    match cli.command {
        Commands::Search {
            query,
            limit,
            offset,
            threshold,
            json,
        } => {
            let options = SearchOptions {
                limit,
                offset,
                score_threshold: threshold,
                json,
            };
            run_search(&cfg, token, &query, options).await?;
        }
        Commands::Interactive { url } => {
            run_interactive(&cfg, token, url.as_deref()).await?;
        }
        Commands::Url { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
