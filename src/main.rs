// HTTP layer: transport, rate limiting and the caching fetcher.
mod http {
    // HTTP client implementation.
    pub mod client;
    // Caching, rate-limited fetch primitive.
    pub mod fetcher;
    // Sliding-window rate limiter.
    pub mod rate_limiter;
}
// Yahoo Finance API.
mod yahoo {
    // Client for quotes, search and dividends.
    pub mod api_caller;
    // Response structures for the Yahoo API.
    pub mod response;
}
// Ticker resolution.
mod resolve {
    /// Batch pacing over the resolver.
    pub mod batch;
    /// Provider symbol candidates.
    pub mod candidates;
    /// Operator-assisted selection.
    pub mod disambiguate;
    /// Failure classification.
    pub mod failure;
    /// Symbol resolution.
    pub mod resolver;
    /// Backoff on throttling.
    pub mod retry;
}
// Data storage module.
mod store {
    /// HTTP response cache storage.
    pub mod http_cache;
    /// SQLite database interaction.
    pub mod sqlite;
}
// Settings from environment and command line.
mod config;
// module storing defaults
mod constants;
// Import command glue.
mod import;
// Data models.
mod model;
// Resolution report.
mod report;
// Symbols file reader.
mod symbols;

use std::{path::PathBuf, process::ExitCode, sync::Arc};

use clap::{Parser, Subcommand};
use dotenv::dotenv;

use config::{Config, Overrides};
use http::client::ReqwestTransport;
use resolve::disambiguate::{ConsolePrompt, Disambiguator, NonInteractive};

// Command-line argument parser.
#[derive(Parser, Debug)]
#[command(name = "ticker_import", about, long_about = None)]
struct Args {
    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Commands,
}

// Subcommands for the application.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve every symbol in a CSV file and write a report.
    Resolve {
        symbols_file_path: PathBuf,
        /// Prompt for a match when a symbol cannot be resolved.
        #[arg(long)]
        interactive: bool,
        #[arg(long)]
        batch_size: Option<usize>,
        /// Seconds to wait between batches.
        #[arg(long)]
        batch_delay: Option<f64>,
        /// Report file; stdout when omitted.
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        with_dividends: bool,
    },
    /// Resolve one symbol and print its dividend history.
    Dividends {
        symbol: String,
        #[arg(long)]
        exchange: Option<String>,
    },
    /// Maintain the HTTP cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// Remove expired entries.
    Purge,
    /// Remove every entry.
    Clear,
}

fn load_config(overrides: &Overrides) -> model::Result<Config> {
    let mut config = Config::from_env()?;
    config.apply(overrides)?;
    Ok(config)
}

async fn run(args: Args) -> model::Result<()> {
    let mut config = load_config(&args.overrides)?;

    match args.command {
        Commands::Resolve {
            symbols_file_path,
            interactive,
            batch_size,
            batch_delay,
            output,
            with_dividends,
        } => {
            config.interactive |= interactive;
            if let Some(size) = batch_size {
                config.batch_size = size;
            }
            if let Some(secs) = batch_delay {
                config.batch_delay = config::seconds_to_duration("batch_delay", &secs.to_string())?;
            }

            let session = import::Session::open(&config, Arc::new(ReqwestTransport))?;
            let mut prompt: Box<dyn Disambiguator> = if config.interactive {
                Box::new(ConsolePrompt::stdio())
            } else {
                Box::new(NonInteractive)
            };
            let options = import::ResolveOptions {
                output,
                with_dividends,
            };
            import::resolve_file(
                &session,
                &config,
                &symbols_file_path,
                &options,
                prompt.as_mut(),
            )
            .await?;
        }

        Commands::Dividends { symbol, exchange } => {
            let session = import::Session::open(&config, Arc::new(ReqwestTransport))?;
            import::show_dividends(
                &session,
                &symbol,
                exchange.as_deref(),
                std::io::stdout().lock(),
            )
            .await?;
        }

        Commands::Cache { action } => {
            let session = import::Session::open(&config, Arc::new(ReqwestTransport))?;
            let removed = match action {
                CacheAction::Purge => import::purge_cache(&session)?,
                CacheAction::Clear => import::clear_cache(&session)?,
            };
            println!("Removed {} cache entries", removed);
        }
    }
    Ok(())
}

// Single-threaded runtime: every request, backoff and pause runs in sequence.
#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenv().ok();

    env_logger::init();

    let args = Args::parse();

    match run(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{}", err);
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}
