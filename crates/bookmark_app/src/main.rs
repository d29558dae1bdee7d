//! `bookmarks`: enrich a list of bookmark URLs with titles, summaries and tags.

mod commands;
mod config;

use std::path::PathBuf;

use anyhow::{Context, Result};
use bookmark_logging::{pipeline_error, LogDestination, DEFAULT_LOG_FILE};
use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;

use commands::{EnrichArgs, ExtractArgs};
use config::AppConfig;

#[derive(Parser)]
#[command(name = "bookmarks", version, about = "Bookmark URL ingestion and enrichment")]
struct Cli {
    /// RON config file. Defaults to ./bookmarks.ron when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Where log output goes.
    #[arg(long, global = true, value_enum, default_value_t = LogTarget::Terminal)]
    log: LogTarget,

    /// Log at debug level.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogTarget {
    Terminal,
    File,
    Both,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, summarize and store every new URL in a list.
    Enrich {
        /// Newline-delimited URL list.
        #[arg(long)]
        input: Option<PathBuf>,

        /// Record store file.
        #[arg(long)]
        db: Option<PathBuf>,

        /// Output file for URLs that failed.
        #[arg(long)]
        broken: Option<PathBuf>,

        /// URLs processed at once.
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Pull URLs out of an exported bookmarks HTML file.
    Extract {
        /// Exported bookmarks file.
        bookmarks: PathBuf,

        /// HEAD-check each URL and split the output into valid and broken.
        #[arg(long)]
        check_liveness: bool,

        #[arg(long)]
        valid: Option<PathBuf>,

        #[arg(long)]
        broken: Option<PathBuf>,
    },

    /// Print the stored record for a URL.
    Show {
        url: String,

        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Print every stored URL with its heading.
    List {
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Fetch one page and stream its summary without storing it.
    Preview { url: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let destination = match cli.log {
        LogTarget::Terminal => LogDestination::Terminal,
        LogTarget::File => LogDestination::File(PathBuf::from(DEFAULT_LOG_FILE)),
        LogTarget::Both => LogDestination::Both(PathBuf::from(DEFAULT_LOG_FILE)),
    };
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    bookmark_logging::initialize(&destination, level);

    let config = AppConfig::load(cli.config.as_deref())?;
    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;

    let result = match cli.command {
        Commands::Enrich {
            input,
            db,
            broken,
            concurrency,
        } => {
            let args = EnrichArgs {
                input: input.unwrap_or_else(|| config.input_path.clone()),
                db: db.unwrap_or_else(|| config.database_path.clone()),
                broken: broken.unwrap_or_else(|| config.broken_urls_path.clone()),
                concurrency: concurrency.unwrap_or(config.concurrency),
            };
            runtime.block_on(commands::enrich(&config, args))
        }
        Commands::Extract {
            bookmarks,
            check_liveness,
            valid,
            broken,
        } => {
            let args = ExtractArgs {
                bookmarks,
                check_liveness,
                valid: valid.unwrap_or_else(|| config.valid_urls_path.clone()),
                broken: broken.unwrap_or_else(|| config.broken_urls_path.clone()),
            };
            runtime.block_on(commands::extract(&config, args))
        }
        Commands::Show { url, db } => {
            commands::show(&db.unwrap_or_else(|| config.database_path.clone()), &url)
        }
        Commands::List { db } => {
            commands::list(&db.unwrap_or_else(|| config.database_path.clone()))
        }
        Commands::Preview { url } => runtime.block_on(commands::preview(&config, &url)),
    };
    if let Err(err) = &result {
        pipeline_error!("{:#}", err);
    }
    result
}
