use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use bookmark_core::{
    build_summary_prompt, extract_bookmark_urls, normalize_url, parse_url_list, UrlOutcome, NO_TITLE,
};
use bookmark_engine::{
    partition_by_liveness, write_url_list, BatchContext, Fetcher, LivenessProbe, OllamaSummarizer,
    Orchestrator, PipelineEvent, PipelineSettings, ProgressSink, RecordStore, RedbRecordStore,
    ReqwestFetcher, Summarizer,
};
use bookmark_logging::{pipeline_debug, pipeline_info};
use futures_util::StreamExt;

use crate::config::AppConfig;

/// Prints each stored record as it completes.
struct ConsoleSink;

impl ProgressSink for ConsoleSink {
    fn emit(&self, event: PipelineEvent) {
        match event {
            PipelineEvent::Stage { index, url, stage } => {
                pipeline_debug!("[{}] {:?} {}", index, stage, url);
            }
            PipelineEvent::Finished {
                outcome: UrlOutcome::Stored(record),
                ..
            } => {
                println!("URL: {}", record.url);
                println!("Heading: {}", record.heading);
                println!("Summary: {}", record.summary);
                println!("Tags: {}", record.tags);
                println!();
            }
            PipelineEvent::Finished { .. } => {}
        }
    }
}

pub struct EnrichArgs {
    pub input: PathBuf,
    pub db: PathBuf,
    pub broken: PathBuf,
    pub concurrency: usize,
}

pub async fn enrich(config: &AppConfig, args: EnrichArgs) -> Result<()> {
    let raw = fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read url list {:?}", args.input))?;
    let urls = parse_url_list(&raw);
    pipeline_info!("Read {} urls from {:?}", urls.len(), args.input);

    let store = Arc::new(open_store(&args.db)?);
    let ctx = BatchContext::open(store).context("failed to load stored urls")?;

    let fetcher = ReqwestFetcher::new(config.fetch_settings()).context("failed to build fetcher")?;
    let summarizer = OllamaSummarizer::new(config.summarizer_config())
        .context("failed to set up summarizer")?;
    let settings = PipelineSettings {
        concurrency: args.concurrency,
        ..PipelineSettings::default()
    };
    let orchestrator = Orchestrator::new(Arc::new(fetcher), Arc::new(summarizer), settings);

    let report = orchestrator.run(&ctx, &urls, &ConsoleSink).await;

    let broken: Vec<String> = report
        .broken_urls()
        .into_iter()
        .map(|broken| broken.raw_url)
        .collect();
    write_url_list(&args.broken, &broken)
        .with_context(|| format!("failed to write {:?}", args.broken))?;

    println!(
        "Stored {}, skipped {}, failed {}. Broken urls written to {}",
        report.stored_count(),
        report.skipped_count(),
        report.failed_count(),
        display_path(&args.broken)
    );
    Ok(())
}

pub struct ExtractArgs {
    pub bookmarks: PathBuf,
    pub check_liveness: bool,
    pub valid: PathBuf,
    pub broken: PathBuf,
}

pub async fn extract(config: &AppConfig, args: ExtractArgs) -> Result<()> {
    let html = fs::read_to_string(&args.bookmarks)
        .with_context(|| format!("failed to read bookmarks file {:?}", args.bookmarks))?;
    let urls = extract_bookmark_urls(&html);
    pipeline_info!("Extracted {} urls from {:?}", urls.len(), args.bookmarks);

    let (valid, broken) = if args.check_liveness {
        let probe = LivenessProbe::new(config.liveness_settings())
            .context("failed to build liveness probe")?;
        let report = partition_by_liveness(&probe, urls, config.liveness.concurrency).await;
        (report.valid, report.broken)
    } else {
        (urls, Vec::new())
    };

    write_url_list(&args.valid, &valid)
        .with_context(|| format!("failed to write {:?}", args.valid))?;
    println!("{} valid urls written to {}", valid.len(), display_path(&args.valid));

    if args.check_liveness {
        write_url_list(&args.broken, &broken)
            .with_context(|| format!("failed to write {:?}", args.broken))?;
        println!("{} broken urls written to {}", broken.len(), display_path(&args.broken));
    }
    Ok(())
}

pub fn show(db: &Path, url: &str) -> Result<()> {
    let store = open_existing_store(db)?;
    let normalized = normalize_url(url);
    match store.get(&normalized)? {
        Some(record) => {
            println!("URL: {}", record.url);
            println!("Heading: {}", record.heading);
            println!("Summary: {}", record.summary);
            println!("Tags: {}", record.tags);
            println!("Fetched: {}", record.fetched_utc);
        }
        None => println!("No record for {normalized}"),
    }
    Ok(())
}

pub fn list(db: &Path) -> Result<()> {
    let store = open_existing_store(db)?;
    let records = store.all_records()?;
    for record in &records {
        println!("{}\t{}", record.url, record.heading);
    }
    pipeline_info!("Listed {} records", records.len());
    Ok(())
}

/// Fetch one page and stream its summary to stdout without storing anything.
pub async fn preview(config: &AppConfig, url: &str) -> Result<()> {
    let fetcher = ReqwestFetcher::new(config.fetch_settings()).context("failed to build fetcher")?;
    let summarizer = OllamaSummarizer::new(config.summarizer_config())
        .context("failed to set up summarizer")?;

    let normalized = normalize_url(url);
    let page = fetcher
        .fetch(&normalized)
        .await
        .with_context(|| format!("failed to fetch {normalized}"))?;
    println!("Heading: {}", page.heading.as_deref().unwrap_or(NO_TITLE));
    println!("Summary ({}):", summarizer.model());

    let prompt = build_summary_prompt(&page.text);
    let mut fragments = summarizer.complete_streaming(&prompt).await?;
    let mut stdout = io::stdout().lock();
    while let Some(fragment) = fragments.next().await {
        stdout.write_all(fragment?.as_bytes())?;
        stdout.flush()?;
    }
    writeln!(stdout)?;
    Ok(())
}

fn open_store(db: &Path) -> Result<RedbRecordStore> {
    RedbRecordStore::open(db).with_context(|| format!("failed to open record store {db:?}"))
}

fn open_existing_store(db: &Path) -> Result<RedbRecordStore> {
    RedbRecordStore::open_existing(db)
        .with_context(|| format!("failed to open record store {db:?}"))
}

fn display_path(path: &Path) -> String {
    fs::canonicalize(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string()
}
