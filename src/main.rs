//! reddit-ingest — one-shot ingestion run.
//! Loads config, fetches submissions, writes `{output_dir}/{output_name}.json`
//! and prints the `IngestionResult` as JSON.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reddit_corpus_ingest::config::ingest::IngestConfig;
use reddit_corpus_ingest::ingest::mock::MockSubmissionApi;
use reddit_corpus_ingest::ingest::providers::reddit::RedditClient;
use reddit_corpus_ingest::ingest::sink::NdjsonFileSink;
use reddit_corpus_ingest::metrics::Metrics;
use reddit_corpus_ingest::{IngestPipeline, SubmissionApi, TimeFilter};

#[derive(Debug, Parser)]
#[command(name = "reddit-ingest", version, about = "Fetch Reddit submissions into newline-delimited JSON")]
struct Cli {
    /// Config file (defaults to $INGEST_CONFIG_PATH, then config/ingest.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    subreddit: Option<String>,

    #[arg(long)]
    author: Option<String>,

    /// all | year | month | week | day | hour
    #[arg(long)]
    time_filter: Option<String>,

    /// Maximum submissions to fetch; 0 = until the archive is exhausted
    #[arg(long)]
    limit: Option<usize>,

    #[arg(long)]
    output_name: Option<String>,

    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Replay a saved search response (`{"data": [...]}`) instead of calling the APIs
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Write a Prometheus text exposition here after the run
    #[arg(long)]
    metrics_file: Option<PathBuf>,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("reddit_corpus_ingest=info,ingest=info,warn"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        registry.with(fmt::layer().compact().with_writer(std::io::stderr)).init();
    }
}

fn load_config(cli: &Cli) -> Result<IngestConfig> {
    let mut cfg = match &cli.config {
        Some(p) => IngestConfig::load_from_file(p)?,
        None => IngestConfig::load_default()?,
    };

    let run = &mut cfg.run;
    if cli.subreddit.is_some() {
        run.subreddit = cli.subreddit.clone();
    }
    if cli.author.is_some() {
        run.author = cli.author.clone();
    }
    if let Some(tf) = &cli.time_filter {
        run.time_filter = tf.parse::<TimeFilter>().context("--time-filter")?;
    }
    if let Some(l) = cli.limit {
        run.limit = l;
    }
    if let Some(n) = &cli.output_name {
        run.output_name = n.clone();
    }
    if let Some(d) = &cli.output_dir {
        run.output_dir = d.clone();
    }
    Ok(cfg)
}

fn build_api(cli: &Cli, cfg: &IngestConfig) -> Result<Box<dyn SubmissionApi>> {
    if let Some(p) = &cli.replay {
        let dump = std::fs::read_to_string(p)
            .with_context(|| format!("reading replay file {}", p.display()))?;
        let api = MockSubmissionApi::from_search_dump(&dump)
            .with_context(|| format!("parsing replay file {}", p.display()))?;
        tracing::info!(path = %p.display(), "replaying saved search response");
        return Ok(Box::new(api));
    }
    let client = RedditClient::new(
        cfg.credentials.clone(),
        &cfg.endpoints,
        cfg.fetch.request_timeout(),
    )?;
    Ok(Box::new(client))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let metrics = match &cli.metrics_file {
        Some(_) => match Metrics::init() {
            Ok(m) => Some(m),
            Err(e) => {
                tracing::warn!(error = ?e, "metrics disabled");
                None
            }
        },
        None => None,
    };

    let (cfg, api) = match load_config(&cli).and_then(|cfg| {
        let api = build_api(&cli, &cfg)?;
        Ok((cfg, api))
    }) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(error = ?e, "configuration error");
            eprintln!("configuration error: {e:#}");
            return ExitCode::from(2);
        }
    };

    let sink = NdjsonFileSink::new(&cfg.run.output_dir, &cfg.run.output_name);
    let pipeline = IngestPipeline::new(&*api, &sink)
        .with_page_size(cfg.fetch.page_size)
        .with_retry(cfg.fetch.retry_policy());

    let result = pipeline
        .run_with(
            cfg.run.subreddit.clone(),
            cfg.run.author.clone(),
            cfg.run.time_filter,
            cfg.run.limit(),
        )
        .await;

    match serde_json::to_string(&result) {
        Ok(s) => println!("{s}"),
        Err(e) => tracing::warn!(error = ?e, "could not serialize result"),
    }

    if let (Some(m), Some(path)) = (&metrics, &cli.metrics_file) {
        if let Err(e) = m.write_textfile(path) {
            tracing::warn!(error = ?e, "metrics textfile not written");
        }
    }

    if result.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
