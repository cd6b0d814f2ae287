//! pagewatch CLI
//!
//! Local execution entry point. Meant to be run periodically (cron, CI).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use pagewatch::{
    error::{AppError, Result},
    models::{Config, Target, TargetKind, load_targets, short_hash},
    pipeline::{FetchOrchestrator, RunOptions, run_monitor, write_check_artifacts},
    services::{
        BlockDetector, HttpPageFetcher, Notifier, PageFetcher, ResourcePolicy, SignatureExtractor,
        TelegramNotifier,
    },
    storage::{LocalStateStore, StateStore},
    utils::http,
};

/// pagewatch - page change monitor
#[derive(Parser, Debug)]
#[command(
    name = "pagewatch",
    version,
    about = "Watches pages and notifies once per real content change"
)]
struct Cli {
    /// Path to storage directory containing config, targets and state
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch all targets, update state and send notifications
    Run {
        /// Fetch and diff only; do not save state or send messages
        #[arg(long)]
        dry_run: bool,
    },

    /// Fetch a single URL and show what the monitor sees
    Check {
        url: String,

        /// Extraction strategy (comment_count, latest_comment_block, full_document_hash)
        #[arg(long, default_value = "full_document_hash")]
        kind: TargetKind,

        /// Number of text lines to show
        #[arg(long, default_value_t = 20)]
        lines: usize,

        /// Write page.html, page.txt and page_meta.json into this directory
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Validate configuration and target list
    Validate {
        /// Print the effective configuration
        #[arg(long)]
        print: bool,
    },

    /// Show tracked state
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Load config.toml when present; a broken file is a configuration error.
fn load_config(path: &Path) -> Result<Config> {
    let config = if path.exists() {
        log::info!("Loading configuration from {}", path.display());
        Config::load(path).map_err(|e| AppError::config(format!("{}: {}", path.display(), e)))?
    } else {
        log::info!("No config at {}, using defaults", path.display());
        Config::default()
    };
    config.validate()?;
    Ok(config)
}

fn build_orchestrator(config: &Config) -> Result<FetchOrchestrator> {
    let client = http::create_async_client(&config.monitor)?;
    let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpPageFetcher::new(
        client,
        ResourcePolicy::from_config(&config.monitor),
    ));
    Ok(FetchOrchestrator::new(
        config.monitor.clone(),
        fetcher,
        BlockDetector::new(config.detector.clone()),
        SignatureExtractor::new(config.extraction.clone())?,
    ))
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(&cli.storage_dir.join("config.toml"))?;
    let targets_path = config.paths.targets_path(&cli.storage_dir);
    let store = LocalStateStore::new(config.paths.state_path(&cli.storage_dir));

    match cli.command {
        Command::Run { dry_run } => {
            let targets = load_targets(&targets_path)?;
            log::info!(
                "Loaded {} target(s) from {}",
                targets.len(),
                targets_path.display()
            );

            let orchestrator = build_orchestrator(&config)?;
            let notifier = TelegramNotifier::from_config(&config.notify)?;
            if notifier.is_none() {
                log::warn!("TELEGRAM_BOT_TOKEN / TELEGRAM_CHAT_ID not set, notifications disabled");
            }

            run_monitor(
                &config,
                &targets,
                &orchestrator,
                &store,
                notifier.as_ref().map(|n| n as &dyn Notifier),
                RunOptions { dry_run },
            )
            .await?;
        }

        Command::Check {
            url,
            kind,
            lines,
            out,
        } => {
            url::Url::parse(&url).map_err(|e| AppError::config(format!("invalid url: {e}")))?;
            let target = Target::new(url.clone(), kind, url);
            let orchestrator = build_orchestrator(&config)?;
            let detail = orchestrator.inspect(&target).await;

            log::info!("Attempts: {}", detail.result.attempts);
            log::info!("Cookie overlay clicked: {}", detail.overlay_dismissed);
            if let Some(page) = &detail.page {
                let snapshot = page.snapshot();
                log::info!("Fetch status: {}", page.status);
                log::info!(
                    "Status: {}",
                    snapshot
                        .http_status
                        .map_or_else(|| "-".to_string(), |s| s.to_string())
                );
                log::info!("Title: {}", snapshot.page_title.as_deref().unwrap_or("-"));
                log::info!("Final URL: {}", snapshot.final_url.as_deref().unwrap_or("-"));
                log::info!("Text length: {}", snapshot.rendered_text.chars().count());
                for line in snapshot.rendered_text.lines().take(lines) {
                    log::info!("  | {}", line);
                }
            }
            if let Some(classification) = &detail.classification {
                log::info!("Classification: {:?}", classification);
            }

            match (detail.result.signature(), detail.result.failure()) {
                (Some(sig), _) => {
                    log::info!("Signature: {}", sig.stable_id);
                    if let Some(count) = sig.numeric_count {
                        log::info!("Comment count: {}", count);
                    }
                    log::info!(
                        "Strategy: {} ({:?})",
                        sig.strategy.as_deref().unwrap_or("-"),
                        sig.confidence
                    );
                    if let Some(preview) = &sig.preview {
                        log::info!("Preview: {}", preview);
                    }
                }
                (None, Some(reason)) => log::warn!("Failed: {}", reason),
                (None, None) => {}
            }

            if let Some(dir) = &out {
                let extractor = SignatureExtractor::new(config.extraction.clone())?;
                write_check_artifacts(dir, &detail, &extractor, lines).await?;
                log::info!("Wrote check artifacts to {}", dir.display());
            }
        }

        Command::Validate { print } => {
            log::info!("Validating configuration...");
            log::info!("✓ Config OK");

            let targets = load_targets(&targets_path)?;
            log::info!("✓ {} target(s) in {}", targets.len(), targets_path.display());
            for target in &targets {
                log::info!("  {} [{}] {}", target.name, target.kind, target.url);
            }

            SignatureExtractor::new(config.extraction.clone())?;
            log::info!("✓ Extraction strategies compile");

            if TelegramNotifier::from_config(&config.notify)?.is_none() {
                log::warn!("Notification credentials missing; runs will not send messages");
            }

            if print {
                println!("{}", config.to_toml()?);
            }

            log::info!("All validations passed!");
        }

        Command::Info => {
            log::info!("Storage directory: {}", cli.storage_dir.display());
            log::info!(
                "Targets: {}",
                if targets_path.exists() {
                    "exists"
                } else {
                    "not found"
                }
            );

            let state = store.load().await?;
            if state.is_empty() {
                log::info!("No state recorded yet.");
            }
            for (url, record) in &state {
                let value = match record.signature.numeric_count {
                    Some(count) => format!("{count} comments"),
                    None => short_hash(&record.signature.stable_id).to_string(),
                };
                let updated = record
                    .updated_at
                    .map_or_else(|| "-".to_string(), |t| t.to_rfc3339());
                log::info!(
                    "{} [{}] {} (updated {}) {}",
                    record.name,
                    record.kind,
                    value,
                    updated,
                    url
                );
            }
        }
    }

    Ok(())
}
