//! `logtide` is the collector daemon and scan tool for fleets of Docker hosts.
//!
//! # Overview
//!
//! The binary has two modes:
//! - `run` starts the collection and metrics loops and keeps them running
//!   until the process receives an interrupt signal
//! - `scan` performs a one-shot detection sweep over recent container logs
//!   and prints the issues it finds, without advancing cursors or writing to
//!   the storage sink
//!
//! ## Usage
//!
//! ```bash
//! logtide run --config /etc/logtide/logtide.yaml
//! logtide run --config logtide.yaml --log-dir /var/log/logtide
//! logtide scan --container api-server --max-lines 500
//! ```
//!
//! Configuration is resolved from `--config`, then the `LOGTIDE_CONFIG`
//! environment variable, then the default location.

use std::{
    env,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use clap::{CommandFactory, Parser};
use logtide::{
    cli::{LogtideArgs, LogtideSubcommand},
    collector::Collector,
    config::{load_config, LogtideConfig, SinkKind},
    detect::{Analyzer, IssueDetector, OllamaAnalyzer},
    issues::IssueRegistry,
    models::IssueFilter,
    sink::{HttpSink, MemorySink, StorageSink},
    store::CursorStore,
    LogtideResult,
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, EnvFilter};

//--------------------------------------------------------------------------------------------------
// Functions: main
//--------------------------------------------------------------------------------------------------

#[tokio::main]
async fn main() -> LogtideResult<()> {
    // Pick up RUST_LOG and LOGTIDE_* overrides from a local .env file
    dotenvy::dotenv().ok();

    // Parse command line arguments
    let args = LogtideArgs::parse();

    match args.subcommand {
        Some(LogtideSubcommand::Run { config, log_dir }) => {
            let _guard = init_tracing(args.verbose, log_dir.as_deref())?;

            let config = load_config(resolve_config_path(config).as_deref()).await?;
            tracing::info!("configuration loaded: hosts={}", config.get_hosts().len());

            // Wire the shared components for the collection loops
            let cursors = Arc::new(CursorStore::open(config.cursor_db_path()).await?);
            let sink = build_sink(&config)?;
            let detector = build_detector(&config)?;
            let registry = Arc::new(IssueRegistry::new());

            let collector = Arc::new(Collector::new(config, cursors, sink, detector, registry));

            // Drain the loops on ctrl-c instead of tearing the process down
            let signal_collector = collector.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("shutdown signal received, draining collection loops");
                    signal_collector.shutdown();
                }
            });

            collector.run().await?;
            tracing::info!("collector stopped");
        }
        Some(LogtideSubcommand::Scan {
            config,
            container,
            max_lines,
        }) => {
            let _guard = init_tracing(args.verbose, None)?;

            let config = load_config(resolve_config_path(config).as_deref()).await?;

            // A scan never stores anything, so the sink is a throwaway
            let cursors = Arc::new(CursorStore::open(config.cursor_db_path()).await?);
            let sink: Arc<dyn StorageSink> = Arc::new(MemorySink::new());
            let detector = build_detector(&config)?;
            let registry = Arc::new(IssueRegistry::new());

            let collector = Collector::new(config, cursors, sink, detector, registry);
            let outcome = collector.scan_now(container.as_deref(), max_lines).await?;

            let issues = collector.registry().list(&IssueFilter::default()).await;
            println!(
                "scanned {} log lines, found {} issues",
                outcome.logs_scanned, outcome.issues_found
            );
            for issue in &issues {
                println!(
                    "{:<9} {:<24} x{:<4} {}",
                    issue.severity.to_string(),
                    issue.container_name,
                    issue.occurrence_count,
                    issue.title
                );
            }
        }
        None => {
            LogtideArgs::command().print_help()?;
        }
    }

    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Functions: helpers
//--------------------------------------------------------------------------------------------------

/// Initializes the tracing subscriber, writing daily-rotated files when a log
/// directory is given and stderr otherwise.
fn init_tracing(verbose: bool, log_dir: Option<&Path>) -> LogtideResult<Option<WorkerGuard>> {
    // An explicit RUST_LOG always wins over the verbosity flag
    let filter = if env::var(EnvFilter::DEFAULT_ENV).is_ok() {
        EnvFilter::from_default_env()
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(
                dir,
                "logtide.log",
            ));
            fmt()
                .with_target(false)
                .with_file(false)
                .with_line_number(false)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_level(true)
                .with_ansi(false)
                .with_writer(writer)
                .with_env_filter(filter)
                .init();
            Ok(Some(guard))
        }
        None => {
            fmt()
                .with_target(false)
                .with_file(false)
                .with_line_number(false)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_level(true)
                .with_env_filter(filter)
                .init();
            Ok(None)
        }
    }
}

/// Resolves the configuration file path from the flag or the environment.
fn resolve_config_path(flag: Option<PathBuf>) -> Option<PathBuf> {
    flag.or_else(|| env::var_os("LOGTIDE_CONFIG").map(PathBuf::from))
}

/// Builds the storage sink named by the configuration.
fn build_sink(config: &LogtideConfig) -> LogtideResult<Arc<dyn StorageSink>> {
    let settings = config.get_sink();
    let timeout = Duration::from_secs(*config.get_collector().get_transport_timeout_secs());
    Ok(match settings.get_kind() {
        SinkKind::Http => Arc::new(HttpSink::new(
            settings.get_url().clone(),
            settings.get_index_prefix(),
            timeout,
        )?),
        SinkKind::Memory => Arc::new(MemorySink::new()),
    })
}

/// Builds the issue detector, attaching the Ollama analyzer when analysis is
/// enabled.
fn build_detector(config: &LogtideConfig) -> LogtideResult<Arc<IssueDetector>> {
    let analyzer: Option<Arc<dyn Analyzer>> = if *config.get_analysis().get_enabled() {
        Some(Arc::new(OllamaAnalyzer::new(config.get_analysis())?))
    } else {
        None
    };

    Ok(Arc::new(IssueDetector::new(analyzer)))
}
