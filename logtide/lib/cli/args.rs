use std::path::PathBuf;

use clap::Parser;

use crate::config::DEFAULT_INITIAL_SCAN_LINES;

use super::styles;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Logtide CLI - incremental Docker log collection and issue detection
#[derive(Debug, Parser)]
#[command(name = "logtide", author, about, version, styles=styles::styles())]
pub struct LogtideArgs {
    /// The subcommand to run
    #[command(subcommand)]
    pub subcommand: Option<LogtideSubcommand>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Available subcommands for the collector
#[derive(Debug, Parser)]
pub enum LogtideSubcommand {
    /// Run the collection and metrics loops until interrupted
    #[command(name = "run")]
    Run {
        /// Path to the configuration file
        #[arg(short, long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Write daily-rotated log files to this directory instead of stderr
        #[arg(long, value_name = "DIR")]
        log_dir: Option<PathBuf>,
    },

    /// Scan recent container logs for issues without storing anything
    #[command(name = "scan")]
    Scan {
        /// Path to the configuration file
        #[arg(short, long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Only scan the container with this name or id
        #[arg(long, value_name = "NAME")]
        container: Option<String>,

        /// Number of recent log lines to scan per container
        #[arg(long, value_name = "COUNT", default_value_t = DEFAULT_INITIAL_SCAN_LINES)]
        max_lines: u32,
    },
}
