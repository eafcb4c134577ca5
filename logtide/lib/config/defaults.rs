use std::{path::PathBuf, sync::LazyLock};

use crate::utils::LOGTIDE_HOME_DIR;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The default number of seconds between log polls per host.
pub const DEFAULT_LOG_INTERVAL_SECS: u64 = 30;

/// The default number of seconds between metrics samples per host.
pub const DEFAULT_METRICS_INTERVAL_SECS: u64 = 15;

/// The default cap on log lines fetched per container per tick.
pub const DEFAULT_MAX_LINES_PER_FETCH: u32 = 500;

/// The default tail applied the first time a container is seen, so a
/// long-lived container does not flood storage with its full history.
pub const DEFAULT_FIRST_SIGHT_BACKLOG: u32 = 500;

/// The default number of containers fetched concurrently within one host.
pub const DEFAULT_WORKER_LIMIT: usize = 4;

/// The default per-call transport deadline in seconds.
pub const DEFAULT_TRANSPORT_TIMEOUT_SECS: u64 = 30;

/// The default ceiling for per-pair retry backoff, in seconds.
pub const DEFAULT_BACKOFF_CEILING_SECS: u64 = 300;

/// The default ssh port.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// The default base url of the Ollama API.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// The default model used for log analysis.
pub const DEFAULT_OLLAMA_MODEL: &str = "qwen2.5:7b";

/// The default cap on characters of log context sent per analysis call.
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 12_000;

/// The default deadline for one analysis request, in seconds.
pub const DEFAULT_ANALYSIS_TIMEOUT_SECS: u64 = 60;

/// The default number of lines per container consumed by the one-time
/// initial scan.
pub const DEFAULT_INITIAL_SCAN_LINES: u32 = 200;

/// The default url of the HTTP storage sink.
pub const DEFAULT_SINK_URL: &str = "http://localhost:9200";

/// The default index name prefix used by the HTTP storage sink.
pub const DEFAULT_INDEX_PREFIX: &str = "logtide";

/// The default capacity of the analyzed-record identity set.
pub const DEFAULT_ANALYZED_SET_CAPACITY: usize = 100_000;

/// The path where all logtide global state is stored.
pub static DEFAULT_LOGTIDE_HOME: LazyLock<PathBuf> =
    LazyLock::new(|| dirs::home_dir().unwrap().join(LOGTIDE_HOME_DIR));
