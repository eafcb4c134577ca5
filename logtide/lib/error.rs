use std::{
    error::Error,
    fmt::{self, Display},
};
use thiserror::Error;
use uuid::Uuid;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of a logtide-related operation.
pub type LogtideResult<T> = Result<T, LogtideError>;

/// An error that occurred during a log collection or analysis operation.
#[derive(Debug, Error)]
pub enum LogtideError {
    /// An I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// An error that can represent any error.
    #[error(transparent)]
    Custom(#[from] AnyError),

    /// An error that occurred while talking to a host's Docker daemon.
    ///
    /// Carries a [`TransportErrorKind`] so the collector can apply a single
    /// retry policy regardless of which transport produced the failure.
    #[error("transport error ({kind}): {message}")]
    Transport {
        /// The classified failure mode.
        kind: TransportErrorKind,
        /// Human-readable detail from the underlying transport.
        message: String,
    },

    /// An error that occurred while parsing a single log line.
    #[error("log parse error: {0}")]
    Parse(String),

    /// An error that occurred when the storage sink rejected a batch.
    #[error("storage sink write failed: {0}")]
    Write(String),

    /// The text-analysis capability is down or timed out.
    #[error("analysis unavailable: {0}")]
    AnalysisUnavailable(String),

    /// An error that occurred when an issue id was not found.
    #[error("issue not found: {0}")]
    IssueNotFound(Uuid),

    /// An error that occurred when the configuration file was not found.
    #[error("config file not found: {0}")]
    ConfigNotFound(String),

    /// An error that occurred when an invalid collector configuration was used.
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] InvalidConfigError),

    /// An error that occurred during an HTTP request.
    #[error("http request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// An error that occurred during an HTTP middleware operation.
    #[error("http middleware error: {0}")]
    HttpMiddleware(#[from] reqwest_middleware::Error),

    /// An error that occurred during a cursor database operation.
    #[error("cursor database error: {0}")]
    Database(#[from] sqlx::Error),

    /// An error that occurred while running cursor database migrations.
    #[error("cursor database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// An error that occurred during JSON serialization or deserialization.
    #[error("serde json error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// An error that occurred while reading the YAML configuration.
    #[error("serde yaml error: {0}")]
    SerdeYaml(#[from] serde_yaml::Error),

    /// An error that occurred when a join handle returned an error.
    #[error("join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),
}

/// The classified failure mode of a transport call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The call exceeded its deadline.
    Timeout,

    /// The host rejected our credentials.
    Auth,

    /// The host or container does not exist.
    NotFound,

    /// Anything else.
    Unknown,
}

/// An error that occurred when an invalid collector configuration was used.
#[derive(Debug, Error)]
pub enum InvalidConfigError {
    /// Two hosts share the same name.
    #[error("duplicate host name: {0}")]
    DuplicateHostName(String),

    /// An ssh host has no hostname to connect to.
    #[error("ssh host {0} has no hostname")]
    SshHostMissingHostname(String),

    /// An agent host has no base url to poll.
    #[error("agent host {0} has no url")]
    AgentHostMissingUrl(String),

    /// A numeric setting that must be positive is zero.
    #[error("{0} must be greater than zero")]
    MustBePositive(&'static str),

    /// No hosts are configured.
    #[error("no hosts configured")]
    NoHosts,
}

/// An error that can represent any error.
#[derive(Debug)]
pub struct AnyError {
    error: anyhow::Error,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl LogtideError {
    /// Creates a new `Err` result.
    pub fn custom(error: impl Into<anyhow::Error>) -> LogtideError {
        LogtideError::Custom(AnyError {
            error: error.into(),
        })
    }

    /// Creates a transport error of the given kind.
    pub fn transport(kind: TransportErrorKind, message: impl Into<String>) -> LogtideError {
        LogtideError::Transport {
            kind,
            message: message.into(),
        }
    }

    /// Returns the transport failure kind if this is a transport error.
    pub fn transport_kind(&self) -> Option<TransportErrorKind> {
        match self {
            LogtideError::Transport { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl AnyError {
    /// Downcasts the error to a `T`.
    pub fn downcast<T>(&self) -> Option<&T>
    where
        T: Display + fmt::Debug + Send + Sync + 'static,
    {
        self.error.downcast_ref::<T>()
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Creates an `Ok` `LogtideResult`.
#[allow(non_snake_case)]
pub fn Ok<T>(value: T) -> LogtideResult<T> {
    Result::Ok(value)
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportErrorKind::Timeout => write!(f, "timeout"),
            TransportErrorKind::Auth => write!(f, "auth"),
            TransportErrorKind::NotFound => write!(f, "notfound"),
            TransportErrorKind::Unknown => write!(f, "unknown"),
        }
    }
}

impl PartialEq for AnyError {
    fn eq(&self, other: &Self) -> bool {
        self.error.to_string() == other.error.to_string()
    }
}

impl Display for AnyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl Error for AnyError {}
