//! Domain models for Logtide.

use std::{cmp::Ordering, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

//--------------------------------------------------------------------------------------------------
// Types: Containers
//--------------------------------------------------------------------------------------------------

/// A container observed on a host during one poll cycle.
///
/// Containers are transient: the set is re-fetched on every tick and never
/// persisted beyond the current snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    /// The host the container was observed on.
    pub host: String,

    /// The container id as reported by the Docker daemon.
    pub id: String,

    /// The container name.
    pub name: String,

    /// The image the container was created from.
    pub image: String,

    /// The container state at observation time.
    pub status: ContainerStatus,

    /// The compose project label, if the container belongs to one.
    pub compose_project: Option<String>,

    /// The compose service label, if the container belongs to one.
    pub compose_service: Option<String>,
}

/// The observed state of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    /// The container is running.
    Running,

    /// The container has exited.
    Exited,

    /// The container is paused.
    Paused,

    /// The container is restarting.
    Restarting,

    /// The container has been created but not started.
    Created,

    /// The container is dead.
    Dead,

    /// Any state we do not recognize.
    Unknown,
}

//--------------------------------------------------------------------------------------------------
// Types: Log Records
//--------------------------------------------------------------------------------------------------

/// One raw log line as delivered by a transport, already split from the
/// `docker logs --timestamps` prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLine {
    /// The source-reported timestamp of the line.
    pub timestamp: DateTime<Utc>,

    /// The message text, without the timestamp prefix.
    pub message: String,
}

/// The structured record written to the storage sink. Append-only, never
/// mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// The host the record was collected from.
    pub host: String,

    /// The container id the record belongs to.
    pub container_id: String,

    /// The container name at collection time.
    pub container_name: String,

    /// The compose project label, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compose_project: Option<String>,

    /// The compose service label, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compose_service: Option<String>,

    /// The source-reported timestamp.
    pub timestamp: DateTime<Utc>,

    /// The raw message text.
    pub message: String,

    /// The detected log level. Unset means no level was found, not "info".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<LogLevel>,

    /// The detected HTTP status code, when the message looks like a request log.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
}

/// The log level detected in a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// CRITICAL, FATAL and PANIC messages.
    Critical,

    /// ERROR, EXCEPTION, FAILED and FAILURE messages.
    Error,

    /// WARN and WARNING messages.
    Warning,

    /// INFO messages.
    Info,

    /// DEBUG and TRACE messages.
    Debug,
}

/// The position of the last ingested line for one (host, container) pair.
///
/// Ordering is lexicographic on `(timestamp, line_count)`: `line_count` is the
/// number of lines already consumed that carry exactly `timestamp`, which
/// disambiguates bursts of lines sharing one timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// The timestamp of the last ingested line.
    pub timestamp: DateTime<Utc>,

    /// How many lines with exactly this timestamp have been ingested.
    pub line_count: u32,
}

//--------------------------------------------------------------------------------------------------
// Types: Metrics
//--------------------------------------------------------------------------------------------------

/// Resource usage of one container, sampled via `docker stats`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerStats {
    /// The host the container runs on.
    pub host: String,

    /// The container id.
    pub container_id: String,

    /// The container name.
    pub container_name: String,

    /// When the sample was taken.
    pub timestamp: DateTime<Utc>,

    /// CPU usage in percent.
    pub cpu_percent: f64,

    /// Memory in use, in megabytes.
    pub memory_usage_mb: f64,

    /// Memory limit, in megabytes.
    pub memory_limit_mb: f64,

    /// Memory usage in percent of the limit.
    pub memory_percent: f64,

    /// Bytes received over the network since container start.
    pub network_rx_bytes: u64,

    /// Bytes sent over the network since container start.
    pub network_tx_bytes: u64,

    /// Bytes read from block devices since container start.
    pub block_read_bytes: u64,

    /// Bytes written to block devices since container start.
    pub block_write_bytes: u64,
}

/// Host-level resource usage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostMetrics {
    /// The host the metrics belong to.
    pub host: String,

    /// When the sample was taken.
    pub timestamp: DateTime<Utc>,

    /// CPU usage in percent.
    pub cpu_percent: f64,

    /// Total memory in megabytes.
    pub memory_total_mb: f64,

    /// Used memory in megabytes.
    pub memory_used_mb: f64,

    /// Memory usage in percent.
    pub memory_percent: f64,

    /// Total disk space on the root filesystem, in gigabytes.
    pub disk_total_gb: f64,

    /// Used disk space on the root filesystem, in gigabytes.
    pub disk_used_gb: f64,

    /// Disk usage in percent.
    pub disk_percent: f64,

    /// GPU utilization in percent, when an NVIDIA GPU is present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpu_percent: Option<f64>,

    /// GPU memory in use, in megabytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpu_memory_used_mb: Option<f64>,

    /// Total GPU memory, in megabytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpu_memory_total_mb: Option<f64>,
}

//--------------------------------------------------------------------------------------------------
// Types: Issues
//--------------------------------------------------------------------------------------------------

/// An unpersisted detection result produced from one analysis batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueCandidate {
    /// The container id the finding belongs to.
    pub container_id: String,

    /// The container name the finding belongs to.
    pub container_name: String,

    /// The severity of the finding.
    pub severity: IssueSeverity,

    /// A short title describing the finding.
    pub title: String,

    /// A longer description of the finding.
    pub description: String,

    /// One representative log excerpt.
    pub excerpt: String,

    /// When the finding was produced.
    pub detected_at: DateTime<Utc>,
}

/// A deduplicated, persistent anomaly record.
///
/// Many [`IssueCandidate`]s with the same normalized signature collapse into
/// one `Issue`, incrementing its occurrence count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// The unique id of the issue.
    pub id: Uuid,

    /// The container id the issue belongs to.
    pub container_id: String,

    /// The container name the issue belongs to.
    pub container_name: String,

    /// The severity of the issue.
    pub severity: IssueSeverity,

    /// The issue title. Together with the container name it forms the
    /// deduplication signature.
    pub title: String,

    /// A description of the issue, refreshed on each recurrence.
    pub description: String,

    /// A representative log excerpt, refreshed on each recurrence.
    pub excerpt: String,

    /// When the issue was first detected.
    pub first_detected: DateTime<Utc>,

    /// When the issue was last detected.
    pub last_detected: DateTime<Utc>,

    /// How many candidates have collapsed into this issue.
    pub occurrence_count: u64,

    /// Whether the issue has been resolved by the operator.
    pub resolved: bool,
}

/// The severity of an issue. Ordered: `Info < Warning < Error < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    /// Informational findings.
    Info,

    /// Findings worth looking at.
    Warning,

    /// Findings that indicate a failure.
    Error,

    /// Findings that indicate an outage or data loss.
    Critical,
}

/// Filter for listing issues.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IssueFilter {
    /// Only return issues at or above this severity.
    pub severity_min: Option<IssueSeverity>,

    /// Only return issues for this container name.
    pub container: Option<String>,

    /// Only return issues seen at least this many times.
    pub min_occurrences: Option<u64>,

    /// `None` lists unresolved issues (the default view), `Some(true)` lists
    /// resolved issues, `Some(false)` lists unresolved explicitly.
    pub resolved: Option<bool>,
}

/// The observable state of the analysis pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisStatus {
    /// Whether the one-time historical pass has completed.
    pub initial_scan_done: bool,

    /// How many records have been considered for analysis in total.
    pub total_logs_analyzed: u64,

    /// How many record identities are currently tracked for deduplication.
    pub tracked_hash_count: usize,

    /// When analysis last ran, if ever.
    pub last_analyzed_at: Option<DateTime<Utc>>,

    /// Whether the last run fell back to rule-based detection because the
    /// text-analysis capability was unavailable.
    pub analysis_degraded: bool,
}

/// The result of a manual scan pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanOutcome {
    /// How many issues the pass found or updated.
    pub issues_found: usize,

    /// How many log lines the pass looked at.
    pub logs_scanned: usize,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Cursor {
    /// Creates a cursor at the given timestamp with no same-timestamp lines
    /// consumed yet.
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            line_count: 0,
        }
    }

    /// Creates a cursor at the given position.
    pub fn at(timestamp: DateTime<Utc>, line_count: u32) -> Self {
        Self {
            timestamp,
            line_count,
        }
    }
}

impl LogLevel {
    /// Returns the uppercase name used in serialized context lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Critical => "CRITICAL",
            LogLevel::Error => "ERROR",
            LogLevel::Warning => "WARNING",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        }
    }
}

impl IssueSeverity {
    /// Parses a severity string leniently, as produced by language models.
    /// Unrecognized values map to [`IssueSeverity::Error`].
    pub fn parse_loose(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "critical" | "fatal" => IssueSeverity::Critical,
            "warning" | "warn" => IssueSeverity::Warning,
            "info" => IssueSeverity::Info,
            _ => IssueSeverity::Error,
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl PartialOrd for Cursor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cursor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then(self.line_count.cmp(&other.line_count))
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}", self.timestamp.to_rfc3339(), self.line_count)
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for IssueSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IssueSeverity::Critical => "critical",
            IssueSeverity::Error => "error",
            IssueSeverity::Warning => "warning",
            IssueSeverity::Info => "info",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for ContainerStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Result::Ok(match s.to_lowercase().as_str() {
            "running" | "up" => ContainerStatus::Running,
            "exited" => ContainerStatus::Exited,
            "paused" => ContainerStatus::Paused,
            "restarting" => ContainerStatus::Restarting,
            "created" => ContainerStatus::Created,
            "dead" => ContainerStatus::Dead,
            _ => ContainerStatus::Unknown,
        })
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_cursor_ordering_uses_line_count_as_tiebreaker() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 1).unwrap();

        assert!(Cursor::at(ts, 0) < Cursor::at(ts, 1));
        assert!(Cursor::at(ts, 5) < Cursor::at(later, 0));
        assert_eq!(Cursor::at(ts, 2), Cursor::at(ts, 2));
    }

    #[test]
    fn test_severity_ordering() {
        assert!(IssueSeverity::Info < IssueSeverity::Warning);
        assert!(IssueSeverity::Warning < IssueSeverity::Error);
        assert!(IssueSeverity::Error < IssueSeverity::Critical);
    }

    #[test]
    fn test_severity_parse_loose_defaults_to_error() {
        assert_eq!(IssueSeverity::parse_loose("CRITICAL"), IssueSeverity::Critical);
        assert_eq!(IssueSeverity::parse_loose(" warn "), IssueSeverity::Warning);
        assert_eq!(IssueSeverity::parse_loose("banana"), IssueSeverity::Error);
    }

    #[test]
    fn test_issue_round_trips_through_json() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        let issue = Issue {
            id: Uuid::new_v4(),
            container_id: "abc123".to_string(),
            container_name: "web".to_string(),
            severity: IssueSeverity::Error,
            title: "Database unreachable".to_string(),
            description: "The app cannot reach its database.".to_string(),
            excerpt: "connection refused".to_string(),
            first_detected: ts,
            last_detected: ts,
            occurrence_count: 3,
            resolved: false,
        };

        let json = serde_json::to_string(&issue).unwrap();
        let parsed: Issue = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, issue);
        assert!(json.contains(&issue.id.to_string()));
    }

    #[test]
    fn test_container_status_parses_docker_states() {
        assert_eq!(
            "running".parse::<ContainerStatus>().unwrap(),
            ContainerStatus::Running
        );
        assert_eq!(
            "Exited".parse::<ContainerStatus>().unwrap(),
            ContainerStatus::Exited
        );
        assert_eq!(
            "weird".parse::<ContainerStatus>().unwrap(),
            ContainerStatus::Unknown
        );
    }
}
