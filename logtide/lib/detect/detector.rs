use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{
    config::DEFAULT_ANALYZED_SET_CAPACITY,
    models::{AnalysisStatus, IssueCandidate, IssueSeverity, LogRecord},
    LogtideResult,
};

use super::{record_identity, AnalyzedSet, Analyzer};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Message fragments that are never analyzed. These are this system's own
/// seams: analysis traffic and chat endpoints would otherwise feed back into
/// detection and flag themselves forever.
const IGNORED_PATTERNS: [&str; 4] = [
    "/api/ai/chat?message=",
    "POST /api/ai/",
    "GET /api/ai/",
    "HTTP Request: POST http://ollama",
];

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Turns batches of collected log records into issue candidates.
///
/// The detector owns the at-most-once bookkeeping: every record is considered
/// exactly once no matter how often the collector refetches it. Detection
/// prefers the configured [`Analyzer`] and falls back to rule-based keyword
/// scanning whenever the analyzer reports itself unavailable.
pub struct IssueDetector {
    analyzer: Option<Arc<dyn Analyzer>>,
    state: Mutex<DetectorState>,
}

#[derive(Debug)]
struct DetectorState {
    analyzed: AnalyzedSet,
    initial_scan_done: bool,
    total_logs_analyzed: u64,
    last_analyzed_at: Option<DateTime<Utc>>,
    analysis_degraded: bool,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl IssueDetector {
    /// Creates a detector. Without an analyzer, detection is rule-based only.
    pub fn new(analyzer: Option<Arc<dyn Analyzer>>) -> Self {
        Self::with_capacity(analyzer, DEFAULT_ANALYZED_SET_CAPACITY)
    }

    /// Creates a detector with a custom identity-set capacity.
    pub fn with_capacity(analyzer: Option<Arc<dyn Analyzer>>, capacity: usize) -> Self {
        Self {
            analyzer,
            state: Mutex::new(DetectorState {
                analyzed: AnalyzedSet::new(capacity),
                initial_scan_done: false,
                total_logs_analyzed: 0,
                last_analyzed_at: None,
                analysis_degraded: false,
            }),
        }
    }

    /// Runs detection over a batch of records.
    ///
    /// Records that were already analyzed or match the ignore list are
    /// dropped first; the remainder is marked analyzed whether or not it
    /// yields candidates.
    pub async fn detect(&self, batch: &[LogRecord]) -> LogtideResult<Vec<IssueCandidate>> {
        let fresh = {
            let mut state = self.state.lock().await;

            let fresh: Vec<LogRecord> = batch
                .iter()
                .filter(|record| !should_ignore(&record.message))
                .filter(|record| state.analyzed.insert(record_identity(record)))
                .cloned()
                .collect();

            state.total_logs_analyzed += fresh.len() as u64;

            fresh
        };

        if fresh.is_empty() {
            return Ok(Vec::new());
        }

        let detected_at = Utc::now();
        let (candidates, degraded) = match &self.analyzer {
            Some(analyzer) => match analyzer.analyze(&fresh).await {
                Result::Ok(candidates) => (candidates, false),
                Err(error) => {
                    warn!(%error, "analyzer unavailable, falling back to rule-based scan");
                    (fallback_scan(&fresh, detected_at), true)
                }
            },
            None => (fallback_scan(&fresh, detected_at), false),
        };

        let mut state = self.state.lock().await;
        state.analysis_degraded = degraded;
        // Recency reflects actual analysis work, not ticks that found
        // nothing fresh.
        state.last_analyzed_at = Some(detected_at);

        debug!(
            fresh = fresh.len(),
            candidates = candidates.len(),
            degraded,
            "detection pass complete"
        );

        Ok(candidates)
    }

    /// Marks the one-time historical pass as complete.
    pub async fn mark_initial_scan_done(&self) {
        self.state.lock().await.initial_scan_done = true;
    }

    /// Returns whether the one-time historical pass has completed.
    pub async fn initial_scan_done(&self) -> bool {
        self.state.lock().await.initial_scan_done
    }

    /// Returns a snapshot of the pipeline state.
    pub async fn status(&self) -> AnalysisStatus {
        let state = self.state.lock().await;
        AnalysisStatus {
            initial_scan_done: state.initial_scan_done,
            total_logs_analyzed: state.total_logs_analyzed,
            tracked_hash_count: state.analyzed.len(),
            last_analyzed_at: state.last_analyzed_at,
            analysis_degraded: state.analysis_degraded,
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Returns whether a message is excluded from analysis.
pub fn should_ignore(message: &str) -> bool {
    if message.trim().is_empty() {
        return true;
    }

    IGNORED_PATTERNS
        .iter()
        .any(|pattern| message.contains(pattern))
}

/// Rule-based detection used when no analyzer is configured or the analyzer
/// is unavailable.
///
/// Titles carry only the severity and container, so repeated findings of one
/// kind collapse into a single counted issue downstream.
pub fn fallback_scan(batch: &[LogRecord], detected_at: DateTime<Utc>) -> Vec<IssueCandidate> {
    batch
        .iter()
        .filter_map(|record| {
            let (severity, keyword) = fallback_severity(&record.message)?;
            Some(IssueCandidate {
                container_id: record.container_id.clone(),
                container_name: record.container_name.clone(),
                severity,
                title: format!(
                    "{} in {}",
                    severity.to_string().to_uppercase(),
                    record.container_name
                ),
                description: format!("Pattern '{}' detected in log message", keyword),
                excerpt: truncate_chars(&record.message, 200),
                detected_at,
            })
        })
        .collect()
}

/// Maps a message to a severity by keyword. The first matching tier wins.
fn fallback_severity(message: &str) -> Option<(IssueSeverity, &'static str)> {
    const CRITICAL: [&str; 4] = ["out of memory", "panic", "fatal", "critical"];
    const ERROR: [&str; 5] = ["error", "exception", "failed", "failure", "refused"];
    const WARNING: [&str; 2] = ["timeout", "timed out"];

    let lowered = message.to_lowercase();

    for keyword in CRITICAL {
        if lowered.contains(keyword) {
            return Some((IssueSeverity::Critical, keyword));
        }
    }
    for keyword in ERROR {
        if lowered.contains(keyword) {
            return Some((IssueSeverity::Error, keyword));
        }
    }
    for keyword in WARNING {
        if lowered.contains(keyword) {
            return Some((IssueSeverity::Warning, keyword));
        }
    }

    None
}

fn truncate_chars(message: &str, limit: usize) -> String {
    match message.char_indices().nth(limit) {
        Some((offset, _)) => message[..offset].to_string(),
        None => message.to_string(),
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
