use std::{sync::LazyLock, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{
    config::AnalysisConfig,
    models::{IssueCandidate, IssueSeverity, LogRecord},
    LogtideError, LogtideResult,
};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Cap on findings accepted from one model response.
const MAX_CANDIDATES: usize = 10;

const TEMPERATURE: f64 = 0.1;

const NUM_PREDICT: u32 = 2000;

const ANALYSIS_PROMPT: &str = "You are reviewing logs from Docker containers. \
Identify real operational problems: crashes, errors, resource exhaustion, repeated failures. \
Ignore routine traffic, debug output and healthy status messages.\n\
\n\
Logs (oldest first):\n\
{logs}\n\
\n\
Respond with only a JSON array. Each finding is an object:\n\
{\"container\": \"<container name>\", \"severity\": \"critical|error|warning|info\", \
\"title\": \"<short summary>\", \"description\": \"<what is wrong and the likely cause>\", \
\"log_excerpt\": \"<one representative log line>\"}\n\
Respond with [] when there are no real problems.";

static TRAILING_COMMA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r",\s*([\]}])").unwrap());

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Analyzes log batches through a local Ollama instance.
pub struct OllamaAnalyzer {
    client: Client,
    base_url: String,
    model: String,
    max_context_chars: usize,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f64,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// Produces issue candidates from a batch of fresh log records.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Analyzes a batch and returns candidate findings.
    ///
    /// Returns [`LogtideError::AnalysisUnavailable`] when the capability is
    /// down or times out, so the caller can fall back to rule-based
    /// detection.
    async fn analyze(&self, batch: &[LogRecord]) -> LogtideResult<Vec<IssueCandidate>>;
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl OllamaAnalyzer {
    /// Creates an analyzer from the analysis settings.
    pub fn new(config: &AnalysisConfig) -> LogtideResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(*config.get_request_timeout_secs()))
            .build()?;

        Ok(Self {
            client,
            base_url: config.get_ollama_url().trim_end_matches('/').to_string(),
            model: config.get_model().clone(),
            max_context_chars: *config.get_max_context_chars(),
        })
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Renders a batch as `[container] LEVEL: message` lines, oldest first.
/// When the rendering exceeds the cap, the oldest lines are dropped so the
/// model always sees the newest context.
fn build_context(batch: &[LogRecord], max_chars: usize) -> String {
    let lines: Vec<String> = batch
        .iter()
        .map(|record| {
            let level = record.level.map(|level| level.as_str()).unwrap_or("LOG");
            format!("[{}] {}: {}", record.container_name, level, record.message)
        })
        .collect();

    let mut total: usize = lines.iter().map(|line| line.len() + 1).sum();
    let mut start = 0;
    while total > max_chars && start < lines.len() {
        total -= lines[start].len() + 1;
        start += 1;
    }

    lines[start..].join("\n")
}

/// Extracts issue candidates from a model response.
///
/// Models wrap output in code fences, add prose around the array and leave
/// trailing commas, so extraction is tolerant: anything that does not yield a
/// parseable array of findings degrades to no candidates rather than an
/// error.
fn extract_candidates(
    text: &str,
    batch: &[LogRecord],
    detected_at: DateTime<Utc>,
) -> Vec<IssueCandidate> {
    let unfenced = text.replace("```json", "").replace("```", "");

    let array = match extract_array(&unfenced) {
        Some(array) => array,
        None => return Vec::new(),
    };

    let repaired = TRAILING_COMMA.replace_all(array, "$1");
    let values: Vec<serde_json::Value> = match serde_json::from_str(&repaired) {
        Result::Ok(values) => values,
        Err(_) => return Vec::new(),
    };

    values
        .iter()
        .filter_map(|value| candidate_from_value(value, batch, detected_at))
        .take(MAX_CANDIDATES)
        .collect()
}

/// Returns the first top-level JSON array in the text.
fn extract_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end < start {
        return None;
    }

    Some(&text[start..=end])
}

fn candidate_from_value(
    value: &serde_json::Value,
    batch: &[LogRecord],
    detected_at: DateTime<Utc>,
) -> Option<IssueCandidate> {
    let container_name = value.get("container")?.as_str()?.trim();

    // The model must name a container that is actually in the batch.
    let record = batch
        .iter()
        .find(|record| record.container_name == container_name)?;

    let title = value.get("title")?.as_str()?.trim();
    if title.is_empty() {
        return None;
    }

    let severity = IssueSeverity::parse_loose(
        value
            .get("severity")
            .and_then(|severity| severity.as_str())
            .unwrap_or("error"),
    );

    let description = value
        .get("description")
        .and_then(|description| description.as_str())
        .unwrap_or("")
        .trim()
        .to_string();

    let excerpt_raw = value
        .get("log_excerpt")
        .and_then(|excerpt| excerpt.as_str())
        .unwrap_or("")
        .trim();
    let excerpt = resolve_excerpt(excerpt_raw, container_name, batch)
        .unwrap_or_else(|| record.message.clone());

    Some(IssueCandidate {
        container_id: record.container_id.clone(),
        container_name: container_name.to_string(),
        severity,
        title: title.to_string(),
        description,
        excerpt,
        detected_at,
    })
}

/// Anchors a model-provided excerpt to a real batch line when one matches,
/// keeping stored excerpts verbatim from the logs instead of paraphrased.
fn resolve_excerpt(excerpt: &str, container_name: &str, batch: &[LogRecord]) -> Option<String> {
    if excerpt.is_empty() {
        return None;
    }

    batch
        .iter()
        .filter(|record| record.container_name == container_name && !record.message.is_empty())
        .find(|record| record.message.contains(excerpt) || excerpt.contains(&record.message))
        .map(|record| record.message.clone())
        .or_else(|| Some(excerpt.to_string()))
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl Analyzer for OllamaAnalyzer {
    async fn analyze(&self, batch: &[LogRecord]) -> LogtideResult<Vec<IssueCandidate>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let context = build_context(batch, self.max_context_chars);
        let prompt = ANALYSIS_PROMPT.replace("{logs}", &context);
        let request = GenerateRequest {
            model: &self.model,
            prompt: &prompt,
            stream: false,
            options: GenerateOptions {
                temperature: TEMPERATURE,
                num_predict: NUM_PREDICT,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|error| LogtideError::AnalysisUnavailable(error.to_string()))?;

        if !response.status().is_success() {
            return Err(LogtideError::AnalysisUnavailable(format!(
                "model endpoint returned {}",
                response.status()
            )));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|error| LogtideError::AnalysisUnavailable(error.to_string()))?;

        Ok(extract_candidates(&body.response, batch, Utc::now()))
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn record(container: &str, message: &str) -> LogRecord {
        LogRecord {
            host: "testhost".to_string(),
            container_id: format!("{}-id", container),
            container_name: container.to_string(),
            compose_project: None,
            compose_service: None,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap(),
            message: message.to_string(),
            level: None,
            http_status: None,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 11, 0, 0).unwrap()
    }

    #[test]
    fn test_extract_candidates_parses_fenced_response() {
        let batch = vec![record("web", "db connection refused")];
        let text = "Here are the findings:\n```json\n[\n  {\"container\": \"web\", \
                    \"severity\": \"critical\", \"title\": \"Database unreachable\", \
                    \"description\": \"The app cannot reach its database.\", \
                    \"log_excerpt\": \"connection refused\"},\n  {\"container\": \"ghost\", \
                    \"severity\": \"error\", \"title\": \"Phantom\"}\n]\n```";

        let candidates = extract_candidates(text, &batch, now());

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].container_name, "web");
        assert_eq!(candidates[0].container_id, "web-id");
        assert_eq!(candidates[0].severity, IssueSeverity::Critical);
        assert_eq!(candidates[0].title, "Database unreachable");
        // The excerpt resolves to the full batch line it came from.
        assert_eq!(candidates[0].excerpt, "db connection refused");
    }

    #[test]
    fn test_extract_candidates_repairs_trailing_commas() {
        let batch = vec![record("web", "boom")];
        let text = r#"[{"container": "web", "severity": "error", "title": "Boom",},]"#;

        let candidates = extract_candidates(text, &batch, now());

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].title, "Boom");
        assert_eq!(candidates[0].excerpt, "boom");
    }

    #[test]
    fn test_extract_candidates_caps_findings() {
        let batch = vec![record("web", "boom")];
        let findings: Vec<String> = (0..15)
            .map(|i| format!(r#"{{"container": "web", "title": "Issue {}"}}"#, i))
            .collect();
        let text = format!("[{}]", findings.join(","));

        let candidates = extract_candidates(&text, &batch, now());

        assert_eq!(candidates.len(), MAX_CANDIDATES);
    }

    #[test]
    fn test_extract_candidates_tolerates_junk() {
        let batch = vec![record("web", "boom")];

        assert!(extract_candidates("I found no issues.", &batch, now()).is_empty());
        assert!(extract_candidates("", &batch, now()).is_empty());
        assert!(extract_candidates("[not json}", &batch, now()).is_empty());
        assert!(extract_candidates("]", &batch, now()).is_empty());
    }

    #[test]
    fn test_unknown_severity_defaults_to_error() {
        let batch = vec![record("web", "boom")];
        let text = r#"[{"container": "web", "severity": "catastrophic", "title": "Boom"}]"#;

        let candidates = extract_candidates(text, &batch, now());

        assert_eq!(candidates[0].severity, IssueSeverity::Error);
    }

    #[test]
    fn test_build_context_drops_oldest_lines_over_cap() {
        let batch = vec![
            record("web", "first line that is rather long"),
            record("web", "second"),
            record("web", "third"),
        ];

        let context = build_context(&batch, 40);

        assert!(!context.contains("first"));
        assert!(context.contains("second"));
        assert!(context.ends_with("[web] LOG: third"));
    }

    #[test]
    fn test_build_context_includes_detected_level() {
        let mut with_level = record("web", "disk almost full");
        with_level.level = Some(crate::models::LogLevel::Warning);

        let context = build_context(&[with_level], 1000);

        assert_eq!(context, "[web] WARNING: disk almost full");
    }
}
