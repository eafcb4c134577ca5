//! Log line parsing.
//!
//! Pure functions that turn raw `docker logs --timestamps` output into
//! structured [`LogRecord`]s: timestamp splitting, level detection, HTTP
//! status extraction and structured-JSON field lifting.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use regex::Regex;

use crate::{
    models::{Container, LogLevel, LogRecord, RawLine},
    LogtideError, LogtideResult,
};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Level keywords in priority order. The first group that matches anywhere in
/// the message wins, so a line containing both WARNING and ERROR is an error.
static LEVEL_PATTERNS: LazyLock<Vec<(Regex, LogLevel)>> = LazyLock::new(|| {
    [
        (r"(?i)\b(?:CRITICAL|FATAL|PANIC)\b", LogLevel::Critical),
        (r"(?i)\b(?:ERROR|EXCEPTION|FAILED|FAILURE)\b", LogLevel::Error),
        (r"(?i)\b(?:WARN|WARNING)\b", LogLevel::Warning),
        (r"(?i)\b(?:DEBUG|TRACE)\b", LogLevel::Debug),
        (r"(?i)\bINFO\b", LogLevel::Info),
    ]
    .iter()
    .map(|(pattern, level)| (Regex::new(pattern).unwrap(), *level))
    .collect()
});

/// HTTP status candidates in preference order. The request-line form comes
/// first so `"GET /path HTTP/1.1" 200` never reads digits out of the path.
static HTTP_STATUS_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"HTTP/\d\.\d["\s]+([1-5]\d{2})"#,
        r"(?i)status[_\s]*(?:code)?[=:\s]+([1-5]\d{2})",
        r"\[([1-5]\d{2})\]",
        r#""\s+([1-5]\d{2})\s+\d"#,
        r"\s([1-5]\d{2})\s+[-\d]+\s*$",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});

/// The `docker logs --timestamps` prefix.
static TIMESTAMP_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d+Z?)\s+").unwrap());

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Splits a raw `docker logs --timestamps` line into its timestamp and
/// message.
///
/// Returns `None` for known non-signal lines (the cgroup v2 "max" parse
/// warning emitted by Go runtimes). Lines without a timestamp prefix fall
/// back to `received_at`. A prefix that looks like a timestamp but does not
/// parse is a [`LogtideError::Parse`]; callers skip the line and continue
/// the batch.
pub fn split_timestamped_line(
    line: &str,
    received_at: DateTime<Utc>,
) -> LogtideResult<Option<RawLine>> {
    if line.is_empty() {
        return Ok(None);
    }

    if line.contains("failed to parse CPU allowed micro secs")
        && (line.contains("parsing \"max\"") || line.contains("parsing \\\"max\\\""))
    {
        return Ok(None);
    }

    let Some(captures) = TIMESTAMP_PREFIX.captures(line) else {
        return Ok(Some(RawLine {
            timestamp: received_at.trunc_subsecs(6),
            message: line.to_string(),
        }));
    };

    let matched = captures.get(0).map(|m| m.end()).unwrap_or(0);
    let timestamp_str = &captures[1];
    let timestamp = parse_docker_timestamp(timestamp_str)
        .ok_or_else(|| LogtideError::Parse(format!("bad timestamp: {}", timestamp_str)))?;

    Ok(Some(RawLine {
        timestamp,
        message: line[matched..].to_string(),
    }))
}

/// Parses a docker timestamp (`2024-01-15T10:30:00.123456789Z`), truncating
/// nanoseconds to microseconds so values round-trip through cursor storage.
pub fn parse_docker_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim_end_matches('Z');
    let naive = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    Some(naive.and_utc().trunc_subsecs(6))
}

/// Detects the log level of a message. `None` means no level keyword was
/// found, which callers must not read as "info".
pub fn detect_level(message: &str) -> Option<LogLevel> {
    LEVEL_PATTERNS
        .iter()
        .find(|(pattern, _)| pattern.is_match(message))
        .map(|(_, level)| *level)
}

/// Extracts an HTTP status code from a message.
///
/// A candidate is a 3-digit token starting with 1-5, bounded by non-digit
/// characters. Candidates embedded in longer digit runs are rejected and
/// scanning continues with the next match.
pub fn detect_http_status(message: &str) -> Option<u16> {
    for pattern in HTTP_STATUS_PATTERNS.iter() {
        for captures in pattern.captures_iter(message) {
            let group = captures.get(1)?;
            if !digit_bounded(message, group.start(), group.end()) {
                continue;
            }
            if let Result::Ok(status) = group.as_str().parse::<u16>() {
                return Some(status);
            }
        }
    }

    None
}

/// Builds a [`LogRecord`] from a raw line. Deterministic and pure.
///
/// Messages that are JSON objects lift their `level` and `status` fields
/// over the text scan.
pub fn parse_record(container: &Container, raw: &RawLine) -> LogRecord {
    let mut level = detect_level(&raw.message);
    let mut http_status = detect_http_status(&raw.message);

    let trimmed = raw.message.trim();
    if trimmed.starts_with('{') {
        if let Result::Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
            if let Some(json_level) = value.get("level").and_then(|v| v.as_str()) {
                if let Some(parsed) = level_from_token(json_level) {
                    level = Some(parsed);
                }
            }
            if let Some(status) = value.get("status").and_then(|v| v.as_u64()) {
                if (100..600).contains(&status) {
                    http_status = Some(status as u16);
                }
            }
        }
    }

    LogRecord {
        host: container.host.clone(),
        container_id: container.id.clone(),
        container_name: container.name.clone(),
        compose_project: container.compose_project.clone(),
        compose_service: container.compose_service.clone(),
        timestamp: raw.timestamp,
        message: raw.message.clone(),
        level,
        http_status,
    }
}

/// Maps a structured-log level token onto [`LogLevel`].
fn level_from_token(token: &str) -> Option<LogLevel> {
    match token.trim().to_uppercase().as_str() {
        "CRITICAL" | "FATAL" | "PANIC" => Some(LogLevel::Critical),
        "ERROR" | "ERR" => Some(LogLevel::Error),
        "WARN" | "WARNING" => Some(LogLevel::Warning),
        "DEBUG" | "TRACE" => Some(LogLevel::Debug),
        "INFO" => Some(LogLevel::Info),
        _ => None,
    }
}

/// Whether the byte range is not part of a longer digit run.
fn digit_bounded(message: &str, start: usize, end: usize) -> bool {
    let bytes = message.as_bytes();
    let before_ok = start == 0 || !bytes[start - 1].is_ascii_digit();
    let after_ok = end == bytes.len() || !bytes[end].is_ascii_digit();
    before_ok && after_ok
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use crate::models::ContainerStatus;

    use super::*;

    fn container() -> Container {
        Container {
            host: "local".to_string(),
            id: "abc123".to_string(),
            name: "api".to_string(),
            image: "api:latest".to_string(),
            status: ContainerStatus::Running,
            compose_project: None,
            compose_service: None,
        }
    }

    #[test]
    fn test_level_priority_error_beats_warning() {
        assert_eq!(
            detect_level("WARNING: retrying after ERROR from upstream"),
            Some(LogLevel::Error)
        );
    }

    #[test]
    fn test_level_detects_bracketed_and_lowercase_forms() {
        assert_eq!(detect_level("[ERROR] db gone"), Some(LogLevel::Error));
        assert_eq!(detect_level("warn: disk almost full"), Some(LogLevel::Warning));
        assert_eq!(detect_level("panic: runtime error"), Some(LogLevel::Critical));
        assert_eq!(detect_level("request failed with exception"), Some(LogLevel::Error));
        assert_eq!(detect_level("trace: enter handler"), Some(LogLevel::Debug));
    }

    #[test]
    fn test_level_requires_whole_words() {
        // "failures" contains FAILURE but not as a whole word.
        assert_eq!(detect_level("0 failures so far"), None);
        assert_eq!(detect_level("user requested information"), None);
    }

    #[test]
    fn test_level_unset_when_nothing_matches() {
        assert_eq!(detect_level("listening on 0.0.0.0:8080"), None);
    }

    #[test]
    fn test_http_status_prefers_request_line_over_path_digits() {
        assert_eq!(
            detect_http_status(r#"GET /api/v2/404page/details HTTP/1.1" 200"#),
            Some(200)
        );
    }

    #[test]
    fn test_http_status_common_forms() {
        assert_eq!(detect_http_status(r#"10.0.0.1 - "GET / HTTP/1.1" 502 157"#), Some(502));
        assert_eq!(detect_http_status("upstream returned status=404"), Some(404));
        assert_eq!(detect_http_status("status_code: 503 from backend"), Some(503));
        assert_eq!(detect_http_status("response [201] created"), Some(201));
    }

    #[test]
    fn test_http_status_rejects_digit_runs_and_ports() {
        assert_eq!(detect_http_status(r#"HTTP/1.1" 2000"#), None);
        assert_eq!(detect_http_status("listening on port 8080"), None);
        assert_eq!(detect_http_status("worker pid 30012 started"), None);
    }

    #[test]
    fn test_split_timestamped_line() {
        let received = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        let raw = split_timestamped_line(
            "2024-01-15T10:30:00.123456789Z request handled",
            received,
        )
        .unwrap()
        .unwrap();

        assert_eq!(raw.message, "request handled");
        assert_eq!(
            raw.timestamp,
            Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap() + chrono::Duration::microseconds(123456)
        );
    }

    #[test]
    fn test_split_falls_back_to_received_at_without_prefix() {
        let received = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        let raw = split_timestamped_line("no timestamp here", received)
            .unwrap()
            .unwrap();

        assert_eq!(raw.timestamp, received);
        assert_eq!(raw.message, "no timestamp here");
    }

    #[test]
    fn test_split_rejects_malformed_timestamp() {
        let received = Utc::now();
        let result = split_timestamped_line("2024-13-45T99:99:99.1Z boom", received);
        assert!(matches!(result, Err(LogtideError::Parse(_))));
    }

    #[test]
    fn test_split_drops_cgroup_noise() {
        let received = Utc::now();
        let line = r#"2024-01-15T10:30:00.1Z level=warn msg="failed to parse CPU allowed micro secs: parsing \"max\": invalid syntax""#;
        assert!(split_timestamped_line(line, received).unwrap().is_none());
    }

    #[test]
    fn test_parse_record_lifts_json_fields() {
        let raw = RawLine {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap(),
            message: r#"{"level": "error", "status": 500, "msg": "boom"}"#.to_string(),
        };
        let record = parse_record(&container(), &raw);

        assert_eq!(record.level, Some(LogLevel::Error));
        assert_eq!(record.http_status, Some(500));
        assert_eq!(record.container_name, "api");
    }

    #[test]
    fn test_parse_record_plain_text() {
        let raw = RawLine {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap(),
            message: "[INFO] starting".to_string(),
        };
        let record = parse_record(&container(), &raw);

        assert_eq!(record.level, Some(LogLevel::Info));
        assert_eq!(record.http_status, None);
    }
}
