use std::time::Duration;

use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::{Client, StatusCode};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};

use crate::{
    config::HostConfig,
    error::InvalidConfigError,
    models::{Container, ContainerStats, Cursor, HostMetrics, RawLine},
    LogtideError, LogtideResult, TransportErrorKind,
};

use super::HostTransport;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Talks to a remote collector agent over HTTP.
///
/// Agents run next to a Docker daemon we cannot reach directly and expose the
/// same operations as the CLI transports behind a small JSON API.
pub struct AgentTransport {
    host: String,
    base_url: String,
    client: ClientWithMiddleware,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl AgentTransport {
    /// Creates a transport for an agent host.
    pub fn new(host: &HostConfig, timeout: Duration) -> LogtideResult<Self> {
        let url = host
            .get_url()
            .clone()
            .ok_or_else(|| InvalidConfigError::AgentHostMissingUrl(host.get_name().clone()))?;

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);
        let client = ClientBuilder::new(Client::builder().timeout(timeout).build()?)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            host: host.get_name().clone(),
            base_url: url.trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn get_json<T>(&self, context: &str, path: &str, query: &[(String, String)]) -> LogtideResult<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|error| classify_send_error(&self.host, context, error))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(&self.host, context, status));
        }

        Ok(response.json::<T>().await?)
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Builds the query string for a log fetch. A cursor carries both its
/// timestamp and how many same-timestamp lines were already consumed, so the
/// agent can resume mid-burst.
fn logs_query(since: Option<&Cursor>, max_lines: u32) -> Vec<(String, String)> {
    let mut query = vec![("max_lines".to_string(), max_lines.to_string())];

    if let Some(cursor) = since {
        query.push((
            "since".to_string(),
            cursor.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
        ));
        query.push(("count_at".to_string(), cursor.line_count.to_string()));
    }

    query
}

fn classify_send_error(host: &str, context: &str, error: reqwest_middleware::Error) -> LogtideError {
    let kind = match &error {
        reqwest_middleware::Error::Reqwest(inner) if inner.is_timeout() => {
            TransportErrorKind::Timeout
        }
        _ => TransportErrorKind::Unknown,
    };

    LogtideError::transport(kind, format!("{} on {}: {}", context, host, error))
}

fn classify_status(host: &str, context: &str, status: StatusCode) -> LogtideError {
    let kind = match status.as_u16() {
        401 | 403 => TransportErrorKind::Auth,
        404 => TransportErrorKind::NotFound,
        _ => TransportErrorKind::Unknown,
    };

    LogtideError::transport(kind, format!("{} on {} returned {}", context, host, status))
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl HostTransport for AgentTransport {
    fn host_name(&self) -> &str {
        &self.host
    }

    async fn list_containers(&self) -> LogtideResult<Vec<Container>> {
        let mut containers: Vec<Container> = self
            .get_json("list containers", "/api/containers", &[])
            .await?;

        // The agent reports its own identity; the configured name wins so
        // records line up with the rest of this collector's output.
        for container in &mut containers {
            container.host = self.host.clone();
        }

        Ok(containers)
    }

    async fn fetch_log_lines(
        &self,
        container_id: &str,
        since: Option<Cursor>,
        max_lines: u32,
    ) -> LogtideResult<Vec<RawLine>> {
        let path = format!("/api/logs/{}", container_id);
        let query = logs_query(since.as_ref(), max_lines);
        self.get_json("fetch logs", &path, &query).await
    }

    async fn fetch_stats(&self, container: &Container) -> LogtideResult<ContainerStats> {
        let path = format!("/api/stats/{}", container.id);
        let mut stats: ContainerStats = self.get_json("fetch stats", &path, &[]).await?;
        stats.host = self.host.clone();
        stats.container_name = container.name.clone();
        Ok(stats)
    }

    async fn fetch_host_metrics(&self) -> LogtideResult<HostMetrics> {
        let mut metrics: HostMetrics = self.get_json("fetch host metrics", "/api/metrics", &[]).await?;
        metrics.host = self.host.clone();
        Ok(metrics)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn test_logs_query_includes_cursor_position() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        let query = logs_query(Some(&Cursor::at(ts, 3)), 250);

        assert!(query.contains(&("max_lines".to_string(), "250".to_string())));
        assert!(query.contains(&(
            "since".to_string(),
            "2024-01-15T10:30:00.000000Z".to_string()
        )));
        assert!(query.contains(&("count_at".to_string(), "3".to_string())));
    }

    #[test]
    fn test_logs_query_without_cursor_only_caps() {
        let query = logs_query(None, 500);
        assert_eq!(query, vec![("max_lines".to_string(), "500".to_string())]);
    }

    #[test]
    fn test_classify_status_maps_auth_and_notfound() {
        let auth = classify_status("agent1", "fetch logs", StatusCode::UNAUTHORIZED);
        assert_eq!(auth.transport_kind(), Some(TransportErrorKind::Auth));

        let forbidden = classify_status("agent1", "fetch logs", StatusCode::FORBIDDEN);
        assert_eq!(forbidden.transport_kind(), Some(TransportErrorKind::Auth));

        let missing = classify_status("agent1", "fetch logs", StatusCode::NOT_FOUND);
        assert_eq!(missing.transport_kind(), Some(TransportErrorKind::NotFound));

        let server = classify_status("agent1", "fetch logs", StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(server.transport_kind(), Some(TransportErrorKind::Unknown));
    }
}
