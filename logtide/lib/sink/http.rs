use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde_json::json;

use crate::{
    models::{ContainerStats, HostMetrics, LogRecord},
    LogtideError, LogtideResult,
};

use super::{record_doc_id, stats_doc_id, StorageSink};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A sink that bulk-indexes documents into an HTTP document store.
///
/// Documents are addressed by deterministic ids, so a refetched window
/// overwrites its earlier copies instead of duplicating them.
#[derive(Debug)]
pub struct HttpSink {
    /// The HTTP client used to talk to the document store.
    client: ClientWithMiddleware,

    /// The base url of the document store.
    base_url: String,

    /// The index that log records are written to.
    logs_index: String,

    /// The index that container stats are written to.
    stats_index: String,

    /// The index that host metrics are written to.
    host_metrics_index: String,
}

/// The part of a bulk response we care about.
#[derive(Debug, serde::Deserialize)]
struct BulkResponse {
    errors: bool,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl HttpSink {
    /// Creates a sink against the given document store.
    ///
    /// Every request carries the per-call deadline, so a hung store turns
    /// into a [`LogtideError::Write`] instead of stalling the tick.
    pub fn new(
        base_url: impl Into<String>,
        index_prefix: &str,
        timeout: Duration,
    ) -> LogtideResult<Self> {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);
        let client = ClientBuilder::new(Client::builder().timeout(timeout).build()?)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            logs_index: format!("{}-logs", index_prefix),
            stats_index: format!("{}-metrics", index_prefix),
            host_metrics_index: format!("{}-host-metrics", index_prefix),
        })
    }

    /// Sends one NDJSON bulk body and checks for item-level failures.
    async fn bulk(&self, body: String) -> LogtideResult<()> {
        let response = self
            .client
            .post(format!("{}/_bulk", self.base_url))
            .header("content-type", "application/x-ndjson")
            .body(body)
            .send()
            .await
            .map_err(|e| LogtideError::Write(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LogtideError::Write(format!(
                "bulk request failed with status {}",
                status
            )));
        }

        let parsed: BulkResponse = response
            .json()
            .await
            .map_err(|e| LogtideError::Write(e.to_string()))?;

        if parsed.errors {
            return Err(LogtideError::Write(
                "bulk response reported item failures".to_string(),
            ));
        }

        Ok(())
    }

    fn bulk_line(index: &str, id: &str, doc: &impl serde::Serialize) -> LogtideResult<String> {
        let action = json!({ "index": { "_index": index, "_id": id } });
        let mut line = serde_json::to_string(&action)?;
        line.push('\n');
        line.push_str(&serde_json::to_string(doc)?);
        line.push('\n');
        Ok(line)
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl StorageSink for HttpSink {
    async fn write_records(&self, records: &[LogRecord]) -> LogtideResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut body = String::new();
        for record in records {
            body.push_str(&Self::bulk_line(
                &self.logs_index,
                &record_doc_id(record),
                record,
            )?);
        }

        self.bulk(body).await
    }

    async fn write_container_stats(&self, stats: &[ContainerStats]) -> LogtideResult<()> {
        if stats.is_empty() {
            return Ok(());
        }

        let mut body = String::new();
        for sample in stats {
            body.push_str(&Self::bulk_line(
                &self.stats_index,
                &stats_doc_id(sample),
                sample,
            )?);
        }

        self.bulk(body).await
    }

    async fn write_host_metrics(&self, metrics: &HostMetrics) -> LogtideResult<()> {
        let id = format!("{}:{}", metrics.host, metrics.timestamp.to_rfc3339());
        let body = Self::bulk_line(&self.host_metrics_index, &id, metrics)?;
        self.bulk(body).await
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
