//! Storage sinks for structured records.

mod http;
mod memory;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::{
    models::{ContainerStats, HostMetrics, LogRecord},
    LogtideResult,
};

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use http::*;
pub use memory::*;

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// An append-only structured record store.
///
/// A write that returns `Ok` is at-least-once durable: the collector advances
/// cursors only after an acknowledged write. Refetched windows may resubmit
/// the same records; sinks key documents by [`record_doc_id`] so duplicates
/// overwrite instead of accumulating.
#[async_trait]
pub trait StorageSink: Send + Sync {
    /// Writes a batch of log records.
    async fn write_records(&self, records: &[LogRecord]) -> LogtideResult<()>;

    /// Writes a batch of container resource samples.
    async fn write_container_stats(&self, stats: &[ContainerStats]) -> LogtideResult<()>;

    /// Writes one host-level metrics sample.
    async fn write_host_metrics(&self, metrics: &HostMetrics) -> LogtideResult<()>;
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Deterministic document id for a log record, derived from its identity
/// (host, container, timestamp, first 100 chars of the message).
pub fn record_doc_id(record: &LogRecord) -> String {
    let prefix: String = record.message.chars().take(100).collect();
    let key = format!(
        "{}:{}:{}:{}",
        record.host,
        record.container_id,
        record.timestamp.to_rfc3339(),
        prefix
    );

    let digest = Sha256::digest(key.as_bytes());
    hex::encode(digest)[..32].to_string()
}

/// Deterministic document id for a container stats sample.
pub fn stats_doc_id(stats: &ContainerStats) -> String {
    let key = format!(
        "{}:{}:{}",
        stats.host,
        stats.container_id,
        stats.timestamp.to_rfc3339()
    );

    let digest = Sha256::digest(key.as_bytes());
    hex::encode(digest)[..32].to_string()
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
