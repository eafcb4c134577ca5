use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    models::{ContainerStats, HostMetrics, LogRecord},
    LogtideError, LogtideResult,
};

use super::{record_doc_id, StorageSink};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A sink that keeps everything in memory. Used by tests and one-shot runs.
///
/// Log records are keyed by their deterministic document id, mirroring the
/// overwrite-on-duplicate behavior of the HTTP sink.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<BTreeMap<String, LogRecord>>,
    stats: Mutex<Vec<ContainerStats>>,
    host_metrics: Mutex<Vec<HostMetrics>>,
    fail_writes: AtomicBool,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl MemorySink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent writes fail, for exercising retry paths.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Returns all stored records ordered by timestamp.
    pub async fn records(&self) -> Vec<LogRecord> {
        let mut records: Vec<_> = self.records.lock().await.values().cloned().collect();
        records.sort_by_key(|r| r.timestamp);
        records
    }

    /// Returns how many distinct records are stored.
    pub async fn record_count(&self) -> usize {
        self.records.lock().await.len()
    }

    /// Returns all stored container stats samples.
    pub async fn container_stats(&self) -> Vec<ContainerStats> {
        self.stats.lock().await.clone()
    }

    /// Returns all stored host metrics samples.
    pub async fn host_metrics(&self) -> Vec<HostMetrics> {
        self.host_metrics.lock().await.clone()
    }

    fn check_writable(&self) -> LogtideResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(LogtideError::Write("memory sink is failing writes".to_string()));
        }
        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl StorageSink for MemorySink {
    async fn write_records(&self, records: &[LogRecord]) -> LogtideResult<()> {
        self.check_writable()?;

        let mut stored = self.records.lock().await;
        for record in records {
            stored.insert(record_doc_id(record), record.clone());
        }

        Ok(())
    }

    async fn write_container_stats(&self, stats: &[ContainerStats]) -> LogtideResult<()> {
        self.check_writable()?;
        self.stats.lock().await.extend_from_slice(stats);
        Ok(())
    }

    async fn write_host_metrics(&self, metrics: &HostMetrics) -> LogtideResult<()> {
        self.check_writable()?;
        self.host_metrics.lock().await.push(metrics.clone());
        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn record(message: &str, second: u32) -> LogRecord {
        LogRecord {
            host: "local".to_string(),
            container_id: "abc".to_string(),
            container_name: "api".to_string(),
            compose_project: None,
            compose_service: None,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, second).unwrap(),
            message: message.to_string(),
            level: None,
            http_status: None,
        }
    }

    #[tokio::test]
    async fn test_duplicate_records_overwrite() {
        let sink = MemorySink::new();

        sink.write_records(&[record("a", 0), record("b", 1)])
            .await
            .unwrap();
        // Same identity submitted again, as a refetched window would.
        sink.write_records(&[record("a", 0)]).await.unwrap();

        assert_eq!(sink.record_count().await, 2);
    }

    #[tokio::test]
    async fn test_failing_writes_return_write_error() {
        let sink = MemorySink::new();
        sink.set_fail_writes(true);

        let err = sink.write_records(&[record("a", 0)]).await.unwrap_err();
        assert!(matches!(err, LogtideError::Write(_)));
        assert_eq!(sink.record_count().await, 0);

        sink.set_fail_writes(false);
        sink.write_records(&[record("a", 0)]).await.unwrap();
        assert_eq!(sink.record_count().await, 1);
    }
}
