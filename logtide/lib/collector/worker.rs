use std::{sync::Arc, time::Duration};

use futures::stream::{self, StreamExt};
use tokio::{
    sync::{broadcast, Mutex},
    time::{self, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{
    config::CollectorConfig,
    detect::IssueDetector,
    events::{CollectorEvent, EventBus},
    issues::{Ingested, IssueRegistry},
    models::{Container, ContainerStatus, Cursor, LogRecord, RawLine},
    parse,
    sink::StorageSink,
    store::CursorStore,
    transport::HostTransport,
    LogtideResult, TransportErrorKind,
};

use super::BackoffTracker;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Backoff key for host-level failures, distinct from any container id.
const HOST_KEY: &str = "__host";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Drives log collection and metrics sampling for one host.
///
/// Each host gets exactly one worker, a tick touches each container at most
/// once, and ticks never overlap, so cursor updates for a (host, container)
/// pair are never raced.
pub struct HostWorker {
    /// The configured name of the host.
    host: String,

    /// The transport used to reach the host's Docker daemon.
    transport: Arc<dyn HostTransport>,

    /// The durable cursor store.
    cursors: Arc<CursorStore>,

    /// The sink acknowledged writes go to.
    sink: Arc<dyn StorageSink>,

    /// The detector fed with every freshly ingested batch.
    detector: Arc<IssueDetector>,

    /// The registry findings are collapsed into.
    registry: Arc<IssueRegistry>,

    /// The bus collection events are emitted on.
    events: EventBus,

    /// The collector loop settings.
    settings: CollectorConfig,

    /// Per-target retry state.
    backoff: Mutex<BackoffTracker>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl HostWorker {
    /// Creates a worker for one host.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        host: String,
        transport: Arc<dyn HostTransport>,
        cursors: Arc<CursorStore>,
        sink: Arc<dyn StorageSink>,
        detector: Arc<IssueDetector>,
        registry: Arc<IssueRegistry>,
        events: EventBus,
        settings: CollectorConfig,
    ) -> Self {
        let base = Duration::from_secs(*settings.get_log_interval_secs());
        let ceiling = Duration::from_secs(*settings.get_backoff_ceiling_secs());

        Self {
            host,
            transport,
            cursors,
            sink,
            detector,
            registry,
            events,
            settings,
            backoff: Mutex::new(BackoffTracker::new(base, ceiling)),
        }
    }

    /// Runs the log collection loop until shutdown.
    ///
    /// A shutdown mid-tick cancels the in-flight work; anything not yet
    /// acknowledged by the sink is refetched on the next start.
    pub async fn run_log_loop(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut interval =
            time::interval(Duration::from_secs(*self.settings.get_log_interval_secs()));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(host = %self.host, "log collection loop started");
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => break,
                _ = interval.tick() => {
                    tokio::select! {
                        _ = shutdown_rx.recv() => break,
                        _ = self.log_tick() => {}
                    }
                }
            }
        }
        info!(host = %self.host, "log collection loop stopped");
    }

    /// Runs the metrics sampling loop until shutdown.
    pub async fn run_metrics_loop(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut interval =
            time::interval(Duration::from_secs(*self.settings.get_metrics_interval_secs()));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(host = %self.host, "metrics loop started");
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => break,
                _ = interval.tick() => {
                    tokio::select! {
                        _ = shutdown_rx.recv() => break,
                        _ = self.metrics_tick() => {}
                    }
                }
            }
        }
        info!(host = %self.host, "metrics loop stopped");
    }

    /// Collects logs from every container on the host once.
    pub async fn log_tick(&self) {
        if self.backoff.lock().await.blocked(HOST_KEY) {
            return;
        }

        let containers = match self.transport.list_containers().await {
            Result::Ok(containers) => {
                self.backoff.lock().await.record_success(HOST_KEY);
                containers
            }
            Err(error) => {
                let delay = self.backoff.lock().await.record_failure(HOST_KEY);
                warn!(
                    host = %self.host,
                    %error,
                    retry_in_secs = delay.as_secs(),
                    "listing containers failed"
                );
                return;
            }
        };

        let limit = *self.settings.get_worker_limit();
        stream::iter(containers)
            .for_each_concurrent(limit, |container| async move {
                self.collect_container(&container).await;
            })
            .await;
    }

    /// Collects one container's fresh lines, classifying failures into the
    /// per-container backoff.
    async fn collect_container(&self, container: &Container) {
        if self.backoff.lock().await.blocked(&container.id) {
            return;
        }

        match self.try_collect(container).await {
            Result::Ok(()) => {
                self.backoff.lock().await.record_success(&container.id);
            }
            Err(error) if error.transport_kind() == Some(TransportErrorKind::NotFound) => {
                // The container vanished between listing and fetching.
                debug!(host = %self.host, container_id = %container.id, "container disappeared");
                self.backoff.lock().await.record_success(&container.id);
            }
            Err(error) => {
                let delay = self.backoff.lock().await.record_failure(&container.id);
                warn!(
                    host = %self.host,
                    container_id = %container.id,
                    %error,
                    retry_in_secs = delay.as_secs(),
                    "log collection failed"
                );
            }
        }
    }

    async fn try_collect(&self, container: &Container) -> LogtideResult<()> {
        let cursor = self.cursors.get(&self.host, &container.id).await?;
        let max_lines = *self.settings.get_max_lines_per_fetch();

        // First sight tails a bounded backlog; afterwards we fetch the window
        // since the cursor. The since-fetch asks for the consumed burst lines
        // on top of the cap, so a burst at the cursor's exact timestamp that
        // is wider than the cap cannot fill the window with nothing but
        // already-ingested lines and stall the cursor.
        let (since, cap) = match cursor {
            Some(cursor) => (Some(cursor), max_lines.saturating_add(cursor.line_count)),
            None => (None, *self.settings.get_first_sight_backlog()),
        };

        let fetched = self
            .transport
            .fetch_log_lines(&container.id, since, cap)
            .await?;
        let mut fresh = drop_consumed(fetched, cursor);
        // The per-tick cap applies to fresh lines only.
        fresh.truncate(max_lines as usize);
        if fresh.is_empty() {
            return Ok(());
        }

        let records: Vec<LogRecord> = fresh
            .iter()
            .map(|raw| parse::parse_record(container, raw))
            .collect();

        // The sink must acknowledge the batch before the cursor moves, so a
        // failed write is refetched instead of lost.
        self.sink.write_records(&records).await?;

        if let Some(position) = advance_position(cursor, &fresh) {
            self.cursors
                .advance(&self.host, &container.id, position)
                .await?;
        }

        self.events.emit(CollectorEvent::RecordsWritten {
            host: self.host.clone(),
            container_id: container.id.clone(),
            count: records.len(),
        });

        let candidates = self.detector.detect(&records).await?;
        for candidate in candidates {
            let ingested = self.registry.ingest(candidate).await;
            self.events.emit(match &ingested {
                Ingested::Created(issue) => CollectorEvent::IssueDetected(issue.clone()),
                Ingested::Updated(issue) => CollectorEvent::IssueUpdated(issue.clone()),
            });
        }

        Ok(())
    }

    /// Samples host metrics and per-container stats once. Sampling is
    /// best-effort and never feeds the backoff.
    pub async fn metrics_tick(&self) {
        match self.transport.fetch_host_metrics().await {
            Result::Ok(metrics) => {
                if let Err(error) = self.sink.write_host_metrics(&metrics).await {
                    warn!(host = %self.host, %error, "writing host metrics failed");
                }
            }
            Err(error) => {
                warn!(host = %self.host, %error, "sampling host metrics failed");
            }
        }

        let containers = match self.transport.list_containers().await {
            Result::Ok(containers) => containers,
            Err(error) => {
                warn!(host = %self.host, %error, "listing containers for stats failed");
                return;
            }
        };

        let mut samples = Vec::new();
        for container in containers
            .iter()
            .filter(|container| container.status == ContainerStatus::Running)
        {
            match self.transport.fetch_stats(container).await {
                Result::Ok(stats) => samples.push(stats),
                Err(error) => {
                    warn!(
                        host = %self.host,
                        container_id = %container.id,
                        %error,
                        "sampling container stats failed"
                    );
                }
            }
        }

        if !samples.is_empty() {
            if let Err(error) = self.sink.write_container_stats(&samples).await {
                warn!(host = %self.host, %error, "writing container stats failed");
            }
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Drops lines the cursor has already consumed.
///
/// Since-fetches are inclusive of the cursor timestamp, so lines before it
/// are stale and the first `line_count` lines exactly at it were ingested on
/// an earlier tick.
pub fn drop_consumed(lines: Vec<RawLine>, cursor: Option<Cursor>) -> Vec<RawLine> {
    let Some(cursor) = cursor else {
        return lines;
    };

    let mut same_ts_seen = 0u32;
    lines
        .into_iter()
        .filter(|line| {
            if line.timestamp < cursor.timestamp {
                false
            } else if line.timestamp == cursor.timestamp {
                if same_ts_seen < cursor.line_count {
                    same_ts_seen += 1;
                    false
                } else {
                    true
                }
            } else {
                true
            }
        })
        .collect()
}

/// Computes the cursor position after ingesting a batch of fresh lines.
///
/// When the batch ends at the previous cursor's timestamp, its count carries
/// forward so a burst spanning several ticks keeps disambiguating.
pub fn advance_position(cursor: Option<Cursor>, fresh: &[RawLine]) -> Option<Cursor> {
    let last = fresh.last()?;

    let same_ts = fresh
        .iter()
        .rev()
        .take_while(|line| line.timestamp == last.timestamp)
        .count() as u32;

    let carried = match cursor {
        Some(cursor) if cursor.timestamp == last.timestamp => cursor.line_count,
        _ => 0,
    };

    Some(Cursor::at(last.timestamp, carried + same_ts))
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};

    use super::*;

    fn ts(second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, second).unwrap()
    }

    fn line(second: u32, message: &str) -> RawLine {
        RawLine {
            timestamp: ts(second),
            message: message.to_string(),
        }
    }

    #[test]
    fn test_drop_consumed_without_cursor_keeps_everything() {
        let lines = vec![line(0, "a"), line(1, "b")];
        assert_eq!(drop_consumed(lines.clone(), None), lines);
    }

    #[test]
    fn test_drop_consumed_skips_stale_and_counted_lines() {
        let lines = vec![
            line(0, "older"),
            line(1, "burst-1"),
            line(1, "burst-2"),
            line(1, "burst-3"),
            line(2, "new"),
        ];

        // Two of the three burst lines at second 1 were already ingested.
        let kept = drop_consumed(lines, Some(Cursor::at(ts(1), 2)));

        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].message, "burst-3");
        assert_eq!(kept[1].message, "new");
    }

    #[test]
    fn test_drop_consumed_can_drop_everything() {
        let lines = vec![line(0, "a"), line(1, "b")];
        assert!(drop_consumed(lines, Some(Cursor::at(ts(1), 1))).is_empty());
    }

    #[test]
    fn test_advance_position_counts_trailing_burst() {
        let fresh = vec![line(0, "a"), line(1, "b"), line(1, "c")];

        let position = advance_position(None, &fresh).unwrap();

        assert_eq!(position, Cursor::at(ts(1), 2));
    }

    #[test]
    fn test_advance_position_carries_previous_count_across_ticks() {
        // Earlier tick ended two lines into the burst at second 1.
        let cursor = Some(Cursor::at(ts(1), 2));
        let fresh = vec![line(1, "burst-3"), line(1, "burst-4")];

        let position = advance_position(cursor, &fresh).unwrap();

        assert_eq!(position, Cursor::at(ts(1), 4));
    }

    #[test]
    fn test_advance_position_resets_count_on_new_timestamp() {
        let cursor = Some(Cursor::at(ts(1), 7));
        let fresh = vec![line(2, "a")];

        let position = advance_position(cursor, &fresh).unwrap();

        assert_eq!(position, Cursor::at(ts(2), 1));
    }

    #[test]
    fn test_advance_position_on_empty_batch_is_none() {
        assert_eq!(advance_position(Some(Cursor::at(ts(1), 1)), &[]), None);
    }
}
