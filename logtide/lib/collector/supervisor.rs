use std::{collections::HashSet, future::Future, sync::Arc, time::Duration};

use futures::future;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{info, warn};

use crate::{
    config::LogtideConfig,
    detect::IssueDetector,
    events::{CollectorEvent, EventBus},
    issues::{Ingested, IssueRegistry},
    models::{LogRecord, ScanOutcome},
    parse,
    sink::StorageSink,
    store::CursorStore,
    transport::{transport_for, HostTransport},
    LogtideResult,
};

use super::worker::HostWorker;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The collector supervising all configured hosts.
///
/// Spawns one log loop and one metrics loop per host and runs them until
/// shutdown. All shared state lives behind the supervisor: the cursor store,
/// the sink, the detector and the issue registry.
pub struct Collector {
    /// The validated configuration.
    config: LogtideConfig,

    /// The durable cursor store shared by all workers.
    cursors: Arc<CursorStore>,

    /// The sink all records, stats and metrics are written to.
    sink: Arc<dyn StorageSink>,

    /// The detector shared by collection and manual scans.
    detector: Arc<IssueDetector>,

    /// The registry issues are collapsed into.
    registry: Arc<IssueRegistry>,

    /// The bus collection events are emitted on.
    events: EventBus,

    /// The channel used to stop all workers.
    shutdown_tx: broadcast::Sender<()>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Collector {
    /// Creates a collector over the given shared components.
    pub fn new(
        config: LogtideConfig,
        cursors: Arc<CursorStore>,
        sink: Arc<dyn StorageSink>,
        detector: Arc<IssueDetector>,
        registry: Arc<IssueRegistry>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            cursors,
            sink,
            detector,
            registry,
            events: EventBus::new(),
            shutdown_tx,
        }
    }

    /// Returns the event bus for subscribing to collection events.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Returns the issue registry.
    pub fn registry(&self) -> &Arc<IssueRegistry> {
        &self.registry
    }

    /// Returns the issue detector.
    pub fn detector(&self) -> &Arc<IssueDetector> {
        &self.detector
    }

    /// Signals all workers to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Runs collection until [`Collector::shutdown`] is called.
    ///
    /// On the first start the one-time historical scan runs before the loops
    /// begin, so long-standing problems surface without waiting for new log
    /// traffic.
    pub async fn run(&self) -> LogtideResult<()> {
        if !self.detector.initial_scan_done().await {
            info!("running initial historical scan");
            let initial_lines = *self.config.get_analysis().get_initial_scan_lines();
            match self.scan_now(None, initial_lines).await {
                Result::Ok(outcome) => info!(
                    logs_scanned = outcome.logs_scanned,
                    issues_found = outcome.issues_found,
                    "initial scan complete"
                ),
                Err(error) => warn!(%error, "initial scan failed"),
            }
            self.detector.mark_initial_scan_done().await;
        }

        self.prune_stale_cursors().await?;

        let timeout =
            Duration::from_secs(*self.config.get_collector().get_transport_timeout_secs());

        let mut handles = Vec::new();
        for host in self.config.get_hosts() {
            let transport: Arc<dyn HostTransport> = Arc::from(transport_for(host, timeout)?);
            let worker = Arc::new(HostWorker::new(
                host.get_name().clone(),
                transport,
                self.cursors.clone(),
                self.sink.clone(),
                self.detector.clone(),
                self.registry.clone(),
                self.events.clone(),
                self.config.get_collector().clone(),
            ));

            let log_worker = worker.clone();
            handles.push(tokio::spawn(supervise(
                "logs",
                host.get_name().clone(),
                self.shutdown_tx.clone(),
                move |shutdown_rx| log_worker.clone().run_log_loop(shutdown_rx),
            )));

            let metrics_worker = worker;
            handles.push(tokio::spawn(supervise(
                "metrics",
                host.get_name().clone(),
                self.shutdown_tx.clone(),
                move |shutdown_rx| metrics_worker.clone().run_metrics_loop(shutdown_rx),
            )));
        }

        info!(hosts = self.config.get_hosts().len(), "collector started");

        for result in future::join_all(handles).await {
            result?;
        }

        info!("collector stopped");
        Ok(())
    }

    /// Drops cursors for hosts that are no longer in the configuration, so a
    /// re-added host starts from a bounded backlog instead of stale state.
    async fn prune_stale_cursors(&self) -> LogtideResult<()> {
        let configured: HashSet<&str> = self
            .config
            .get_hosts()
            .iter()
            .map(|host| host.get_name().as_str())
            .collect();

        for host in self.cursors.hosts().await? {
            if !configured.contains(host.as_str()) {
                let removed = self.cursors.remove_host(&host).await?;
                info!(host = %host, cursors = removed, "pruned cursors for removed host");
            }
        }

        Ok(())
    }

    /// Runs one detection-only pass over current container tails.
    ///
    /// Cursors are neither read nor advanced and nothing is written to the
    /// sink; only detection state and the issue registry change. An optional
    /// filter restricts the pass to one container by name or id.
    pub async fn scan_now(
        &self,
        container: Option<&str>,
        max_lines: u32,
    ) -> LogtideResult<ScanOutcome> {
        let timeout =
            Duration::from_secs(*self.config.get_collector().get_transport_timeout_secs());

        let mut issues_found = 0;
        let mut logs_scanned = 0;

        for host in self.config.get_hosts() {
            let transport = match transport_for(host, timeout) {
                Result::Ok(transport) => transport,
                Err(error) => {
                    warn!(host = %host.get_name(), %error, "skipping host for scan");
                    continue;
                }
            };

            let containers = match transport.list_containers().await {
                Result::Ok(containers) => containers,
                Err(error) => {
                    warn!(host = %host.get_name(), %error, "listing containers for scan failed");
                    continue;
                }
            };

            for found in containers {
                if let Some(filter) = container {
                    if found.name != filter && found.id != filter {
                        continue;
                    }
                }

                let lines = match transport.fetch_log_lines(&found.id, None, max_lines).await {
                    Result::Ok(lines) => lines,
                    Err(error) => {
                        warn!(
                            host = %host.get_name(),
                            container_id = %found.id,
                            %error,
                            "fetching logs for scan failed"
                        );
                        continue;
                    }
                };

                let records: Vec<LogRecord> = lines
                    .iter()
                    .map(|raw| parse::parse_record(&found, raw))
                    .collect();
                logs_scanned += records.len();

                let candidates = self.detector.detect(&records).await?;
                for candidate in candidates {
                    let ingested = self.registry.ingest(candidate).await;
                    self.events.emit(match &ingested {
                        Ingested::Created(issue) => CollectorEvent::IssueDetected(issue.clone()),
                        Ingested::Updated(issue) => CollectorEvent::IssueUpdated(issue.clone()),
                    });
                    issues_found += 1;
                }
            }
        }

        Ok(ScanOutcome {
            issues_found,
            logs_scanned,
        })
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Runs one worker loop as a task, restarting it if the task fails.
///
/// A clean exit means the loop saw the shutdown signal. A failed task never
/// takes the process down: the failure is logged and the loop restarted,
/// unless shutdown was requested in the meantime.
async fn supervise<F, Fut>(
    loop_kind: &'static str,
    host: String,
    shutdown_tx: broadcast::Sender<()>,
    make_loop: F,
) where
    F: Fn(broadcast::Receiver<()>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut shutdown_rx = shutdown_tx.subscribe();

    loop {
        let task = tokio::spawn(make_loop(shutdown_tx.subscribe()));
        match task.await {
            Result::Ok(()) => break,
            Err(error) => {
                warn!(host = %host, loop_kind, %error, "worker task failed, restarting");
                if !matches!(shutdown_rx.try_recv(), Err(TryRecvError::Empty)) {
                    break;
                }
            }
        }
    }
}
