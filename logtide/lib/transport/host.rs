use std::time::Duration;

use async_trait::async_trait;

use crate::{
    config::{HostConfig, TransportKind},
    models::{Container, ContainerStats, Cursor, HostMetrics, RawLine},
    LogtideResult,
};

use super::{AgentTransport, DockerCliTransport};

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// Operations every host transport provides.
///
/// Implementations exist for the local Docker daemon, remote daemons reached
/// over ssh, and remote collector agents. The collector drives all hosts
/// through this trait and never learns which transport it is holding.
#[async_trait]
pub trait HostTransport: Send + Sync {
    /// Returns the configured name of the host this transport reaches.
    fn host_name(&self) -> &str;

    /// Lists all containers on the host, including stopped ones.
    async fn list_containers(&self) -> LogtideResult<Vec<Container>>;

    /// Fetches log lines for one container.
    ///
    /// With a cursor the fetch covers everything at or after the cursor's
    /// timestamp and keeps at most `max_lines` of the earliest lines, so the
    /// window stays contiguous with what was already ingested. Without a
    /// cursor the newest `max_lines` are tailed, which caps the backlog the
    /// first sight of a container can pull in.
    async fn fetch_log_lines(
        &self,
        container_id: &str,
        since: Option<Cursor>,
        max_lines: u32,
    ) -> LogtideResult<Vec<RawLine>>;

    /// Samples resource usage for one container.
    async fn fetch_stats(&self, container: &Container) -> LogtideResult<ContainerStats>;

    /// Samples host-level resource usage.
    async fn fetch_host_metrics(&self) -> LogtideResult<HostMetrics>;
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Builds the transport for a host, dispatching on its configured kind.
///
/// The match is exhaustive over [`TransportKind`], so a new kind cannot be
/// added without deciding how to reach it.
pub fn transport_for(
    host: &HostConfig,
    timeout: Duration,
) -> LogtideResult<Box<dyn HostTransport>> {
    match host.get_transport() {
        TransportKind::Local => Ok(Box::new(DockerCliTransport::local(
            host.get_name().clone(),
            timeout,
        ))),
        TransportKind::Ssh => Ok(Box::new(DockerCliTransport::ssh(host, timeout)?)),
        TransportKind::Agent => Ok(Box::new(AgentTransport::new(host, timeout)?)),
    }
}
