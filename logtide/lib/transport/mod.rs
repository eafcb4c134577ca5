//! Transports for reaching the Docker daemons on monitored hosts.
//!
//! This module provides:
//! - A common [`HostTransport`] seam the collector drives every host through
//! - A CLI transport that shells out to `docker`, locally or over ssh
//! - An HTTP transport that polls a remote collector agent

mod agent;
mod docker_cli;
mod host;
mod runner;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use agent::*;
pub use docker_cli::*;
pub use host::*;
pub use runner::*;
