//! `logtide` is an incremental log collection and issue detection engine for fleets of Docker hosts.
//!
//! # Overview
//!
//! logtide polls the Docker daemons of many hosts, ingests container logs
//! exactly once past a durable cursor, and turns the stream into deduplicated
//! operational issues. It handles:
//! - Incremental log collection with durable per-container cursors
//! - Local, ssh and agent transports behind one seam
//! - Level and HTTP status detection on every line
//! - Language-model issue analysis with a rule-based fallback
//! - Container and host resource metrics
//!
//! # Key Guarantees
//!
//! - **At-least-once storage**: a record only advances its cursor after the
//!   sink acknowledges it, and deterministic document ids make redelivery
//!   harmless
//! - **At-most-once analysis**: every log line is considered for detection
//!   exactly once, no matter how often it is refetched
//! - **Bounded fetches**: first sight of a container tails a capped backlog,
//!   and later fetches never exceed the per-tick line cap
//! - **Independent failure domains**: a failing container backs off
//!   exponentially without slowing its host's healthy neighbors
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use logtide::{
//!     collector::Collector,
//!     config::load_config,
//!     detect::IssueDetector,
//!     issues::IssueRegistry,
//!     sink::MemorySink,
//!     store::CursorStore,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config(None).await?;
//!
//!     let cursors = Arc::new(CursorStore::open(config.cursor_db_path()).await?);
//!     let sink = Arc::new(MemorySink::new());
//!     let detector = Arc::new(IssueDetector::new(None));
//!     let registry = Arc::new(IssueRegistry::new());
//!
//!     let collector = Collector::new(config, cursors, sink, detector, registry);
//!     collector.run().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`collector`] - The collection loops and their retry policy
//! - [`config`] - Configuration types and validation
//! - [`detect`] - Issue detection and analysis
//! - [`events`] - Collector event broadcasting
//! - [`issues`] - Deduplicated issue tracking
//! - [`models`] - Domain models
//! - [`parse`] - Log line parsing
//! - [`sink`] - Storage sinks
//! - [`store`] - The durable cursor store
//! - [`transport`] - Host transports
//! - [`utils`] - Common utilities and helpers

#![warn(missing_docs)]

mod error;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub mod cli;
pub mod collector;
pub mod config;
pub mod detect;
pub mod events;
pub mod issues;
pub mod models;
pub mod parse;
pub mod sink;
pub mod store;
pub mod transport;
pub mod utils;

pub use error::*;
