//! Logtide configuration validation

use std::collections::HashSet;

use crate::{error::InvalidConfigError, LogtideResult};

use super::{LogtideConfig, TransportKind};

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl LogtideConfig {
    /// Performs validation of the logtide configuration.
    /// This includes checking for:
    /// - At least one configured host
    /// - Unique host names
    /// - Transport-specific required fields (hostname for ssh, url for agent)
    /// - Positive intervals and fetch limits
    pub fn validate(&self) -> LogtideResult<()> {
        if self.hosts.is_empty() {
            return Err(InvalidConfigError::NoHosts.into());
        }

        let mut names = HashSet::new();
        for host in &self.hosts {
            if !names.insert(host.name.as_str()) {
                return Err(InvalidConfigError::DuplicateHostName(host.name.clone()).into());
            }

            match host.transport {
                TransportKind::Ssh if host.hostname.is_none() => {
                    return Err(
                        InvalidConfigError::SshHostMissingHostname(host.name.clone()).into(),
                    );
                }
                TransportKind::Agent if host.url.is_none() => {
                    return Err(InvalidConfigError::AgentHostMissingUrl(host.name.clone()).into());
                }
                _ => {}
            }
        }

        if self.collector.log_interval_secs == 0 {
            return Err(InvalidConfigError::MustBePositive("log_interval_secs").into());
        }
        if self.collector.metrics_interval_secs == 0 {
            return Err(InvalidConfigError::MustBePositive("metrics_interval_secs").into());
        }
        if self.collector.max_lines_per_fetch == 0 {
            return Err(InvalidConfigError::MustBePositive("max_lines_per_fetch").into());
        }
        if self.collector.worker_limit == 0 {
            return Err(InvalidConfigError::MustBePositive("worker_limit").into());
        }
        if self.collector.transport_timeout_secs == 0 {
            return Err(InvalidConfigError::MustBePositive("transport_timeout_secs").into());
        }

        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
