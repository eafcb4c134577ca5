use std::{path::PathBuf, process::Stdio};

use async_trait::async_trait;
use tokio::process::Command;

use crate::{config::HostConfig, error::InvalidConfigError, LogtideResult};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Captured output of one executed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// The captured standard output.
    pub stdout: String,

    /// The captured standard error.
    pub stderr: String,

    /// The exit code. `-1` when the process was killed by a signal.
    pub code: i32,
}

/// Runs command lines on the collector's own machine.
#[derive(Debug, Default)]
pub struct LocalRunner;

/// Runs command lines on a remote machine through the system `ssh` binary.
#[derive(Debug)]
pub struct SshRunner {
    /// The `user@host` (or bare host) target passed to ssh.
    target: String,

    /// The ssh port.
    port: u16,

    /// An identity file passed with `-i`, if configured.
    identity_file: Option<PathBuf>,
}

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// Executes shell command lines somewhere a Docker CLI is available.
///
/// The same docker invocations run unchanged locally and over ssh; only the
/// runner differs. Non-zero exit codes are reported in the output, not as
/// errors, so callers can classify them.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs one shell command line and captures its output.
    async fn run(&self, command: &str) -> LogtideResult<CommandOutput>;
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl SshRunner {
    /// Builds a runner from an ssh host's configuration.
    pub fn from_config(host: &HostConfig) -> LogtideResult<Self> {
        let hostname = host
            .get_hostname()
            .clone()
            .ok_or_else(|| InvalidConfigError::SshHostMissingHostname(host.get_name().clone()))?;

        let target = match host.get_user() {
            Some(user) => format!("{}@{}", user, hostname),
            None => hostname,
        };

        Ok(Self {
            target,
            port: host.port_or_default(),
            identity_file: host.get_identity_file().clone(),
        })
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl CommandRunner for LocalRunner {
    async fn run(&self, command: &str) -> LogtideResult<CommandOutput> {
        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .output()
            .await?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            code: output.status.code().unwrap_or(-1),
        })
    }
}

#[async_trait]
impl CommandRunner for SshRunner {
    async fn run(&self, command: &str) -> LogtideResult<CommandOutput> {
        let mut ssh = Command::new("ssh");
        ssh.arg("-o")
            .arg("BatchMode=yes")
            .arg("-o")
            .arg("ConnectTimeout=10")
            .arg("-o")
            .arg("StrictHostKeyChecking=accept-new")
            .arg("-p")
            .arg(self.port.to_string());

        if let Some(identity_file) = &self.identity_file {
            ssh.arg("-i").arg(identity_file);
        }

        let output = ssh
            .arg(&self.target)
            .arg(command)
            .stdin(Stdio::null())
            .output()
            .await?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            code: output.status.code().unwrap_or(-1),
        })
    }
}
