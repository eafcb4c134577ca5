use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use tokio::time;
use tracing::warn;

use crate::{
    config::HostConfig,
    models::{Container, ContainerStats, ContainerStatus, Cursor, HostMetrics, RawLine},
    parse, LogtideError, LogtideResult, TransportErrorKind,
};

use super::{
    runner::{CommandOutput, CommandRunner, LocalRunner, SshRunner},
    HostTransport,
};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const LIST_COMMAND: &str = "docker ps -a --format '{{json .}}'";

const CPU_COMMAND: &str =
    "grep 'cpu ' /proc/stat | awk '{usage=($2+$4)*100/($2+$4+$5)} END {print usage}'";

const MEMORY_COMMAND: &str = "free -m | grep Mem";

const DISK_COMMAND: &str = "df -BG / | tail -1";

const GPU_COMMAND: &str = "nvidia-smi --query-gpu=utilization.gpu,memory.used,memory.total \
     --format=csv,noheader,nounits 2>/dev/null || echo ''";

const COMPOSE_PROJECT_LABEL: &str = "com.docker.compose.project";

const COMPOSE_SERVICE_LABEL: &str = "com.docker.compose.service";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Talks to a Docker daemon by shelling out to the `docker` CLI.
///
/// The same invocations work locally and over ssh, so the runner is the only
/// thing that differs between the two transports.
pub struct DockerCliTransport {
    host: String,
    runner: Box<dyn CommandRunner>,
    timeout: Duration,
}

/// One line of `docker ps --format '{{json .}}'` output.
#[derive(Debug, Deserialize)]
struct PsLine {
    #[serde(rename = "ID")]
    id: String,

    #[serde(rename = "Names")]
    names: String,

    #[serde(rename = "Image")]
    image: String,

    #[serde(rename = "State")]
    state: String,

    #[serde(rename = "Labels", default)]
    labels: String,
}

/// One line of `docker stats --format '{{json .}}'` output.
#[derive(Debug, Deserialize)]
struct StatsLine {
    #[serde(rename = "CPUPerc")]
    cpu_perc: String,

    #[serde(rename = "MemUsage")]
    mem_usage: String,

    #[serde(rename = "MemPerc")]
    mem_perc: String,

    #[serde(rename = "NetIO")]
    net_io: String,

    #[serde(rename = "BlockIO")]
    block_io: String,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl DockerCliTransport {
    /// Creates a transport that runs docker commands on this machine.
    pub fn local(host_name: impl Into<String>, timeout: Duration) -> Self {
        Self {
            host: host_name.into(),
            runner: Box::new(LocalRunner),
            timeout,
        }
    }

    /// Creates a transport that runs docker commands on a remote machine
    /// through ssh.
    pub fn ssh(host: &HostConfig, timeout: Duration) -> LogtideResult<Self> {
        Ok(Self {
            host: host.get_name().clone(),
            runner: Box::new(SshRunner::from_config(host)?),
            timeout,
        })
    }

    /// Runs a command, enforcing the per-call deadline and classifying
    /// non-zero exits into transport errors.
    async fn run_checked(&self, context: &str, command: &str) -> LogtideResult<String> {
        let output = time::timeout(self.timeout, self.runner.run(command))
            .await
            .map_err(|_| {
                LogtideError::transport(
                    TransportErrorKind::Timeout,
                    format!(
                        "{} on {} exceeded {}s deadline",
                        context,
                        self.host,
                        self.timeout.as_secs()
                    ),
                )
            })??;

        if output.code != 0 {
            return Err(classify_failure(&self.host, context, &output));
        }

        Ok(output.stdout)
    }

    fn container_from_ps(&self, ps: PsLine) -> Container {
        let (compose_project, compose_service) = parse_compose_labels(&ps.labels);
        Container {
            host: self.host.clone(),
            id: ps.id,
            name: ps.names,
            image: ps.image,
            status: ps.state.parse().unwrap_or(ContainerStatus::Unknown),
            compose_project,
            compose_service,
        }
    }

    fn stats_from_line(&self, container: &Container, line: StatsLine) -> ContainerStats {
        let (memory_usage_mb, memory_limit_mb) = parse_usage_pair(&line.mem_usage);
        let (network_rx_bytes, network_tx_bytes) = parse_io_pair(&line.net_io);
        let (block_read_bytes, block_write_bytes) = parse_io_pair(&line.block_io);

        ContainerStats {
            host: self.host.clone(),
            container_id: container.id.clone(),
            container_name: container.name.clone(),
            timestamp: Utc::now(),
            cpu_percent: parse_percent(&line.cpu_perc),
            memory_usage_mb,
            memory_limit_mb,
            memory_percent: parse_percent(&line.mem_perc),
            network_rx_bytes,
            network_tx_bytes,
            block_read_bytes,
            block_write_bytes,
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Builds the `docker logs` invocation for a fetch.
///
/// With a cursor we fetch the full window since its timestamp; without one we
/// tail the newest `max_lines` so a first sight cannot pull unbounded history.
/// `2>&1` folds the container's stderr stream into the captured output.
fn logs_command(container_id: &str, since: Option<&Cursor>, max_lines: u32) -> String {
    match since {
        Some(cursor) => format!(
            "docker logs {} --timestamps --since {} 2>&1",
            container_id,
            cursor.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
        ),
        None => format!(
            "docker logs {} --timestamps --tail {} 2>&1",
            container_id, max_lines
        ),
    }
}

fn stats_command(container_id: &str) -> String {
    format!(
        "docker stats {} --no-stream --format '{{{{json .}}}}'",
        container_id
    )
}

/// Maps a non-zero exit to a transport error kind.
///
/// ssh reserves exit code 255 for its own failures, so 255 is classified from
/// the ssh diagnostics rather than the docker command's.
fn classify_failure(host: &str, context: &str, output: &CommandOutput) -> LogtideError {
    let haystack = format!("{} {}", output.stderr, output.stdout).to_lowercase();

    let kind = if output.code == 255 {
        if haystack.contains("permission denied") || haystack.contains("authentication") {
            TransportErrorKind::Auth
        } else if haystack.contains("timed out") || haystack.contains("timeout") {
            TransportErrorKind::Timeout
        } else {
            TransportErrorKind::Unknown
        }
    } else if haystack.contains("no such container") || haystack.contains("no such object") {
        TransportErrorKind::NotFound
    } else {
        TransportErrorKind::Unknown
    };

    let detail = output
        .stderr
        .lines()
        .chain(output.stdout.lines())
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("exit code {}", output.code));

    LogtideError::transport(kind, format!("{} on {}: {}", context, host, detail))
}

/// Pulls the compose project and service out of the `docker ps` label list,
/// which arrives as a single `key=value,key=value` string.
fn parse_compose_labels(labels: &str) -> (Option<String>, Option<String>) {
    let mut project = None;
    let mut service = None;

    for label in labels.split(',') {
        if let Some((key, value)) = label.split_once('=') {
            match key.trim() {
                COMPOSE_PROJECT_LABEL => project = Some(value.to_string()),
                COMPOSE_SERVICE_LABEL => service = Some(value.to_string()),
                _ => {}
            }
        }
    }

    (project, service)
}

/// Converts a docker size string like `103.7MiB` or `7.775GiB` to megabytes.
/// Unparseable values become `0.0` so one odd field cannot sink a sample.
fn parse_size_mb(value: &str) -> f64 {
    let value = value.trim();
    if value.is_empty() || value == "--" {
        return 0.0;
    }

    let upper = value.to_uppercase();
    const SUFFIXES: [(&str, f64); 9] = [
        ("TIB", 1024.0 * 1024.0),
        ("GIB", 1024.0),
        ("MIB", 1.0),
        ("KIB", 1.0 / 1024.0),
        ("TB", 1024.0 * 1024.0),
        ("GB", 1024.0),
        ("MB", 1.0),
        ("KB", 1.0 / 1024.0),
        ("B", 1.0 / (1024.0 * 1024.0)),
    ];

    for (suffix, multiplier) in SUFFIXES {
        if let Some(number) = upper.strip_suffix(suffix) {
            return number.trim().parse::<f64>().unwrap_or(0.0) * multiplier;
        }
    }

    upper.parse::<f64>().unwrap_or(0.0)
}

/// Splits a `used / limit` pair like `103.7MiB / 7.775GiB` into megabytes.
fn parse_usage_pair(value: &str) -> (f64, f64) {
    match value.split_once(" / ") {
        Some((used, limit)) => (parse_size_mb(used), parse_size_mb(limit)),
        None => (0.0, 0.0),
    }
}

/// Splits an I/O counter pair like `1.45kB / 10.3MB` into bytes.
fn parse_io_pair(value: &str) -> (u64, u64) {
    match value.split_once(" / ") {
        Some((first, second)) => (
            (parse_size_mb(first) * 1024.0 * 1024.0) as u64,
            (parse_size_mb(second) * 1024.0 * 1024.0) as u64,
        ),
        None => (0, 0),
    }
}

fn parse_percent(value: &str) -> f64 {
    value.trim().trim_end_matches('%').parse().unwrap_or(0.0)
}

/// Parses the `Mem:` line of `free -m` into (total, used, percent).
fn parse_free_line(stdout: &str) -> (f64, f64, f64) {
    let fields: Vec<&str> = stdout.split_whitespace().collect();
    let total: f64 = fields.get(1).and_then(|f| f.parse().ok()).unwrap_or(0.0);
    let used: f64 = fields.get(2).and_then(|f| f.parse().ok()).unwrap_or(0.0);
    let percent = if total > 0.0 {
        used / total * 100.0
    } else {
        0.0
    };

    (total, used, percent)
}

/// Parses the root filesystem line of `df -BG /` into (total, used, percent).
fn parse_df_line(stdout: &str) -> (f64, f64, f64) {
    let fields: Vec<&str> = stdout.split_whitespace().collect();
    let total: f64 = fields
        .get(1)
        .and_then(|f| f.trim_end_matches('G').parse().ok())
        .unwrap_or(0.0);
    let used: f64 = fields
        .get(2)
        .and_then(|f| f.trim_end_matches('G').parse().ok())
        .unwrap_or(0.0);
    let percent = if total > 0.0 {
        used / total * 100.0
    } else {
        0.0
    };

    (total, used, percent)
}

/// Parses `nvidia-smi` csv output into (utilization, memory used, memory
/// total). Hosts without a GPU produce empty output, which maps to `None`.
fn parse_gpu_line(stdout: &str) -> Option<(f64, f64, f64)> {
    let line = stdout.lines().map(str::trim).find(|line| !line.is_empty())?;
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() < 3 {
        return None;
    }

    let utilization: f64 = fields[0].parse().ok()?;
    let memory_used: f64 = fields[1].parse().ok()?;
    let memory_total: f64 = fields[2].parse().ok()?;

    Some((utilization, memory_used, memory_total))
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl HostTransport for DockerCliTransport {
    fn host_name(&self) -> &str {
        &self.host
    }

    async fn list_containers(&self) -> LogtideResult<Vec<Container>> {
        let stdout = self.run_checked("docker ps", LIST_COMMAND).await?;

        let mut containers = Vec::new();
        for line in stdout.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match serde_json::from_str::<PsLine>(line) {
                Result::Ok(ps) => containers.push(self.container_from_ps(ps)),
                Err(error) => {
                    warn!(host = %self.host, %error, "skipping unparseable docker ps line");
                }
            }
        }

        Ok(containers)
    }

    async fn fetch_log_lines(
        &self,
        container_id: &str,
        since: Option<Cursor>,
        max_lines: u32,
    ) -> LogtideResult<Vec<RawLine>> {
        let command = logs_command(container_id, since.as_ref(), max_lines);
        let stdout = self.run_checked("docker logs", &command).await?;

        let received_at = Utc::now();
        let mut lines = Vec::new();
        for line in stdout.lines() {
            match parse::split_timestamped_line(line, received_at) {
                Result::Ok(Some(raw)) => lines.push(raw),
                Result::Ok(None) => {}
                Err(error) => {
                    warn!(host = %self.host, container_id, %error, "skipping unparseable log line");
                }
            }

            // A since-fetch keeps the earliest lines so the cursor window
            // stays contiguous and the remainder is picked up next tick.
            if since.is_some() && lines.len() >= max_lines as usize {
                break;
            }
        }

        Ok(lines)
    }

    async fn fetch_stats(&self, container: &Container) -> LogtideResult<ContainerStats> {
        let command = stats_command(&container.id);
        let stdout = self.run_checked("docker stats", &command).await?;

        let line = stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .ok_or_else(|| {
                LogtideError::transport(
                    TransportErrorKind::Unknown,
                    format!("docker stats returned no output for {}", container.id),
                )
            })?;

        let stats = serde_json::from_str::<StatsLine>(line)?;
        Ok(self.stats_from_line(container, stats))
    }

    async fn fetch_host_metrics(&self) -> LogtideResult<HostMetrics> {
        let cpu = self.run_checked("cpu sample", CPU_COMMAND).await?;
        let memory = self.run_checked("memory sample", MEMORY_COMMAND).await?;
        let disk = self.run_checked("disk sample", DISK_COMMAND).await?;
        let gpu = self.run_checked("gpu sample", GPU_COMMAND).await?;

        let (memory_total_mb, memory_used_mb, memory_percent) = parse_free_line(&memory);
        let (disk_total_gb, disk_used_gb, disk_percent) = parse_df_line(&disk);
        let gpu_sample = parse_gpu_line(&gpu);

        Ok(HostMetrics {
            host: self.host.clone(),
            timestamp: Utc::now(),
            cpu_percent: cpu.trim().parse().unwrap_or(0.0),
            memory_total_mb,
            memory_used_mb,
            memory_percent,
            disk_total_gb,
            disk_used_gb,
            disk_percent,
            gpu_percent: gpu_sample.map(|(utilization, _, _)| utilization),
            gpu_memory_used_mb: gpu_sample.map(|(_, used, _)| used),
            gpu_memory_total_mb: gpu_sample.map(|(_, _, total)| total),
        })
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{Arc, Mutex},
    };

    use super::*;

    struct ScriptedRunner {
        commands: Arc<Mutex<Vec<String>>>,
        outputs: Mutex<VecDeque<CommandOutput>>,
    }

    impl ScriptedRunner {
        fn new(outputs: Vec<CommandOutput>) -> (Self, Arc<Mutex<Vec<String>>>) {
            let commands = Arc::new(Mutex::new(Vec::new()));
            let runner = Self {
                commands: commands.clone(),
                outputs: Mutex::new(outputs.into()),
            };
            (runner, commands)
        }
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn run(&self, command: &str) -> LogtideResult<CommandOutput> {
            self.commands.lock().unwrap().push(command.to_string());
            let output = self
                .outputs
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| ok_output(""));
            Ok(output)
        }
    }

    struct StalledRunner;

    #[async_trait]
    impl CommandRunner for StalledRunner {
        async fn run(&self, _command: &str) -> LogtideResult<CommandOutput> {
            time::sleep(Duration::from_secs(5)).await;
            Ok(ok_output(""))
        }
    }

    fn ok_output(stdout: &str) -> CommandOutput {
        CommandOutput {
            stdout: stdout.to_string(),
            stderr: String::new(),
            code: 0,
        }
    }

    fn failed_output(code: i32, stderr: &str) -> CommandOutput {
        CommandOutput {
            stdout: String::new(),
            stderr: stderr.to_string(),
            code,
        }
    }

    fn scripted_transport(outputs: Vec<CommandOutput>) -> (DockerCliTransport, Arc<Mutex<Vec<String>>>) {
        let (runner, commands) = ScriptedRunner::new(outputs);
        let transport = DockerCliTransport {
            host: "testhost".to_string(),
            runner: Box::new(runner),
            timeout: Duration::from_secs(5),
        };
        (transport, commands)
    }

    fn test_container() -> Container {
        Container {
            host: "testhost".to_string(),
            id: "abc123".to_string(),
            name: "web".to_string(),
            image: "nginx:latest".to_string(),
            status: ContainerStatus::Running,
            compose_project: None,
            compose_service: None,
        }
    }

    #[tokio::test]
    async fn test_list_containers_parses_ps_json() -> anyhow::Result<()> {
        let ps_output = concat!(
            r#"{"ID":"abc123","Names":"web","Image":"nginx:latest","State":"running","Labels":"com.docker.compose.project=shop,com.docker.compose.service=web,other=x"}"#,
            "\n",
            r#"{"ID":"def456","Names":"worker","Image":"app:1.2","State":"exited","Labels":""}"#,
            "\n",
        );
        let (transport, commands) = scripted_transport(vec![ok_output(ps_output)]);

        let containers = transport.list_containers().await?;

        assert_eq!(commands.lock().unwrap()[0], LIST_COMMAND);
        assert_eq!(containers.len(), 2);
        assert_eq!(containers[0].id, "abc123");
        assert_eq!(containers[0].name, "web");
        assert_eq!(containers[0].status, ContainerStatus::Running);
        assert_eq!(containers[0].compose_project.as_deref(), Some("shop"));
        assert_eq!(containers[0].compose_service.as_deref(), Some("web"));
        assert_eq!(containers[1].status, ContainerStatus::Exited);
        assert_eq!(containers[1].compose_project, None);

        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_log_lines_tails_without_cursor() -> anyhow::Result<()> {
        let logs = "2024-01-15T10:30:00.100000000Z starting up\n\
                    2024-01-15T10:30:01.200000000Z ready\n";
        let (transport, commands) = scripted_transport(vec![ok_output(logs)]);

        let lines = transport.fetch_log_lines("abc123", None, 500).await?;

        let command = commands.lock().unwrap()[0].clone();
        assert!(command.contains("--tail 500"));
        assert!(command.contains("--timestamps"));
        assert!(command.ends_with("2>&1"));
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].message, "starting up");

        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_log_lines_uses_since_and_keeps_earliest() -> anyhow::Result<()> {
        let logs = "2024-01-15T10:30:00.100000000Z first\n\
                    2024-01-15T10:30:01.000000000Z second\n\
                    2024-01-15T10:30:02.000000000Z third\n";
        let (transport, commands) = scripted_transport(vec![ok_output(logs)]);

        let since = Cursor::new(parse::parse_docker_timestamp("2024-01-15T10:30:00.100000Z").unwrap());
        let lines = transport.fetch_log_lines("abc123", Some(since), 2).await?;

        let command = commands.lock().unwrap()[0].clone();
        assert!(command.contains("--since 2024-01-15T10:30:00.100000Z"));
        assert!(!command.contains("--tail"));
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].message, "first");
        assert_eq!(lines[1].message, "second");

        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_stats_parses_docker_units() -> anyhow::Result<()> {
        let stats = r#"{"CPUPerc":"12.50%","MemUsage":"103.7MiB / 2GiB","MemPerc":"5.06%","NetIO":"1.45kB / 2MB","BlockIO":"0B / 4MiB"}"#;
        let (transport, _) = scripted_transport(vec![ok_output(stats)]);

        let stats = transport.fetch_stats(&test_container()).await?;

        assert_eq!(stats.host, "testhost");
        assert_eq!(stats.container_id, "abc123");
        assert!((stats.cpu_percent - 12.5).abs() < 1e-9);
        assert!((stats.memory_usage_mb - 103.7).abs() < 1e-9);
        assert!((stats.memory_limit_mb - 2048.0).abs() < 1e-9);
        assert_eq!(stats.network_rx_bytes, 1484);
        assert_eq!(stats.network_tx_bytes, 2 * 1024 * 1024);
        assert_eq!(stats.block_read_bytes, 0);
        assert_eq!(stats.block_write_bytes, 4 * 1024 * 1024);

        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_host_metrics_parses_samples() -> anyhow::Result<()> {
        let (transport, _) = scripted_transport(vec![
            ok_output("23.5\n"),
            ok_output("Mem:          64012       12345       40000        100       11667       50000\n"),
            ok_output("/dev/sda1  468G  123G  321G  28% /\n"),
            ok_output("45, 1234, 24576\n"),
        ]);

        let metrics = transport.fetch_host_metrics().await?;

        assert!((metrics.cpu_percent - 23.5).abs() < 1e-9);
        assert!((metrics.memory_total_mb - 64012.0).abs() < 1e-9);
        assert!((metrics.memory_used_mb - 12345.0).abs() < 1e-9);
        assert!((metrics.memory_percent - 12345.0 / 64012.0 * 100.0).abs() < 1e-9);
        assert!((metrics.disk_total_gb - 468.0).abs() < 1e-9);
        assert!((metrics.disk_used_gb - 123.0).abs() < 1e-9);
        assert_eq!(metrics.gpu_percent, Some(45.0));
        assert_eq!(metrics.gpu_memory_used_mb, Some(1234.0));
        assert_eq!(metrics.gpu_memory_total_mb, Some(24576.0));

        Ok(())
    }

    #[tokio::test]
    async fn test_host_without_gpu_reports_none() -> anyhow::Result<()> {
        let (transport, _) = scripted_transport(vec![
            ok_output("10.0\n"),
            ok_output("Mem: 1000 500 400 0 100 500\n"),
            ok_output("/dev/sda1 100G 50G 50G 50% /\n"),
            ok_output("\n"),
        ]);

        let metrics = transport.fetch_host_metrics().await?;

        assert_eq!(metrics.gpu_percent, None);
        assert_eq!(metrics.gpu_memory_used_mb, None);
        assert_eq!(metrics.gpu_memory_total_mb, None);

        Ok(())
    }

    #[tokio::test]
    async fn test_ssh_exit_255_with_permission_denied_maps_to_auth() {
        let (transport, _) = scripted_transport(vec![failed_output(
            255,
            "borg@10.0.0.5: Permission denied (publickey).",
        )]);

        let error = transport.list_containers().await.unwrap_err();
        assert_eq!(error.transport_kind(), Some(TransportErrorKind::Auth));
    }

    #[tokio::test]
    async fn test_missing_container_maps_to_notfound() {
        let (transport, _) = scripted_transport(vec![failed_output(
            1,
            "Error response from daemon: No such container: abc123",
        )]);

        let error = transport
            .fetch_log_lines("abc123", None, 100)
            .await
            .unwrap_err();
        assert_eq!(error.transport_kind(), Some(TransportErrorKind::NotFound));
    }

    #[tokio::test]
    async fn test_stalled_command_maps_to_timeout() {
        let transport = DockerCliTransport {
            host: "testhost".to_string(),
            runner: Box::new(StalledRunner),
            timeout: Duration::from_millis(20),
        };

        let error = transport.list_containers().await.unwrap_err();
        assert_eq!(error.transport_kind(), Some(TransportErrorKind::Timeout));
    }

    #[test]
    fn test_parse_size_mb_handles_docker_suffixes() {
        assert!((parse_size_mb("103.7MiB") - 103.7).abs() < 1e-9);
        assert!((parse_size_mb("2GiB") - 2048.0).abs() < 1e-9);
        assert!((parse_size_mb("1.5GB") - 1536.0).abs() < 1e-9);
        assert!((parse_size_mb("512KiB") - 0.5).abs() < 1e-9);
        assert!((parse_size_mb("1TB") - 1024.0 * 1024.0).abs() < 1e-9);
        assert!((parse_size_mb("1048576B") - 1.0).abs() < 1e-9);
        assert_eq!(parse_size_mb("--"), 0.0);
        assert_eq!(parse_size_mb("garbage"), 0.0);
    }

    #[test]
    fn test_classify_failure_defaults_to_unknown() {
        let output = failed_output(1, "something odd happened");
        let error = classify_failure("testhost", "docker ps", &output);
        assert_eq!(error.transport_kind(), Some(TransportErrorKind::Unknown));
        assert!(error.to_string().contains("something odd happened"));
    }
}
