use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use serde::Deserialize;
use meterline_core::error::{MeterError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReporterConfig {
    pub version: u32,

    #[serde(default)]
    pub report: ReportSection,

    #[serde(default)]
    pub file: FileSinkConfig,

    #[serde(default)]
    pub statsd: StatsdSinkConfig,

    #[serde(default)]
    pub json: JsonSinkConfig,

    #[serde(default)]
    pub request_timing: RequestTimingSection,

    #[serde(default)]
    pub ops: OpsSection,
}

impl ReporterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(MeterError::Config(format!(
                "unsupported config version {} (expected 1)",
                self.version
            )));
        }
        self.report.validate()?;
        self.file.validate()?;
        self.statsd.validate()?;
        self.json.validate()?;
        self.request_timing.validate()?;
        self.ops.validate()?;
        Ok(())
    }
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            version: 1,
            report: ReportSection::default(),
            file: FileSinkConfig::default(),
            statsd: StatsdSinkConfig::default(),
            json: JsonSinkConfig::default(),
            request_timing: RequestTimingSection::default(),
            ops: OpsSection::default(),
        }
    }
}

// --------------------
// report
// --------------------
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportSection {
    #[serde(default = "default_frequency_secs")]
    pub frequency_secs: u64,

    /// Defaults to `frequency_secs`.
    #[serde(default)]
    pub initial_delay_secs: Option<u64>,

    /// Wildcard name patterns; empty reports everything.
    #[serde(default)]
    pub include: Vec<String>,
}

impl Default for ReportSection {
    fn default() -> Self {
        Self {
            frequency_secs: default_frequency_secs(),
            initial_delay_secs: None,
            include: Vec::new(),
        }
    }
}

impl ReportSection {
    pub fn validate(&self) -> Result<()> {
        if !(1..=86_400).contains(&self.frequency_secs) {
            return Err(MeterError::Config(
                "report.frequency_secs must be between 1 and 86400".into(),
            ));
        }
        if self.initial_delay_secs.is_some_and(|d| d > 86_400) {
            return Err(MeterError::Config(
                "report.initial_delay_secs must be at most 86400".into(),
            ));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.frequency_secs)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_secs.unwrap_or(self.frequency_secs))
    }
}

fn default_frequency_secs() -> u64 {
    60
}

// --------------------
// file sink
// --------------------
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileSinkConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_directory")]
    pub directory: String,

    #[serde(default = "default_base_file_name")]
    pub base_file_name: String,

    #[serde(default = "default_extension")]
    pub extension: String,

    #[serde(default = "default_keep_files")]
    pub keep_files: usize,

    /// chrono format string; a new file starts whenever the rendered value changes.
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,
}

impl Default for FileSinkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: default_directory(),
            base_file_name: default_base_file_name(),
            extension: default_extension(),
            keep_files: default_keep_files(),
            timestamp_format: default_timestamp_format(),
        }
    }
}

impl FileSinkConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        if self.directory.trim().is_empty() {
            return Err(MeterError::Config("file.directory must not be empty".into()));
        }
        let bad_name = |s: &str| s.is_empty() || s.contains(['/', '\\']);
        if bad_name(&self.base_file_name) {
            return Err(MeterError::Config(
                "file.base_file_name must be a plain, non-empty file name".into(),
            ));
        }
        if self.extension.contains(['/', '\\', '.']) {
            return Err(MeterError::Config(
                "file.extension must not contain '.' or path separators".into(),
            ));
        }
        if !(1..=1_000).contains(&self.keep_files) {
            return Err(MeterError::Config(
                "file.keep_files must be between 1 and 1000".into(),
            ));
        }
        if self.timestamp_format.trim().is_empty() || self.timestamp_format.contains(['/', '\\']) {
            return Err(MeterError::Config(
                "file.timestamp_format must be non-empty and contain no path separators".into(),
            ));
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}
fn default_directory() -> String {
    "metrics".into()
}
fn default_base_file_name() -> String {
    "metrics".into()
}
fn default_extension() -> String {
    "csv".into()
}
fn default_keep_files() -> usize {
    7
}
fn default_timestamp_format() -> String {
    "%Y%m%d".into()
}

// --------------------
// statsd sink
// --------------------
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatsdSinkConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_statsd_host")]
    pub host: String,

    #[serde(default = "default_statsd_port")]
    pub port: u16,

    #[serde(default)]
    pub prefix: Option<String>,

    #[serde(default = "default_max_name_bytes")]
    pub max_name_bytes: usize,

    #[serde(default = "default_max_packet_bytes")]
    pub max_packet_bytes: usize,

    #[serde(default = "default_true")]
    pub include_tags: bool,
}

impl Default for StatsdSinkConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_statsd_host(),
            port: default_statsd_port(),
            prefix: None,
            max_name_bytes: default_max_name_bytes(),
            max_packet_bytes: default_max_packet_bytes(),
            include_tags: true,
        }
    }
}

impl StatsdSinkConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        if self.host.trim().is_empty() {
            return Err(MeterError::Config("statsd.host must not be empty".into()));
        }
        if self.port == 0 {
            return Err(MeterError::Config("statsd.port must not be 0".into()));
        }
        if !(16..=1_024).contains(&self.max_name_bytes) {
            return Err(MeterError::Config(
                "statsd.max_name_bytes must be between 16 and 1024".into(),
            ));
        }
        if !(512..=65_000).contains(&self.max_packet_bytes) {
            return Err(MeterError::Config(
                "statsd.max_packet_bytes must be between 512 and 65000".into(),
            ));
        }
        Ok(())
    }

    /// Resolve `host:port`. Fails if the host does not resolve.
    pub fn resolve(&self) -> Result<SocketAddr> {
        let target = format!("{}:{}", self.host, self.port);
        target
            .to_socket_addrs()
            .map_err(|e| MeterError::Config(format!("statsd target {target} invalid: {e}")))?
            .next()
            .ok_or_else(|| MeterError::Config(format!("statsd target {target} did not resolve")))
    }
}

fn default_statsd_host() -> String {
    "127.0.0.1".into()
}
fn default_statsd_port() -> u16 {
    8125
}
fn default_max_name_bytes() -> usize {
    200
}
fn default_max_packet_bytes() -> usize {
    // fits a typical 1500 byte MTU after IP/UDP headers
    1432
}

// --------------------
// json sink
// --------------------
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JsonSinkConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Number of past cycles kept in memory.
    #[serde(default = "default_json_history")]
    pub history: usize,
}

impl Default for JsonSinkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            history: default_json_history(),
        }
    }
}

impl JsonSinkConfig {
    pub fn validate(&self) -> Result<()> {
        if self.enabled && !(1..=1_000).contains(&self.history) {
            return Err(MeterError::Config(
                "json.history must be between 1 and 1000".into(),
            ));
        }
        Ok(())
    }
}

fn default_json_history() -> usize {
    10
}

// --------------------
// request timing
// --------------------
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestTimingSection {
    /// Spans below this share of the request duration are left out of reports.
    #[serde(default)]
    pub threshold_percent: f64,

    /// Completed requests held between cycles; older ones are dropped first.
    #[serde(default = "default_timing_capacity")]
    pub capacity: usize,
}

impl Default for RequestTimingSection {
    fn default() -> Self {
        Self {
            threshold_percent: 0.0,
            capacity: default_timing_capacity(),
        }
    }
}

impl RequestTimingSection {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.threshold_percent) {
            return Err(MeterError::Config(
                "request_timing.threshold_percent must be between 0 and 100".into(),
            ));
        }
        if self.capacity > 100_000 {
            return Err(MeterError::Config(
                "request_timing.capacity must be at most 100000".into(),
            ));
        }
        Ok(())
    }
}

fn default_timing_capacity() -> usize {
    meterline_core::registry::DEFAULT_TIMING_CAPACITY
}

// --------------------
// ops endpoints
// --------------------
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpsSection {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_ops_listen")]
    pub listen: String,
}

impl Default for OpsSection {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: default_ops_listen(),
        }
    }
}

impl OpsSection {
    pub fn validate(&self) -> Result<()> {
        if self.enabled {
            self.listen_addr()?;
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen
            .parse()
            .map_err(|_| MeterError::Config(format!("ops.listen must be a valid SocketAddr: {}", self.listen)))
    }
}

fn default_ops_listen() -> String {
    "127.0.0.1:9102".into()
}
