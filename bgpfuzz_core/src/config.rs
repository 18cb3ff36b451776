use crate::bgp::{MessageTemplate, OpenTemplate};
use crate::mutation::DEFAULT_LEARNING_RATE;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct FuzzerSettings {
    #[serde(default = "default_iterations")]
    pub max_iterations: u64,
    /// Fixed seed for reproducible runs; random when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    #[serde(default = "default_mutations_per_case")]
    pub mutations_per_case: usize,
    /// Restrict mutations to value and length fields.
    #[serde(default)]
    pub leaves_only: bool,
}

pub fn default_iterations() -> u64 {
    100_000
}

fn default_learning_rate() -> f64 {
    DEFAULT_LEARNING_RATE
}

fn default_mutations_per_case() -> usize {
    1
}

impl Default for FuzzerSettings {
    fn default() -> Self {
        Self {
            max_iterations: default_iterations(),
            seed: None,
            learning_rate: default_learning_rate(),
            mutations_per_case: default_mutations_per_case(),
            leaves_only: false,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TransportKind {
    Tcp,
    File,
    #[default]
    DryRun,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct TransportConfig {
    #[serde(default)]
    pub kind: TransportKind,
    /// Target `ip:port`, required for `tcp`.
    #[serde(default)]
    pub address: Option<SocketAddr>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_timeout_ms() -> u64 {
    1000
}

pub fn default_output_dir() -> PathBuf {
    PathBuf::from("./.bgpfuzz_cases")
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: TransportKind::default(),
            address: None,
            timeout_ms: default_timeout_ms(),
            output_dir: default_output_dir(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Open every connection with OPEN + KEEPALIVE before the test case.
    #[serde(default)]
    pub handshake: bool,
    #[serde(default)]
    pub open: OpenTemplate,
    #[serde(default = "default_report_notifications")]
    pub report_notifications: bool,
}

fn default_report_notifications() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            handshake: false,
            open: OpenTemplate::default(),
            report_notifications: default_report_notifications(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct FuzzConfig {
    #[serde(default)]
    pub fuzzer: FuzzerSettings,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub message: MessageTemplate,
}

impl FuzzConfig {
    pub fn load_from_file(path: &Path) -> Result<Self, anyhow::Error> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file at {:?}: {}", path, e))?;

        let config: FuzzConfig = toml::from_str(&content).map_err(|e| {
            anyhow::anyhow!("Failed to parse TOML from config file {:?}: {}", path, e)
        })?;

        Ok(config)
    }
}
