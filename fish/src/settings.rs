//! Node configuration (§6.5), grounded on the teacher's
//! `settings::Settings::new` (`config::Config` layered over a TOML file,
//! overridable by environment variables) and `CommandLineOptions`
//! (`clap::Parser`) for the config-file path override.

use clap::Parser;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_json::Value;

fn default_config_path() -> String {
    "config/default.toml".to_string()
}

/// CLI surface: just enough to locate configuration and pick a log format,
/// mirroring the teacher's `CommandLineOptions` (everything else lives in
/// the config file/environment, not flags).
#[derive(Debug, Parser)]
#[command(name = "fish", about = "Aquarium-Fish node")]
pub struct CommandLineOptions {
    /// Path to the TOML configuration file.
    #[arg(long, env = "FISH_CONFIG", default_value = "config/default.toml")]
    pub config: String,

    /// Emit JSON-formatted log lines instead of the human-readable format.
    #[arg(long, env = "FISH_LOG_JSON")]
    pub log_json: bool,
}

/// `NodeIdentifiers` (§6.5) plus the node's own identity. `uid`/`name` are
/// how this node's `StateStore::node_uid`/`node_name` are seeded; left
/// unset, a fresh identity is minted at startup (fine for the in-memory
/// deliverable, where there is nothing to reconnect to across restarts).
#[derive(Debug, Clone, Deserialize, Default)]
pub struct NodeSettings {
    pub name: String,
    #[serde(default)]
    pub identifiers: Vec<String>,
}

/// `ElectedRoundsToWait`, `AllocationRetry`, `DefaultResourceLifetime`
/// (§6.5). `ElectionRoundTime` is deliberately absent: the spec fixes it as
/// a constant, not a configuration option.
#[derive(Debug, Clone, Deserialize)]
pub struct ElectionSettings {
    #[serde(default = "default_elected_rounds_to_wait")]
    pub elected_rounds_to_wait: u32,
    #[serde(default = "default_allocation_retry")]
    pub allocation_retry: u32,
    #[serde(default)]
    pub default_resource_lifetime: String,
}

fn default_elected_rounds_to_wait() -> u32 {
    10
}

fn default_allocation_retry() -> u32 {
    3
}

impl Default for ElectionSettings {
    fn default() -> Self {
        Self {
            elected_rounds_to_wait: default_elected_rounds_to_wait(),
            allocation_retry: default_allocation_retry(),
            default_resource_lifetime: String::new(),
        }
    }
}

/// One entry of `Drivers` (§6.3, §6.5): `name` is the instance name
/// (`aws` or `aws/prod`), `cfg` its opaque per-instance configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DriverSettings {
    pub name: String,
    #[serde(default)]
    pub cfg: Value,
}

/// Ambient "is this node alive" surface the teacher always carries beside
/// its domain settings (`HealthCheck`-style binding) even though the full
/// HTTP surface is out of scope here (spec §1) — kept minimal on purpose.
#[derive(Debug, Clone, Deserialize)]
pub struct ReadinessSettings {
    #[serde(default = "default_readiness_bind")]
    pub bind: String,
}

fn default_readiness_bind() -> String {
    "127.0.0.1:9080".to_string()
}

impl Default for ReadinessSettings {
    fn default() -> Self {
        Self {
            bind: default_readiness_bind(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub node: NodeSettings,
    #[serde(default)]
    pub election: ElectionSettings,
    /// Empty means "load all registered drivers" (§6.3).
    #[serde(default)]
    pub drivers: Vec<DriverSettings>,
    #[serde(default)]
    pub readiness: ReadinessSettings,
}

impl Settings {
    /// Loads `config/default.toml` (or `cli.config`), then overlays
    /// `FISH_*` environment variables, matching the teacher's
    /// `File::with_name(...)` + env-override layering.
    pub fn new(cli: &CommandLineOptions) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(&cli.config).required(false))
            .add_source(Environment::with_prefix("FISH").separator("__"))
            .build()?;
        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            node: NodeSettings {
                name: "fish-node".to_string(),
                identifiers: vec![],
            },
            election: ElectionSettings::default(),
            drivers: vec![],
            readiness: ReadinessSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_file_falls_back_to_defaults() {
        let cli = CommandLineOptions {
            config: default_config_path() + ".does-not-exist",
            log_json: false,
        };
        let settings = Settings::new(&cli).unwrap();
        assert_eq!(settings.election.allocation_retry, 3);
        assert_eq!(settings.election.elected_rounds_to_wait, 10);
        assert!(settings.drivers.is_empty());
    }
}
