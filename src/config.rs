use crate::error::{DeadboltError, Result};
use crate::locking::policy::DeadlockPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const CONFIG_FILE_NAME: &str = "deadbolt.toml";
const DEFAULT_ITERATIONS: u32 = 10;
const DEFAULT_HOLD_MILLIS: u64 = 100;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DeadboltConfig {
    /// Response to a detected circular wait; overridden by the CLI mode
    /// argument.
    #[serde(default)]
    pub on_deadlock: DeadlockPolicy,

    #[serde(default)]
    pub demo: DemoConfig,
}

/// Workload knobs for the demonstration scenarios.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoConfig {
    #[serde(default = "default_iterations")]
    pub iterations: u32,

    #[serde(default = "default_hold_millis")]
    pub hold_millis: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            hold_millis: DEFAULT_HOLD_MILLIS,
        }
    }
}

fn default_iterations() -> u32 {
    DEFAULT_ITERATIONS
}

fn default_hold_millis() -> u64 {
    DEFAULT_HOLD_MILLIS
}

impl DeadboltConfig {
    pub fn load(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            log::debug!("Config file not found at {config_path:?}, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&config_path)?;
        let config: DeadboltConfig = toml::from_str(&contents).map_err(|e| {
            DeadboltError::ConfigError(format!("Failed to parse {CONFIG_FILE_NAME}: {e}"))
        })?;

        log::debug!("Loaded config from {config_path:?}");
        Ok(config)
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        let config_path = dir.join(CONFIG_FILE_NAME);

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| DeadboltError::ConfigError(format!("Failed to serialize config: {e}")))?;

        fs::write(&config_path, contents)?;
        log::debug!("Saved config to {config_path:?}");
        Ok(())
    }
}
