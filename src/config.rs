//! Configuration management for the transaction dispatcher
//!
//! Loads configuration from TOML files with environment variable substitution.

use crate::tx::EscalationOptions;

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::env;
use std::path::{Path, PathBuf};

/// Environment variable pointing at the configuration file
pub const CONFIG_ENV: &str = "TESSERACT_DISPATCHER_CONFIG";

lazy_static! {
    static ref ENV_VAR: Regex = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub dispatcher: DispatcherConfig,
    pub escalation: EscalationConfig,
    pub logging: LoggingConfig,
    pub chains: HashMap<String, ChainConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Substrings that mark a send failure as nonce-related
    pub nonce_error_markers: Vec<String>,
    /// Buffer size of the dispatch event channel
    pub event_channel_capacity: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            nonce_error_markers: vec![
                "nonce too low".to_string(),
                "already known".to_string(),
                "known transaction".to_string(),
                "replacement transaction underpriced".to_string(),
            ],
            event_channel_capacity: 1024,
        }
    }
}

/// Default gas price escalation parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EscalationConfig {
    pub price_multiplier: f64,
    pub increase_interval_secs: u64,
    pub check_interval_secs: u64,
    pub max_price_gwei: u64,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            price_multiplier: 1.1,
            increase_interval_secs: 60,
            check_interval_secs: 10,
            max_price_gwei: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Overrides the default filter when `RUST_LOG` is not set
    pub filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            filter: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub name: String,
    pub rpc_urls: Vec<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Settings {
    /// Load settings from the file named by `TESSERACT_DISPATCHER_CONFIG`
    pub fn load() -> Result<Self> {
        let config_path = env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        Self::load_from(&config_path)
    }

    /// Load settings from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        Self::from_toml_str(&config_str)
    }

    /// Parse and validate settings from TOML text
    pub fn from_toml_str(input: &str) -> Result<Self> {
        // Substitute environment variables
        let config_str = substitute_env_vars(input);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for (name, chain) in &self.chains {
            if !seen.insert(chain.chain_id) {
                anyhow::bail!("Chain ID {} is configured more than once", chain.chain_id);
            }
            if chain.enabled && chain.rpc_urls.is_empty() {
                anyhow::bail!("Chain {} has no RPC URLs configured", name);
            }
        }

        if self.dispatcher.event_channel_capacity == 0 {
            anyhow::bail!("Event channel capacity must be positive");
        }

        EscalationOptions::from(&self.escalation)
            .validate()
            .context("Invalid escalation defaults")?;

        Ok(())
    }

    /// Get list of enabled chains
    pub fn enabled_chains(&self) -> Vec<(&String, &ChainConfig)> {
        self.chains.iter().filter(|(_, c)| c.enabled).collect()
    }

    /// Get chain config by chain ID
    pub fn get_chain_by_id(&self, chain_id: u64) -> Option<&ChainConfig> {
        self.chains.values().find(|c| c.chain_id == chain_id)
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    ENV_VAR
        .replace_all(input, |caps: &regex::Captures| {
            env::var(&caps[1]).unwrap_or_default()
        })
        .into_owned()
}
