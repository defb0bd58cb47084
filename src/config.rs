//! Harness configuration.
//!
//! Loaded in order, each layer overriding the previous one:
//! 1. Default values
//! 2. Optional JSON file
//! 3. Environment variables (`WORKSHOP_RPC_URL`, `WORKSHOP_ARTIFACTS_DIR`)

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::HarnessError;

pub const RPC_URL_ENV: &str = "WORKSHOP_RPC_URL";
pub const ARTIFACTS_DIR_ENV: &str = "WORKSHOP_ARTIFACTS_DIR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// JSON-RPC endpoint of the node the contracts are deployed to.
    #[serde(default = "default_rpc_url")]
    pub rpc_url: Url,
    /// Directory holding one `<Contract>.json` artifact per contract.
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,
    /// Confirmations to wait for before a transaction counts as mined.
    #[serde(default = "default_confirmations")]
    pub confirmations: usize,
    #[serde(default = "default_deploy_attempts")]
    pub deploy_attempts: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            artifacts_dir: default_artifacts_dir(),
            confirmations: default_confirmations(),
            deploy_attempts: default_deploy_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_rpc_url() -> Url {
    Url::parse("http://127.0.0.1:8545").expect("default rpc url is valid")
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("artifacts")
}

fn default_confirmations() -> usize {
    1
}

fn default_deploy_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_poll_interval_ms() -> u64 {
    100
}

impl HarnessConfig {
    /// Loads defaults, then `path` if given, then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, HarnessError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, HarnessError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, HarnessError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Applies overrides from `lookup`, which maps a variable name to its value.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), HarnessError> {
        if let Some(url) = lookup(RPC_URL_ENV) {
            self.rpc_url = Url::parse(&url)
                .map_err(|e| HarnessError::Config(format!("{RPC_URL_ENV}={url}: {e}")))?;
        }
        if let Some(dir) = lookup(ARTIFACTS_DIR_ENV) {
            self.artifacts_dir = PathBuf::from(dir);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), HarnessError> {
        if !matches!(self.rpc_url.scheme(), "http" | "https") {
            return Err(HarnessError::Config(format!(
                "rpc_url must be http or https, got {}",
                self.rpc_url.scheme()
            )));
        }
        if self.deploy_attempts == 0 {
            return Err(HarnessError::Config(
                "deploy_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
