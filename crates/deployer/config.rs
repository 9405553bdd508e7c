use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use timelocks_common::Address;

use crate::error::DeployerError;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read deploy config {path}: {source}")]
    IO {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse deploy config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid chain id key `{0}`")]
    InvalidChainId(String),
}

/// Token and admin of one chain inside a [`ConfigGroup`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChainEntry {
    pub admin: Address,
    pub token: Address,
    /// Overrides the network name used for output directories.
    #[serde(default)]
    pub name: Option<String>,
}

/// A set of chains sharing one beneficiary file, e.g. `mainnet` or `testnet`.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigGroup {
    pub file: PathBuf,
    pub timelocks: BTreeMap<String, ChainEntry>,
}

#[derive(Debug, Clone)]
pub struct DeployConfig {
    groups: BTreeMap<String, ConfigGroup>,
    base_dir: PathBuf,
}

/// Everything a run needs to know about its target chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub token: Address,
    pub admin: Address,
    pub beneficiary_file: PathBuf,
    pub network: String,
}

impl DeployConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::IO {
            path: path.to_path_buf(),
            source,
        })?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self::from_json(&raw, base_dir)
    }

    /// Relative beneficiary files are resolved against `base_dir`.
    pub fn from_json(raw: &str, base_dir: PathBuf) -> Result<Self, ConfigError> {
        let groups: BTreeMap<String, ConfigGroup> = serde_json::from_str(raw)?;
        for group in groups.values() {
            for key in group.timelocks.keys() {
                key.parse::<u64>()
                    .map_err(|_| ConfigError::InvalidChainId(key.clone()))?;
            }
        }
        Ok(Self { groups, base_dir })
    }

    pub fn resolve(&self, chain_id: u64) -> Result<ChainConfig, DeployerError> {
        let key = chain_id.to_string();
        self.groups
            .values()
            .find_map(|group| {
                let entry = group.timelocks.get(&key)?;
                Some(ChainConfig {
                    chain_id,
                    token: entry.token,
                    admin: entry.admin,
                    beneficiary_file: self.base_dir.join(&group.file),
                    network: entry
                        .name
                        .clone()
                        .unwrap_or_else(|| network_name(chain_id)),
                })
            })
            .ok_or(DeployerError::UnsupportedChain(chain_id))
    }

    pub fn chain_ids(&self) -> Vec<u64> {
        self.groups
            .values()
            .flat_map(|group| group.timelocks.keys())
            .filter_map(|key| key.parse().ok())
            .collect()
    }
}

/// Directory name used for deployments and batches of a chain.
pub fn network_name(chain_id: u64) -> String {
    match chain_id {
        1 => "mainnet",
        5 => "goerli",
        10 => "optimism",
        56 => "bnb",
        100 => "gnosis",
        137 => "polygon",
        420 => "optimism-goerli",
        10200 => "gnosis-testnet",
        42161 => "arbitrum-one",
        80001 => "mumbai",
        421613 => "arbitrum-goerli",
        other => return format!("chain-{other}"),
    }
    .to_owned()
}
