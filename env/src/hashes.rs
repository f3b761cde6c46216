//! Parsed output of `ckb list-hashes --format json`.

use crate::error::{Error, Result};
use ckb_types::H256;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// The key of the dev chain entry.
pub const DEV_NETWORK: &str = "ckb_dev";

/// Hashes of every network listed in the file.
#[derive(Clone, Debug, Deserialize)]
#[serde(transparent)]
pub struct DevChainHashes(HashMap<String, NetworkHashes>);

#[derive(Clone, Debug, Deserialize)]
pub struct NetworkHashes {
    #[serde(default)]
    pub spec_hash: Option<H256>,
    #[serde(default)]
    pub genesis: Option<H256>,
    #[serde(default)]
    pub cellbase: Option<H256>,
    pub system_cells: Vec<SystemCell>,
    pub dep_groups: Vec<DepGroup>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SystemCell {
    #[serde(default)]
    pub path: String,
    pub tx_hash: H256,
    pub index: u32,
    pub data_hash: H256,
    #[serde(default)]
    pub type_hash: Option<H256>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DepGroup {
    pub tx_hash: H256,
    pub index: u32,
    #[serde(default)]
    pub included_cells: Vec<String>,
}

impl DevChainHashes {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|err| {
            Error::Config(format!("failed to read {}: {}", path.display(), err))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(Into::into)
    }

    pub fn network(&self, name: &str) -> Result<&NetworkHashes> {
        self.0
            .get(name)
            .ok_or_else(|| Error::MissingNetwork(name.to_string()))
    }

    pub fn dev(&self) -> Result<&NetworkHashes> {
        self.network(DEV_NETWORK)
    }
}
