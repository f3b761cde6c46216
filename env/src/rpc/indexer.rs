//! Client side of the indexer RPCs.
//!
//! The indexer types in `ckb-jsonrpc-types` are shaped for the server: they
//! only serialize results and only deserialize requests. These mirror them
//! in the other direction.

use ckb_jsonrpc_types::{BlockNumber, CellOutput, JsonBytes, OutPoint, Script, Uint32};
use ckb_types::H256;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptType {
    Lock,
    Type,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    Prefix,
    Exact,
    Partial,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Order {
    Desc,
    Asc,
}

/// The `search_key` param of `get_cells`.
#[derive(Clone, Debug, Serialize)]
pub struct SearchKey {
    pub script: Script,
    pub script_type: ScriptType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_search_mode: Option<SearchMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub with_data: Option<bool>,
}

impl SearchKey {
    /// Cells whose lock is exactly `script`, with their data.
    pub fn lock(script: Script) -> Self {
        SearchKey {
            script,
            script_type: ScriptType::Lock,
            script_search_mode: Some(SearchMode::Exact),
            with_data: Some(true),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Tip {
    pub block_hash: H256,
    pub block_number: BlockNumber,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Cell {
    pub output: CellOutput,
    pub output_data: Option<JsonBytes>,
    pub out_point: OutPoint,
    pub block_number: BlockNumber,
    pub tx_index: Uint32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Pagination<T> {
    pub objects: Vec<T>,
    pub last_cursor: JsonBytes,
}
