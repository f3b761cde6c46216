mod error;
mod id_generator;
pub mod indexer;
#[macro_use]
mod macros;

pub use error::RpcError;

use self::indexer::{Cell, Order, Pagination, SearchKey, Tip};
use ckb_jsonrpc_types::{
    BlockNumber, CellWithStatus, HeaderView, JsonBytes, OutPoint, OutputsValidator, Transaction,
    TransactionWithStatusResponse, Uint32,
};
use ckb_types::{core, packed, H256};
use lazy_static::lazy_static;
use std::time::Duration;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

lazy_static! {
    pub static ref HTTP_CLIENT: reqwest::blocking::Client = reqwest::blocking::Client::builder()
        .timeout(DEFAULT_REQUEST_TIMEOUT)
        .build()
        .expect("reqwest Client build");
}

/// Blocking JSON-RPC client for a CKB node.
///
/// Methods return `Err` instead of panicking, since readiness polling treats
/// failures as "not ready yet".
#[derive(Debug)]
pub struct RpcClient {
    inner: Inner,
}

impl RpcClient {
    /// Creates a client sharing the process-wide HTTP connection pool.
    pub fn new(url: reqwest::Url) -> Self {
        Self {
            inner: Inner::new(url, HTTP_CLIENT.clone()),
        }
    }

    /// Creates a client whose requests give up after `timeout`.
    pub fn with_timeout(url: reqwest::Url, timeout: Duration) -> Result<Self, RpcError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            inner: Inner::new(url, client),
        })
    }

    pub fn url(&self) -> &reqwest::Url {
        &self.inner.url
    }

    pub fn get_indexer_tip(&self) -> Result<Option<Tip>, RpcError> {
        self.inner.get_indexer_tip()
    }

    pub fn get_tip_block_number(&self) -> Result<core::BlockNumber, RpcError> {
        self.inner.get_tip_block_number().map(Into::into)
    }

    pub fn get_tip_header(&self) -> Result<HeaderView, RpcError> {
        self.inner.get_tip_header()
    }

    /// Transaction status only, the transaction body is not requested.
    pub fn get_transaction(
        &self,
        hash: H256,
    ) -> Result<Option<TransactionWithStatusResponse>, RpcError> {
        self.inner.get_transaction(hash, Some(1u32.into()))
    }

    pub fn get_live_cell(
        &self,
        out_point: packed::OutPoint,
        with_data: bool,
    ) -> Result<CellWithStatus, RpcError> {
        self.inner.get_live_cell(out_point.into(), with_data)
    }

    pub fn get_cells(
        &self,
        search_key: SearchKey,
        order: Order,
        limit: u32,
        after_cursor: Option<JsonBytes>,
    ) -> Result<Pagination<Cell>, RpcError> {
        self.inner
            .get_cells(search_key, order, limit.into(), after_cursor)
    }

    /// Submits the transaction, skipping the well-known-scripts output check
    /// so custom locks may appear in outputs.
    pub fn send_transaction(&self, tx: packed::Transaction) -> Result<H256, RpcError> {
        self.inner
            .send_transaction(tx.into(), Some(OutputsValidator::Passthrough))
    }

    pub fn generate_block(&self) -> Result<H256, RpcError> {
        self.inner.generate_block()
    }
}

jsonrpc!(
#[derive(Debug)]
pub struct Inner {
    pub fn get_indexer_tip(&self) -> Option<Tip>;
    pub fn get_tip_block_number(&self) -> BlockNumber;
    pub fn get_tip_header(&self) -> HeaderView;
    pub fn get_transaction(
        &self,
        _hash: H256,
        verbosity: Option<Uint32>
    ) -> Option<TransactionWithStatusResponse>;
    pub fn get_live_cell(&self, _out_point: OutPoint, _with_data: bool) -> CellWithStatus;
    pub fn get_cells(
        &self,
        search_key: SearchKey,
        order: Order,
        limit: Uint32,
        after_cursor: Option<JsonBytes>
    ) -> Pagination<Cell>;
    pub fn send_transaction(
        &self,
        tx: Transaction,
        outputs_validator: Option<OutputsValidator>
    ) -> H256;
    pub fn generate_block(&self) -> H256;
});
