use crate::error::Result;
use crate::rpc::indexer::{Cell, Order, SearchKey};
use crate::rpc::RpcClient;
use ckb_jsonrpc_types::JsonBytes;
use ckb_logger::trace;
use ckb_types::{
    bytes::Bytes,
    packed::{CellOutput, OutPoint, Script},
};
use std::collections::VecDeque;

const DEFAULT_PAGE_SIZE: u32 = 64;

/// A spendable cell.
#[derive(Clone, Debug)]
pub struct LiveCell {
    pub out_point: OutPoint,
    pub output: CellOutput,
    pub data: Bytes,
}

impl From<Cell> for LiveCell {
    fn from(cell: Cell) -> Self {
        LiveCell {
            out_point: cell.out_point.into(),
            output: cell.output.into(),
            data: cell
                .output_data
                .map(JsonBytes::into_bytes)
                .unwrap_or_default(),
        }
    }
}

/// Yields cells to feed into a transaction.
pub trait LiveCellIterator {
    fn next_cell(&mut self) -> Result<Option<LiveCell>>;
}

/// Pages through the indexer for plain cells locked by one script: no type
/// script and empty data.
pub struct IndexerCellIterator<'a> {
    rpc: &'a RpcClient,
    lock: Script,
    page_size: u32,
    cursor: Option<JsonBytes>,
    buffer: VecDeque<LiveCell>,
    exhausted: bool,
}

impl<'a> IndexerCellIterator<'a> {
    pub fn new(rpc: &'a RpcClient, lock: Script) -> Self {
        IndexerCellIterator {
            rpc,
            lock,
            page_size: DEFAULT_PAGE_SIZE,
            cursor: None,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Number of cells requested per `get_cells` call.
    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn fetch_page(&mut self) -> Result<()> {
        let page = self.rpc.get_cells(
            SearchKey::lock(self.lock.clone().into()),
            Order::Asc,
            self.page_size,
            self.cursor.take(),
        )?;
        trace!("Indexer returned {} cells", page.objects.len());
        if page.objects.len() < self.page_size as usize {
            self.exhausted = true;
        }
        self.cursor = Some(page.last_cursor);
        self.buffer.extend(
            page.objects
                .into_iter()
                .filter(|cell| cell.output.type_.is_none())
                .map(LiveCell::from)
                .filter(|cell| cell.data.is_empty()),
        );
        Ok(())
    }
}

impl LiveCellIterator for IndexerCellIterator<'_> {
    fn next_cell(&mut self) -> Result<Option<LiveCell>> {
        while self.buffer.is_empty() && !self.exhausted {
            self.fetch_page()?;
        }
        Ok(self.buffer.pop_front())
    }
}

/// Yields a fixed list of cells.
#[derive(Clone, Debug, Default)]
pub struct VecCellIterator(VecDeque<LiveCell>);

impl VecCellIterator {
    pub fn new(cells: Vec<LiveCell>) -> Self {
        VecCellIterator(cells.into())
    }
}

impl LiveCellIterator for VecCellIterator {
    fn next_cell(&mut self) -> Result<Option<LiveCell>> {
        Ok(self.0.pop_front())
    }
}
