//! A dev chain node together with everything needed to talk to it.

use crate::config::HarnessConfig;
use crate::dev_chain::{parse_hex, parse_privkey, DevChain};
use crate::error::{Error, Result};
use crate::process::{KillHandle, NodeProcess};
use crate::readiness::wait_for_node;
use crate::rpc::RpcClient;
use crate::tx::TxSkeleton;
use crate::wait::wait_until;
use ckb_crypto::secp::Privkey;
use ckb_jsonrpc_types::Status;
use ckb_logger::{debug, info};
use ckb_types::{core::BlockNumber, packed::Script, prelude::*, H256};
use std::time::Instant;

pub struct Env {
    config: HarnessConfig,
    dev_chain: DevChain,
    rpc: RpcClient,
    node: Option<NodeProcess>,
}

impl Env {
    /// Launches the node script and blocks until its indexer answers.
    ///
    /// The node is torn down if it never becomes ready.
    pub fn start(config: HarnessConfig) -> Result<Self> {
        Self::start_with_kill_handle(config, KillHandle::new())
    }

    /// Like [`Env::start`], but `kill_handle` learns the node's pid as soon as
    /// it is spawned, before the readiness wait begins.
    pub fn start_with_kill_handle(config: HarnessConfig, kill_handle: KillHandle) -> Result<Self> {
        let dev_chain = DevChain::load(&config.hashes_path)?;
        let mut node = NodeProcess::new(config.node_script.clone())
            .kill_grace(config.readiness.kill_grace)
            .with_kill_handle(kill_handle);
        node.start()?;
        let rpc = wait_for_node(&mut node, &config)?;
        Ok(Env {
            config,
            dev_chain,
            rpc,
            node: Some(node),
        })
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn dev_chain(&self) -> &DevChain {
        &self.dev_chain
    }

    pub fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    pub fn miner_key(&self) -> Result<Privkey> {
        parse_privkey(self.config.require_miner_private_key()?)
    }

    pub fn miner_lock(&self) -> Result<Script> {
        let args = parse_hex(self.config.require_miner_lock_arg()?)?;
        self.dev_chain.secp256k1_lock(args)
    }

    pub fn alice_lock(&self) -> Result<Script> {
        let args = parse_hex(self.config.require_alice_lock_arg()?)?;
        self.dev_chain.secp256k1_lock(args)
    }

    /// Blocks until the indexer has synced `block_number`.
    pub fn wait_for_indexer(&self, block_number: BlockNumber) -> Result<()> {
        let readiness = &self.config.readiness;
        wait_until(
            &format!("indexer to reach block {block_number}"),
            readiness.ready_timeout,
            readiness.poll_interval,
            || {
                Ok(self
                    .rpc
                    .get_indexer_tip()?
                    .map_or(false, |tip| tip.block_number.value() >= block_number))
            },
        )
    }

    /// Produces `count` new blocks and waits for the indexer to catch up.
    ///
    /// Backs off for a poll interval whenever the node produces no block, and
    /// gives up after the readiness timeout.
    pub fn mine(&self, count: u64) -> Result<()> {
        let readiness = &self.config.readiness;
        let start_number = self.rpc.get_tip_block_number()?;
        let mut tip_hash = self.rpc.get_tip_header()?.hash;
        let mut mined = 0;
        wait_until(
            &format!("{count} blocks on top of {start_number}"),
            readiness.ready_timeout,
            readiness.poll_interval,
            || {
                while mined < count {
                    let hash = self.rpc.generate_block()?;
                    // the node returns the old tip when no block was produced
                    if hash == tip_hash {
                        return Ok(false);
                    }
                    mined += 1;
                    tip_hash = hash;
                }
                Ok(true)
            },
        )?;
        debug!("Mined {} blocks on top of {}", count, start_number);
        self.wait_for_indexer(start_number + count)
    }

    /// Mines `step` blocks at a time until `tx_hash` is committed.
    pub fn mine_until_committed(&self, tx_hash: &H256, step: u64) -> Result<()> {
        let timeout = self.config.readiness.ready_timeout;
        let start = Instant::now();
        loop {
            self.mine(step)?;
            let status = self
                .rpc
                .get_transaction(tx_hash.clone())?
                .map(|tx| tx.tx_status.status);
            match status {
                Some(Status::Committed) => {
                    info!("Transaction {:#x} committed", tx_hash);
                    return Ok(());
                }
                Some(Status::Rejected) => return Err(Error::TransactionRejected(tx_hash.clone())),
                _ => {}
            }
            if start.elapsed() >= timeout {
                return Err(Error::timeout(
                    format!("transaction {tx_hash:#x} to commit"),
                    start.elapsed(),
                    None,
                ));
            }
        }
    }

    /// Submits `tx` and checks the node accepted it under the hash it was
    /// built with.
    pub fn send_transaction(&self, tx: &TxSkeleton) -> Result<H256> {
        let tx = tx.build();
        let expected: H256 = tx.hash().unpack();
        let actual = self.rpc.send_transaction(tx.data())?;
        if actual != expected {
            return Err(Error::UnexpectedTxHash { expected, actual });
        }
        info!("Sent transaction {:#x}", actual);
        Ok(actual)
    }

    /// Stops the node, if this `Env` launched one.
    pub fn stop(&mut self) {
        if let Some(mut node) = self.node.take() {
            node.cancel();
        }
    }
}

impl Drop for Env {
    fn drop(&mut self) {
        self.stop();
    }
}
