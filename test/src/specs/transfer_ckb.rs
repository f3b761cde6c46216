use super::{miner_registry, Example};
use ckb_logger::info;
use ckb_sdk_examples_env::script::{ResolvedCells, SignContext};
use ckb_sdk_examples_env::tx::{CapacityTransferBuilder, FeeRate, IndexerCellIterator};
use ckb_sdk_examples_env::{Env, Result};
use ckb_types::{
    bytes::Bytes,
    packed::{CellOutput, Script},
    prelude::*,
    H256,
};

/// 100 CKB, in shannons.
pub const TRANSFER_CAPACITY: u64 = 100 * 100_000_000;

/// Shannons per 1000 bytes.
pub const FEE_RATE: FeeRate = FeeRate(1000);

/// Blocks mined between two commit checks.
pub const COMMIT_STEP: u64 = 3;

/// The miner sends 100 CKB to alice.
pub struct TransferCkb;

impl Example for TransferCkb {
    fn name(&self) -> &'static str {
        "transfer_ckb"
    }

    fn run(&self, env: &Env) -> Result<()> {
        let miner_lock = env.miner_lock()?;
        let alice_lock = env.alice_lock()?;
        let tx_hash = transfer(env, miner_lock, alice_lock, TRANSFER_CAPACITY)?;
        // later examples collect the miner's cells again
        env.mine_until_committed(&tx_hash, COMMIT_STEP)?;
        info!(
            "Miner sent {} shannons to alice in {:#x}",
            TRANSFER_CAPACITY, tx_hash
        );
        Ok(())
    }
}

/// Sends `capacity` from the miner to `receiver` and returns the transaction
/// hash.
pub fn transfer(env: &Env, miner_lock: Script, receiver: Script, capacity: u64) -> Result<H256> {
    let registry = miner_registry(env)?;
    let output = CellOutput::new_builder()
        .lock(receiver)
        .capacity(capacity.pack())
        .build();
    let builder =
        CapacityTransferBuilder::new(vec![(output, Bytes::new())], miner_lock.clone(), FEE_RATE);

    let mut cells = IndexerCellIterator::new(env.rpc(), miner_lock);
    let mut tx = builder.build(&mut cells, &registry)?;
    let resolved = ResolvedCells::from(&tx);
    registry.sign_transaction(&mut tx, &SignContext::new(&resolved))?;

    env.send_transaction(&tx)
}
