use super::transfer_ckb::{transfer, COMMIT_STEP, FEE_RATE};
use super::{miner_registry, Example};
use byteorder::{ByteOrder, LittleEndian};
use ckb_logger::info;
use ckb_sdk_examples_env::script::{ScriptGroup, ScriptHandler, ScriptSigner, SignContext};
use ckb_sdk_examples_env::tx::{CapacityTransferBuilder, IndexerCellIterator, TxSkeleton};
use ckb_sdk_examples_env::{Env, Error, Result};
use ckb_types::{
    bytes::Bytes,
    packed::{CellDep, CellOutput},
    prelude::*,
    H256,
};

/// The CapacityDiff lock expects the capacity change of its group as an i64.
pub const CAPACITY_DIFF_WITNESS_SIZE: usize = 8;

const FILL_CAPACITY: u64 = 1000 * 100_000_000;
const SPEND_CAPACITY: u64 = 500 * 100_000_000;

/// Reserves the 8-byte witness lock and adds the CapacityDiff code cell.
pub struct CapacityDiffScriptHandler {
    cell_dep: CellDep,
}

impl CapacityDiffScriptHandler {
    pub fn new(cell_dep: CellDep) -> Self {
        CapacityDiffScriptHandler { cell_dep }
    }
}

impl ScriptHandler for CapacityDiffScriptHandler {
    fn build_transaction(&self, tx: &mut TxSkeleton, group: &ScriptGroup) -> Result<bool> {
        tx.add_cell_dep(self.cell_dep.clone());
        tx.set_witness_lock(
            group.first_input(),
            Bytes::from(vec![0u8; CAPACITY_DIFF_WITNESS_SIZE]),
        )?;
        Ok(true)
    }
}

/// Writes `outputs locked by the group - inputs of the group` into the
/// witness lock. Works for any args.
pub struct CapacityDiffScriptSigner;

impl ScriptSigner for CapacityDiffScriptSigner {
    fn sign_transaction(
        &self,
        tx: &mut TxSkeleton,
        group: &ScriptGroup,
        context: &SignContext,
    ) -> Result<bool> {
        let mut total: i128 = 0;
        for &index in &group.input_indices {
            let out_point = tx.inputs()[index].out_point();
            let capacity: u64 = context.input_cell(&out_point)?.capacity().unpack();
            total -= i128::from(capacity);
        }
        for output in tx.outputs() {
            if output.lock() == group.script {
                let capacity: u64 = output.capacity().unpack();
                total += i128::from(capacity);
            }
        }
        let total = i64::try_from(total)
            .map_err(|_| Error::Capacity(format!("capacity diff {total} overflows i64")))?;

        let mut lock = [0u8; CAPACITY_DIFF_WITNESS_SIZE];
        LittleEndian::write_i64(&mut lock, total);
        tx.set_witness_lock(group.first_input(), Bytes::from(lock.to_vec()))?;
        Ok(true)
    }
}

/// Locks 1000 CKB with the CapacityDiff script, then spends 500 CKB of it
/// back to the miner.
pub struct CustomScript;

impl Example for CustomScript {
    fn name(&self) -> &'static str {
        "custom_script"
    }

    fn run(&self, env: &Env) -> Result<()> {
        let dev_chain = env.dev_chain();
        let custom_lock = dev_chain.capacity_diff_lock(Bytes::new())?;
        let miner_lock = env.miner_lock()?;

        let fill_hash = transfer(env, miner_lock.clone(), custom_lock.clone(), FILL_CAPACITY)?;
        env.mine_until_committed(&fill_hash, COMMIT_STEP)?;

        // A new script only needs its handler and signer registered.
        let mut registry = miner_registry(env)?;
        let custom_code_hash: H256 = custom_lock.code_hash().unpack();
        registry.register(
            custom_code_hash,
            CapacityDiffScriptHandler::new(dev_chain.capacity_diff_cell_dep()?),
            CapacityDiffScriptSigner,
        );

        let output = CellOutput::new_builder()
            .lock(miner_lock)
            .capacity(SPEND_CAPACITY.pack())
            .build();
        let builder = CapacityTransferBuilder::new(
            vec![(output, Bytes::new())],
            custom_lock.clone(),
            FEE_RATE,
        );
        let mut cells = IndexerCellIterator::new(env.rpc(), custom_lock);
        let mut tx = builder.build(&mut cells, &registry)?;
        // input cells are looked up on chain
        registry.sign_transaction(&mut tx, &SignContext::new(env.rpc()))?;

        let tx_hash = env.send_transaction(&tx)?;
        env.mine_until_committed(&tx_hash, COMMIT_STEP)?;
        info!("Spent CapacityDiff cells in {:#x}", tx_hash);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ckb_sdk_examples_env::script::{ResolvedCells, ScriptRegistry};
    use ckb_sdk_examples_env::tx::LiveCell;
    use ckb_types::{
        core::ScriptHashType,
        packed::{self, OutPoint, Script, WitnessArgs},
    };

    fn script(byte: u8) -> Script {
        let hash_type: packed::Byte = ScriptHashType::Type.into();
        Script::new_builder()
            .code_hash(H256::from([byte; 32]).pack())
            .hash_type(hash_type)
            .build()
    }

    fn cell(tx_byte: u8, capacity: u64, lock: Script) -> LiveCell {
        LiveCell {
            out_point: OutPoint::new(H256::from([tx_byte; 32]).pack(), 0),
            output: CellOutput::new_builder()
                .capacity(capacity.pack())
                .lock(lock)
                .build(),
            data: Bytes::new(),
        }
    }

    fn output(capacity: u64, lock: Script) -> CellOutput {
        CellOutput::new_builder()
            .capacity(capacity.pack())
            .lock(lock)
            .build()
    }

    fn witness_lock(tx: &TxSkeleton, index: usize) -> Bytes {
        let witness = WitnessArgs::from_slice(tx.witness(index).unwrap()).unwrap();
        witness.lock().to_opt().unwrap().raw_data()
    }

    fn registry() -> ScriptRegistry {
        let code_hash: H256 = script(4).code_hash().unpack();
        let mut registry = ScriptRegistry::new();
        registry.register(
            code_hash,
            CapacityDiffScriptHandler::new(
                CellDep::new_builder()
                    .out_point(OutPoint::new(H256::from([9u8; 32]).pack(), 5))
                    .build(),
            ),
            CapacityDiffScriptSigner,
        );
        registry
    }

    #[test]
    fn handler_reserves_eight_bytes() {
        let mut tx = TxSkeleton::new();
        tx.add_input(cell(1, 1000, script(4)));
        registry().build_transaction(&mut tx).unwrap();

        assert_eq!(tx.cell_deps().len(), 1);
        assert_eq!(witness_lock(&tx, 0), Bytes::from(vec![0u8; 8]));
    }

    #[test]
    fn signer_writes_the_capacity_diff() {
        let registry = registry();
        let mut tx = TxSkeleton::new();
        tx.add_input(cell(1, 600, script(4)));
        tx.add_input(cell(2, 400, script(4)));
        tx.add_output(output(500, script(7)), Bytes::new());
        tx.add_output(output(490, script(4)), Bytes::new());
        registry.build_transaction(&mut tx).unwrap();

        let resolved = ResolvedCells::from(&tx);
        registry
            .sign_transaction(&mut tx, &SignContext::new(&resolved))
            .unwrap();

        let lock = witness_lock(&tx, 0);
        assert_eq!(LittleEndian::read_i64(&lock), -510);
        assert!(tx.witness(1).map_or(true, |witness| witness.is_empty()));
    }

    #[test]
    fn signer_counts_only_its_own_outputs() {
        let registry = registry();
        let mut tx = TxSkeleton::new();
        tx.add_input(cell(1, 100, script(4)));
        tx.add_output(output(300, script(4)), Bytes::new());
        tx.add_output(output(50, script(5)), Bytes::new());
        registry.build_transaction(&mut tx).unwrap();

        let resolved = ResolvedCells::from(&tx);
        registry
            .sign_transaction(&mut tx, &SignContext::new(&resolved))
            .unwrap();
        assert_eq!(LittleEndian::read_i64(&witness_lock(&tx, 0)), 200);
    }

    #[test]
    fn unknown_input_fails_signing() {
        let registry = registry();
        let mut tx = TxSkeleton::new();
        tx.add_input(cell(1, 100, script(4)));
        registry.build_transaction(&mut tx).unwrap();

        let empty = ResolvedCells::default();
        let err = registry
            .sign_transaction(&mut tx, &SignContext::new(&empty))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownInput(_)), "{err}");
    }
}
