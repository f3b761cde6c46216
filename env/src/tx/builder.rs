use super::{LiveCellIterator, TxSkeleton};
use crate::error::{Error, Result};
use crate::script::ScriptRegistry;
use ckb_logger::debug;
use ckb_types::{
    bytes::Bytes,
    core::Capacity,
    packed::{CellOutput, Script},
    prelude::*,
};

/// Shannons per 1000 bytes of serialized transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeeRate(pub u64);

impl FeeRate {
    pub fn fee(self, size: usize) -> Result<u64> {
        (size as u64)
            .checked_mul(self.0)
            .map(|product| product / 1000 + u64::from(product % 1000 != 0))
            .ok_or_else(|| Error::Capacity(format!("fee overflow for {size} bytes")))
    }
}

/// Transfers capacity to fixed outputs, collecting inputs from a cell
/// iterator and returning the remainder to `change_lock`.
pub struct CapacityTransferBuilder {
    outputs: Vec<(CellOutput, Bytes)>,
    change_lock: Script,
    fee_rate: FeeRate,
}

impl CapacityTransferBuilder {
    pub fn new(outputs: Vec<(CellOutput, Bytes)>, change_lock: Script, fee_rate: FeeRate) -> Self {
        CapacityTransferBuilder {
            outputs,
            change_lock,
            fee_rate,
        }
    }

    /// Builds an unsigned, balanced transaction. Every script group must have
    /// a handler in `registry`.
    pub fn build(
        &self,
        cells: &mut dyn LiveCellIterator,
        registry: &ScriptRegistry,
    ) -> Result<TxSkeleton> {
        let mut base = TxSkeleton::new();
        for (index, (output, data)) in self.outputs.iter().enumerate() {
            check_occupied(index, output, data)?;
            base.add_output(output.clone(), data.clone());
        }
        let outputs_capacity = base.output_capacity()?;

        let change = CellOutput::new_builder()
            .lock(self.change_lock.clone())
            .build();
        let change_occupied = change
            .occupied_capacity(Capacity::zero())
            .map_err(|err| Error::Capacity(err.to_string()))?
            .as_u64();
        let mut required = add(outputs_capacity, change_occupied)?;

        loop {
            let cell = match cells.next_cell()? {
                Some(cell) => cell,
                None => {
                    return Err(Error::InsufficientCapacity {
                        required,
                        available: base.input_capacity()?,
                    })
                }
            };
            base.add_input(cell);

            let mut tx = base.clone();
            let change_index = tx.add_output(change.clone(), Bytes::new());
            registry.build_transaction(&mut tx)?;

            let fee = self
                .fee_rate
                .fee(tx.build().data().serialized_size_in_block())?;
            let available = tx.input_capacity()?;
            required = add(add(outputs_capacity, fee)?, change_occupied)?;
            if available >= required {
                let change_capacity = available - outputs_capacity - fee;
                tx.set_output_capacity(change_index, change_capacity);
                debug!(
                    "Balanced transfer with {} inputs, fee {} shannons, change {} shannons",
                    tx.inputs().len(),
                    fee,
                    change_capacity
                );
                return Ok(tx);
            }
        }
    }
}

fn check_occupied(index: usize, output: &CellOutput, data: &Bytes) -> Result<()> {
    let data_capacity =
        Capacity::bytes(data.len()).map_err(|err| Error::Capacity(err.to_string()))?;
    let occupied = output
        .occupied_capacity(data_capacity)
        .map_err(|err| Error::Capacity(err.to_string()))?
        .as_u64();
    let capacity: u64 = output.capacity().unpack();
    if capacity < occupied {
        return Err(Error::Capacity(format!(
            "output {index} holds {capacity} shannons but occupies {occupied}"
        )));
    }
    Ok(())
}

fn add(lhs: u64, rhs: u64) -> Result<u64> {
    lhs.checked_add(rhs)
        .ok_or_else(|| Error::Capacity("capacity overflow".to_string()))
}
