//! Transaction assembly.

mod builder;
mod iterator;

pub use builder::{CapacityTransferBuilder, FeeRate};
pub use iterator::{IndexerCellIterator, LiveCell, LiveCellIterator, VecCellIterator};

use crate::error::{Error, Result};
use crate::script::ScriptGroup;
use ckb_types::{
    bytes::Bytes,
    core::{Capacity, TransactionBuilder, TransactionView},
    packed::{CellDep, CellInput, CellOutput, OutPoint, Script, WitnessArgs},
    prelude::*,
};

/// An input together with the cell it spends.
#[derive(Clone, Debug)]
pub struct ResolvedInput {
    pub input: CellInput,
    pub output: CellOutput,
    pub data: Bytes,
}

impl ResolvedInput {
    pub fn out_point(&self) -> OutPoint {
        self.input.previous_output()
    }

    pub fn lock(&self) -> Script {
        self.output.lock()
    }
}

/// A mutable transaction whose inputs carry their resolved cells.
#[derive(Clone, Debug, Default)]
pub struct TxSkeleton {
    cell_deps: Vec<CellDep>,
    inputs: Vec<ResolvedInput>,
    outputs: Vec<CellOutput>,
    outputs_data: Vec<Bytes>,
    witnesses: Vec<Bytes>,
}

impl TxSkeleton {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `cell_dep` unless an identical one is already present.
    pub fn add_cell_dep(&mut self, cell_dep: CellDep) {
        if !self.cell_deps.contains(&cell_dep) {
            self.cell_deps.push(cell_dep);
        }
    }

    pub fn add_input(&mut self, cell: LiveCell) -> usize {
        self.inputs.push(ResolvedInput {
            input: CellInput::new(cell.out_point, 0),
            output: cell.output,
            data: cell.data,
        });
        self.inputs.len() - 1
    }

    pub fn add_output(&mut self, output: CellOutput, data: Bytes) -> usize {
        self.outputs.push(output);
        self.outputs_data.push(data);
        self.outputs.len() - 1
    }

    pub fn set_output_capacity(&mut self, index: usize, capacity: u64) {
        if let Some(output) = self.outputs.get_mut(index) {
            *output = output.clone().as_builder().capacity(capacity.pack()).build();
        }
    }

    pub fn cell_deps(&self) -> &[CellDep] {
        &self.cell_deps
    }

    pub fn inputs(&self) -> &[ResolvedInput] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[CellOutput] {
        &self.outputs
    }

    pub fn witnesses(&self) -> &[Bytes] {
        &self.witnesses
    }

    pub fn witness(&self, index: usize) -> Option<&Bytes> {
        self.witnesses.get(index)
    }

    /// Replaces the witness at `index`, padding with empty witnesses as needed.
    pub fn set_witness(&mut self, index: usize, witness: Bytes) {
        if self.witnesses.len() <= index {
            self.witnesses.resize(index + 1, Bytes::new());
        }
        self.witnesses[index] = witness;
    }

    /// Sets the `lock` field of the `WitnessArgs` at `index`, creating the
    /// `WitnessArgs` if the slot is empty.
    pub fn set_witness_lock(&mut self, index: usize, lock: Bytes) -> Result<()> {
        let builder = match self.witnesses.get(index) {
            Some(witness) if !witness.is_empty() => WitnessArgs::from_slice(witness)
                .map_err(|err| Error::InvalidWitness(format!("witness {index}: {err}")))?
                .as_builder(),
            _ => WitnessArgs::new_builder(),
        };
        let witness = builder.lock(Some(lock).pack()).build();
        self.set_witness(index, witness.as_bytes());
        Ok(())
    }

    /// Groups inputs by lock script in first-seen order.
    pub fn script_groups(&self) -> Vec<ScriptGroup> {
        let mut groups: Vec<ScriptGroup> = Vec::new();
        for (index, input) in self.inputs.iter().enumerate() {
            let lock = input.lock();
            match groups.iter_mut().find(|group| group.script == lock) {
                Some(group) => group.input_indices.push(index),
                None => groups.push(ScriptGroup::new(lock, index)),
            }
        }
        groups
    }

    pub fn input_capacity(&self) -> Result<u64> {
        sum_capacity(self.inputs.iter().map(|input| &input.output))
    }

    pub fn output_capacity(&self) -> Result<u64> {
        sum_capacity(self.outputs.iter())
    }

    pub fn build(&self) -> TransactionView {
        TransactionBuilder::default()
            .cell_deps(self.cell_deps.iter().cloned())
            .inputs(self.inputs.iter().map(|input| input.input.clone()))
            .outputs(self.outputs.iter().cloned())
            .outputs_data(self.outputs_data.iter().map(|data| data.pack()))
            .witnesses(self.witnesses.iter().map(|witness| witness.pack()))
            .build()
    }
}

fn sum_capacity<'a, I>(outputs: I) -> Result<u64>
where
    I: Iterator<Item = &'a CellOutput>,
{
    outputs
        .map(|output| Capacity::shannons(output.capacity().unpack()))
        .try_fold(Capacity::zero(), |total, capacity| total.safe_add(capacity))
        .map(|total| total.as_u64())
        .map_err(|err| Error::Capacity(err.to_string()))
}
