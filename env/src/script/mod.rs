//! Per-script extension points for building and signing transactions.

pub mod secp256k1;

use crate::error::{Error, Result};
use crate::rpc::RpcClient;
use crate::tx::TxSkeleton;
use ckb_types::{
    packed::{CellOutput, OutPoint, Script},
    prelude::*,
    H256,
};
use std::collections::HashMap;

/// A lock script and the inputs it guards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptGroup {
    pub script: Script,
    pub input_indices: Vec<usize>,
}

impl ScriptGroup {
    pub fn new(script: Script, first_input: usize) -> Self {
        ScriptGroup {
            script,
            input_indices: vec![first_input],
        }
    }

    pub fn code_hash(&self) -> H256 {
        self.script.code_hash().unpack()
    }

    /// The witness slot that carries the group's signature.
    pub fn first_input(&self) -> usize {
        self.input_indices[0]
    }
}

/// Prepares a transaction for a script group: cell deps, witness placeholders.
pub trait ScriptHandler {
    /// Returns `true` once the group is handled.
    fn build_transaction(&self, tx: &mut TxSkeleton, group: &ScriptGroup) -> Result<bool>;
}

/// Fills in the witness of a script group.
pub trait ScriptSigner {
    /// Returns `false` when this signer cannot sign the group.
    fn sign_transaction(
        &self,
        tx: &mut TxSkeleton,
        group: &ScriptGroup,
        context: &SignContext,
    ) -> Result<bool>;
}

/// Resolves the cell an input spends.
pub trait InputCellProvider {
    fn input_cell(&self, out_point: &OutPoint) -> Result<CellOutput>;
}

impl InputCellProvider for RpcClient {
    fn input_cell(&self, out_point: &OutPoint) -> Result<CellOutput> {
        self.get_live_cell(out_point.clone(), false)?
            .cell
            .map(|cell| cell.output.into())
            .ok_or_else(|| Error::UnknownInput(out_point.to_string()))
    }
}

/// The cells already resolved in a skeleton, detached from it so signers can
/// mutate the skeleton while reading them.
#[derive(Clone, Debug, Default)]
pub struct ResolvedCells(HashMap<OutPoint, CellOutput>);

impl From<&TxSkeleton> for ResolvedCells {
    fn from(tx: &TxSkeleton) -> Self {
        ResolvedCells(
            tx.inputs()
                .iter()
                .map(|input| (input.out_point(), input.output.clone()))
                .collect(),
        )
    }
}

impl InputCellProvider for ResolvedCells {
    fn input_cell(&self, out_point: &OutPoint) -> Result<CellOutput> {
        self.0
            .get(out_point)
            .cloned()
            .ok_or_else(|| Error::UnknownInput(out_point.to_string()))
    }
}

/// What signers may consult besides the skeleton.
pub struct SignContext<'a> {
    provider: &'a dyn InputCellProvider,
}

impl<'a> SignContext<'a> {
    pub fn new(provider: &'a dyn InputCellProvider) -> Self {
        SignContext { provider }
    }

    pub fn input_cell(&self, out_point: &OutPoint) -> Result<CellOutput> {
        self.provider.input_cell(out_point)
    }
}

struct ScriptEntry {
    handler: Box<dyn ScriptHandler>,
    signer: Box<dyn ScriptSigner>,
}

/// Handler and signer pairs keyed by script code hash.
#[derive(Default)]
pub struct ScriptRegistry {
    entries: HashMap<H256, ScriptEntry>,
}

impl ScriptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the pair for `code_hash`, replacing any previous pair.
    pub fn register<H, S>(&mut self, code_hash: H256, handler: H, signer: S)
    where
        H: ScriptHandler + 'static,
        S: ScriptSigner + 'static,
    {
        self.entries.insert(
            code_hash,
            ScriptEntry {
                handler: Box::new(handler),
                signer: Box::new(signer),
            },
        );
    }

    pub fn handler(&self, code_hash: &H256) -> Option<&dyn ScriptHandler> {
        self.entries.get(code_hash).map(|entry| entry.handler.as_ref())
    }

    pub fn signer(&self, code_hash: &H256) -> Option<&dyn ScriptSigner> {
        self.entries.get(code_hash).map(|entry| entry.signer.as_ref())
    }

    /// Runs the handler of every group in `tx`.
    pub fn build_transaction(&self, tx: &mut TxSkeleton) -> Result<()> {
        for group in tx.script_groups() {
            let code_hash = group.code_hash();
            let handled = match self.handler(&code_hash) {
                Some(handler) => handler.build_transaction(tx, &group)?,
                None => false,
            };
            if !handled {
                return Err(Error::UnhandledScript(code_hash));
            }
        }
        Ok(())
    }

    /// Runs the signer of every group in `tx`.
    pub fn sign_transaction(&self, tx: &mut TxSkeleton, context: &SignContext) -> Result<()> {
        for group in tx.script_groups() {
            let code_hash = group.code_hash();
            let signed = match self.signer(&code_hash) {
                Some(signer) => signer.sign_transaction(tx, &group, context)?,
                None => false,
            };
            if !signed {
                return Err(Error::UnsignedGroup(code_hash));
            }
        }
        Ok(())
    }
}
