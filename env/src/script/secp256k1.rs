//! The secp256k1 blake160 sighash-all lock.

use super::{ScriptGroup, ScriptHandler, ScriptSigner, SignContext};
use crate::error::{Error, Result};
use crate::tx::TxSkeleton;
use ckb_crypto::secp::{Privkey, Pubkey};
use ckb_hash::{blake2b_256, new_blake2b};
use ckb_types::{
    bytes::Bytes,
    packed::{CellDep, WitnessArgs},
    prelude::*,
    H256,
};

pub const SIGNATURE_SIZE: usize = 65;

/// `blake2b_256(compressed pubkey)[..20]`, the lock args of a key.
pub fn blake160(pubkey: &Pubkey) -> Bytes {
    Bytes::from(blake2b_256(pubkey.serialize())[..20].to_vec())
}

/// Reserves the signature slot and adds the dep group.
pub struct Secp256k1Handler {
    cell_dep: CellDep,
}

impl Secp256k1Handler {
    pub fn new(cell_dep: CellDep) -> Self {
        Secp256k1Handler { cell_dep }
    }
}

impl ScriptHandler for Secp256k1Handler {
    fn build_transaction(&self, tx: &mut TxSkeleton, group: &ScriptGroup) -> Result<bool> {
        tx.add_cell_dep(self.cell_dep.clone());
        tx.set_witness_lock(group.first_input(), Bytes::from(vec![0u8; SIGNATURE_SIZE]))?;
        Ok(true)
    }
}

/// Signs groups whose lock args match one of its keys.
pub struct Secp256k1Signer {
    keys: Vec<(Bytes, Privkey)>,
}

impl Secp256k1Signer {
    pub fn new(keys: Vec<Privkey>) -> Result<Self> {
        let keys = keys
            .into_iter()
            .map(|key| -> Result<(Bytes, Privkey)> { Ok((blake160(&key.pubkey()?), key)) })
            .collect::<Result<_>>()?;
        Ok(Secp256k1Signer { keys })
    }

    fn key_for(&self, args: &[u8]) -> Option<&Privkey> {
        self.keys
            .iter()
            .find(|(lock_arg, _)| &lock_arg[..] == args)
            .map(|(_, key)| key)
    }
}

impl ScriptSigner for Secp256k1Signer {
    fn sign_transaction(
        &self,
        tx: &mut TxSkeleton,
        group: &ScriptGroup,
        _context: &SignContext,
    ) -> Result<bool> {
        let key = match self.key_for(&group.script.args().raw_data()) {
            Some(key) => key,
            None => return Ok(false),
        };
        let message = sighash_all_message(tx, group)?;
        let signature = key.sign_recoverable(&message)?;
        tx.set_witness_lock(group.first_input(), Bytes::from(signature.serialize()))?;
        Ok(true)
    }
}

/// The sighash-all message of `group`: the tx hash followed by every witness
/// of the group and every witness past the inputs, each prefixed by its u64
/// LE length. The first witness is hashed with a zeroed signature slot.
pub fn sighash_all_message(tx: &TxSkeleton, group: &ScriptGroup) -> Result<H256> {
    let first = group.first_input();
    let first_witness = tx
        .witness(first)
        .filter(|witness| !witness.is_empty())
        .ok_or_else(|| Error::InvalidWitness(format!("witness {first} is empty")))?;
    let zeroed = WitnessArgs::from_slice(first_witness)
        .map_err(|err| Error::InvalidWitness(format!("witness {first}: {err}")))?
        .as_builder()
        .lock(Some(Bytes::from(vec![0u8; SIGNATURE_SIZE])).pack())
        .build()
        .as_bytes();

    let tx_hash = tx.build().hash();
    let mut blake2b = new_blake2b();
    blake2b.update(tx_hash.as_slice());
    let mut hash_witness = |witness: &[u8]| {
        blake2b.update(&(witness.len() as u64).to_le_bytes());
        blake2b.update(witness);
    };
    hash_witness(&zeroed);
    for index in group.input_indices.iter().skip(1) {
        hash_witness(tx.witness(*index).map(|w| &w[..]).unwrap_or_default());
    }
    for witness in tx.witnesses().iter().skip(tx.inputs().len()) {
        hash_witness(witness);
    }

    let mut message = [0u8; 32];
    blake2b.finalize(&mut message);
    Ok(H256::from(message))
}
