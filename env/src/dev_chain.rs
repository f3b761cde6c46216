//! Scripts and cell deps of the dev chain genesis.

use crate::error::{Error, Result};
use crate::hashes::{DevChainHashes, NetworkHashes, SystemCell};
use ckb_crypto::secp::Privkey;
use ckb_types::{
    bytes::Bytes,
    core::{DepType, ScriptHashType},
    packed::{self, CellDep, OutPoint, Script},
    prelude::*,
    H256,
};
use std::path::Path;
use std::str::FromStr;

/// Index of the secp256k1 blake160 sighash-all cell in `system_cells`.
pub const SECP256K1_SYSTEM_CELL: usize = 0;
/// Index of the secp256k1 dep group in `dep_groups`.
pub const SECP256K1_DEP_GROUP: usize = 0;
/// Index of the capacity-diff lock cell in `system_cells`.
pub const CAPACITY_DIFF_SYSTEM_CELL: usize = 4;

#[derive(Clone, Debug)]
pub struct DevChain {
    hashes: NetworkHashes,
}

impl DevChain {
    pub fn load<P: AsRef<Path>>(hashes_path: P) -> Result<Self> {
        let hashes = DevChainHashes::load(hashes_path)?;
        Ok(Self::new(hashes.dev()?.clone()))
    }

    pub fn new(hashes: NetworkHashes) -> Self {
        DevChain { hashes }
    }

    pub fn hashes(&self) -> &NetworkHashes {
        &self.hashes
    }

    /// Code hash of the secp256k1 lock, always referenced by type.
    pub fn secp256k1_code_hash(&self) -> Result<H256> {
        self.system_cell(SECP256K1_SYSTEM_CELL)?
            .type_hash
            .clone()
            .ok_or(Error::MissingSystemCell(SECP256K1_SYSTEM_CELL))
    }

    pub fn secp256k1_lock(&self, args: Bytes) -> Result<Script> {
        Ok(build_script(
            &self.secp256k1_code_hash()?,
            ScriptHashType::Type,
            args,
        ))
    }

    pub fn secp256k1_cell_dep(&self) -> Result<CellDep> {
        let group = self
            .hashes
            .dep_groups
            .get(SECP256K1_DEP_GROUP)
            .ok_or(Error::MissingDepGroup(SECP256K1_DEP_GROUP))?;
        Ok(build_cell_dep(&group.tx_hash, group.index, DepType::DepGroup))
    }

    /// Script of `system_cells[index]`: by type hash when the cell has one,
    /// by data hash otherwise.
    pub fn system_script(&self, index: usize, args: Bytes) -> Result<Script> {
        let cell = self.system_cell(index)?;
        Ok(match &cell.type_hash {
            Some(type_hash) => build_script(type_hash, ScriptHashType::Type, args),
            None => build_script(&cell.data_hash, ScriptHashType::Data1, args),
        })
    }

    pub fn system_cell_dep(&self, index: usize) -> Result<CellDep> {
        let cell = self.system_cell(index)?;
        Ok(build_cell_dep(&cell.tx_hash, cell.index, DepType::Code))
    }

    pub fn capacity_diff_lock(&self, args: Bytes) -> Result<Script> {
        self.system_script(CAPACITY_DIFF_SYSTEM_CELL, args)
    }

    pub fn capacity_diff_cell_dep(&self) -> Result<CellDep> {
        self.system_cell_dep(CAPACITY_DIFF_SYSTEM_CELL)
    }

    fn system_cell(&self, index: usize) -> Result<&SystemCell> {
        self.hashes
            .system_cells
            .get(index)
            .ok_or(Error::MissingSystemCell(index))
    }
}

fn build_script(code_hash: &H256, hash_type: ScriptHashType, args: Bytes) -> Script {
    let hash_type: packed::Byte = hash_type.into();
    Script::new_builder()
        .code_hash(code_hash.pack())
        .hash_type(hash_type)
        .args(args.pack())
        .build()
}

fn build_cell_dep(tx_hash: &H256, index: u32, dep_type: DepType) -> CellDep {
    let dep_type: packed::Byte = dep_type.into();
    CellDep::new_builder()
        .out_point(OutPoint::new(tx_hash.pack(), index))
        .dep_type(dep_type)
        .build()
}

/// Decodes `0x`-prefixed (or bare) hex.
pub fn parse_hex(input: &str) -> Result<Bytes> {
    let hex = input.strip_prefix("0x").unwrap_or(input);
    if hex.len() % 2 != 0 {
        return Err(Error::Hex(format!("odd length: {input}")));
    }
    let mut bytes = vec![0u8; hex.len() / 2];
    faster_hex::hex_decode(hex.as_bytes(), &mut bytes)
        .map_err(|err| Error::Hex(format!("{input}: {err}")))?;
    Ok(Bytes::from(bytes))
}

/// Parses a 32-byte secp256k1 private key in hex.
pub fn parse_privkey(input: &str) -> Result<Privkey> {
    let hex = input.strip_prefix("0x").unwrap_or(input);
    let key = H256::from_str(hex).map_err(|err| Error::Hex(format!("private key: {err}")))?;
    Ok(Privkey::from(key))
}
