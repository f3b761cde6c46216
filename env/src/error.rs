//! The error type for the examples harness.

use crate::rpc::RpcError;
use ckb_types::H256;
use std::path::PathBuf;
use std::time::Duration;
use std::{fmt, io};
use thiserror::Error;

/// A specialized `Result` for harness operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A list specifying general categories of harness error.
#[derive(Error, Debug)]
pub enum Error {
    /// The node process could not be spawned.
    #[error("failed to launch {}: {source}", path.display())]
    Launch {
        /// Path of the executable.
        path: PathBuf,
        /// Underlying spawn error.
        #[source]
        source: io::Error,
    },
    /// The RPC port never accepted a TCP connection.
    #[error("rpc is not available at {0}")]
    RpcUnavailable(String),
    /// The node exited before it became ready.
    #[error("node exited before it became ready: {0}")]
    NodeExited(String),
    /// A bounded wait hit its deadline.
    #[error("timed out after {elapsed:?} waiting for {what}{}", Cause(.cause))]
    Timeout {
        /// What was being waited for.
        what: String,
        /// Time spent before giving up.
        elapsed: Duration,
        /// The last failure observed while waiting.
        #[source]
        cause: Option<Box<Error>>,
    },
    /// Invalid harness configuration.
    #[error("config error: {0}")]
    Config(String),
    /// A required environment variable is absent.
    #[error("environment variable {0} is not set")]
    MissingEnv(&'static str),
    /// The hashes file has no entry for the network.
    #[error("network {0} not found in hashes")]
    MissingNetwork(String),
    /// The hashes file lacks the requested system cell.
    #[error("system cell {0} not found or has no usable hash")]
    MissingSystemCell(usize),
    /// The hashes file lacks the requested dep group.
    #[error("dep group {0} not found in hashes")]
    MissingDepGroup(usize),
    /// Malformed hex input.
    #[error("invalid hex: {0}")]
    Hex(String),
    /// Underlying IO error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// Underlying JSON error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    /// RPC call failure.
    #[error(transparent)]
    Rpc(#[from] RpcError),
    /// Signing or key derivation failure.
    #[error("crypto error: {0}")]
    Crypto(#[from] ckb_crypto::secp::Error),
    /// Capacity overflow or occupied capacity calculation failure.
    #[error("capacity error: {0}")]
    Capacity(String),
    /// The collected live cells cannot cover outputs, change and fee.
    #[error("insufficient capacity: required {required}, available {available}")]
    InsufficientCapacity {
        /// Shannons needed.
        required: u64,
        /// Shannons collected.
        available: u64,
    },
    /// No handler is registered for a script group.
    #[error("no script handler registered for code hash {0:#x}")]
    UnhandledScript(H256),
    /// No signer accepted a script group.
    #[error("no signer accepted the script group with code hash {0:#x}")]
    UnsignedGroup(H256),
    /// An input cell could not be resolved.
    #[error("input cell {0} is not live")]
    UnknownInput(String),
    /// The witness in a slot is not a valid `WitnessArgs`.
    #[error("invalid witness: {0}")]
    InvalidWitness(String),
    /// The node rejected a transaction.
    #[error("transaction {0:#x} was rejected")]
    TransactionRejected(H256),
    /// The node accepted a transaction under a different hash than the one built.
    #[error("node reported {actual:#x} for transaction {expected:#x}")]
    UnexpectedTxHash {
        /// Hash of the transaction as built locally.
        expected: H256,
        /// Hash returned by `send_transaction`.
        actual: H256,
    },
}

impl Error {
    /// Builds a `Timeout` error.
    pub fn timeout<S: Into<String>>(what: S, elapsed: Duration, cause: Option<Error>) -> Self {
        Error::Timeout {
            what: what.into(),
            elapsed,
            cause: cause.map(Box::new),
        }
    }

    /// The last failure carried by a `Timeout`, if any.
    pub fn timeout_cause(&self) -> Option<&Error> {
        match self {
            Error::Timeout { cause, .. } => cause.as_deref(),
            _ => None,
        }
    }
}

struct Cause<'a>(&'a Option<Box<Error>>);

impl fmt::Display for Cause<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.0 {
            Some(cause) => write!(f, ", last error: {cause}"),
            None => Ok(()),
        }
    }
}
