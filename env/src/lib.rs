//! Harness for running the CKB SDK examples against a local dev chain.
//!
//! [`Env::start`] launches `bin/ckb-node.sh`, waits until the RPC port accepts
//! connections and the indexer reports a tip, and tears the node down again
//! when dropped.

pub mod config;
pub mod dev_chain;
pub mod error;
pub mod hashes;
mod node;
pub mod process;
pub mod readiness;
pub mod rpc;
pub mod script;
pub mod tx;
pub mod wait;

pub use config::{HarnessConfig, ReadinessConfig};
pub use dev_chain::DevChain;
pub use error::{Error, Result};
pub use node::Env;
pub use process::{KillHandle, NodeProcess};
pub use rpc::{RpcClient, RpcError};
