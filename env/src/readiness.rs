//! Turns "the node process is running" into "the node answers RPC".

use crate::config::HarnessConfig;
use crate::error::{Error, Result};
use crate::process::NodeProcess;
use crate::rpc::RpcClient;
use crate::wait::{wait_for_tcp, wait_until};
use ckb_logger::info;
use std::time::Instant;

/// Waits for an already running node at the configured RPC URL.
pub fn wait_for_rpc(config: &HarnessConfig) -> Result<RpcClient> {
    wait_ready(None, config)
}

/// Waits for `node` to become ready. Fails early with `Error::NodeExited` if
/// the process exits with a non-zero status while waiting.
pub fn wait_for_node(node: &mut NodeProcess, config: &HarnessConfig) -> Result<RpcClient> {
    wait_ready(Some(node), config)
}

fn wait_ready(mut node: Option<&mut NodeProcess>, config: &HarnessConfig) -> Result<RpcClient> {
    let readiness = &config.readiness;
    let start = Instant::now();
    let (host, port) = config.rpc_socket_addr()?;
    wait_for_tcp(&host, port, readiness)?;

    let client = RpcClient::with_timeout(config.rpc_url.clone(), readiness.request_timeout)?;
    let mut exited = None;
    let polled = wait_until(
        "indexer tip",
        readiness.ready_timeout,
        readiness.poll_interval,
        || {
            if let Some(node) = node.as_deref_mut() {
                if let Some(status) = node.try_exit_status()? {
                    if !status.success() {
                        exited = Some(status);
                        return Ok(true);
                    }
                }
            }
            Ok(client.get_indexer_tip()?.is_some())
        },
    );
    if let Some(status) = exited {
        return Err(Error::NodeExited(status.to_string()));
    }
    polled?;

    info!(
        "RPC {} is ready after {:?}",
        client.url(),
        start.elapsed()
    );
    Ok(client)
}
