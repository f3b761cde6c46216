use thiserror::Error;

/// RPC call failure.
#[derive(Error, Debug)]
pub enum RpcError {
    /// Transport level failure, including connection refused and request timeout.
    #[error("http request error: {0}")]
    Http(#[from] reqwest::Error),
    /// The response could not be decoded.
    #[error("data parse error: {0}")]
    Parse(#[from] serde_json::Error),
    /// The node answered with a JSON-RPC error object.
    #[error("jsonrpc error: {0}")]
    JsonRpc(jsonrpc_core::types::error::Error),
}
