//! Harness configuration, built once from the environment and `.env`.

use crate::error::{Error, Result};
use ckb_logger::{debug, info};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// The RPC port used when `CKB_RPC_URL` does not specify one.
pub const DEFAULT_RPC_PORT: u16 = 8114;
/// The RPC URL used when `CKB_RPC_URL` is unset.
pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8114";

pub const ENV_RPC_URL: &str = "CKB_RPC_URL";
pub const ENV_NODE_SCRIPT: &str = "CKB_NODE_SCRIPT";
pub const ENV_MINER_PRIVATE_KEY: &str = "MINER_PRIVATE_KEY";
pub const ENV_MINER_LOCK_ARG: &str = "MINER_LOCK_ARG";
pub const ENV_ALICE_LOCK_ARG: &str = "ALICE_LOCK_ARG";

/// Timing knobs for starting, probing and stopping the node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadinessConfig {
    /// Timeout of a single TCP connect attempt.
    pub tcp_connect_timeout: Duration,
    /// Delay between TCP connect attempts.
    pub tcp_retry_delay: Duration,
    /// Total budget for the TCP reachability phase.
    pub tcp_deadline: Duration,
    /// Interval between readiness polls.
    pub poll_interval: Duration,
    /// Ceiling for the application readiness phase, also used by mining waits.
    pub ready_timeout: Duration,
    /// Per-request timeout of the RPC client.
    pub request_timeout: Duration,
    /// How long `cancel` waits after SIGTERM before sending SIGKILL.
    pub kill_grace: Duration,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        ReadinessConfig {
            tcp_connect_timeout: Duration::from_secs(1),
            tcp_retry_delay: Duration::from_millis(100),
            tcp_deadline: Duration::from_secs(10),
            poll_interval: Duration::from_millis(300),
            ready_timeout: Duration::from_secs(120),
            request_timeout: Duration::from_secs(5),
            kill_grace: Duration::from_secs(5),
        }
    }
}

impl ReadinessConfig {
    pub fn tcp_deadline(mut self, deadline: Duration) -> Self {
        self.tcp_deadline = deadline;
        self
    }

    pub fn tcp_retry_delay(mut self, delay: Duration) -> Self {
        self.tcp_retry_delay = delay;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }
}

/// Everything the harness reads from the outside world.
#[derive(Clone, Debug)]
pub struct HarnessConfig {
    pub root_dir: PathBuf,
    pub node_script: PathBuf,
    pub hashes_path: PathBuf,
    pub rpc_url: Url,
    pub miner_private_key: Option<String>,
    pub miner_lock_arg: Option<String>,
    pub alice_lock_arg: Option<String>,
    pub readiness: ReadinessConfig,
}

impl HarnessConfig {
    /// Loads `<root_dir>/.env` if present, then reads the process environment.
    pub fn load<P: AsRef<Path>>(root_dir: P) -> Result<Self> {
        let root_dir = root_dir.as_ref().to_path_buf();
        let dotenv_path = root_dir.join(".env");
        if dotenv_path.exists() {
            dotenv::from_path(&dotenv_path).map_err(|err| {
                Error::Config(format!("failed to load {}: {}", dotenv_path.display(), err))
            })?;
            info!("Loaded environment from {}", dotenv_path.display());
        } else {
            debug!("No dotenv file at {}", dotenv_path.display());
        }
        Self::from_env(root_dir)
    }

    /// Reads the process environment without touching any dotenv file.
    pub fn from_env(root_dir: PathBuf) -> Result<Self> {
        let rpc_url = env::var(ENV_RPC_URL)
            .ok()
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_RPC_URL.to_string());
        let node_script = env::var_os(ENV_NODE_SCRIPT)
            .map(PathBuf::from)
            .unwrap_or_else(|| root_dir.join("bin").join("ckb-node.sh"));

        Ok(HarnessConfig {
            node_script,
            hashes_path: root_dir.join("var").join("hashes.json"),
            rpc_url: parse_rpc_url(&rpc_url)?,
            miner_private_key: env::var(ENV_MINER_PRIVATE_KEY).ok(),
            miner_lock_arg: env::var(ENV_MINER_LOCK_ARG).ok(),
            alice_lock_arg: env::var(ENV_ALICE_LOCK_ARG).ok(),
            readiness: ReadinessConfig::default(),
            root_dir,
        })
    }

    /// Host and port of the RPC endpoint, port 8114 when the URL omits it.
    pub fn rpc_socket_addr(&self) -> Result<(String, u16)> {
        rpc_socket_addr(&self.rpc_url)
    }

    pub fn require_miner_private_key(&self) -> Result<&str> {
        self.miner_private_key
            .as_deref()
            .ok_or(Error::MissingEnv(ENV_MINER_PRIVATE_KEY))
    }

    pub fn require_miner_lock_arg(&self) -> Result<&str> {
        self.miner_lock_arg
            .as_deref()
            .ok_or(Error::MissingEnv(ENV_MINER_LOCK_ARG))
    }

    pub fn require_alice_lock_arg(&self) -> Result<&str> {
        self.alice_lock_arg
            .as_deref()
            .ok_or(Error::MissingEnv(ENV_ALICE_LOCK_ARG))
    }
}

pub fn parse_rpc_url(raw: &str) -> Result<Url> {
    let url =
        Url::parse(raw).map_err(|err| Error::Config(format!("invalid rpc url {raw}: {err}")))?;
    if url.host_str().is_none() {
        return Err(Error::Config(format!("rpc url {raw} has no host")));
    }
    Ok(url)
}

pub fn rpc_socket_addr(url: &Url) -> Result<(String, u16)> {
    let host = url
        .host_str()
        .ok_or_else(|| Error::Config(format!("rpc url {url} has no host")))?;
    // IPv6 hosts come back bracketed
    let host = host.trim_start_matches('[').trim_end_matches(']');
    Ok((host.to_string(), url.port().unwrap_or(DEFAULT_RPC_PORT)))
}
