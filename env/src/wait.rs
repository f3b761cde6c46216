//! Bounded polling helpers.

use crate::config::ReadinessConfig;
use crate::error::{Error, Result};
use ckb_logger::{debug, trace};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::thread::sleep;
use std::time::{Duration, Instant};

/// Evaluates `predicate` every `interval` until it returns `Ok(true)` or
/// `timeout` elapses.
///
/// An `Err` from the predicate counts as "not ready yet"; the most recent one
/// is carried as the cause of the returned `Error::Timeout`. The sleep between
/// evaluations never overshoots the deadline, so a timeout is reported no
/// later than `timeout + interval`.
pub fn wait_until<F>(
    what: &str,
    timeout: Duration,
    interval: Duration,
    mut predicate: F,
) -> Result<()>
where
    F: FnMut() -> Result<bool>,
{
    let start = Instant::now();
    let deadline = start + timeout;
    let mut cause = None;
    loop {
        let now = Instant::now();
        if now >= deadline {
            return Err(Error::timeout(what, now - start, cause));
        }
        match predicate() {
            Ok(true) => {
                debug!("{} is ready after {:?}", what, start.elapsed());
                return Ok(());
            }
            Ok(false) => trace!("{} is not ready yet", what),
            Err(err) => {
                trace!("{} is not ready yet: {}", what, err);
                cause = Some(err);
            }
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        sleep(interval.min(remaining));
    }
}

/// Retries a TCP connect to `host:port` until it succeeds or the budget in
/// `config` runs out.
pub fn wait_for_tcp(host: &str, port: u16, config: &ReadinessConfig) -> Result<()> {
    let target = format!("{host}:{port}");
    let start = Instant::now();
    loop {
        match connect_once(host, port, config.tcp_connect_timeout) {
            Ok(addr) => {
                debug!("Connected to {} ({}) after {:?}", target, addr, start.elapsed());
                return Ok(());
            }
            Err(err) => trace!("Connect to {} failed: {}", target, err),
        }
        if start.elapsed() + config.tcp_retry_delay >= config.tcp_deadline {
            return Err(Error::RpcUnavailable(target));
        }
        sleep(config.tcp_retry_delay);
    }
}

fn connect_once(host: &str, port: u16, timeout: Duration) -> std::io::Result<SocketAddr> {
    let mut last_err = None;
    for addr in (host, port).to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(_) => return Ok(addr),
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::NotFound, "host resolved to no address")
    }))
}
