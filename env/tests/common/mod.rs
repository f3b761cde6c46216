#![allow(dead_code)]

use ckb_sdk_examples_env::{Error, HarnessConfig, NodeProcess, ReadinessConfig};
use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Once};
use std::thread::{self, sleep};
use std::time::Duration;

pub fn init_logger() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        if let Ok(guard) = ckb_logger_service::init_for_test("debug") {
            // keep the logger alive for the whole test binary
            std::mem::forget(guard);
        }
    });
}

/// Writes an executable shell script into `dir`.
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Whether `err` is the ETXTBSY a freshly written script gives while another
/// test's fork still holds it open.
pub fn is_text_busy(err: &Error) -> bool {
    matches!(err, Error::Launch { source, .. } if source.raw_os_error() == Some(26))
}

/// Starts `node`, retrying while the script is busy.
pub fn start(node: &mut NodeProcess) {
    for _ in 0..20 {
        match node.start() {
            Err(err) if is_text_busy(&err) => sleep(Duration::from_millis(50)),
            result => return result.unwrap(),
        }
    }
    panic!("script stayed busy");
}

pub fn config(root: &Path, port: u16, readiness: ReadinessConfig) -> HarnessConfig {
    HarnessConfig {
        root_dir: root.to_path_buf(),
        node_script: root.join("bin").join("ckb-node.sh"),
        hashes_path: root.join("var").join("hashes.json"),
        rpc_url: format!("http://127.0.0.1:{port}").parse().unwrap(),
        miner_private_key: None,
        miner_lock_arg: None,
        alice_lock_arg: None,
        readiness,
    }
}

pub fn fast() -> ReadinessConfig {
    ReadinessConfig::default()
        .tcp_deadline(Duration::from_millis(500))
        .tcp_retry_delay(Duration::from_millis(20))
        .poll_interval(Duration::from_millis(20))
        .ready_timeout(Duration::from_secs(10))
        .request_timeout(Duration::from_secs(2))
        .kill_grace(Duration::from_secs(2))
}

pub fn hash(n: u64) -> String {
    format!("0x{n:064x}")
}

pub fn indexer_tip(number: u64) -> Value {
    json!({ "block_hash": hash(number), "block_number": format!("{number:#x}") })
}

pub fn header(number: u64) -> Value {
    json!({
        "compact_target": "0x20010000",
        "dao": "0x18a2f6e8d3b1a12e0f9e5b0b3e9a2700e4c1e1b1a5cb5200006c3a1b3a4ffe06",
        "epoch": "0x3e80001000000",
        "extra_hash": hash(0),
        "hash": hash(number),
        "nonce": "0x0",
        "number": format!("{number:#x}"),
        "parent_hash": hash(number.saturating_sub(1)),
        "proposals_hash": hash(0),
        "timestamp": "0x18c1a2b3c4d",
        "transactions_root": hash(0),
        "version": "0x0"
    })
}

pub fn tx_status(status: &str) -> Value {
    json!({
        "transaction": null,
        "cycles": null,
        "tx_status": { "status": status, "block_hash": null, "reason": null }
    })
}

type Handler = Box<dyn FnMut(&str, &Value) -> Value + Send>;

/// An in-process JSON-RPC server. `handler` gets the method name and params
/// of each request and returns the response object without `jsonrpc` and
/// `id`, e.g. `{"result": ...}` or `{"error": ...}`.
pub struct FakeNode {
    pub port: u16,
    calls: Arc<Mutex<Vec<(String, Value)>>>,
}

impl FakeNode {
    pub fn spawn<F>(handler: F) -> Self
    where
        F: FnMut(&str, &Value) -> Value + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&calls);
        let mut handler: Handler = Box::new(handler);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                let _ = serve(stream, &recorded, &mut handler);
            }
        });
        FakeNode { port, calls }
    }

    /// Number of JSON-RPC requests served.
    pub fn requests(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Params of every call to `method`, in order.
    pub fn calls(&self, method: &str) -> Vec<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| name == method)
            .map(|(_, params)| params.clone())
            .collect()
    }
}

fn serve(
    stream: TcpStream,
    calls: &Mutex<Vec<(String, Value)>>,
    handler: &mut Handler,
) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut content_length = 0;
    loop {
        let mut line = String::new();
        // connections from the TCP phase close without sending anything
        if reader.read_line(&mut line)? == 0 {
            return Ok(());
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }
    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body)?;
    let request: Value = serde_json::from_slice(&body)?;
    let method = request["method"].as_str().unwrap_or_default().to_string();
    let params = request["params"].clone();

    let mut response = handler(&method, &params);
    calls.lock().unwrap().push((method, params));
    response["jsonrpc"] = json!("2.0");
    response["id"] = request["id"].clone();
    let body = response.to_string();
    let mut stream = stream;
    write!(
        stream,
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    )?;
    stream.flush()
}
