use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic JSON-RPC request ids.
#[derive(Debug, Default)]
pub struct IdGenerator {
    state: AtomicU64,
}

impl IdGenerator {
    pub fn new() -> IdGenerator {
        IdGenerator {
            state: AtomicU64::new(1),
        }
    }

    pub fn next(&self) -> u64 {
        self.state.fetch_add(1, Ordering::SeqCst)
    }
}
