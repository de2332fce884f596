//! Shared test utilities for Brook integration tests.
//!
//! Import via `mod common;` in integration test files:
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use brook::Brook;

/// Fixed settling delay given to subscribers after a publish.
#[allow(dead_code)]
pub const SETTLE: Duration = Duration::from_millis(500);

/// Create a shared `Brook` with default settings.
#[allow(dead_code)]
pub fn new_shared_brook() -> Arc<Brook> {
    Arc::new(Brook::builder().build().expect("failed to build brook"))
}

/// A key no other test in this process uses.
#[allow(dead_code)]
pub fn unique_key(prefix: &str) -> String {
    static NEXT: AtomicU64 = AtomicU64::new(0);
    format!("{prefix}_StreamTest_{}", NEXT.fetch_add(1, Ordering::Relaxed))
}

/// Poll `cond` until it holds or `SETTLE` elapses.
#[allow(dead_code)]
pub fn settle(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + SETTLE;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}
