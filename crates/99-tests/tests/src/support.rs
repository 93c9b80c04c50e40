//! Shared helpers for the end-to-end scenarios.

use std::time::{Duration, Instant};

/// Polls `check` until it returns true or the deadline passes.
pub fn wait_for(what: &str, check: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if check() {
            return;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    panic!("timed out waiting for {what}");
}

/// Sleeps long enough for in-flight mailbox traffic to drain.
pub fn settle() {
    std::thread::sleep(Duration::from_millis(50));
}
