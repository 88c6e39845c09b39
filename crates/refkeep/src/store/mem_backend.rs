use super::backend::{Interference, Snapshot, StorageBackend, StoreOp};
use crate::error::{RefkeepError, Result};
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

/// In-memory storage backend for testing.
///
/// Uses `Mutex` rather than `RefCell` because store futures must be `Send`
/// and may be polled from any runtime worker.
#[derive(Default)]
pub struct MemBackend {
    snapshot: Mutex<Snapshot>,
    simulate_write_error: Mutex<bool>,
    writes_before_failure: Mutex<Option<usize>>,
    failing_groups: Mutex<HashSet<String>>,
    failing_increments: Mutex<bool>,
    latency: Mutex<Option<Duration>>,
}

impl MemBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable write error simulation for testing error handling.
    pub fn set_simulate_write_error(&self, simulate: bool) {
        if let Ok(mut flag) = self.simulate_write_error.lock() {
            *flag = simulate;
        }
    }

    /// Let `count` more commits succeed, then fail every write after them.
    /// Simulates a crash between two commits of a multi-batch operation.
    pub fn fail_writes_after(&self, count: usize) {
        if let Ok(mut remaining) = self.writes_before_failure.lock() {
            *remaining = Some(count);
        }
    }

    /// Make every group query over `name` fail.
    pub fn fail_group_queries(&self, name: &str) {
        if let Ok(mut groups) = self.failing_groups.lock() {
            groups.insert(name.to_string());
        }
    }

    /// Make every counter increment fail while other writes still commit.
    pub fn fail_increments(&self, fail: bool) {
        if let Ok(mut flag) = self.failing_increments.lock() {
            *flag = fail;
        }
    }

    /// Delay every store call by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        if let Ok(mut current) = self.latency.lock() {
            *current = latency;
        }
    }

    fn lock_err<T>(_: T) -> RefkeepError {
        RefkeepError::Store("memory backend lock poisoned".to_string())
    }
}

impl StorageBackend for MemBackend {
    fn load(&self) -> Result<Snapshot> {
        Ok(self.snapshot.lock().map_err(Self::lock_err)?.clone())
    }

    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        if *self.simulate_write_error.lock().map_err(Self::lock_err)? {
            return Err(RefkeepError::Store("Simulated write error".to_string()));
        }
        {
            let mut remaining = self.writes_before_failure.lock().map_err(Self::lock_err)?;
            match remaining.as_mut() {
                Some(0) => {
                    return Err(RefkeepError::Store("Simulated crash".to_string()));
                }
                Some(n) => *n -= 1,
                None => {}
            }
        }
        *self.snapshot.lock().map_err(Self::lock_err)? = snapshot.clone();
        Ok(())
    }

    fn interfere(&self, op: StoreOp<'_>) -> Interference {
        if op == StoreOp::Increment
            && self.failing_increments.lock().map(|flag| *flag).unwrap_or(false)
        {
            return Interference::Fail("Simulated increment failure".to_string());
        }
        if let StoreOp::QueryGroup(name) = op {
            let failing = self
                .failing_groups
                .lock()
                .map(|groups| groups.contains(name))
                .unwrap_or(false);
            if failing {
                return Interference::Fail(format!("Simulated failure querying group {}", name));
            }
        }
        match self.latency.lock().ok().and_then(|latency| *latency) {
            Some(delay) => Interference::Delay(delay),
            None => Interference::None,
        }
    }
}
