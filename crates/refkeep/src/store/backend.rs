use crate::error::Result;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

/// Every document in the store, keyed by document path (`topics/t1/comments/c1`).
pub type Snapshot = BTreeMap<String, Map<String, Value>>;

/// The kind of store call about to run, as seen by [`StorageBackend::interfere`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp<'a> {
    Get,
    Query(&'a str),
    QueryGroup(&'a str),
    Write,
    Increment,
}

/// Misbehaviour a backend asks the store to exhibit for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interference {
    None,
    Delay(Duration),
    Fail(String),
}

/// Abstract interface for raw storage I/O.
/// This trait handles the "how" of storage (filesystem vs memory),
/// while DocStore handles the "what" (queries, batches, counters).
pub trait StorageBackend: Send + Sync {
    /// Load every document.
    fn load(&self) -> Result<Snapshot>;

    /// Persist every document.
    /// MUST be atomic (e.g. write to tmp then rename) so a batch is all-or-nothing.
    fn save(&self, snapshot: &Snapshot) -> Result<()>;

    /// Hook run before each store call. Only test backends interfere.
    fn interfere(&self, _op: StoreOp<'_>) -> Interference {
        Interference::None
    }
}
