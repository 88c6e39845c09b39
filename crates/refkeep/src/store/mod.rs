//! # Storage Layer
//!
//! The integrity layer never owns the data: it talks to a remote, schemaless
//! document store through the [`DocumentStore`] trait. The trait captures the
//! handful of capabilities the cascade and scan logic rely on:
//!
//! - point reads ([`DocumentStore::get`])
//! - equality-filtered, optionally ordered collection queries ([`DocumentStore::query`])
//! - group queries spanning every subcollection with a given name
//!   ([`DocumentStore::query_group`])
//! - atomic, size-bounded batch deletes ([`DocumentStore::batch_delete`])
//! - atomic counter deltas ([`DocumentStore::increment`])
//!
//! There are **no** cross-batch transactions. Two separate `batch_delete`
//! calls may be separated by a crash; callers order their batches so that the
//! only possible leftovers are orphans.
//!
//! ## Backend Split
//!
//! [`doc_store::DocStore`] implements the query and batch semantics once. The
//! "how" of persistence lives behind [`backend::StorageBackend`], which only
//! loads and saves a snapshot of every document:
//!
//! - [`mem_backend::MemBackend`] → [`memory::InMemoryStore`]: tests, with fault
//!   injection (failed writes, failed group queries, latency).
//! - [`fs_backend::FsBackend`] → [`fs::FileStore`]: a JSON snapshot on disk,
//!   used by the admin CLI against exported data.
//!
//! ## Snapshot Layout
//!
//! ```text
//! store.json
//! {
//!   "topics/t1": { "ownerId": "u1", "commentCount": 2 },
//!   "topics/t1/comments/c1": { "authorId": "u2", ... },
//!   ...
//! }
//! ```

use crate::error::Result;
use crate::model::{DocRef, Document};
use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;

pub mod backend;
pub mod doc_store;
pub mod fs;
pub mod fs_backend;
pub mod mem_backend;
pub mod memory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// Equality filters plus an optional ordering.
///
/// As with most document stores, ordering by a field excludes documents that
/// do not carry it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<(String, Value)>,
    pub order_by: Option<OrderBy>,
}

impl Query {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self::all().and_eq(field, value)
    }

    pub fn and_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push((field.to_string(), value.into()));
        self
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.to_string(),
            direction,
        });
        self
    }

    pub fn matches(&self, doc: &Document) -> bool {
        let filtered = self
            .filters
            .iter()
            .all(|(field, value)| doc.fields.get(field) == Some(value));
        let ordered = match &self.order_by {
            Some(order) => doc.fields.contains_key(&order.field),
            None => true,
        };
        filtered && ordered
    }

    /// Sorts already-filtered results. Ties (and unordered queries) fall back
    /// to document path so results are deterministic.
    pub fn sort(&self, docs: &mut [Document]) {
        docs.sort_by(|a, b| {
            let by_field = match &self.order_by {
                Some(order) => {
                    let ord = compare_values(
                        a.fields.get(&order.field),
                        b.fields.get(&order.field),
                    );
                    match order.direction {
                        Direction::Ascending => ord,
                        Direction::Descending => ord.reverse(),
                    }
                }
                None => Ordering::Equal,
            };
            by_field.then_with(|| a.reference.cmp(&b.reference))
        });
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

/// The remote document store, as seen by the integrity layer.
///
/// Implementations must make each call individually atomic. Nothing is atomic
/// across calls.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Point read. `Ok(None)` when the document does not exist.
    async fn get(&self, doc: &DocRef) -> Result<Option<Document>>;

    /// Query the documents of one collection path.
    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>>;

    /// Query every collection whose last path segment is `name`.
    async fn query_group(&self, name: &str, query: &Query) -> Result<Vec<Document>>;

    /// Create or overwrite a document.
    async fn set(&self, doc: Document) -> Result<()>;

    /// Overwrite a single field of an existing document.
    async fn set_field(&self, doc: &DocRef, field: &str, value: Value) -> Result<()>;

    /// Delete all `refs` in one atomic commit, returning how many existed.
    ///
    /// Missing documents are skipped. Fails without touching anything if
    /// `refs` is longer than [`DocumentStore::max_batch_ops`].
    async fn batch_delete(&self, refs: &[DocRef]) -> Result<usize>;

    /// Atomically add `delta` to an integer field, returning the new value.
    async fn increment(&self, doc: &DocRef, field: &str, delta: i64) -> Result<i64>;

    /// Upper bound on operations per batch.
    fn max_batch_ops(&self) -> usize;
}
