use super::backend::{Interference, Snapshot, StorageBackend, StoreOp};
use super::{DocumentStore, Query};
use crate::error::{RefkeepError, Result};
use crate::model::{DocRef, Document};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;

/// Most document stores cap a write batch at 500 operations.
pub const DEFAULT_MAX_BATCH_OPS: usize = 500;

pub struct DocStore<B: StorageBackend> {
    /// The underlying storage backend.
    /// Exposed as pub(crate) for testing and internal access only.
    pub(crate) backend: B,
    /// Serializes read-modify-write cycles so each call commits atomically.
    write_lock: Mutex<()>,
    max_batch_ops: usize,
}

impl<B: StorageBackend> DocStore<B> {
    pub fn with_backend(backend: B) -> Self {
        Self {
            backend,
            write_lock: Mutex::new(()),
            max_batch_ops: DEFAULT_MAX_BATCH_OPS,
        }
    }

    pub fn with_max_batch_ops(mut self, max_batch_ops: usize) -> Self {
        self.max_batch_ops = max_batch_ops.max(1);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Synchronous write used for seeding and fixtures. Bypasses interference.
    pub fn put(&self, doc: Document) -> Result<()> {
        self.mutate(|snapshot| {
            snapshot.insert(doc.reference.path(), doc.fields);
            Ok(())
        })
    }

    /// Synchronous existence check, for tests and diagnostics.
    pub fn contains(&self, doc: &DocRef) -> Result<bool> {
        Ok(self.backend.load()?.contains_key(&doc.path()))
    }

    /// Total number of stored documents.
    pub fn len(&self) -> Result<usize> {
        Ok(self.backend.load()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    async fn before(&self, op: StoreOp<'_>) -> Result<()> {
        match self.backend.interfere(op) {
            Interference::None => Ok(()),
            Interference::Delay(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
            Interference::Fail(msg) => Err(RefkeepError::Store(msg)),
        }
    }

    fn mutate<T, F>(&self, apply: F) -> Result<T>
    where
        F: FnOnce(&mut Snapshot) -> Result<T>,
    {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| RefkeepError::Store("store lock poisoned".to_string()))?;
        let mut snapshot = self.backend.load()?;
        let out = apply(&mut snapshot)?;
        self.backend.save(&snapshot)?;
        Ok(out)
    }

    fn select<P>(&self, query: &Query, in_scope: P) -> Result<Vec<Document>>
    where
        P: Fn(&DocRef) -> bool,
    {
        let snapshot = self.backend.load()?;
        let mut docs: Vec<Document> = snapshot
            .into_iter()
            .filter_map(|(path, fields)| {
                let reference = DocRef::parse(&path)?;
                in_scope(&reference).then_some(Document { reference, fields })
            })
            .filter(|doc| query.matches(doc))
            .collect();
        query.sort(&mut docs);
        Ok(docs)
    }
}

#[async_trait]
impl<B: StorageBackend> DocumentStore for DocStore<B> {
    async fn get(&self, doc: &DocRef) -> Result<Option<Document>> {
        self.before(StoreOp::Get).await?;
        let snapshot = self.backend.load()?;
        Ok(snapshot.get(&doc.path()).map(|fields| Document {
            reference: doc.clone(),
            fields: fields.clone(),
        }))
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>> {
        self.before(StoreOp::Query(collection)).await?;
        self.select(query, |doc| doc.collection == collection)
    }

    async fn query_group(&self, name: &str, query: &Query) -> Result<Vec<Document>> {
        self.before(StoreOp::QueryGroup(name)).await?;
        self.select(query, |doc| doc.collection_name() == name)
    }

    async fn set(&self, doc: Document) -> Result<()> {
        self.before(StoreOp::Write).await?;
        self.put(doc)
    }

    async fn set_field(&self, doc: &DocRef, field: &str, value: Value) -> Result<()> {
        self.before(StoreOp::Write).await?;
        self.mutate(|snapshot| {
            let fields = snapshot
                .get_mut(&doc.path())
                .ok_or_else(|| RefkeepError::NotFound(doc.path()))?;
            fields.insert(field.to_string(), value);
            Ok(())
        })
    }

    async fn batch_delete(&self, refs: &[DocRef]) -> Result<usize> {
        if refs.len() > self.max_batch_ops {
            return Err(RefkeepError::BatchTooLarge {
                size: refs.len(),
                limit: self.max_batch_ops,
            });
        }
        if refs.is_empty() {
            return Ok(0);
        }
        self.before(StoreOp::Write).await?;
        self.mutate(|snapshot| {
            Ok(refs
                .iter()
                .filter(|doc| snapshot.remove(&doc.path()).is_some())
                .count())
        })
    }

    async fn increment(&self, doc: &DocRef, field: &str, delta: i64) -> Result<i64> {
        self.before(StoreOp::Increment).await?;
        self.mutate(|snapshot| {
            let fields = snapshot
                .get_mut(&doc.path())
                .ok_or_else(|| RefkeepError::NotFound(doc.path()))?;
            let current = fields.get(field).and_then(Value::as_i64).unwrap_or(0);
            let next = current + delta;
            fields.insert(field.to_string(), Value::from(next));
            Ok(next)
        })
    }

    fn max_batch_ops(&self) -> usize {
        self.max_batch_ops
    }
}
