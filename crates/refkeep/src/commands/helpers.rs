use crate::config::CascadeSettings;
use crate::error::{RefkeepError, Result};
use crate::model::{DocRef, Document, COMMENTS};
use crate::store::{DocumentStore, Query};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Bounds one store call. Dropping the returned future cancels the call.
pub async fn timed<T, F>(limit: Duration, what: &str, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(RefkeepError::Timeout(limit, what.to_string())),
    }
}

/// Deletes `refs` in store-sized chunks, in order, returning how many existed.
///
/// Each chunk is atomic; the sequence is not. Callers put parents last.
pub async fn delete_in_batches<S: DocumentStore + ?Sized>(
    store: &S,
    settings: &CascadeSettings,
    refs: &[DocRef],
) -> Result<usize> {
    let mut removed = 0;
    for (i, chunk) in refs.chunks(chunk_size(store, settings)).enumerate() {
        let n = timed(
            settings.op_timeout,
            "committing delete batch",
            store.batch_delete(chunk),
        )
        .await?;
        debug!(batch = i, size = chunk.len(), removed = n, "delete batch committed");
        removed += n;
    }
    Ok(removed)
}

/// Refs per delete batch: the configured size, capped by the store.
pub fn chunk_size<S: DocumentStore + ?Sized>(store: &S, settings: &CascadeSettings) -> usize {
    settings.batch_size.clamp(1, store.max_batch_ops().max(1))
}

/// Every comment stored under `root`, at any reply depth.
///
/// One flat query on the root's comment collection: replies whose parent
/// comment is already gone are found just like any other.
pub async fn comments_under<S: DocumentStore + ?Sized>(
    store: &S,
    settings: &CascadeSettings,
    root: &DocRef,
) -> Result<Vec<Document>> {
    timed(
        settings.op_timeout,
        "listing comments",
        store.query(&root.subcollection(COMMENTS), &Query::all()),
    )
    .await
}

pub fn refs_of(docs: &[Document]) -> Vec<DocRef> {
    docs.iter().map(|doc| doc.reference.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RootKind;
    use crate::store::memory::InMemoryStore;

    #[tokio::test(start_paused = true)]
    async fn timed_reports_what_was_running() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        };
        match timed(Duration::from_secs(1), "listing users", slow).await {
            Err(RefkeepError::Timeout(limit, what)) => {
                assert_eq!(limit, Duration::from_secs(1));
                assert_eq!(what, "listing users");
            }
            other => panic!("Expected Timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn deletes_in_chunks_of_batch_size() {
        let store = InMemoryStore::new().with_max_batch_ops(2);
        let refs: Vec<DocRef> = (0..5)
            .map(|i| DocRef::root(RootKind::Topic, format!("t{}", i)))
            .collect();
        for r in &refs {
            store.put(Document::new(r.clone())).unwrap();
        }

        let settings = CascadeSettings {
            batch_size: 500,
            ..Default::default()
        };
        let removed = delete_in_batches(&store, &settings, &refs).await.unwrap();
        assert_eq!(removed, 5);
        assert!(store.is_empty().unwrap());
    }

    #[tokio::test]
    async fn failed_chunk_stops_the_sequence() {
        let store = InMemoryStore::new();
        let refs: Vec<DocRef> = (0..4)
            .map(|i| DocRef::root(RootKind::Topic, format!("t{}", i)))
            .collect();
        for r in &refs {
            store.put(Document::new(r.clone())).unwrap();
        }
        store.backend().fail_writes_after(1);

        let settings = CascadeSettings {
            batch_size: 2,
            ..Default::default()
        };
        assert!(delete_in_batches(&store, &settings, &refs).await.is_err());
        // First chunk committed, the rest untouched
        assert_eq!(store.len().unwrap(), 2);
        assert!(store.contains(&refs[3]).unwrap());
    }
}
