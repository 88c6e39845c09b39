//! Denormalized `commentCount` maintenance.
//!
//! Counters are only ever adjusted *after* the comments they describe have been
//! committed or deleted. A counter may therefore lag (a crash between the two
//! writes), but [`reconcile`] recomputes it from the live comment collection.
//!
//! A decrement that would take a counter below zero means it had already
//! drifted; the counter is reconciled on the spot instead of going negative.
//!
//! Comment deletes go through [`delete_counted`], which lowers the counter
//! after each committed batch and reconciles it if any step fails. A retry
//! then only has to account for the comments that are still there.

use super::helpers::{chunk_size, comments_under, timed};
use super::CmdMessage;
use crate::config::CascadeSettings;
use crate::error::{RefkeepError, Result};
use crate::model::{DocRef, RootKind, COMMENT_COUNT_FIELD};
use crate::store::{DocumentStore, Query};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

/// A counter that was recomputed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reconciled {
    pub root: DocRef,
    /// Stored value before the fix. `None` if the field was absent.
    pub previous: Option<i64>,
    pub corrected: i64,
}

impl Reconciled {
    pub fn changed(&self) -> bool {
        self.previous != Some(self.corrected)
    }

    pub fn message(&self) -> CmdMessage {
        match self.previous {
            Some(prev) if prev == self.corrected => CmdMessage::info(format!(
                "{}: commentCount already correct ({})",
                self.root, self.corrected
            )),
            Some(prev) => CmdMessage::success(format!(
                "{}: commentCount {} -> {}",
                self.root, prev, self.corrected
            )),
            None => CmdMessage::success(format!(
                "{}: commentCount set to {}",
                self.root, self.corrected
            )),
        }
    }
}

/// Atomically lowers a root's counter by `n`.
///
/// Returns the new value, or `None` when the root no longer exists.
pub async fn decrement<S: DocumentStore + ?Sized>(
    store: &S,
    settings: &CascadeSettings,
    kind: RootKind,
    id: &str,
    n: usize,
) -> Result<Option<i64>> {
    decrement_at(store, settings, &DocRef::root(kind, id), n).await
}

pub(crate) async fn decrement_at<S: DocumentStore + ?Sized>(
    store: &S,
    settings: &CascadeSettings,
    root: &DocRef,
    n: usize,
) -> Result<Option<i64>> {
    if n == 0 {
        return Ok(None);
    }
    let delta = -i64::try_from(n).unwrap_or(i64::MAX);
    let result = timed(
        settings.op_timeout,
        "decrementing commentCount",
        store.increment(root, COMMENT_COUNT_FIELD, delta),
    )
    .await;

    match result {
        Ok(value) if value < 0 => {
            warn!(root = %root, value, "commentCount went negative, reconciling");
            Ok(reconcile_at(store, settings, root)
                .await?
                .map(|fixed| fixed.corrected))
        }
        Ok(value) => {
            debug!(root = %root, by = n, value, "commentCount decremented");
            Ok(Some(value))
        }
        Err(RefkeepError::NotFound(_)) => {
            debug!(root = %root, "root gone, nothing to decrement");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

/// Deletes comments of `root` batch by batch, decrementing after each commit.
///
/// `refs` must already be ordered replies first. Returns how many comments
/// were removed and the last counter value written.
pub(crate) async fn delete_counted<S: DocumentStore + ?Sized>(
    store: &S,
    settings: &CascadeSettings,
    root: &DocRef,
    refs: &[DocRef],
) -> Result<(usize, Option<i64>)> {
    let mut progress = (0, None);
    match delete_then_decrement(store, settings, root, refs, &mut progress).await {
        Ok(()) => Ok(progress),
        Err(err) => {
            warn!(root = %root, removed = progress.0, error = %err, "comment delete interrupted, reconciling");
            if let Err(fix) = reconcile_at(store, settings, root).await {
                warn!(root = %root, error = %fix, "commentCount left for a later reconcile");
            }
            Err(err)
        }
    }
}

async fn delete_then_decrement<S: DocumentStore + ?Sized>(
    store: &S,
    settings: &CascadeSettings,
    root: &DocRef,
    refs: &[DocRef],
    progress: &mut (usize, Option<i64>),
) -> Result<()> {
    for chunk in refs.chunks(chunk_size(store, settings)) {
        let n = timed(
            settings.op_timeout,
            "committing delete batch",
            store.batch_delete(chunk),
        )
        .await?;
        progress.0 += n;
        if n > 0 {
            progress.1 = decrement_at(store, settings, root, n).await?;
        }
    }
    Ok(())
}

/// Recomputes one root's counter from its live comments.
///
/// Returns `None` when the root does not exist.
pub async fn reconcile<S: DocumentStore + ?Sized>(
    store: &S,
    settings: &CascadeSettings,
    kind: RootKind,
    id: &str,
) -> Result<Option<Reconciled>> {
    reconcile_at(store, settings, &DocRef::root(kind, id)).await
}

pub(crate) async fn reconcile_at<S: DocumentStore + ?Sized>(
    store: &S,
    settings: &CascadeSettings,
    root: &DocRef,
) -> Result<Option<Reconciled>> {
    let (doc, comments) = tokio::try_join!(
        timed(settings.op_timeout, "reading root", store.get(root)),
        comments_under(store, settings, root),
    )?;
    let Some(doc) = doc else {
        return Ok(None);
    };
    let previous = doc.int_field(COMMENT_COUNT_FIELD);
    write_count(store, settings, root, previous, comments.len()).await
}

async fn write_count<S: DocumentStore + ?Sized>(
    store: &S,
    settings: &CascadeSettings,
    root: &DocRef,
    previous: Option<i64>,
    live: usize,
) -> Result<Option<Reconciled>> {
    let corrected = i64::try_from(live).unwrap_or(i64::MAX);
    let fixed = Reconciled {
        root: root.clone(),
        previous,
        corrected,
    };
    if !fixed.changed() {
        return Ok(Some(fixed));
    }

    let written = timed(
        settings.op_timeout,
        "writing commentCount",
        store.set_field(root, COMMENT_COUNT_FIELD, Value::from(corrected)),
    )
    .await;
    match written {
        Ok(()) => {
            info!(root = %root, ?previous, corrected, "commentCount reconciled");
            Ok(Some(fixed))
        }
        // Deleted while we were counting
        Err(RefkeepError::NotFound(_)) => Ok(None),
        Err(err) => Err(err),
    }
}

/// Reconciles every root of `kind`, returning only the counters that changed.
pub async fn reconcile_kind<S: DocumentStore + ?Sized>(
    store: &S,
    settings: &CascadeSettings,
    kind: RootKind,
) -> Result<Vec<Reconciled>> {
    let roots = timed(
        settings.op_timeout,
        "listing roots",
        store.query(kind.collection(), &Query::all()),
    )
    .await?;

    let mut changed = Vec::new();
    for doc in roots {
        let root = doc.reference.clone();
        let live = comments_under(store, settings, &root).await?.len();
        let previous = doc.int_field(COMMENT_COUNT_FIELD);
        if let Some(fixed) = write_count(store, settings, &root, previous, live).await? {
            if fixed.changed() {
                changed.push(fixed);
            }
        }
    }
    info!(%kind, fixed = changed.len(), "counter reconciliation finished");
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::fixtures::StoreFixture;

    fn settings() -> CascadeSettings {
        CascadeSettings::default()
    }

    async fn count(store: &impl DocumentStore, kind: RootKind, id: &str) -> Option<i64> {
        store
            .get(&DocRef::root(kind, id))
            .await
            .unwrap()
            .and_then(|doc| doc.int_field(COMMENT_COUNT_FIELD))
    }

    #[tokio::test]
    async fn decrement_lowers_counter() {
        let store = StoreFixture::new()
            .with_root(RootKind::Topic, "t1", "u1")
            .with_count(RootKind::Topic, "t1", 5)
            .build();
        let value = decrement(&store, &settings(), RootKind::Topic, "t1", 3)
            .await
            .unwrap();
        assert_eq!(value, Some(2));
        assert_eq!(count(&store, RootKind::Topic, "t1").await, Some(2));
    }

    #[tokio::test]
    async fn decrement_on_missing_root_is_noop() {
        let store = StoreFixture::new().build();
        let value = decrement(&store, &settings(), RootKind::Topic, "gone", 2)
            .await
            .unwrap();
        assert_eq!(value, None);
        assert!(store.is_empty().unwrap());
    }

    #[tokio::test]
    async fn decrement_below_zero_reconciles() {
        let store = StoreFixture::new()
            .with_root(RootKind::Topic, "t1", "u1")
            .with_comment(RootKind::Topic, "t1", "c1", "u2", None)
            .with_count(RootKind::Topic, "t1", 1)
            .build();
        // Counter says 1, caller claims 4 were removed: drifted
        let value = decrement(&store, &settings(), RootKind::Topic, "t1", 4)
            .await
            .unwrap();
        assert_eq!(value, Some(1));
        assert_eq!(count(&store, RootKind::Topic, "t1").await, Some(1));
    }

    #[tokio::test]
    async fn reconcile_counts_live_comments() {
        let store = StoreFixture::new()
            .with_root(RootKind::Resolution, "r1", "u1")
            .with_comment(RootKind::Resolution, "r1", "c1", "u2", None)
            .with_comment(RootKind::Resolution, "r1", "c2", "u3", Some("c1"))
            .with_count(RootKind::Resolution, "r1", 9)
            .build();

        let fixed = reconcile(&store, &settings(), RootKind::Resolution, "r1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fixed.previous, Some(9));
        assert_eq!(fixed.corrected, 2);
        assert!(fixed.changed());
        assert_eq!(count(&store, RootKind::Resolution, "r1").await, Some(2));

        let again = reconcile(&store, &settings(), RootKind::Resolution, "r1")
            .await
            .unwrap()
            .unwrap();
        assert!(!again.changed());
    }

    #[tokio::test]
    async fn reconcile_missing_root_is_none() {
        let store = StoreFixture::new().build();
        assert!(reconcile(&store, &settings(), RootKind::Topic, "t1")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn reconcile_kind_reports_only_changes() {
        let store = StoreFixture::new()
            .with_root(RootKind::Topic, "ok", "u1")
            .with_root(RootKind::Topic, "drift", "u1")
            .with_comment(RootKind::Topic, "drift", "c1", "u1", None)
            .with_root(RootKind::Resolution, "r1", "u1")
            .with_count(RootKind::Resolution, "r1", 3)
            .build();

        let changed = reconcile_kind(&store, &settings(), RootKind::Topic)
            .await
            .unwrap();
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].root, DocRef::root(RootKind::Topic, "drift"));
        assert_eq!(changed[0].corrected, 1);
        // Other kinds untouched
        assert_eq!(count(&store, RootKind::Resolution, "r1").await, Some(3));
    }
}
