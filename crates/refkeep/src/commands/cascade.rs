//! # Cascade Delete
//!
//! Deleting a root removes, in this order:
//!
//! 1. every comment stored under the root (one flat query, any depth)
//! 2. the root document itself
//! 3. for a user only: every owned resolution, topic and journal entry (each
//!    cascaded through steps 1-2), both halves of every social edge, and every
//!    notification the user sent or received
//! 4. for a user only, best-effort: the user's comments on *other* roots,
//!    with each affected root's `commentCount` lowered by what was removed
//!
//! Steps 1-3 are mandatory: the first failure aborts the cascade and the
//! error is returned. Notification deletes and step 4 are best-effort: a
//! failure is logged, recorded on the outcome, and the cascade still succeeds.
//!
//! Every step enumerates what is *currently* there, so running the cascade
//! again after any failure finishes the job. On an already-deleted root it
//! finds nothing and reports zero.
//!
//! Independent enumerations fan out concurrently. If one fails, the others are
//! dropped (cancelled) before anything is deleted.

use super::counters::delete_counted;
use super::helpers::{comments_under, delete_in_batches, refs_of, timed};
use super::CmdMessage;
use crate::config::CascadeSettings;
use crate::error::Result;
use crate::model::{
    DocRef, Document, RootKind, SocialEdge, AUTHOR_FIELD, COMMENTS, FOLLOWERS, FOLLOWING,
    NOTIFICATIONS, OWNER_FIELD, RECIPIENT_FIELD, SENDER_FIELD,
};
use crate::store::{DocumentStore, Query};
use futures::future::try_join_all;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Field on each edge half naming the user at the other end.
pub const EDGE_USER_FIELD: &str = "userId";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GhostSweep {
    pub comments_removed: usize,
    /// Roots whose counter was lowered, with the amount.
    pub roots_adjusted: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    pub kind: RootKind,
    pub id: String,
    pub root_existed: bool,
    /// Dependent records removed (the root itself is not counted).
    pub deleted: usize,
    pub comments: usize,
    pub owned_roots: usize,
    pub edges: usize,
    pub notifications: usize,
    pub ghost_sweep: Option<GhostSweep>,
    /// Best-effort steps that failed.
    pub warnings: Vec<String>,
}

impl DeleteOutcome {
    fn new(kind: RootKind, id: &str) -> Self {
        Self {
            kind,
            id: id.to_string(),
            root_existed: false,
            deleted: 0,
            comments: 0,
            owned_roots: 0,
            edges: 0,
            notifications: 0,
            ghost_sweep: None,
            warnings: Vec::new(),
        }
    }

    fn total(&self) -> usize {
        let ghosts = self
            .ghost_sweep
            .as_ref()
            .map_or(0, |sweep| sweep.comments_removed);
        self.comments + self.owned_roots + self.edges + self.notifications + ghosts
    }

    pub fn messages(&self) -> Vec<CmdMessage> {
        let mut messages = Vec::new();
        if !self.root_existed && self.deleted == 0 {
            messages.push(CmdMessage::info(format!(
                "{} {} not found, nothing to delete",
                self.kind, self.id
            )));
        } else {
            messages.push(CmdMessage::success(format!(
                "Deleted {} {} and {} dependent record(s)",
                self.kind, self.id, self.deleted
            )));
        }
        if self.kind == RootKind::User && self.deleted > 0 {
            messages.push(CmdMessage::info(format!(
                "comments: {}, owned records: {}, edges: {}, notifications: {}",
                self.comments, self.owned_roots, self.edges, self.notifications
            )));
        }
        if let Some(sweep) = self.ghost_sweep.as_ref().filter(|s| s.comments_removed > 0) {
            messages.push(CmdMessage::info(format!(
                "Removed {} comment(s) on {} other record(s)",
                sweep.comments_removed,
                sweep.roots_adjusted.len()
            )));
        }
        for warning in &self.warnings {
            messages.push(CmdMessage::warning(warning.clone()));
        }
        messages
    }
}

/// What deleting one root and its comments removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Subtree {
    pub root_existed: bool,
    pub comments: usize,
}

/// Deletes `kind/id` and everything depending on it.
pub async fn delete_root<S: DocumentStore + ?Sized>(
    store: &S,
    settings: &CascadeSettings,
    kind: RootKind,
    id: &str,
) -> Result<DeleteOutcome> {
    info!(%kind, id, "cascade delete starting");
    let mut outcome = DeleteOutcome::new(kind, id);

    let subtree = delete_subtree(store, settings, &DocRef::root(kind, id)).await?;
    outcome.root_existed = subtree.root_existed;
    outcome.comments = subtree.comments;

    if kind == RootKind::User {
        delete_user_dependents(store, settings, id, &mut outcome).await?;
        if settings.sweep_ghost_comments {
            match sweep_ghost_comments(store, settings, id).await {
                Ok(sweep) => outcome.ghost_sweep = Some(sweep),
                Err(err) => {
                    warn!(uid = id, error = %err, "ghost comment sweep failed");
                    outcome.warnings.push(format!("Comment sweep failed: {}", err));
                }
            }
        }
    }

    outcome.deleted = outcome.total();
    info!(
        %kind,
        id,
        existed = outcome.root_existed,
        deleted = outcome.deleted,
        warnings = outcome.warnings.len(),
        "cascade delete finished"
    );
    Ok(outcome)
}

/// Comments first, root last. Used for every root, owned or orphaned.
pub(crate) async fn delete_subtree<S: DocumentStore + ?Sized>(
    store: &S,
    settings: &CascadeSettings,
    root: &DocRef,
) -> Result<Subtree> {
    let comments = comments_under(store, settings, root).await?;
    let removed = delete_in_batches(store, settings, &refs_of(&comments)).await?;
    let root_removed = timed(
        settings.op_timeout,
        "deleting root",
        store.batch_delete(std::slice::from_ref(root)),
    )
    .await?;
    debug!(root = %root, comments = removed, existed = root_removed > 0, "subtree deleted");
    Ok(Subtree {
        root_existed: root_removed > 0,
        comments: removed,
    })
}

async fn delete_user_dependents<S: DocumentStore + ?Sized>(
    store: &S,
    settings: &CascadeSettings,
    uid: &str,
    outcome: &mut DeleteOutcome,
) -> Result<()> {
    let t = settings.op_timeout;
    let owned = Query::eq(OWNER_FIELD, uid);
    let user = DocRef::root(RootKind::User, uid);
    let following = user.subcollection(FOLLOWING);
    let followers = user.subcollection(FOLLOWERS);
    let about_user = Query::eq(EDGE_USER_FIELD, uid);
    let sent_q = Query::eq(SENDER_FIELD, uid);
    let received_q = Query::eq(RECIPIENT_FIELD, uid);
    let all = Query::all();

    let (resolutions, topics, journal, sent, received, edges_out, edges_in, mirrors_out, mirrors_in) = tokio::try_join!(
        timed(t, "listing owned resolutions", store.query(RootKind::Resolution.collection(), &owned)),
        timed(t, "listing owned topics", store.query(RootKind::Topic.collection(), &owned)),
        timed(t, "listing owned journal entries", store.query(RootKind::JournalEntry.collection(), &owned)),
        timed(t, "listing sent notifications", store.query(NOTIFICATIONS, &sent_q)),
        timed(t, "listing received notifications", store.query(NOTIFICATIONS, &received_q)),
        timed(t, "listing followed users", store.query(&following, &all)),
        timed(t, "listing followers", store.query(&followers, &all)),
        timed(t, "listing follower halves", store.query_group(FOLLOWING, &about_user)),
        timed(t, "listing followee halves", store.query_group(FOLLOWERS, &about_user)),
    )?;

    // Owned roots: each cascades independently
    let owned_roots: Vec<DocRef> = [resolutions, topics, journal]
        .iter()
        .flat_map(|docs| refs_of(docs))
        .collect();
    let subtrees = try_join_all(
        owned_roots
            .iter()
            .map(|root| delete_subtree(store, settings, root)),
    )
    .await?;
    outcome.owned_roots = subtrees
        .iter()
        .map(|s| s.comments + usize::from(s.root_existed))
        .sum();

    // Both halves of every edge touching the user, whichever half we found
    let edges: BTreeSet<SocialEdge> = [edges_out, edges_in, mirrors_out, mirrors_in]
        .iter()
        .flatten()
        .filter_map(|doc| SocialEdge::from_half(&doc.reference))
        .filter(|edge| edge.follower == uid || edge.following == uid)
        .collect();
    let halves: Vec<DocRef> = edges.iter().flat_map(SocialEdge::halves).collect();
    outcome.edges = delete_in_batches(store, settings, &halves).await?;

    let notifications: BTreeSet<DocRef> = sent
        .iter()
        .chain(received.iter())
        .map(|doc: &Document| doc.reference.clone())
        .collect();
    let notifications: Vec<DocRef> = notifications.into_iter().collect();
    match delete_in_batches(store, settings, &notifications).await {
        Ok(n) => outcome.notifications = n,
        Err(err) => {
            warn!(uid, error = %err, "notification cleanup failed");
            outcome
                .warnings
                .push(format!("Notification cleanup failed: {}", err));
        }
    }

    debug!(
        uid,
        owned = owned_roots.len(),
        edges = edges.len(),
        notifications = notifications.len(),
        "user dependents deleted"
    );
    Ok(())
}

/// Removes the user's comments on roots the user did not own.
///
/// Works root by root, decrementing as each batch commits. A root whose
/// delete fails is reconciled before the error surfaces, and a retry finds
/// the remaining comments by author again.
async fn sweep_ghost_comments<S: DocumentStore + ?Sized>(
    store: &S,
    settings: &CascadeSettings,
    uid: &str,
) -> Result<GhostSweep> {
    let authored = timed(
        settings.op_timeout,
        "listing authored comments",
        store.query_group(COMMENTS, &Query::eq(AUTHOR_FIELD, uid)),
    )
    .await?;

    let mut by_root: BTreeMap<DocRef, Vec<DocRef>> = BTreeMap::new();
    for doc in authored {
        if let Some(root) = doc.reference.parent_doc() {
            by_root.entry(root).or_default().push(doc.reference);
        }
    }

    let mut sweep = GhostSweep::default();
    for (root, refs) in by_root {
        let (removed, _) = delete_counted(store, settings, &root, &refs).await?;
        if removed == 0 {
            continue;
        }
        sweep.comments_removed += removed;
        sweep.roots_adjusted.insert(root.path(), removed);
    }
    debug!(uid, removed = sweep.comments_removed, roots = sweep.roots_adjusted.len(), "ghost sweep done");
    Ok(sweep)
}
