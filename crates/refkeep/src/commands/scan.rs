//! # Orphan Scan
//!
//! A read-only pass over the whole store that finds records whose referents
//! are gone. It never writes; [`super::clean`] acts on its report.
//!
//! ## What Counts as an Orphan
//!
//! | Record | Orphan when |
//! |--------|-------------|
//! | resolution, topic, journal entry | `ownerId` missing or naming no existing user |
//! | comment | its structural root is missing, or is itself an orphan root |
//! | edge half | either endpoint user is missing, or the mirror half is missing |
//! | notification | sender or recipient names no existing user |
//!
//! A comment whose *parent comment* is gone but whose root is live is not an
//! orphan: the thread view lifts it to top level.
//!
//! ## Ordering
//!
//! Users and roots are read first (concurrently), and only then are comments,
//! edges and notifications read. Nothing is locked in between. A root deleted
//! without cascading after the first phase is still in the live set, so its
//! leftover comments pass as live and are only reported by the next scan.
//! Scans never write, so the race only delays a report.

use super::helpers::timed;
use super::CmdMessage;
use crate::config::CascadeSettings;
use crate::error::Result;
use crate::model::{
    DocRef, Document, Notification, RootKind, SocialEdge, COMMENTS, FOLLOWERS, FOLLOWING,
    NOTIFICATIONS, OWNER_FIELD,
};
use crate::store::{DocumentStore, Query};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    pub users: usize,
    pub roots: usize,
    pub comments: usize,
    pub edges: usize,
    pub notifications: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrphanReport {
    pub orphan_resolutions: Vec<DocRef>,
    pub orphan_topics: Vec<DocRef>,
    pub orphan_journal_entries: Vec<DocRef>,
    pub orphan_comments: Vec<DocRef>,
    pub orphan_edges: Vec<DocRef>,
    pub orphan_notifications: Vec<DocRef>,
    pub scanned: ScanStats,
}

impl OrphanReport {
    pub fn orphan_roots(&self) -> impl Iterator<Item = &DocRef> {
        self.orphan_resolutions
            .iter()
            .chain(&self.orphan_topics)
            .chain(&self.orphan_journal_entries)
    }

    pub fn total(&self) -> usize {
        self.orphan_roots().count()
            + self.orphan_comments.len()
            + self.orphan_edges.len()
            + self.orphan_notifications.len()
    }

    pub fn is_clean(&self) -> bool {
        self.total() == 0
    }

    fn roots_mut(&mut self, kind: RootKind) -> Option<&mut Vec<DocRef>> {
        match kind {
            RootKind::Resolution => Some(&mut self.orphan_resolutions),
            RootKind::Topic => Some(&mut self.orphan_topics),
            RootKind::JournalEntry => Some(&mut self.orphan_journal_entries),
            RootKind::User => None,
        }
    }

    pub fn messages(&self) -> Vec<CmdMessage> {
        let s = &self.scanned;
        let mut messages = vec![CmdMessage::info(format!(
            "Scanned {} users, {} records, {} comments, {} edge halves, {} notifications",
            s.users, s.roots, s.comments, s.edges, s.notifications
        ))];
        if self.is_clean() {
            messages.push(CmdMessage::success("No orphans found"));
            return messages;
        }
        let groups = [
            ("resolution", self.orphan_resolutions.len()),
            ("topic", self.orphan_topics.len()),
            ("journal entry", self.orphan_journal_entries.len()),
            ("comment", self.orphan_comments.len()),
            ("edge half", self.orphan_edges.len()),
            ("notification", self.orphan_notifications.len()),
        ];
        for (label, n) in groups.into_iter().filter(|(_, n)| *n > 0) {
            messages.push(CmdMessage::warning(format!("{} orphan {}(s)", n, label)));
        }
        messages
    }
}

/// Scans the store for orphaned records.
pub async fn run<S: DocumentStore + ?Sized>(
    store: &S,
    settings: &CascadeSettings,
) -> Result<OrphanReport> {
    let t = settings.op_timeout;
    let all = Query::all();

    let (users, resolutions, topics, journal) = tokio::try_join!(
        timed(t, "listing users", store.query(RootKind::User.collection(), &all)),
        timed(t, "listing resolutions", store.query(RootKind::Resolution.collection(), &all)),
        timed(t, "listing topics", store.query(RootKind::Topic.collection(), &all)),
        timed(t, "listing journal entries", store.query(RootKind::JournalEntry.collection(), &all)),
    )?;

    let mut report = OrphanReport::default();
    report.scanned.users = users.len();
    report.scanned.roots = resolutions.len() + topics.len() + journal.len();

    let live_users: HashSet<&str> = users.iter().map(|doc| doc.reference.id.as_str()).collect();
    let mut live_roots: HashMap<RootKind, HashSet<String>> = HashMap::new();
    live_roots.insert(
        RootKind::User,
        live_users.iter().map(|id| id.to_string()).collect(),
    );

    for (kind, docs) in [
        (RootKind::Resolution, &resolutions),
        (RootKind::Topic, &topics),
        (RootKind::JournalEntry, &journal),
    ] {
        let mut live = HashSet::new();
        for doc in docs.iter() {
            let owned = doc
                .str_field(OWNER_FIELD)
                .is_some_and(|owner| live_users.contains(owner));
            if owned {
                live.insert(doc.reference.id.clone());
            } else if let Some(orphans) = report.roots_mut(kind) {
                orphans.push(doc.reference.clone());
            }
        }
        live_roots.insert(kind, live);
    }

    // Second phase: everything that points at users or roots
    let (comments, following, followers, notifications) = tokio::try_join!(
        timed(t, "listing all comments", store.query_group(COMMENTS, &all)),
        timed(t, "listing follower halves", store.query_group(FOLLOWING, &all)),
        timed(t, "listing followee halves", store.query_group(FOLLOWERS, &all)),
        timed(t, "listing notifications", store.query(NOTIFICATIONS, &all)),
    )?;
    report.scanned.comments = comments.len();
    report.scanned.edges = following.len() + followers.len();
    report.scanned.notifications = notifications.len();

    report.orphan_comments = comments
        .iter()
        .filter(|doc| comment_is_orphan(doc, &live_roots))
        .map(|doc| doc.reference.clone())
        .collect();

    let halves: Vec<&Document> = following.iter().chain(followers.iter()).collect();
    let present: HashSet<&DocRef> = halves.iter().copied().map(|doc| &doc.reference).collect();
    report.orphan_edges = halves
        .iter()
        .filter(|doc| {
            let Some(edge) = SocialEdge::from_half(&doc.reference) else {
                return false;
            };
            let endpoints_live = live_users.contains(edge.follower.as_str())
                && live_users.contains(edge.following.as_str());
            let mirrored = SocialEdge::mirror_of(&doc.reference)
                .is_some_and(|mirror| present.contains(&mirror));
            !endpoints_live || !mirrored
        })
        .map(|doc| doc.reference.clone())
        .collect();

    report.orphan_notifications = notifications
        .iter()
        .filter(|doc| match Notification::from_document(doc) {
            Ok(n) => n.parties().iter().any(|uid| !live_users.contains(uid)),
            Err(err) => {
                warn!(path = %doc.reference, error = %err, "skipping unreadable notification");
                false
            }
        })
        .map(|doc| doc.reference.clone())
        .collect();

    debug!(scanned = ?report.scanned, "scan finished");
    info!(
        orphans = report.total(),
        roots = report.orphan_roots().count(),
        comments = report.orphan_comments.len(),
        edges = report.orphan_edges.len(),
        notifications = report.orphan_notifications.len(),
        "orphan scan complete"
    );
    Ok(report)
}

/// Only comments stored under a known root kind are judged.
fn comment_is_orphan(doc: &Document, live_roots: &HashMap<RootKind, HashSet<String>>) -> bool {
    let Some(root) = doc.reference.parent_doc() else {
        return false;
    };
    let Some(kind) = root.root_kind() else {
        return false;
    };
    !live_roots
        .get(&kind)
        .is_some_and(|live| live.contains(&root.id))
}
