use super::cascade::delete_subtree;
use super::helpers::delete_in_batches;
use super::scan::OrphanReport;
use super::CmdMessage;
use crate::config::CascadeSettings;
use crate::error::Result;
use crate::store::DocumentStore;
use serde::Serialize;
use tracing::info;

/// What a repair would remove. Used by the CLI to confirm before [`run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanPreview {
    pub roots: usize,
    pub comments: usize,
    pub edges: usize,
    pub notifications: usize,
}

impl CleanPreview {
    pub fn total(&self) -> usize {
        self.roots + self.comments + self.edges + self.notifications
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanSummary {
    pub roots_removed: usize,
    /// Orphan comments plus comments found under orphan roots.
    pub comments_removed: usize,
    pub edges_removed: usize,
    pub notifications_removed: usize,
}

impl CleanSummary {
    pub fn total(&self) -> usize {
        self.roots_removed + self.comments_removed + self.edges_removed + self.notifications_removed
    }

    pub fn messages(&self) -> Vec<CmdMessage> {
        if self.total() == 0 {
            return vec![CmdMessage::info("Nothing to clean.")];
        }
        vec![CmdMessage::success(format!(
            "Removed {} record(s), {} comment(s), {} edge half(s), {} notification(s)",
            self.roots_removed, self.comments_removed, self.edges_removed, self.notifications_removed
        ))]
    }
}

pub fn preview(report: &OrphanReport) -> CleanPreview {
    CleanPreview {
        roots: report.orphan_roots().count(),
        comments: report.orphan_comments.len(),
        edges: report.orphan_edges.len(),
        notifications: report.orphan_notifications.len(),
    }
}

/// Deletes everything in `report`.
///
/// Does NOT rescan or prompt: callers show [`preview`] and confirm first.
/// Orphan comments go before orphan roots; each orphan root is removed
/// with whatever comments it still holds. Records already gone are skipped.
pub async fn run<S: DocumentStore + ?Sized>(
    store: &S,
    settings: &CascadeSettings,
    report: &OrphanReport,
) -> Result<CleanSummary> {
    let mut summary = CleanSummary {
        comments_removed: delete_in_batches(store, settings, &report.orphan_comments).await?,
        ..Default::default()
    };

    for root in report.orphan_roots() {
        let subtree = delete_subtree(store, settings, root).await?;
        summary.comments_removed += subtree.comments;
        summary.roots_removed += usize::from(subtree.root_existed);
    }

    summary.edges_removed = delete_in_batches(store, settings, &report.orphan_edges).await?;
    summary.notifications_removed =
        delete_in_batches(store, settings, &report.orphan_notifications).await?;

    info!(
        roots = summary.roots_removed,
        comments = summary.comments_removed,
        edges = summary.edges_removed,
        notifications = summary.notifications_removed,
        "orphan repair finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::scan;
    use crate::model::RootKind;
    use crate::store::memory::fixtures::StoreFixture;

    #[tokio::test]
    async fn repairs_what_scan_found() {
        let store = StoreFixture::new()
            .with_user("u1")
            .with_root(RootKind::Topic, "t1", "u1")
            .with_comment(RootKind::Topic, "t1", "keep", "u1", None)
            .with_root(RootKind::Topic, "t2", "ghost")
            .with_comment(RootKind::Topic, "t2", "a", "u1", None)
            .with_half_follow("u1", "ghost")
            .with_notification("n1", "ghost", "u1")
            .build();
        let settings = CascadeSettings::default();

        let report = scan::run(&store, &settings).await.unwrap();
        let plan = preview(&report);
        assert_eq!(plan.roots, 1);
        assert_eq!(plan.comments, 1);
        assert_eq!(plan.total(), 4);

        let summary = run(&store, &settings, &report).await.unwrap();
        assert_eq!(summary.roots_removed, 1);
        assert_eq!(summary.comments_removed, 1);
        assert_eq!(summary.edges_removed, 1);
        assert_eq!(summary.notifications_removed, 1);

        // u1, t1, keep
        assert_eq!(store.len().unwrap(), 3);
        assert!(scan::run(&store, &settings).await.unwrap().is_clean());
    }

    #[tokio::test]
    async fn stale_report_is_harmless() {
        let store = StoreFixture::new()
            .with_root(RootKind::Resolution, "r1", "ghost")
            .build();
        let settings = CascadeSettings::default();
        let report = scan::run(&store, &settings).await.unwrap();

        run(&store, &settings, &report).await.unwrap();
        let again = run(&store, &settings, &report).await.unwrap();
        assert_eq!(again.total(), 0);
    }
}
