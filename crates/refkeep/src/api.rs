//! # API Facade
//!
//! The API layer is a **thin facade** over the command layer and the single
//! entry point for every refkeep operation, whichever host calls it (the admin
//! CLI, a request handler, a scheduled job).
//!
//! ## Role and Responsibilities
//!
//! - **Dispatches** to the command functions with the configured settings
//! - **Authorizes** the caller-facing operation ([`RefkeepApi::close_account`])
//! - **Returns structured types**, never strings
//!
//! ## Generic Over DocumentStore
//!
//! `RefkeepApi<S: DocumentStore>` works the same over every backend:
//! - Admin CLI: `RefkeepApi<FileStore>`
//! - Testing: `RefkeepApi<InMemoryStore>`
//!
//! The API holds no state of its own besides the store and settings, so a host
//! may share one instance across tasks.

use crate::commands::cascade::{self, DeleteOutcome};
use crate::commands::clean::{self, CleanPreview, CleanSummary};
use crate::commands::comments::{self, CommentDeletion, NewComment};
use crate::commands::counters::{self, Reconciled};
use crate::commands::scan::{self, OrphanReport};
use crate::config::{CascadeSettings, RefkeepConfig};
use crate::error::{RefkeepError, Result};
use crate::model::{Comment, Identity, RootKind, RootRef};
use crate::store::DocumentStore;
use crate::thread::ThreadNode;
use tracing::warn;

pub struct RefkeepApi<S: DocumentStore> {
    store: S,
    settings: CascadeSettings,
}

impl<S: DocumentStore> RefkeepApi<S> {
    pub fn new(store: S, settings: CascadeSettings) -> Self {
        Self { store, settings }
    }

    pub fn from_config(store: S, config: &RefkeepConfig) -> Self {
        let settings = config.settings_for(&store);
        Self::new(store, settings)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &CascadeSettings {
        &self.settings
    }

    pub async fn delete_root(&self, kind: RootKind, id: &str) -> Result<DeleteOutcome> {
        cascade::delete_root(&self.store, &self.settings, kind, id).await
    }

    pub async fn delete_user(&self, uid: &str) -> Result<DeleteOutcome> {
        self.delete_root(RootKind::User, uid).await
    }

    pub async fn delete_topic(&self, topic_id: &str) -> Result<DeleteOutcome> {
        self.delete_root(RootKind::Topic, topic_id).await
    }

    /// Account closure requested by a signed-in caller.
    ///
    /// Only the account holder or an elevated caller may close an account.
    pub async fn close_account(&self, caller: &Identity, uid: &str) -> Result<DeleteOutcome> {
        if !caller.may_act_for(uid) {
            warn!(caller = %caller.uid, target = uid, "account closure refused");
            return Err(RefkeepError::PermissionDenied(format!(
                "{} may not close account {}",
                caller.uid, uid
            )));
        }
        self.delete_user(uid).await
    }

    pub async fn add_comment(
        &self,
        kind: RootKind,
        root_id: &str,
        comment: NewComment,
    ) -> Result<Comment> {
        comments::add(&self.store, &self.settings, &RootRef::new(kind, root_id), comment).await
    }

    pub async fn delete_comment(
        &self,
        kind: RootKind,
        root_id: &str,
        comment_id: &str,
    ) -> Result<CommentDeletion> {
        comments::delete(
            &self.store,
            &self.settings,
            &RootRef::new(kind, root_id),
            comment_id,
        )
        .await
    }

    pub async fn thread(&self, kind: RootKind, root_id: &str) -> Result<Vec<ThreadNode>> {
        comments::thread(&self.store, &self.settings, &RootRef::new(kind, root_id)).await
    }

    pub async fn decrement_counter(
        &self,
        kind: RootKind,
        root_id: &str,
        n: usize,
    ) -> Result<Option<i64>> {
        counters::decrement(&self.store, &self.settings, kind, root_id, n).await
    }

    pub async fn reconcile_counter(
        &self,
        kind: RootKind,
        root_id: &str,
    ) -> Result<Option<Reconciled>> {
        counters::reconcile(&self.store, &self.settings, kind, root_id).await
    }

    pub async fn reconcile_all(&self, kind: RootKind) -> Result<Vec<Reconciled>> {
        counters::reconcile_kind(&self.store, &self.settings, kind).await
    }

    pub async fn scan_orphans(&self) -> Result<OrphanReport> {
        scan::run(&self.store, &self.settings).await
    }

    pub fn clean_preview(&self, report: &OrphanReport) -> CleanPreview {
        clean::preview(report)
    }

    pub async fn clean_orphans(&self, report: &OrphanReport) -> Result<CleanSummary> {
        clean::run(&self.store, &self.settings, report).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AuthorRef;
    use crate::store::memory::fixtures::StoreFixture;
    use crate::store::memory::InMemoryStore;

    fn api(store: InMemoryStore) -> RefkeepApi<InMemoryStore> {
        RefkeepApi::from_config(store, &RefkeepConfig::default())
    }

    #[tokio::test]
    async fn close_account_requires_owner_or_elevated() {
        let api = api(StoreFixture::new().with_user("u1").build());

        let refused = api.close_account(&Identity::user("u2"), "u1").await;
        assert!(matches!(refused, Err(RefkeepError::PermissionDenied(_))));
        assert_eq!(api.store().len().unwrap(), 1);

        let outcome = api.close_account(&Identity::user("u1"), "u1").await.unwrap();
        assert!(outcome.root_existed);
        assert!(api.store().is_empty().unwrap());
    }

    #[tokio::test]
    async fn elevated_caller_may_close_any_account() {
        let api = api(StoreFixture::new().with_user("u1").build());
        let outcome = api.close_account(&Identity::admin("ops"), "u1").await.unwrap();
        assert!(outcome.root_existed);
    }

    #[tokio::test]
    async fn comment_lifecycle_through_api() {
        let api = api(
            StoreFixture::new()
                .with_user("u1")
                .with_root(RootKind::Topic, "t1", "u1")
                .build(),
        );
        let c = api
            .add_comment(
                RootKind::Topic,
                "t1",
                NewComment::new(AuthorRef::new("u1", "Ada"), "hi"),
            )
            .await
            .unwrap();
        assert_eq!(api.thread(RootKind::Topic, "t1").await.unwrap().len(), 1);

        let deletion = api
            .delete_comment(RootKind::Topic, "t1", &c.id)
            .await
            .unwrap();
        assert_eq!(deletion.deleted, 1);
        assert_eq!(deletion.comment_count, Some(0));
    }

    #[tokio::test]
    async fn settings_follow_store_limit() {
        let api = api(InMemoryStore::new().with_max_batch_ops(10));
        assert_eq!(api.settings().batch_size, 10);
    }
}
