use super::counters::delete_counted;
use super::helpers::{comments_under, timed};
use super::CmdMessage;
use crate::config::CascadeSettings;
use crate::error::{RefkeepError, Result};
use crate::model::{AuthorRef, Comment, Document, RootRef, COMMENT_COUNT_FIELD};
use crate::store::{Direction, DocumentStore, Query};
use crate::thread::{build_threads, descendant_ids, ThreadNode};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

const PARENT_FIELD: &str = "parentCommentId";

/// Input for [`add`]. The id is generated when not supplied.
#[derive(Debug, Clone)]
pub struct NewComment {
    pub id: Option<String>,
    pub content: String,
    pub author: AuthorRef,
    pub parent_comment_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl NewComment {
    pub fn new(author: AuthorRef, content: impl Into<String>) -> Self {
        Self {
            id: None,
            content: content.into(),
            author,
            parent_comment_id: None,
            created_at: None,
        }
    }

    pub fn reply_to(mut self, parent: impl Into<String>) -> Self {
        self.parent_comment_id = Some(parent.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentDeletion {
    pub root: RootRef,
    pub comment_id: String,
    /// The comment plus every reply beneath it that still existed.
    pub deleted: usize,
    /// Root counter after the decrement; `None` if the root is gone.
    pub comment_count: Option<i64>,
}

impl CommentDeletion {
    pub fn messages(&self) -> Vec<CmdMessage> {
        if self.deleted == 0 {
            return vec![CmdMessage::info(format!(
                "Comment {} on {} was already gone",
                self.comment_id, self.root
            ))];
        }
        vec![CmdMessage::success(format!(
            "Deleted comment {} on {} ({} including replies)",
            self.comment_id, self.root, self.deleted
        ))]
    }
}

/// Writes a comment, then bumps the root's counter.
pub async fn add<S: DocumentStore + ?Sized>(
    store: &S,
    settings: &CascadeSettings,
    root: &RootRef,
    new: NewComment,
) -> Result<Comment> {
    let root_doc = root.doc_ref();
    let exists = timed(settings.op_timeout, "reading root", store.get(&root_doc)).await?;
    if exists.is_none() {
        return Err(RefkeepError::NotFound(root_doc.path()));
    }

    if let Some(parent) = &new.parent_comment_id {
        let parent_ref = root.comment_ref(parent.clone());
        let found = timed(settings.op_timeout, "reading parent comment", store.get(&parent_ref)).await?;
        if found.is_none() {
            return Err(RefkeepError::NotFound(parent_ref.path()));
        }
    }

    let comment = Comment {
        id: new.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        content: new.content,
        author: new.author,
        created_at: new.created_at.unwrap_or_else(Utc::now),
        parent_comment_id: new.parent_comment_id,
        root: root.clone(),
    };
    timed(settings.op_timeout, "writing comment", store.set(comment.to_document()?)).await?;
    let count = timed(
        settings.op_timeout,
        "incrementing commentCount",
        store.increment(&root_doc, COMMENT_COUNT_FIELD, 1),
    )
    .await?;
    debug!(comment = %comment.reference(), count, "comment added");
    Ok(comment)
}

/// Deletes a comment and every reply beneath it, decrementing the root as
/// batches commit.
///
/// Deepest replies are committed first and the comment itself last, so an
/// interrupted delete is finished by calling it again.
pub async fn delete<S: DocumentStore + ?Sized>(
    store: &S,
    settings: &CascadeSettings,
    root: &RootRef,
    comment_id: &str,
) -> Result<CommentDeletion> {
    let root_doc = root.doc_ref();
    let docs = comments_under(store, settings, &root_doc).await?;

    let mut outcome = CommentDeletion {
        root: root.clone(),
        comment_id: comment_id.to_string(),
        deleted: 0,
        comment_count: None,
    };
    if !docs.iter().any(|doc| doc.reference.id == comment_id) {
        debug!(root = %root_doc, comment_id, "comment already gone");
        return Ok(outcome);
    }

    let links = docs
        .iter()
        .map(|doc| (doc.reference.id.as_str(), doc.str_field(PARENT_FIELD)));
    let mut refs: Vec<_> = descendant_ids(links, comment_id)
        .into_iter()
        .map(|id| root.comment_ref(id))
        .collect();
    refs.push(root.comment_ref(comment_id));

    let (deleted, count) = delete_counted(store, settings, &root_doc, &refs).await?;
    outcome.deleted = deleted;
    outcome.comment_count = count;
    info!(root = %root_doc, comment_id, deleted = outcome.deleted, "comment deleted");
    Ok(outcome)
}

/// Loads a root's comments and nests them for display.
///
/// Documents that do not decode as comments are skipped with a warning.
pub async fn thread<S: DocumentStore + ?Sized>(
    store: &S,
    settings: &CascadeSettings,
    root: &RootRef,
) -> Result<Vec<ThreadNode>> {
    let query = Query::all().order_by("createdAt", Direction::Ascending);
    let docs = timed(
        settings.op_timeout,
        "listing comments",
        store.query(&root.comments_collection(), &query),
    )
    .await?;
    let comments = docs.iter().filter_map(decode_or_warn).collect();
    Ok(build_threads(comments))
}

fn decode_or_warn(doc: &Document) -> Option<Comment> {
    match Comment::from_document(doc) {
        Ok(comment) => Some(comment),
        Err(err) => {
            warn!(path = %doc.reference, error = %err, "skipping malformed comment");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DocRef, RootKind};
    use crate::store::memory::fixtures::StoreFixture;
    use crate::store::memory::InMemoryStore;
    use crate::thread::thread_size;

    fn topic() -> RootRef {
        RootRef::new(RootKind::Topic, "t1")
    }

    fn settings() -> CascadeSettings {
        CascadeSettings::default()
    }

    async fn count(store: &impl DocumentStore) -> Option<i64> {
        store
            .get(&topic().doc_ref())
            .await
            .unwrap()
            .and_then(|doc| doc.int_field(COMMENT_COUNT_FIELD))
    }

    #[tokio::test]
    async fn add_writes_comment_and_bumps_counter() {
        let store = StoreFixture::new()
            .with_user("u1")
            .with_root(RootKind::Topic, "t1", "u1")
            .build();

        let first = add(
            &store,
            &settings(),
            &topic(),
            NewComment::new(AuthorRef::new("u1", "Ada"), "hello"),
        )
        .await
        .unwrap();
        let reply = add(
            &store,
            &settings(),
            &topic(),
            NewComment::new(AuthorRef::new("u1", "Ada"), "again").reply_to(first.id.clone()),
        )
        .await
        .unwrap();

        assert_eq!(count(&store).await, Some(2));
        assert!(store.contains(&reply.reference()).unwrap());
        assert_eq!(reply.parent_comment_id.as_deref(), Some(first.id.as_str()));
    }

    #[tokio::test]
    async fn add_requires_root_and_parent() {
        let store = StoreFixture::new().with_root(RootKind::Topic, "t1", "u1").build();

        let missing_root = add(
            &store,
            &settings(),
            &RootRef::new(RootKind::Topic, "nope"),
            NewComment::new(AuthorRef::new("u1", "Ada"), "x"),
        )
        .await;
        assert!(matches!(missing_root, Err(RefkeepError::NotFound(_))));

        let missing_parent = add(
            &store,
            &settings(),
            &topic(),
            NewComment::new(AuthorRef::new("u1", "Ada"), "x").reply_to("ghost"),
        )
        .await;
        assert!(matches!(missing_parent, Err(RefkeepError::NotFound(_))));
        assert_eq!(count(&store).await, Some(0));
    }

    #[tokio::test]
    async fn delete_takes_replies_along() {
        let store = StoreFixture::new()
            .with_root(RootKind::Topic, "t1", "u1")
            .with_comment(RootKind::Topic, "t1", "a", "u1", None)
            .with_comment(RootKind::Topic, "t1", "b", "u2", Some("a"))
            .with_comment(RootKind::Topic, "t1", "c", "u3", Some("b"))
            .with_comment(RootKind::Topic, "t1", "d", "u3", None)
            .with_count(RootKind::Topic, "t1", 4)
            .build();

        let outcome = delete(&store, &settings(), &topic(), "a").await.unwrap();
        assert_eq!(outcome.deleted, 3);
        assert_eq!(outcome.comment_count, Some(1));
        assert!(store
            .contains(&DocRef::parse("topics/t1/comments/d").unwrap())
            .unwrap());

        let again = delete(&store, &settings(), &topic(), "a").await.unwrap();
        assert_eq!(again.deleted, 0);
        assert_eq!(count(&store).await, Some(1));
    }

    fn chain() -> InMemoryStore {
        StoreFixture::new()
            .with_root(RootKind::Topic, "t1", "u1")
            .with_comment(RootKind::Topic, "t1", "a", "u1", None)
            .with_comment(RootKind::Topic, "t1", "b", "u2", Some("a"))
            .with_comment(RootKind::Topic, "t1", "c", "u3", Some("b"))
            .with_count(RootKind::Topic, "t1", 3)
            .build()
    }

    #[tokio::test]
    async fn interrupted_delete_is_finished_by_retry() {
        let store = chain();
        let one_per_batch = CascadeSettings {
            batch_size: 1,
            ..Default::default()
        };
        // Delete of c and its decrement commit, then the store goes down
        store.backend().fail_writes_after(2);
        assert!(delete(&store, &one_per_batch, &topic(), "a").await.is_err());
        assert!(!store.contains(&topic().comment_ref("c")).unwrap());
        assert!(store.contains(&topic().comment_ref("b")).unwrap());
        assert_eq!(count(&store).await, Some(2));

        store.backend().fail_writes_after(usize::MAX);
        let retried = delete(&store, &one_per_batch, &topic(), "a").await.unwrap();
        assert_eq!(retried.deleted, 2);
        assert_eq!(retried.comment_count, Some(0));
        assert_eq!(store.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn failed_decrement_reconciles_counter() {
        let store = chain();
        store.backend().fail_increments(true);

        let result = delete(&store, &settings(), &topic(), "a").await;
        assert!(matches!(result, Err(RefkeepError::Store(_))));
        // Comments are gone and the counter matches them anyway
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(count(&store).await, Some(0));
    }

    #[tokio::test]
    async fn thread_skips_malformed_and_keeps_ghost_replies() {
        let store = StoreFixture::new()
            .with_root(RootKind::Topic, "t1", "u1")
            .with_comment(RootKind::Topic, "t1", "a", "u1", None)
            .with_comment(RootKind::Topic, "t1", "ghost-reply", "u2", Some("deleted"))
            .build();
        store
            .put(
                Document::new(topic().comment_ref("broken"))
                    .with_field("createdAt", "2024-01-01T00:00:00Z"),
            )
            .unwrap();

        let threads = thread(&store, &settings(), &topic()).await.unwrap();
        assert_eq!(thread_size(&threads), 2);
        assert_eq!(threads.len(), 2);
        assert_eq!(threads[1].comment.id, "ghost-reply");
    }
}
