use super::doc_store::DocStore;
use super::mem_backend::MemBackend;

pub type InMemoryStore = DocStore<MemBackend>;

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        DocStore::with_backend(MemBackend::new())
    }
}

// --- Test Fixtures ---

#[cfg(any(test, feature = "test_utils"))]
pub mod fixtures {
    use super::*;
    use crate::model::{
        AuthorRef, Comment, DocRef, Document, RootKind, RootRef, SocialEdge, COMMENT_COUNT_FIELD,
        NOTIFICATIONS, OWNER_FIELD, RECIPIENT_FIELD, SENDER_FIELD,
    };
    use chrono::{DateTime, Duration, TimeZone, Utc};

    /// Fixed origin for fixture timestamps; minute offsets order comments.
    pub fn at(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minute)
    }

    pub fn comment(
        root: &RootRef,
        id: &str,
        author: &str,
        parent: Option<&str>,
        minute: i64,
    ) -> Comment {
        Comment {
            id: id.to_string(),
            content: format!("comment {}", id),
            author: AuthorRef::new(author, author.to_uppercase()),
            created_at: at(minute),
            parent_comment_id: parent.map(str::to_string),
            root: root.clone(),
        }
    }

    /// Builds a store through its synchronous seeding path.
    ///
    /// Comments added here do NOT touch the root's `commentCount`; use
    /// `with_count` to set it explicitly, including to drifted values.
    pub struct StoreFixture {
        pub store: InMemoryStore,
        clock: i64,
    }

    impl Default for StoreFixture {
        fn default() -> Self {
            Self::new()
        }
    }

    impl StoreFixture {
        pub fn new() -> Self {
            Self {
                store: InMemoryStore::new(),
                clock: 0,
            }
        }

        pub fn with_max_batch_ops(mut self, max: usize) -> Self {
            self.store = self.store.with_max_batch_ops(max);
            self
        }

        pub fn with_user(self, uid: &str) -> Self {
            let doc = Document::new(DocRef::root(RootKind::User, uid))
                .with_field("displayName", uid.to_uppercase())
                .with_field(COMMENT_COUNT_FIELD, 0);
            self.store.put(doc).unwrap();
            self
        }

        pub fn with_root(self, kind: RootKind, id: &str, owner: &str) -> Self {
            let doc = Document::new(DocRef::root(kind, id))
                .with_field(OWNER_FIELD, owner)
                .with_field("title", format!("{} {}", kind, id))
                .with_field(COMMENT_COUNT_FIELD, 0);
            self.store.put(doc).unwrap();
            self
        }

        pub fn with_count(self, kind: RootKind, id: &str, count: i64) -> Self {
            let reference = DocRef::root(kind, id);
            let mut doc = Document::new(reference.clone());
            if let Ok(snapshot) = crate::store::backend::StorageBackend::load(&self.store.backend) {
                if let Some(fields) = snapshot.get(&reference.path()) {
                    doc.fields = fields.clone();
                }
            }
            self.store
                .put(doc.with_field(COMMENT_COUNT_FIELD, count))
                .unwrap();
            self
        }

        /// Adds a comment timestamped after every earlier fixture comment.
        pub fn with_comment(
            mut self,
            kind: RootKind,
            root_id: &str,
            id: &str,
            author: &str,
            parent: Option<&str>,
        ) -> Self {
            self.clock += 1;
            let c = comment(&RootRef::new(kind, root_id), id, author, parent, self.clock);
            self.store.put(c.to_document().unwrap()).unwrap();
            self
        }

        pub fn with_follow(self, follower: &str, following: &str) -> Self {
            let edge = SocialEdge::new(follower, following);
            self.with_edge_half(edge.follower_half(), following)
                .with_edge_half(edge.followee_half(), follower)
        }

        /// Writes only the follower side of an edge.
        pub fn with_half_follow(self, follower: &str, following: &str) -> Self {
            let edge = SocialEdge::new(follower, following);
            self.with_edge_half(edge.follower_half(), following)
        }

        fn with_edge_half(self, half: DocRef, other: &str) -> Self {
            self.store
                .put(Document::new(half).with_field("userId", other))
                .unwrap();
            self
        }

        pub fn with_notification(mut self, id: &str, sender: &str, recipient: &str) -> Self {
            self.clock += 1;
            let doc = Document::new(DocRef::new(NOTIFICATIONS, id))
                .with_field(SENDER_FIELD, sender)
                .with_field(RECIPIENT_FIELD, recipient)
                .with_field("type", "reply")
                .with_field("createdAt", at(self.clock).to_rfc3339());
            self.store.put(doc).unwrap();
            self
        }

        pub fn build(self) -> InMemoryStore {
            self.store
        }
    }
}
