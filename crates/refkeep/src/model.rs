//! # Domain Model: Documents, Roots and Their Dependents
//!
//! The store is schemaless: every record is a [`Document`], a bag of JSON fields
//! addressed by a [`DocRef`]. This module gives those bags typed views
//! ([`Comment`], [`Notification`], [`SocialEdge`]) and names the collections the
//! integrity layer reasons about.
//!
//! ## Storage Layout
//!
//! ```text
//! users/{uid}                                 root, commentCount
//! users/{uid}/following/{other}               social edge, follower half
//! users/{uid}/followers/{other}               social edge, followee half
//! resolutions/{id}    topics/{id}    journalEntries/{id}
//!                                             owned roots, ownerId + commentCount
//! {rootCollection}/{rootId}/comments/{cid}    comment (flat, parentCommentId)
//! notifications/{id}                          derived, senderId/recipientId
//! ```
//!
//! Comments are stored under their root, but nothing in the store guarantees
//! the root still exists. A comment whose root (or parent comment) is gone is
//! a *ghost*; see [`crate::commands::scan`].
//!
//! ## Time
//!
//! `createdAt` is only ever an ordering key. No deletion decision reads a clock.

use crate::error::{RefkeepError, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

pub const OWNER_FIELD: &str = "ownerId";
pub const COMMENT_COUNT_FIELD: &str = "commentCount";
pub const AUTHOR_FIELD: &str = "authorId";
pub const SENDER_FIELD: &str = "senderId";
pub const RECIPIENT_FIELD: &str = "recipientId";

pub const COMMENTS: &str = "comments";
pub const FOLLOWING: &str = "following";
pub const FOLLOWERS: &str = "followers";
pub const NOTIFICATIONS: &str = "notifications";

/// The four kinds of top-level records that own comments.
///
/// Serialized as the name of the collection holding them, which is also what
/// comments store in their `rootCollection` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RootKind {
    #[serde(rename = "users")]
    User,
    #[serde(rename = "resolutions")]
    Resolution,
    #[serde(rename = "topics")]
    Topic,
    #[serde(rename = "journalEntries")]
    JournalEntry,
}

impl RootKind {
    pub const ALL: [RootKind; 4] = [
        RootKind::User,
        RootKind::Resolution,
        RootKind::Topic,
        RootKind::JournalEntry,
    ];

    pub fn collection(self) -> &'static str {
        match self {
            RootKind::User => "users",
            RootKind::Resolution => "resolutions",
            RootKind::Topic => "topics",
            RootKind::JournalEntry => "journalEntries",
        }
    }

    pub fn from_collection(name: &str) -> Option<Self> {
        RootKind::ALL
            .into_iter()
            .find(|kind| kind.collection() == name)
    }
}

impl fmt::Display for RootKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RootKind::User => "user",
            RootKind::Resolution => "resolution",
            RootKind::Topic => "topic",
            RootKind::JournalEntry => "journal",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for RootKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "user" | "users" => Ok(RootKind::User),
            "resolution" | "resolutions" => Ok(RootKind::Resolution),
            "topic" | "topics" => Ok(RootKind::Topic),
            "journal" | "journal-entry" | "journalentry" | "journalentries" => {
                Ok(RootKind::JournalEntry)
            }
            _ => Err(format!("Unknown root kind: {}", s)),
        }
    }
}

/// Address of a single document.
///
/// `collection` is the full collection path, so a comment under topic `t1`
/// lives in collection `topics/t1/comments`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocRef {
    pub collection: String,
    pub id: String,
}

impl DocRef {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }

    pub fn root(kind: RootKind, id: impl Into<String>) -> Self {
        Self::new(kind.collection(), id)
    }

    /// Path of a subcollection hanging off this document.
    pub fn subcollection(&self, name: &str) -> String {
        format!("{}/{}/{}", self.collection, self.id, name)
    }

    pub fn child(&self, subcollection: &str, id: impl Into<String>) -> DocRef {
        DocRef::new(self.subcollection(subcollection), id)
    }

    pub fn path(&self) -> String {
        format!("{}/{}", self.collection, self.id)
    }

    /// Parses `a/b` or `a/b/c/d` style document paths.
    pub fn parse(path: &str) -> Option<DocRef> {
        let segments: Vec<&str> = path.split('/').collect();
        if segments.len() < 2 || segments.len() % 2 != 0 || segments.iter().any(|s| s.is_empty())
        {
            return None;
        }
        let (collection, id) = segments.split_at(segments.len() - 1);
        Some(DocRef::new(collection.join("/"), id[0]))
    }

    /// Last segment of the collection path (`comments` for a comment).
    pub fn collection_name(&self) -> &str {
        self.collection
            .rsplit('/')
            .next()
            .unwrap_or(self.collection.as_str())
    }

    /// The document one level up in storage, if this is a subcollection document.
    pub fn parent_doc(&self) -> Option<DocRef> {
        let segments: Vec<&str> = self.collection.split('/').collect();
        if segments.len() < 3 {
            return None;
        }
        let parent_collection = segments[..segments.len() - 2].join("/");
        Some(DocRef::new(parent_collection, segments[segments.len() - 2]))
    }

    /// Root kind of a top-level document (`topics/t1` -> Topic).
    pub fn root_kind(&self) -> Option<RootKind> {
        if self.collection.contains('/') {
            return None;
        }
        RootKind::from_collection(&self.collection)
    }
}

impl fmt::Display for DocRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// A stored record: its address plus schemaless fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub reference: DocRef,
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(reference: DocRef) -> Self {
        Self {
            reference,
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    pub fn int_field(&self, name: &str) -> Option<i64> {
        self.fields.get(name).and_then(Value::as_i64)
    }

    /// Decodes the fields into a typed view.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(Value::Object(self.fields.clone())).map_err(|source| {
            RefkeepError::Malformed {
                path: self.reference.path(),
                source,
            }
        })
    }
}

/// Denormalized author fields stored on every comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorRef {
    #[serde(rename = "authorId")]
    pub id: String,
    #[serde(rename = "authorName", default)]
    pub display_name: String,
    #[serde(
        rename = "authorPhoto",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub photo_url: Option<String>,
}

impl AuthorRef {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            photo_url: None,
        }
    }
}

/// The root a comment declares it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RootRef {
    #[serde(rename = "rootCollection")]
    pub kind: RootKind,
    #[serde(rename = "rootId")]
    pub id: String,
}

impl RootRef {
    pub fn new(kind: RootKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    pub fn doc_ref(&self) -> DocRef {
        DocRef::root(self.kind, self.id.clone())
    }

    pub fn comments_collection(&self) -> String {
        self.doc_ref().subcollection(COMMENTS)
    }

    pub fn comment_ref(&self, comment_id: impl Into<String>) -> DocRef {
        self.doc_ref().child(COMMENTS, comment_id)
    }
}

impl fmt::Display for RootRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    /// Taken from the document address, not stored as a field.
    #[serde(skip)]
    pub id: String,
    pub content: String,
    #[serde(flatten)]
    pub author: AuthorRef,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_comment_id: Option<String>,
    #[serde(flatten)]
    pub root: RootRef,
}

impl Comment {
    pub fn from_document(doc: &Document) -> Result<Comment> {
        let mut comment: Comment = doc.decode()?;
        comment.id = doc.reference.id.clone();
        Ok(comment)
    }

    pub fn reference(&self) -> DocRef {
        self.root.comment_ref(self.id.clone())
    }

    pub fn to_document(&self) -> Result<Document> {
        let fields = match serde_json::to_value(self)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Ok(Document {
            reference: self.reference(),
            fields,
        })
    }
}

/// Derived record; only the two user references matter for integrity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub recipient_id: String,
    pub sender_id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Notification {
    pub fn from_document(doc: &Document) -> Result<Notification> {
        doc.decode()
    }

    /// Sender and recipient uids.
    pub fn parties(&self) -> [&str; 2] {
        [self.sender_id.as_str(), self.recipient_id.as_str()]
    }
}

/// A follow relationship, stored twice: once under each endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SocialEdge {
    pub follower: String,
    pub following: String,
}

impl SocialEdge {
    pub fn new(follower: impl Into<String>, following: impl Into<String>) -> Self {
        Self {
            follower: follower.into(),
            following: following.into(),
        }
    }

    /// `users/{follower}/following/{following}`
    pub fn follower_half(&self) -> DocRef {
        DocRef::root(RootKind::User, self.follower.clone()).child(FOLLOWING, self.following.clone())
    }

    /// `users/{following}/followers/{follower}`
    pub fn followee_half(&self) -> DocRef {
        DocRef::root(RootKind::User, self.following.clone()).child(FOLLOWERS, self.follower.clone())
    }

    pub fn halves(&self) -> [DocRef; 2] {
        [self.follower_half(), self.followee_half()]
    }

    /// Recovers the edge from the address of either half.
    pub fn from_half(half: &DocRef) -> Option<SocialEdge> {
        let owner = half.parent_doc()?;
        if owner.root_kind() != Some(RootKind::User) {
            return None;
        }
        match half.collection_name() {
            FOLLOWING => Some(SocialEdge::new(owner.id, half.id.clone())),
            FOLLOWERS => Some(SocialEdge::new(half.id.clone(), owner.id)),
            _ => None,
        }
    }

    /// The other half of the edge `half` belongs to.
    pub fn mirror_of(half: &DocRef) -> Option<DocRef> {
        let edge = SocialEdge::from_half(half)?;
        if half.collection_name() == FOLLOWING {
            Some(edge.followee_half())
        } else {
            Some(edge.follower_half())
        }
    }
}

/// A caller whose identity has already been verified by the host application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
    pub elevated: bool,
}

impl Identity {
    pub fn user(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            elevated: false,
        }
    }

    pub fn admin(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            elevated: true,
        }
    }

    pub fn may_act_for(&self, uid: &str) -> bool {
        self.elevated || self.uid == uid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn parses_nested_paths() {
        let doc = DocRef::parse("topics/t1/comments/c9").unwrap();
        assert_eq!(doc.collection, "topics/t1/comments");
        assert_eq!(doc.id, "c9");
        assert_eq!(doc.collection_name(), "comments");
        assert_eq!(doc.parent_doc(), Some(DocRef::root(RootKind::Topic, "t1")));
        assert_eq!(doc.path(), "topics/t1/comments/c9");
    }

    #[test]
    fn rejects_collection_paths() {
        assert!(DocRef::parse("topics").is_none());
        assert!(DocRef::parse("topics/t1/comments").is_none());
        assert!(DocRef::parse("topics//comments/c1").is_none());
    }

    #[test]
    fn top_level_docs_have_no_parent() {
        let topic = DocRef::root(RootKind::Topic, "t1");
        assert!(topic.parent_doc().is_none());
        assert_eq!(topic.root_kind(), Some(RootKind::Topic));
        assert_eq!(topic.child(COMMENTS, "c1").root_kind(), None);
    }

    #[test]
    fn root_kind_accepts_cli_and_collection_names() {
        assert_eq!("topic".parse::<RootKind>(), Ok(RootKind::Topic));
        assert_eq!("journalEntries".parse::<RootKind>(), Ok(RootKind::JournalEntry));
        assert_eq!("Users".parse::<RootKind>(), Ok(RootKind::User));
        assert!("post".parse::<RootKind>().is_err());
    }

    #[test]
    fn comment_reads_flattened_fields() {
        let doc = Document {
            reference: DocRef::parse("topics/t1/comments/c1").unwrap(),
            fields: json!({
                "content": "hello",
                "authorId": "u1",
                "authorName": "Ada",
                "createdAt": "2024-01-02T03:04:05Z",
                "parentCommentId": "c0",
                "rootId": "t1",
                "rootCollection": "topics"
            })
            .as_object()
            .cloned()
            .unwrap(),
        };

        let comment = Comment::from_document(&doc).unwrap();
        assert_eq!(comment.id, "c1");
        assert_eq!(comment.author.id, "u1");
        assert_eq!(comment.parent_comment_id.as_deref(), Some("c0"));
        assert_eq!(comment.root, RootRef::new(RootKind::Topic, "t1"));
        assert_eq!(
            comment.created_at,
            Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
        );
        assert_eq!(comment.reference(), doc.reference);

        let written = comment.to_document().unwrap();
        assert_eq!(written.str_field("authorId"), Some("u1"));
        assert_eq!(written.str_field("rootCollection"), Some("topics"));
        assert!(!written.fields.contains_key("id"));
    }

    #[test]
    fn malformed_comment_names_its_path() {
        let doc = Document::new(DocRef::parse("topics/t1/comments/c1").unwrap())
            .with_field("content", "no author");
        match Comment::from_document(&doc) {
            Err(RefkeepError::Malformed { path, .. }) => assert_eq!(path, "topics/t1/comments/c1"),
            other => panic!("Expected Malformed, got {:?}", other),
        }
    }

    #[test]
    fn edge_halves_mirror_each_other() {
        let edge = SocialEdge::new("a", "b");
        assert_eq!(edge.follower_half().path(), "users/a/following/b");
        assert_eq!(edge.followee_half().path(), "users/b/followers/a");
        assert_eq!(SocialEdge::from_half(&edge.followee_half()), Some(edge.clone()));
        assert_eq!(
            SocialEdge::mirror_of(&edge.follower_half()),
            Some(edge.followee_half())
        );
        assert!(SocialEdge::from_half(&DocRef::parse("topics/t1/comments/c1").unwrap()).is_none());
    }

    #[test]
    fn notification_needs_only_its_parties() {
        let doc = Document::new(DocRef::new(NOTIFICATIONS, "n1"))
            .with_field(SENDER_FIELD, "u2")
            .with_field(RECIPIENT_FIELD, "u1");
        let n = Notification::from_document(&doc).unwrap();
        assert_eq!(n.parties(), ["u2", "u1"]);
        assert!(n.created_at.is_none());

        let missing = Document::new(DocRef::new(NOTIFICATIONS, "n2")).with_field(SENDER_FIELD, "u2");
        assert!(matches!(
            Notification::from_document(&missing),
            Err(RefkeepError::Malformed { .. })
        ));
    }

    #[test]
    fn identity_checks() {
        assert!(Identity::user("u1").may_act_for("u1"));
        assert!(!Identity::user("u1").may_act_for("u2"));
        assert!(Identity::admin("ops").may_act_for("u2"));
    }
}
