use refkeep::model::{DocRef, Document, RootKind, COMMENT_COUNT_FIELD};
use refkeep::store::backend::StorageBackend;
use refkeep::store::fs::FileStore;
use refkeep::store::fs_backend::FsBackend;
use refkeep::store::{DocumentStore, Query};
use refkeep::test_utils::TestEnv;
use std::fs;

fn topic(id: &str, owner: &str) -> Document {
    Document::new(DocRef::root(RootKind::Topic, id))
        .with_field("ownerId", owner)
        .with_field(COMMENT_COUNT_FIELD, 0)
}

#[test]
fn missing_or_empty_snapshot_is_an_empty_store() {
    let env = TestEnv::new();
    let backend = FsBackend::new(env.root.clone());
    assert!(backend.load().unwrap().is_empty());

    fs::write(env.snapshot_path(), "  \n").unwrap();
    assert!(backend.load().unwrap().is_empty());
}

#[test]
fn corrupted_snapshot_is_a_serialization_error() {
    let env = TestEnv::new();
    fs::write(env.snapshot_path(), "{ not json").unwrap();
    let err = FsBackend::new(env.root.clone()).load().unwrap_err();
    assert!(matches!(err, refkeep::RefkeepError::Serialization(_)));
}

#[tokio::test]
async fn writes_survive_reopening() {
    let env = TestEnv::new();
    env.seed([topic("t1", "u1"), topic("t2", "u1")]);

    env.store
        .increment(&DocRef::root(RootKind::Topic, "t1"), COMMENT_COUNT_FIELD, 3)
        .await
        .unwrap();
    env.store
        .batch_delete(&[DocRef::root(RootKind::Topic, "t2")])
        .await
        .unwrap();

    let reopened = FileStore::open(env.snapshot_path());
    let topics = reopened
        .query("topics", &Query::all())
        .await
        .unwrap();
    assert_eq!(topics.len(), 1);
    assert_eq!(topics[0].int_field(COMMENT_COUNT_FIELD), Some(3));

    let raw = fs::read_to_string(env.snapshot_path()).unwrap();
    assert!(raw.contains("\"topics/t1\""));
    assert!(!raw.contains("topics/t2"));
}

#[tokio::test]
async fn no_temp_files_left_behind() {
    let env = TestEnv::new();
    env.seed([topic("t1", "u1")]);
    env.store
        .batch_delete(&[DocRef::root(RootKind::Topic, "t1")])
        .await
        .unwrap();

    let names: Vec<String> = fs::read_dir(&env.root)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["store.json".to_string()]);
}

#[tokio::test]
async fn api_cascades_against_files() {
    let env = TestEnv::new();
    env.seed([
        Document::new(DocRef::root(RootKind::User, "u1")),
        topic("t1", "u1"),
        Document::new(DocRef::root(RootKind::Topic, "t1").child("comments", "c1"))
            .with_field("authorId", "u1"),
    ]);

    let outcome = env.api().delete_user("u1").await.unwrap();
    assert!(outcome.root_existed);
    assert_eq!(outcome.owned_roots, 2);
    assert!(env.store.is_empty().unwrap());
}
