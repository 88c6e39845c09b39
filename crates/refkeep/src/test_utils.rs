use crate::api::RefkeepApi;
use crate::config::RefkeepConfig;
use crate::model::Document;
use crate::store::fs::FileStore;
use crate::store::fs_backend::SNAPSHOT_FILE;
use std::path::PathBuf;
use tempfile::TempDir;

/// A `FileStore` in a fresh temp directory.
pub struct TestEnv {
    // We keep _temp_dir to ensure the directory is not dropped until the test is done
    pub _temp_dir: TempDir,
    pub store: FileStore,
    pub root: PathBuf,
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("failed to create temp dir");
        let root = temp_dir.path().to_path_buf();
        let store = FileStore::open(root.clone());
        Self {
            _temp_dir: temp_dir,
            store,
            root,
        }
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.root.join(SNAPSHOT_FILE)
    }

    pub fn seed(&self, docs: impl IntoIterator<Item = Document>) {
        for doc in docs {
            self.store.put(doc).expect("failed to seed document");
        }
    }

    /// An API over a second handle on the same snapshot file.
    pub fn api(&self) -> RefkeepApi<FileStore> {
        RefkeepApi::from_config(FileStore::open(self.root.clone()), &RefkeepConfig::default())
    }
}
