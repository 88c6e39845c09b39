use super::doc_store::DocStore;
use super::fs_backend::FsBackend;
use std::path::PathBuf;

pub type FileStore = DocStore<FsBackend>;

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        DocStore::with_backend(FsBackend::new(path))
    }
}
