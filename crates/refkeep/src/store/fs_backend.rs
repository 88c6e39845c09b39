use super::backend::{Snapshot, StorageBackend};
use crate::error::{RefkeepError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const SNAPSHOT_FILE: &str = "store.json";

/// JSON snapshot on disk: one file holding every document, keyed by path.
pub struct FsBackend {
    file: PathBuf,
}

impl FsBackend {
    /// `path` may name the snapshot file itself or the directory holding it.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file = if path.is_dir() {
            path.join(SNAPSHOT_FILE)
        } else {
            path
        };
        Self { file }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    fn ensure_dir(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path).map_err(RefkeepError::Io)?;
        }
        Ok(())
    }
}

impl StorageBackend for FsBackend {
    fn load(&self) -> Result<Snapshot> {
        if !self.file.exists() {
            return Ok(Snapshot::new());
        }
        let content = fs::read_to_string(&self.file).map_err(RefkeepError::Io)?;
        if content.trim().is_empty() {
            return Ok(Snapshot::new());
        }
        let snapshot: Snapshot =
            serde_json::from_str(&content).map_err(RefkeepError::Serialization)?;
        Ok(snapshot)
    }

    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let root = self
            .file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        self.ensure_dir(&root)?;

        let content = serde_json::to_string_pretty(snapshot).map_err(RefkeepError::Serialization)?;

        // Write to tmp then rename so a commit is all-or-nothing
        let tmp_file = root.join(format!(".store-{}.tmp", Uuid::new_v4()));
        fs::write(&tmp_file, content).map_err(RefkeepError::Io)?;
        fs::rename(&tmp_file, &self.file).map_err(RefkeepError::Io)?;

        Ok(())
    }
}
