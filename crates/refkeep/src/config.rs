//! # Configuration
//!
//! Refkeep configuration is managed by [`confique`], which handles layered
//! loading from a TOML file, environment variables, and compiled defaults.
//!
//! ## Resolution Order
//!
//! 1. **Environment variables**: `REFKEEP_MAX_BATCH_OPS`, `REFKEEP_OP_TIMEOUT_MS`, etc.
//! 2. **Config file**: `--config <path>`, else `refkeep.toml` in the OS config
//!    directory (via the `directories` crate).
//! 3. **Compiled defaults**: `#[config(default = ...)]`.
//!
//! ## Available Settings
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | `max_batch_ops` | `500` | Largest delete batch sent to the store |
//! | `op_timeout_ms` | `10000` | Deadline for each individual store call |
//! | `sweep_ghost_comments` | `true` | Run the cross-root sweep when deleting a user |
//! | `store_path` | none | Snapshot file used by the admin CLI |

use crate::error::Result;
use crate::store::DocumentStore;
use confique::Config;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE: &str = "refkeep.toml";

/// Configuration for refkeep, stored in `refkeep.toml`.
#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RefkeepConfig {
    /// Largest number of deletes committed in one batch. Clamped to the
    /// store's own limit.
    #[config(default = 500, env = "REFKEEP_MAX_BATCH_OPS")]
    pub max_batch_ops: usize,

    /// Deadline in milliseconds for each individual store call.
    #[config(default = 10000, env = "REFKEEP_OP_TIMEOUT_MS")]
    pub op_timeout_ms: u64,

    /// Whether deleting a user also sweeps the user's comments on other roots.
    #[config(default = true, env = "REFKEEP_SWEEP_GHOST_COMMENTS")]
    pub sweep_ghost_comments: bool,

    /// Snapshot file (or directory holding `store.json`) for the admin CLI.
    #[config(env = "REFKEEP_STORE_PATH")]
    pub store_path: Option<PathBuf>,
}

impl Default for RefkeepConfig {
    fn default() -> Self {
        Self {
            max_batch_ops: 500,
            op_timeout_ms: 10_000,
            sweep_ghost_comments: true,
            store_path: None,
        }
    }
}

impl RefkeepConfig {
    /// Loads env, then `file` (or the default config file if present), then defaults.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = RefkeepConfig::builder().env();
        match file {
            Some(path) => builder = builder.file(path),
            None => {
                if let Some(default) = default_config_file() {
                    builder = builder.file(default);
                }
            }
        }
        Ok(builder.load()?)
    }

    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }

    /// Runtime settings for one store.
    pub fn settings_for<S: DocumentStore + ?Sized>(&self, store: &S) -> CascadeSettings {
        CascadeSettings {
            batch_size: self.max_batch_ops.clamp(1, store.max_batch_ops().max(1)),
            op_timeout: self.op_timeout(),
            sweep_ghost_comments: self.sweep_ghost_comments,
        }
    }
}

/// Commented TOML sample of every setting.
pub fn template() -> String {
    confique::toml::template::<RefkeepConfig>(confique::toml::FormatOptions::default())
}

pub fn default_config_file() -> Option<PathBuf> {
    ProjectDirs::from("dev", "refkeep", "refkeep").map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

/// What the cascade, scan and repair operations need at run time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeSettings {
    pub batch_size: usize,
    pub op_timeout: Duration,
    pub sweep_ghost_comments: bool,
}

impl Default for CascadeSettings {
    fn default() -> Self {
        Self {
            batch_size: 500,
            op_timeout: Duration::from_millis(10_000),
            sweep_ghost_comments: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;
    use std::fs;

    #[test]
    fn test_default_config() {
        let config = RefkeepConfig::default();
        assert_eq!(config.max_batch_ops, 500);
        assert_eq!(config.op_timeout(), Duration::from_secs(10));
        assert!(config.sweep_ghost_comments);
        assert!(config.store_path.is_none());
    }

    #[test]
    fn test_batch_size_clamped_to_store_limit() {
        let store = InMemoryStore::new().with_max_batch_ops(50);
        let settings = RefkeepConfig::default().settings_for(&store);
        assert_eq!(settings.batch_size, 50);

        let config = RefkeepConfig {
            max_batch_ops: 0,
            ..Default::default()
        };
        assert_eq!(config.settings_for(&store).batch_size, 1);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "max_batch_ops = 20\nsweep_ghost_comments = false\n").unwrap();

        let config = RefkeepConfig::load(Some(&path)).unwrap();
        assert_eq!(config.max_batch_ops, 20);
        assert!(!config.sweep_ghost_comments);
        assert_eq!(config.op_timeout_ms, 10_000);
    }

    #[test]
    fn test_template_parses_back() {
        let sample = template();
        assert!(sample.contains("max_batch_ops"));
        let parsed: toml::Value = toml::from_str(&sample).unwrap();
        assert!(parsed.is_table());
    }
}
