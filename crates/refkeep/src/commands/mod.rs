//! # Command Layer
//!
//! This module contains the **integrity logic** of refkeep. Each operation lives
//! in its own submodule as async functions generic over [`DocumentStore`].
//!
//! ## Role and Responsibilities
//!
//! - Decide *what* must be deleted, adjusted or reported, and in which order
//! - Chunk writes to the store's batch limit and bound every call with a timeout
//! - Return structured outcomes (counts, references, warnings), never strings
//!
//! ## What Commands Do NOT Do
//!
//! - **Any terminal I/O**: outcomes carry [`CmdMessage`]s, the UI decides how to show them
//! - **Authentication**: callers pass an already-verified identity
//! - **Retries**: every step is idempotent, so the caller retries the whole operation
//!
//! ## Ordering Rule
//!
//! There are no transactions across batches. Every multi-batch operation
//! commits children before parents and data before counters, so a crash
//! between two commits leaves orphans behind (detectable by [`scan`],
//! repairable by [`clean`]) rather than replies cut off from their root.
//! Counters are lowered after every committed batch; a comment delete that
//! fails reconciles its root's counter before returning the error.
//!
//! ## Command Modules
//!
//! - [`cascade`]: delete a root and everything that depends on it
//! - [`comments`]: add, delete and thread the comments of one root
//! - [`counters`]: atomic decrements and full counter reconciliation
//! - [`scan`]: read-only orphan detection
//! - [`clean`]: explicit repair of a scan report
//! - [`helpers`]: timeouts and chunked batch deletes
//!
//! [`DocumentStore`]: crate::store::DocumentStore

use serde::Serialize;

pub mod cascade;
pub mod clean;
pub mod comments;
pub mod counters;
pub mod helpers;
pub mod scan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CmdMessage {
    pub level: MessageLevel,
    pub content: String,
}

impl CmdMessage {
    pub fn info(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Info,
            content: content.into(),
        }
    }

    pub fn success(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Success,
            content: content.into(),
        }
    }

    pub fn warning(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Warning,
            content: content.into(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Error,
            content: content.into(),
        }
    }
}
