use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RefkeepError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Batch of {size} operations exceeds the store limit of {limit}")]
    BatchTooLarge { size: usize, limit: usize },

    #[error("Timed out after {0:?} while {1}")]
    Timeout(Duration, String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Malformed document {path}: {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] confique::Error),
}

impl RefkeepError {
    /// Whether retrying the whole operation may succeed.
    ///
    /// Every cascade step is idempotent, so callers can simply re-run the
    /// operation on a transient failure.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RefkeepError::Timeout(..) | RefkeepError::Store(_) | RefkeepError::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, RefkeepError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(RefkeepError::Timeout(Duration::from_millis(5), "querying".into()).is_transient());
        assert!(RefkeepError::Store("connection reset".into()).is_transient());
        assert!(!RefkeepError::NotFound("users/u1".into()).is_transient());
        assert!(!RefkeepError::PermissionDenied("nope".into()).is_transient());
        assert!(!RefkeepError::BatchTooLarge { size: 3, limit: 2 }.is_transient());
    }

    #[test]
    fn messages_name_the_problem() {
        let err = RefkeepError::BatchTooLarge { size: 600, limit: 500 };
        assert_eq!(
            err.to_string(),
            "Batch of 600 operations exceeds the store limit of 500"
        );
    }
}
