use std::path::PathBuf;

use bulletin_common::EventId;

/// The persisted store can't be trusted. Never repaired automatically.
#[derive(Debug, thiserror::Error)]
pub enum CorruptStoreError {
    #[error("store is not a valid store document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("event at index {index} has no id")]
    NullId { index: usize },

    #[error("event id {id} appears more than once")]
    DuplicateId { id: EventId },

    #[error("next_id {next_id} does not exceed the highest event id {max_id}")]
    NextIdNotAbove { next_id: EventId, max_id: EventId },

    #[error("next_id must be at least 1")]
    ZeroNextId,

    #[error("event {id}: `{field}` {problem}")]
    InvalidField {
        id: EventId,
        field: &'static str,
        problem: &'static str,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("corrupt store at {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: CorruptStoreError,
    },

    #[error("refusing to save a store that violates its invariants: {0}")]
    Invalid(#[source] CorruptStoreError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
