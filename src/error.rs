use thiserror::Error;

use crate::table::TableId;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("stored value for {key:?} is not a valid {channel}: {reason}")]
    Decode {
        key: String,
        channel: &'static str,
        reason: String,
    },

    #[error("storage backend failed: {0:#}")]
    Backend(#[from] anyhow::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableError {
    #[error("mapping table {0} is missing")]
    MissingTable(TableId),

    #[error("no entry {key:?} in mapping table {table}")]
    UnknownKey { table: TableId, key: String },

    #[error("entry {key:?} already exists in mapping table {table}")]
    DuplicateKey { table: TableId, key: String },

    #[error("entry keys must not be empty")]
    EmptyKey,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InsertError {
    #[error("insert index {index} out of range (len {len})")]
    OutOfRange { index: usize, len: usize },
}
