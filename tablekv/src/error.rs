use crate::batch::Operation;
use crate::schema::ValidationError;
use std::sync::PoisonError;
use thiserror::Error;
use tokio::task::JoinError;

/// Failures raised by a [`crate::storage::KvStore`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Join: {0}")]
    Join(#[from] JoinError),

    #[error("Poisoned lock: {0}")]
    Poisoned(String),

    #[error("Corrupt key: {0}")]
    CorruptKey(String),

    #[error("atomic operation too large: {checks} checks / {mutations} mutations, limits are {max_checks} / {max_mutations}")]
    OperationLimit { checks: usize, mutations: usize, max_checks: usize, max_mutations: usize },
}

impl<T> From<PoisonError<T>> for StoreError {
    fn from(e: PoisonError<T>) -> Self {
        StoreError::Poisoned(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Key error: {0}")]
    Key(String),

    #[error("Could not create item: {0}")]
    CreateItem(String),

    #[error("Could not update item: {message}")]
    Update { message: String, conflict: bool },

    #[error("Could not delete item: {0}")]
    DeleteItem(String),

    #[error("{operation} failed in batch {batch}, {committed} items were committed before the failure")]
    BatchOperation { operation: Operation, batch: usize, committed: usize },

    #[error("Relation error: {0}")]
    Relation(String),

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
}

impl Error {
    /// True when the error is a failed commit precondition that a retry against fresh data may resolve.
    pub fn is_conflict(&self) -> bool {
        match self {
            Error::Update { conflict, .. } => *conflict,
            Error::DeleteItem(_) => true,
            Error::BatchOperation { operation, .. } => matches!(operation, Operation::Update | Operation::Delete),
            _ => false,
        }
    }
}
