use crate::error::Error;
use crate::storage::{AtomicOperation, CommitResult, KvStore, StoreLimits, Versionstamp};
use crate::{debug, error, warn};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ceilings on the checks and mutations one batch may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchLimits {
    pub max_checks: usize,
    pub max_mutations: usize,
}

impl Default for BatchLimits {
    fn default() -> Self {
        BatchLimits { max_checks: 10, max_mutations: 10 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Create => write!(f, "create"),
            Operation::Update => write!(f, "update"),
            Operation::Delete => write!(f, "delete"),
        }
    }
}

/// Staged operations of consecutive items committed together.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub op: AtomicOperation,
    pub items: usize,
}

impl BatchLimits {
    /// The tighter of these limits and the ones a store enforces.
    pub fn within(self, store: StoreLimits) -> BatchLimits {
        BatchLimits { max_checks: self.max_checks.min(store.max_checks), max_mutations: self.max_mutations.min(store.max_mutations) }
    }

    /// Groups per-item operations greedily. Items are never split, an oversized item gets a batch of its own.
    pub fn plan(&self, staged: Vec<AtomicOperation>) -> Vec<Batch> {
        let mut batches = Vec::new();
        let mut current = Batch { op: AtomicOperation::new(), items: 0 };
        for item in staged {
            let overflows = current.op.check_count() + item.check_count() > self.max_checks
                || current.op.mutation_count() + item.mutation_count() > self.max_mutations;
            if current.items > 0 && overflows {
                batches.push(std::mem::replace(&mut current, Batch { op: AtomicOperation::new(), items: 0 }));
            }
            current.op.append(item);
            current.items += 1;
        }
        if current.items > 0 {
            batches.push(current);
        }
        batches
    }
}

/// Stages every item into its own buffer, stopping at the first staging error.
pub fn stage<T>(items: &[T], mut stage_item: impl FnMut(&T, &mut AtomicOperation) -> Result<(), Error>) -> Result<Vec<AtomicOperation>, Error> {
    items
        .iter()
        .map(|item| {
            let mut op = AtomicOperation::new();
            stage_item(item, &mut op)?;
            Ok(op)
        })
        .collect()
}

pub struct BatchExecutor<'s, S: KvStore> {
    store: &'s S,
    limits: BatchLimits,
}

impl<'s, S: KvStore> BatchExecutor<'s, S> {
    pub fn new(store: &'s S, limits: BatchLimits) -> Self {
        BatchExecutor { store, limits }
    }

    /// Commits batches one after another and returns one versionstamp per item.
    /// Batches are sized to fit the store's own limits too; an item the store can never accept
    /// fails the call before anything is committed. Any failure after the first commit is
    /// reported as a batch error carrying the number of items already committed.
    pub async fn execute(&self, operation: Operation, staged: Vec<AtomicOperation>) -> Result<Vec<Versionstamp>, Error> {
        let store_limits = self.store.limits();
        let batches = self.limits.within(store_limits).plan(staged);
        for batch in &batches {
            store_limits.verify(&batch.op)?;
        }
        let total = batches.len();
        let mut stamps = Vec::new();
        for (index, batch) in batches.into_iter().enumerate() {
            let items = batch.items;
            match self.store.commit(batch.op).await {
                Ok(CommitResult::Committed(stamp)) => {
                    debug!("{} batch {}/{} with {} items committed at {}", operation, index + 1, total, items, stamp);
                    stamps.extend(std::iter::repeat(stamp).take(items));
                }
                Ok(CommitResult::CheckFailed) => {
                    warn!("{} batch {}/{} failed its checks, {} items committed before", operation, index + 1, total, stamps.len());
                    return Err(Error::BatchOperation { operation, batch: index, committed: stamps.len() });
                }
                Err(e) if stamps.is_empty() => return Err(e.into()),
                Err(e) => {
                    error!("{} batch {}/{} failed, {} items committed before: {}", operation, index + 1, total, stamps.len(), e);
                    return Err(Error::BatchOperation { operation, batch: index, committed: stamps.len() });
                }
            }
        }
        Ok(stamps)
    }
}
