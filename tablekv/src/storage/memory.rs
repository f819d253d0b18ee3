use super::key::prefix_successor;
use super::{AtomicOperation, CommitResult, Entry, Key, KvStore, MaybeEntry, Mutation, StoreLimits, Versionstamp};
use crate::error::StoreError;
use crate::value::Record;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Mutex;

#[derive(Default)]
struct State {
    entries: BTreeMap<Vec<u8>, (Key, Record, Versionstamp)>,
    sequence: u64,
}

/// In-process ordered store. Commits are serialized by a single mutex.
pub struct MemoryStore {
    state: Mutex<State>,
    limits: StoreLimits,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_limits(StoreLimits::default())
    }

    pub fn with_limits(limits: StoreLimits) -> Self {
        MemoryStore { state: Mutex::new(State::default()), limits }
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.state.lock()?.entries.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    fn read(&self, key: &Key) -> Result<MaybeEntry, StoreError> {
        let state = self.state.lock()?;
        Ok(match state.entries.get(&key.encode()) {
            Some((k, value, stamp)) => MaybeEntry { key: k.clone(), value: Some(value.clone()), versionstamp: Some(*stamp) },
            None => MaybeEntry::absent(key.clone()),
        })
    }

    fn range(&self, prefix: &Key) -> Result<Vec<Entry>, StoreError> {
        let from = prefix.encode();
        let upper = match prefix_successor(&from) {
            Some(end) => Bound::Excluded(end),
            None => Bound::Unbounded,
        };
        let state = self.state.lock()?;
        Ok(state
            .entries
            .range((Bound::Excluded(from), upper))
            .map(|(_, (key, value, stamp))| Entry { key: key.clone(), value: value.clone(), versionstamp: *stamp })
            .collect())
    }

    fn apply(&self, op: AtomicOperation) -> Result<CommitResult, StoreError> {
        self.limits.verify(&op)?;
        let (checks, mutations) = op.into_parts();
        let mut state = self.state.lock()?;
        for check in &checks {
            let current = state.entries.get(&check.key.encode()).map(|(_, _, stamp)| *stamp);
            if current != check.versionstamp {
                return Ok(CommitResult::CheckFailed);
            }
        }
        state.sequence += 1;
        let stamp = Versionstamp::from_sequence(state.sequence);
        for mutation in mutations {
            match mutation {
                Mutation::Set(key, value) => {
                    state.entries.insert(key.encode(), (key, value, stamp));
                }
                Mutation::Delete(key) => {
                    state.entries.remove(&key.encode());
                }
            }
        }
        Ok(CommitResult::Committed(stamp))
    }
}

impl KvStore for MemoryStore {
    fn limits(&self) -> StoreLimits {
        self.limits
    }

    async fn get(&self, key: &Key) -> Result<MaybeEntry, StoreError> {
        self.read(key)
    }

    async fn get_many(&self, keys: &[Key]) -> Result<Vec<MaybeEntry>, StoreError> {
        keys.iter().map(|key| self.read(key)).collect()
    }

    async fn scan(&self, prefix: &Key) -> Result<Vec<Entry>, StoreError> {
        self.range(prefix)
    }

    async fn commit(&self, op: AtomicOperation) -> Result<CommitResult, StoreError> {
        self.apply(op)
    }
}
