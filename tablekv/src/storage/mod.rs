pub mod key;
pub mod memory;
pub mod redb_store;

pub use key::{Key, KeyPart};
pub use memory::MemoryStore;
pub use redb_store::RedbStore;

use crate::error::StoreError;
use crate::value::Record;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::str::FromStr;

/// Opaque commit token. The first eight bytes carry the store's commit sequence, so later commits compare greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Versionstamp([u8; 10]);

impl Versionstamp {
    pub fn from_sequence(sequence: u64) -> Self {
        let mut bytes = [0u8; 10];
        bytes[..8].copy_from_slice(&sequence.to_be_bytes());
        Versionstamp(bytes)
    }

    pub fn sequence(&self) -> u64 {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.0[..8]);
        u64::from_be_bytes(buf)
    }

    pub fn from_bytes(bytes: [u8; 10]) -> Self {
        Versionstamp(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 10] {
        &self.0
    }
}

impl fmt::Display for Versionstamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for Versionstamp {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 10];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Versionstamp(bytes))
    }
}

/// A present record copy.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub key: Key,
    pub value: Record,
    pub versionstamp: Versionstamp,
}

/// Result slot of a point read; value and versionstamp are both `None` for absent keys.
#[derive(Debug, Clone, PartialEq)]
pub struct MaybeEntry {
    pub key: Key,
    pub value: Option<Record>,
    pub versionstamp: Option<Versionstamp>,
}

impl MaybeEntry {
    pub fn absent(key: Key) -> Self {
        MaybeEntry { key, value: None, versionstamp: None }
    }

    pub fn into_entry(self) -> Option<Entry> {
        match (self.value, self.versionstamp) {
            (Some(value), Some(versionstamp)) => Some(Entry { key: self.key, value, versionstamp }),
            _ => None,
        }
    }
}

impl From<Entry> for MaybeEntry {
    fn from(entry: Entry) -> Self {
        MaybeEntry { key: entry.key, value: Some(entry.value), versionstamp: Some(entry.versionstamp) }
    }
}

/// Commit precondition: `versionstamp: None` means the key must not exist.
#[derive(Debug, Clone, PartialEq)]
pub struct Check {
    pub key: Key,
    pub versionstamp: Option<Versionstamp>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Set(Key, Record),
    Delete(Key),
}

impl Mutation {
    pub fn key(&self) -> &Key {
        match self {
            Mutation::Set(key, _) | Mutation::Delete(key) => key,
        }
    }
}

/// Staged checks and mutations applied by one [`KvStore::commit`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AtomicOperation {
    checks: Vec<Check>,
    mutations: Vec<Mutation>,
}

impl AtomicOperation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, key: Key, versionstamp: Option<Versionstamp>) -> &mut Self {
        self.checks.push(Check { key, versionstamp });
        self
    }

    pub fn set(&mut self, key: Key, value: Record) -> &mut Self {
        self.mutations.push(Mutation::Set(key, value));
        self
    }

    pub fn delete(&mut self, key: Key) -> &mut Self {
        self.mutations.push(Mutation::Delete(key));
        self
    }

    pub fn checks(&self) -> &[Check] {
        &self.checks
    }

    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    pub fn check_count(&self) -> usize {
        self.checks.len()
    }

    pub fn mutation_count(&self) -> usize {
        self.mutations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty() && self.mutations.is_empty()
    }

    pub fn append(&mut self, other: AtomicOperation) {
        self.checks.extend(other.checks);
        self.mutations.extend(other.mutations);
    }

    pub fn into_parts(self) -> (Vec<Check>, Vec<Mutation>) {
        (self.checks, self.mutations)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitResult {
    Committed(Versionstamp),
    CheckFailed,
}

/// Per-commit ceilings a store enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreLimits {
    pub max_checks: usize,
    pub max_mutations: usize,
}

impl Default for StoreLimits {
    fn default() -> Self {
        StoreLimits { max_checks: 100, max_mutations: 1000 }
    }
}

impl StoreLimits {
    pub fn verify(&self, op: &AtomicOperation) -> Result<(), StoreError> {
        if op.check_count() > self.max_checks || op.mutation_count() > self.max_mutations {
            return Err(StoreError::OperationLimit {
                checks: op.check_count(),
                mutations: op.mutation_count(),
                max_checks: self.max_checks,
                max_mutations: self.max_mutations,
            });
        }
        Ok(())
    }
}

/// The ordered key-value capability the table layer is built on.
///
/// `commit` applies every staged mutation iff every staged check holds at commit time,
/// and stamps all written keys with the same fresh versionstamp.
pub trait KvStore: Send + Sync + 'static {
    fn get(&self, key: &Key) -> impl Future<Output = Result<MaybeEntry, StoreError>> + Send;

    fn get_many(&self, keys: &[Key]) -> impl Future<Output = Result<Vec<MaybeEntry>, StoreError>> + Send;

    /// Entries strictly under `prefix`, in key order.
    fn scan(&self, prefix: &Key) -> impl Future<Output = Result<Vec<Entry>, StoreError>> + Send;

    fn commit(&self, op: AtomicOperation) -> impl Future<Output = Result<CommitResult, StoreError>> + Send;

    /// Ceilings `commit` rejects operations above.
    fn limits(&self) -> StoreLimits;

    fn atomic(&self) -> AtomicOperation {
        AtomicOperation::new()
    }
}
