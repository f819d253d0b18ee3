//! Relational tables over an ordered key-value store.
//!
//! A record lives once under `(table, primary)` and once more per unique field
//! `(table_by_unique_<field>, value)` and per indexed field `(table_by_<field>, value, primary)`.
//! All copies of a record are written in the same atomic commit, so lookups through any of them
//! see the same value and versionstamp.

pub mod logger;

pub mod batch;
pub mod crud;
pub mod error;
pub mod facade;
pub mod keys;
pub mod query;
pub mod relation;
pub mod retry;
pub mod schema;
pub mod search;
pub mod settings;
pub mod storage;
pub mod table;
pub mod value;

pub use batch::{BatchLimits, Operation};
pub use error::{Error, StoreError};
pub use facade::{Database, Table};
pub use query::{CreateArgs, CreateManyArgs, DeleteArgs, DeleteResponse, Document, FindArgs, Include, IncludeQuery, Select, UpdateArgs, Where};
pub use schema::{Field, FieldType, IndexKind, Schema, ValidationError};
pub use settings::Settings;
pub use storage::{AtomicOperation, CommitResult, Entry, Key, KeyPart, KvStore, MaybeEntry, MemoryStore, RedbStore, StoreLimits, Versionstamp};
pub use table::{Cardinality, RelationDefinition, TableDefinition};
pub use value::{Record, Value};
