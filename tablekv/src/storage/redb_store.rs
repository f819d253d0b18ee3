use super::key::prefix_successor;
use super::{AtomicOperation, CommitResult, Entry, Key, KvStore, MaybeEntry, Mutation, StoreLimits, Versionstamp};
use crate::error::StoreError;
use crate::info;
use crate::settings::StoreSettings;
use crate::value::Record;
use redb::{Database, ReadableTable, TableDefinition};
use std::ops::Bound;
use std::path::PathBuf;
use std::sync::Arc;
use std::{env, fs};

const ENTRIES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("entries");
const META: TableDefinition<&str, u64> = TableDefinition::new("meta");
const SEQUENCE: &str = "sequence";
const STAMP_LEN: usize = 10;

/// Persistent store on a single redb file. Values are laid out as `versionstamp ++ bincode(record)`.
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
    limits: StoreLimits,
}

impl RedbStore {
    pub async fn open(db_dir: PathBuf, settings: &StoreSettings) -> Result<RedbStore, StoreError> {
        let db_path = db_dir.join("tablekv.db");
        let cache_size = settings.cache_size_mb * 1024 * 1024;
        let db = if !db_path.exists() {
            fs::create_dir_all(&db_dir)?;
            Database::builder().set_cache_size(cache_size).create(&db_path)?
        } else {
            info!("Opening existing db at {:?}, it might take a while in case previous process was killed", db_path);
            let path = db_path.clone();
            tokio::task::spawn_blocking(move || Database::builder().set_cache_size(cache_size).open(path)).await??
        };
        let store = RedbStore { db: Arc::new(db), limits: settings.limits };
        store.ensure_tables()?;
        Ok(store)
    }

    /// Opens the store in the configured `db_path`.
    pub async fn from_settings(settings: &StoreSettings) -> Result<RedbStore, StoreError> {
        RedbStore::open(settings.db_path.clone(), settings).await
    }

    /// Fresh store under the system temp dir, named `<name>_<random>`.
    pub async fn temp(name: &str) -> Result<RedbStore, StoreError> {
        let db_dir = env::temp_dir().join("tablekv").join(format!("{}_{}", name, rand::random::<u64>()));
        if db_dir.exists() {
            fs::remove_dir_all(&db_dir)?;
        }
        RedbStore::open(db_dir, &StoreSettings::default()).await
    }

    fn ensure_tables(&self) -> Result<(), StoreError> {
        let tx = self.db.begin_write()?;
        {
            tx.open_table(ENTRIES)?;
            tx.open_table(META)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn decode_payload(bytes: &[u8]) -> Result<(Versionstamp, Record), StoreError> {
        let stamp = Self::decode_stamp(bytes)?;
        let record: Record = bincode::deserialize(&bytes[STAMP_LEN..])?;
        Ok((stamp, record))
    }

    fn decode_stamp(bytes: &[u8]) -> Result<Versionstamp, StoreError> {
        let raw: [u8; STAMP_LEN] = bytes
            .get(..STAMP_LEN)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| StoreError::CorruptKey("value shorter than its versionstamp".to_string()))?;
        Ok(Versionstamp::from_bytes(raw))
    }

    fn read_many(db: &Database, keys: Vec<Key>) -> Result<Vec<MaybeEntry>, StoreError> {
        let tx = db.begin_read()?;
        let table = tx.open_table(ENTRIES)?;
        let mut result = Vec::with_capacity(keys.len());
        for key in keys {
            let payload = table.get(key.encode().as_slice())?.map(|guard| guard.value().to_vec());
            match payload {
                Some(bytes) => {
                    let (stamp, record) = Self::decode_payload(&bytes)?;
                    result.push(MaybeEntry { key, value: Some(record), versionstamp: Some(stamp) });
                }
                None => result.push(MaybeEntry::absent(key)),
            }
        }
        Ok(result)
    }

    fn read_range(db: &Database, prefix: Key) -> Result<Vec<Entry>, StoreError> {
        let from = prefix.encode();
        let until = prefix_successor(&from);
        let upper = match &until {
            Some(end) => Bound::Excluded(end.as_slice()),
            None => Bound::Unbounded,
        };
        let tx = db.begin_read()?;
        let table = tx.open_table(ENTRIES)?;
        let mut entries = Vec::new();
        for row in table.range::<&[u8]>((Bound::Excluded(from.as_slice()), upper))? {
            let (k, v) = row?;
            let key = Key::decode(k.value())?;
            let (versionstamp, value) = Self::decode_payload(v.value())?;
            entries.push(Entry { key, value, versionstamp });
        }
        Ok(entries)
    }

    fn write(db: &Database, op: AtomicOperation) -> Result<CommitResult, StoreError> {
        let (checks, mutations) = op.into_parts();
        let tx = db.begin_write()?;
        let stamp = {
            let mut entries = tx.open_table(ENTRIES)?;
            for check in &checks {
                let current = match entries.get(check.key.encode().as_slice())? {
                    Some(guard) => Some(Self::decode_stamp(guard.value())?),
                    None => None,
                };
                if current != check.versionstamp {
                    drop(entries);
                    tx.abort()?;
                    return Ok(CommitResult::CheckFailed);
                }
            }
            let mut meta = tx.open_table(META)?;
            let sequence = meta.get(SEQUENCE)?.map(|g| g.value()).unwrap_or(0) + 1;
            meta.insert(SEQUENCE, sequence)?;
            let stamp = Versionstamp::from_sequence(sequence);
            for mutation in mutations {
                match mutation {
                    Mutation::Set(key, record) => {
                        let mut payload = stamp.as_bytes().to_vec();
                        payload.extend(bincode::serialize(&record)?);
                        entries.insert(key.encode().as_slice(), payload.as_slice())?;
                    }
                    Mutation::Delete(key) => {
                        entries.remove(key.encode().as_slice())?;
                    }
                }
            }
            stamp
        };
        tx.commit()?;
        Ok(CommitResult::Committed(stamp))
    }
}

impl KvStore for RedbStore {
    fn limits(&self) -> StoreLimits {
        self.limits
    }

    async fn get(&self, key: &Key) -> Result<MaybeEntry, StoreError> {
        let mut found = self.get_many(std::slice::from_ref(key)).await?;
        Ok(found.pop().unwrap_or_else(|| MaybeEntry::absent(key.clone())))
    }

    async fn get_many(&self, keys: &[Key]) -> Result<Vec<MaybeEntry>, StoreError> {
        let db = Arc::clone(&self.db);
        let keys = keys.to_vec();
        tokio::task::spawn_blocking(move || Self::read_many(&db, keys)).await?
    }

    async fn scan(&self, prefix: &Key) -> Result<Vec<Entry>, StoreError> {
        let db = Arc::clone(&self.db);
        let prefix = prefix.clone();
        tokio::task::spawn_blocking(move || Self::read_range(&db, prefix)).await?
    }

    async fn commit(&self, op: AtomicOperation) -> Result<CommitResult, StoreError> {
        self.limits.verify(&op)?;
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || Self::write(&db, op)).await?
    }
}
