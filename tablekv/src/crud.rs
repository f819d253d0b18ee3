use crate::batch::{self, BatchExecutor, BatchLimits, Operation};
use crate::debug;
use crate::error::Error;
use crate::keys::{self, DerivedKey, LookupPath};
use crate::query::{DeleteResponse, Document, Where};
use crate::schema::{IndexKind, Schema};
use crate::search;
use crate::storage::{AtomicOperation, CommitResult, Entry, Key, KvStore, Versionstamp};
use crate::table::TableDefinition;
use crate::value::Record;
use std::collections::HashSet;

/// Record-level operations of one table.
pub struct Crud<'a, S: KvStore> {
    store: &'a S,
    table: &'a str,
    definition: &'a TableDefinition,
    limits: BatchLimits,
}

fn is_constrained(derived: &DerivedKey) -> bool {
    matches!(derived.access_key.kind, IndexKind::Primary | IndexKind::Unique)
}

impl<'a, S: KvStore> Crud<'a, S> {
    pub fn new(store: &'a S, table: &'a str, definition: &'a TableDefinition, limits: BatchLimits) -> Self {
        Crud { store, table, definition, limits }
    }

    fn schema(&self) -> &Schema {
        &self.definition.schema
    }

    fn executor(&self) -> BatchExecutor<'a, S> {
        BatchExecutor::new(self.store, self.limits)
    }

    fn derive(&self, record: &Record) -> Result<Vec<DerivedKey>, Error> {
        keys::derive_keys(self.table, self.schema(), record)
    }

    fn stage_create(derived: &[DerivedKey], record: &Record, op: &mut AtomicOperation) {
        for key in derived.iter().filter(|k| is_constrained(k)) {
            op.check(key.key.clone(), None);
        }
        for key in derived {
            op.set(key.key.clone(), record.clone());
        }
    }

    pub async fn create(&self, data: &Record) -> Result<Document, Error> {
        let record = self.schema().parse(data)?;
        let derived = self.derive(&record)?;
        let mut op = self.store.atomic();
        Self::stage_create(&derived, &record, &mut op);
        match self.store.commit(op).await? {
            CommitResult::Committed(versionstamp) => {
                debug!("Created {} record with {} keys at {}", self.table, derived.len(), versionstamp);
                Ok(Document { value: record, versionstamp })
            }
            CommitResult::CheckFailed => Err(Error::CreateItem(format!(
                "a {} record with the same primary or unique key already exists",
                self.table
            ))),
        }
    }

    /// Validates every item before anything is written, then commits in batches.
    pub async fn create_many(&self, data: &[Record]) -> Result<Vec<Document>, Error> {
        let mut prepared = Vec::with_capacity(data.len());
        let mut claimed = HashSet::new();
        for item in data {
            let record = self.schema().parse(item)?;
            let derived = self.derive(&record)?;
            let own: HashSet<&Key> = derived.iter().filter(|k| is_constrained(k)).map(|k| &k.key).collect();
            for key in own {
                if !claimed.insert(key.clone()) {
                    return Err(Error::CreateItem(format!("key {} appears more than once in the input", key)));
                }
            }
            prepared.push((record, derived));
        }
        let staged = batch::stage(&prepared, |(record, derived), op| {
            Self::stage_create(derived, record, op);
            Ok(())
        })?;
        let stamps = self.executor().execute(Operation::Create, staged).await?;
        Ok(prepared.into_iter().zip(stamps).map(|((value, _), versionstamp)| Document { value, versionstamp }).collect())
    }

    /// Present entries for the given physical keys, in key order of the input.
    pub async fn read_by_keys(&self, keys: &[Key]) -> Result<Vec<Entry>, Error> {
        let found = self.store.get_many(keys).await?;
        Ok(found.into_iter().filter_map(|e| e.into_entry()).collect())
    }

    pub async fn list(&self) -> Result<Vec<Entry>, Error> {
        Ok(self.store.scan(&keys::table_prefix(self.table)).await?)
    }

    /// Records matching `filter`, reached through one lookup path and post-filtered on every field.
    pub async fn find_entries(&self, filter: &Where, skip: Option<usize>, take: Option<usize>) -> Result<Vec<Entry>, Error> {
        let fields = self.schema().coerce_filter(&filter.fields);
        let entries = match keys::lookup_path(self.table, self.schema(), &fields)? {
            LookupPath::Keys(keys) => self.read_by_keys(&keys).await?,
            LookupPath::Prefixes(prefixes) => {
                let mut entries = Vec::new();
                for prefix in &prefixes {
                    entries.extend(self.store.scan(prefix).await?);
                }
                entries
            }
            LookupPath::Scan(prefix) => self.store.scan(&prefix).await?,
        };
        let mut seen = HashSet::new();
        let mut unique = Vec::new();
        for entry in search::filter(entries, &fields) {
            let identity = keys::identity(self.table, self.schema(), &entry.value)?.unwrap_or_else(|| entry.key.clone());
            if seen.insert(identity) {
                unique.push(entry);
            }
        }
        Ok(unique.into_iter().skip(skip.unwrap_or(0)).take(take.unwrap_or(usize::MAX)).collect())
    }

    /// Merges `patch` into the first match (or every match when `many`), re-deriving index copies.
    pub async fn update(&self, filter: &Where, patch: &Record, many: bool) -> Result<Vec<Document>, Error> {
        let patch = self.schema().parse_patch(patch)?;
        let matched = self.find_entries(filter, None, if many { None } else { Some(1) }).await?;
        if matched.is_empty() {
            return Err(Error::Update { message: format!("no {} record matches the filter", self.table), conflict: false });
        }
        let primary = self.schema().primary_field()?.map(|f| f.name.clone());

        let mut updated = Vec::with_capacity(matched.len());
        let mut claimed = HashSet::new();
        for entry in matched {
            let mut merged = entry.value.clone();
            merged.extend(patch.clone());
            let record = self.schema().parse(&merged)?;
            if let Some(primary) = &primary {
                if record.get(primary) != entry.value.get(primary) {
                    return Err(Error::Update { message: format!("primary field {}.{} cannot change", self.table, primary), conflict: false });
                }
            }
            let old_keys: HashSet<Key> = self.derive(&entry.value)?.into_iter().map(|k| k.key).collect();
            let new_keys = self.derive(&record)?;
            for key in new_keys.iter().filter(|k| k.access_key.kind == IndexKind::Unique && !old_keys.contains(&k.key)) {
                if !claimed.insert(key.key.clone()) {
                    return Err(Error::Update { message: format!("key {} would be claimed by more than one record", key.key), conflict: false });
                }
            }
            updated.push((entry.versionstamp, old_keys, new_keys, record));
        }

        let expected = filter.versionstamp;
        let staged = batch::stage(&updated, |(read_at, old_keys, new_keys, record), op| {
            let current: HashSet<&Key> = new_keys.iter().map(|k| &k.key).collect();
            for key in new_keys {
                match key.access_key.kind {
                    IndexKind::Primary => {
                        op.check(key.key.clone(), Some(expected.unwrap_or(*read_at)));
                    }
                    IndexKind::Unique if !old_keys.contains(&key.key) => {
                        op.check(key.key.clone(), None);
                    }
                    _ => {}
                }
            }
            for stale in old_keys.iter().filter(|k| !current.contains(k)) {
                op.delete(stale.clone());
            }
            for key in new_keys {
                op.set(key.key.clone(), record.clone());
            }
            Ok(())
        })?;

        let stamps = if many {
            self.executor().execute(Operation::Update, staged).await?
        } else {
            self.commit_single(Operation::Update, staged).await.map_err(|e| match e {
                Error::BatchOperation { .. } => Error::Update {
                    message: format!("{} record changed since it was read or a unique value is taken", self.table),
                    conflict: true,
                },
                other => other,
            })?
        };
        debug!("Updated {} {} records", updated.len(), self.table);
        Ok(updated.into_iter().zip(stamps).map(|((_, _, _, value), versionstamp)| Document { value, versionstamp }).collect())
    }

    /// Deletes every physical copy of the first match (or every match when `many`).
    pub async fn remove(&self, filter: &Where, many: bool) -> Result<DeleteResponse, Error> {
        let matched = self.find_entries(filter, None, if many { None } else { Some(1) }).await?;
        if matched.is_empty() {
            return Ok(DeleteResponse { deleted: 0, versionstamp: None });
        }
        let expected = filter.versionstamp;
        let mut prepared = Vec::with_capacity(matched.len());
        for entry in matched {
            let derived = self.derive(&entry.value)?;
            prepared.push((entry.versionstamp, derived));
        }
        let staged = batch::stage(&prepared, |(read_at, derived), op| {
            for key in derived.iter().filter(|k| k.access_key.kind == IndexKind::Primary) {
                op.check(key.key.clone(), Some(expected.unwrap_or(*read_at)));
            }
            for key in derived {
                op.delete(key.key.clone());
            }
            Ok(())
        })?;

        let stamps = if many {
            self.executor().execute(Operation::Delete, staged).await?
        } else {
            self.commit_single(Operation::Delete, staged).await.map_err(|e| match e {
                Error::BatchOperation { .. } => Error::DeleteItem(format!("{} record changed since it was read", self.table)),
                other => other,
            })?
        };
        debug!("Deleted {} {} records", prepared.len(), self.table);
        Ok(DeleteResponse { deleted: prepared.len(), versionstamp: stamps.last().copied() })
    }

    async fn commit_single(&self, operation: Operation, staged: Vec<AtomicOperation>) -> Result<Vec<Versionstamp>, Error> {
        BatchExecutor::new(self.store, BatchLimits { max_checks: usize::MAX, max_mutations: usize::MAX }).execute(operation, staged).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;
    use crate::schema::Field;
    use crate::storage::MemoryStore;
    use crate::value::Value;

    fn users() -> TableDefinition {
        TableDefinition::new(Schema::new(vec![
            Field::string("id").describe("primary"),
            Field::string("email").describe("unique"),
            Field::string("color").describe("index"),
            Field::string("name"),
        ]))
    }

    fn john() -> Record {
        record! { "id" => "u1", "email" => "john@doe.com", "color" => "blue", "name" => "John" }
    }

    #[tokio::test]
    async fn create_writes_every_copy_and_rejects_duplicates() {
        let store = MemoryStore::new();
        let definition = users();
        let crud = Crud::new(&store, "users", &definition, BatchLimits::default());
        let created = crud.create(&john()).await.unwrap();
        assert_eq!(store.len().unwrap(), 3);
        let keys = vec![
            Key::new(vec!["users".into(), "u1".into()]),
            Key::new(vec!["users_by_unique_email".into(), "john@doe.com".into()]),
            Key::new(vec!["users_by_color".into(), "blue".into(), "u1".into()]),
        ];
        let copies = crud.read_by_keys(&keys).await.unwrap();
        assert_eq!(copies.len(), 3);
        assert!(copies.iter().all(|e| e.value == created.value && e.versionstamp == created.versionstamp));

        let mut same_email = john();
        same_email.insert("id".into(), Value::from("u2"));
        assert!(matches!(crud.create(&same_email).await, Err(Error::CreateItem(_))));
        assert_eq!(store.len().unwrap(), 3);
    }

    #[tokio::test]
    async fn find_entries_deduplicates_across_index_copies() {
        let store = MemoryStore::new();
        let definition = users();
        let crud = Crud::new(&store, "users", &definition, BatchLimits::default());
        crud.create(&john()).await.unwrap();
        let found = crud.find_entries(&Where::new().eq("color", vec!["blue", "blue"]), None, None).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].key, Key::new(vec!["users_by_color".into(), "blue".into(), "u1".into()]));
    }

    #[tokio::test]
    async fn update_rekeys_changed_index_values() {
        let store = MemoryStore::new();
        let definition = users();
        let crud = Crud::new(&store, "users", &definition, BatchLimits::default());
        crud.create(&john()).await.unwrap();
        crud.update(&Where::new().eq("id", "u1"), &record! { "email" => "new@doe.com", "color" => "red" }, false).await.unwrap();

        assert_eq!(store.len().unwrap(), 3);
        assert!(crud.find_entries(&Where::new().eq("email", "john@doe.com"), None, None).await.unwrap().is_empty());
        assert!(crud.find_entries(&Where::new().eq("color", "blue"), None, None).await.unwrap().is_empty());
        assert_eq!(crud.find_entries(&Where::new().eq("email", "new@doe.com"), None, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_refuses_primary_change() {
        let store = MemoryStore::new();
        let definition = users();
        let crud = Crud::new(&store, "users", &definition, BatchLimits::default());
        crud.create(&john()).await.unwrap();
        let err = crud.update(&Where::new().eq("id", "u1"), &record! { "id" => "u9" }, false).await.unwrap_err();
        assert!(matches!(err, Error::Update { conflict: false, .. }));
    }

    #[tokio::test]
    async fn remove_drops_every_copy() {
        let store = MemoryStore::new();
        let definition = users();
        let crud = Crud::new(&store, "users", &definition, BatchLimits::default());
        crud.create(&john()).await.unwrap();
        let response = crud.remove(&Where::new().eq("email", "john@doe.com"), false).await.unwrap();
        assert_eq!(response.deleted, 1);
        assert!(response.versionstamp.is_some());
        assert!(store.is_empty().unwrap());
    }
}
