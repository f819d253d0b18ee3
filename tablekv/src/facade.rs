use crate::batch::BatchLimits;
use crate::crud::Crud;
use crate::error::Error;
use crate::info;
use crate::query::{CreateArgs, CreateManyArgs, DeleteArgs, DeleteResponse, Document, FindArgs, IncludeMap, Select, UpdateArgs};
use crate::relation;
use crate::settings::Settings;
use crate::storage::KvStore;
use crate::table::{self, TableDefinition};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Registry of table definitions over one shared store.
pub struct Database<S: KvStore> {
    store: Arc<S>,
    tables: BTreeMap<String, TableDefinition>,
    limits: BatchLimits,
}

impl<S: KvStore> Database<S> {
    pub fn new(store: Arc<S>, tables: BTreeMap<String, TableDefinition>) -> Result<Self, Error> {
        Self::with_settings(store, tables, &Settings::default())
    }

    /// Validates every definition up front and fails on the first invalid one.
    pub fn with_settings(store: Arc<S>, tables: BTreeMap<String, TableDefinition>, settings: &Settings) -> Result<Self, Error> {
        table::validate_tables(&tables)?;
        info!("Registered {} tables: {}", tables.len(), tables.keys().cloned().collect::<Vec<_>>().join(", "));
        Ok(Database { store, tables, limits: settings.batch })
    }

    pub fn table(&self, name: &str) -> Result<Table<'_, S>, Error> {
        let (name, definition) = self.tables.get_key_value(name).ok_or_else(|| Error::UnknownTable(name.to_string()))?;
        Ok(Table { db: self, name, definition })
    }

    pub fn definition(&self, name: &str) -> Result<&TableDefinition, Error> {
        self.tables.get(name).ok_or_else(|| Error::UnknownTable(name.to_string()))
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn batch_limits(&self) -> BatchLimits {
        self.limits
    }
}

/// Handle exposing the operations of one registered table.
pub struct Table<'db, S: KvStore> {
    db: &'db Database<S>,
    name: &'db str,
    definition: &'db TableDefinition,
}

impl<'db, S: KvStore> Table<'db, S> {
    pub fn name(&self) -> &str {
        self.name
    }

    pub fn definition(&self) -> &TableDefinition {
        self.definition
    }

    fn crud(&self) -> Crud<'db, S> {
        Crud::new(self.db.store(), self.name, self.definition, self.db.batch_limits())
    }

    fn selected(mut document: Document, select: Option<&Select>) -> Document {
        document.value = relation::project(document.value, select, &IncludeMap::new());
        document
    }

    pub async fn create(&self, args: CreateArgs) -> Result<Document, Error> {
        let created = self.crud().create(&args.data).await?;
        Ok(Self::selected(created, args.select.as_ref()))
    }

    pub async fn create_many(&self, args: CreateManyArgs) -> Result<Vec<Document>, Error> {
        let created = self.crud().create_many(&args.data).await?;
        Ok(created.into_iter().map(|d| Self::selected(d, args.select.as_ref())).collect())
    }

    pub async fn update(&self, args: UpdateArgs) -> Result<Document, Error> {
        let updated = self.crud().update(&args.filter, &args.data, false).await?;
        updated
            .into_iter()
            .next()
            .map(|d| Self::selected(d, args.select.as_ref()))
            .ok_or_else(|| Error::Update { message: format!("no {} record was updated", self.name), conflict: false })
    }

    pub async fn update_many(&self, args: UpdateArgs) -> Result<Vec<Document>, Error> {
        let updated = self.crud().update(&args.filter, &args.data, true).await?;
        Ok(updated.into_iter().map(|d| Self::selected(d, args.select.as_ref())).collect())
    }

    pub async fn delete(&self, args: DeleteArgs) -> Result<DeleteResponse, Error> {
        self.crud().remove(&args.filter, false).await
    }

    pub async fn delete_many(&self, args: DeleteArgs) -> Result<DeleteResponse, Error> {
        self.crud().remove(&args.filter, true).await
    }

    pub async fn find_first(&self, mut args: FindArgs) -> Result<Option<Document>, Error> {
        args.take = Some(1);
        Ok(self.find_many(args).await?.into_iter().next())
    }

    pub async fn find_many(&self, args: FindArgs) -> Result<Vec<Document>, Error> {
        relation::find_many(self.db, self.name, &args).await
    }
}
