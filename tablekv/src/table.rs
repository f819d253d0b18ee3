use crate::error::Error;
use crate::keys;
use crate::schema::Schema;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    One,
    Many,
}

/// Link from a record's `local_key` to the records of `target_table` whose `foreign_key` matches it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDefinition {
    pub target_table: String,
    pub cardinality: Cardinality,
    pub local_key: String,
    pub foreign_key: String,
}

impl RelationDefinition {
    pub fn to_one(target_table: &str, local_key: &str, foreign_key: &str) -> Self {
        RelationDefinition {
            target_table: target_table.to_string(),
            cardinality: Cardinality::One,
            local_key: local_key.to_string(),
            foreign_key: foreign_key.to_string(),
        }
    }

    pub fn to_many(target_table: &str, local_key: &str, foreign_key: &str) -> Self {
        RelationDefinition { cardinality: Cardinality::Many, ..Self::to_one(target_table, local_key, foreign_key) }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TableDefinition {
    pub schema: Schema,
    pub relations: BTreeMap<String, RelationDefinition>,
}

impl TableDefinition {
    pub fn new(schema: Schema) -> Self {
        TableDefinition { schema, relations: BTreeMap::new() }
    }

    pub fn relation(mut self, name: &str, relation: RelationDefinition) -> Self {
        self.relations.insert(name.to_string(), relation);
        self
    }
}

/// Validates every definition against the others: key annotations, a single primary,
/// relation targets and key fields, and index namespaces not shadowing table names.
pub fn validate_tables(tables: &BTreeMap<String, TableDefinition>) -> Result<(), Error> {
    for (name, definition) in tables {
        keys::validate_schema(name, &definition.schema)?;
        for (field, kind) in definition.schema.key_fields()? {
            if let Some(suffix) = keys::suffix(kind, &field.name) {
                let namespace = format!("{}{}", name, suffix);
                if tables.contains_key(&namespace) {
                    return Err(Error::Key(format!("index namespace {} of {}.{} collides with a table", namespace, name, field.name)));
                }
            }
        }
        for (relation_name, relation) in &definition.relations {
            let target = tables.get(&relation.target_table).ok_or_else(|| {
                Error::Relation(format!("relation {}.{} targets unknown table {}", name, relation_name, relation.target_table))
            })?;
            if definition.schema.field(&relation.local_key).is_none() {
                return Err(Error::Relation(format!(
                    "relation {}.{} uses local key {} which is not a field of {}",
                    name, relation_name, relation.local_key, name
                )));
            }
            if target.schema.field(&relation.foreign_key).is_none() {
                return Err(Error::Relation(format!(
                    "relation {}.{} uses foreign key {} which is not a field of {}",
                    name, relation_name, relation.foreign_key, relation.target_table
                )));
            }
        }
    }
    Ok(())
}
