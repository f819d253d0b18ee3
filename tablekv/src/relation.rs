use crate::crud::Crud;
use crate::error::Error;
use crate::facade::Database;
use crate::query::{Document, FindArgs, Include, IncludeMap, Select, Where};
use crate::storage::KvStore;
use crate::table::{Cardinality, RelationDefinition};
use crate::value::{Record, Value};
use futures::future::BoxFuture;

/// Matching records of `table` with relations attached and the selection applied.
/// Each include level costs one nested query per record.
pub fn find_many<'a, S: KvStore>(db: &'a Database<S>, table: &'a str, args: &'a FindArgs) -> BoxFuture<'a, Result<Vec<Document>, Error>> {
    Box::pin(async move {
        let definition = db.definition(table)?;
        let crud = Crud::new(db.store(), table, definition, db.batch_limits());
        let entries = match args.filter.versionstamp {
            None => crud.find_entries(&args.filter, args.skip, args.take).await?,
            Some(versionstamp) => crud
                .find_entries(&args.filter, None, None)
                .await?
                .into_iter()
                .filter(|e| e.versionstamp == versionstamp)
                .skip(args.skip.unwrap_or(0))
                .take(args.take.unwrap_or(usize::MAX))
                .collect(),
        };

        let mut documents = Vec::with_capacity(entries.len());
        for entry in entries {
            // relations resolve against the stored record, a relation may shadow another's local key
            let mut attached = Vec::with_capacity(args.include.len());
            for (name, include) in &args.include {
                let relation = definition
                    .relations
                    .get(name)
                    .ok_or_else(|| Error::Relation(format!("no relation named {} is defined on {}", name, table)))?;
                attached.push((name.clone(), load_relation(db, relation, &entry.value, include).await?));
            }
            let mut value = entry.value;
            value.extend(attached);
            documents.push(Document { value: project(value, args.select.as_ref(), &args.include), versionstamp: entry.versionstamp });
        }
        Ok(documents)
    })
}

async fn load_relation<S: KvStore>(db: &Database<S>, relation: &RelationDefinition, record: &Record, include: &Include) -> Result<Value, Error> {
    let local = record.get(&relation.local_key).cloned().unwrap_or(Value::Null);
    if local.is_null() {
        return Ok(match relation.cardinality {
            Cardinality::Many => Value::Array(Vec::new()),
            Cardinality::One => Value::Null,
        });
    }
    let (select, include) = match include {
        Include::All => (None, IncludeMap::new()),
        Include::Nested(nested) => (nested.select.clone(), nested.include.clone()),
    };
    let mut args = FindArgs::new(Where::new().eq(&relation.foreign_key, local));
    args.select = select;
    args.include = include;
    if relation.cardinality == Cardinality::One {
        args.take = Some(1);
    }
    let related = find_many(db, &relation.target_table, &args).await?;
    Ok(match relation.cardinality {
        Cardinality::Many => Value::Array(related.into_iter().map(|d| Value::Object(d.value)).collect()),
        Cardinality::One => related.into_iter().next().map(|d| Value::Object(d.value)).unwrap_or(Value::Null),
    })
}

/// Keeps selected fields; attached relations always survive.
pub(crate) fn project(value: Record, select: Option<&Select>, include: &IncludeMap) -> Record {
    match select {
        None => value,
        Some(select) => value.into_iter().filter(|(field, _)| select.contains(field) || include.contains_key(field)).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;

    #[test]
    fn projection_keeps_selected_and_included_fields() {
        let value = record! { "id" => "u1", "name" => "John", "age" => 3, "myOrders" => Vec::<Value>::new() };
        let include = IncludeMap::from([("myOrders".to_string(), Include::All)]);
        let projected = project(value, Some(&Select::fields(["name"])), &include);
        assert_eq!(projected.keys().collect::<Vec<_>>(), vec!["myOrders", "name"]);
    }

    #[test]
    fn projection_without_select_is_identity() {
        let value = record! { "id" => "u1" };
        assert_eq!(project(value.clone(), None, &IncludeMap::new()), value);
    }
}
