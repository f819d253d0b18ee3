use crate::error::Error;
use crate::schema::{FieldType, IndexKind, Schema};
use crate::storage::{Key, KeyPart};
use crate::value::{Record, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct AccessKey {
    pub kind: IndexKind,
    pub field: String,
    pub value: KeyPart,
    pub suffix: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DerivedKey {
    pub access_key: AccessKey,
    pub key: Key,
}

/// Single store access chosen for a query.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupPath {
    Keys(Vec<Key>),
    Prefixes(Vec<Key>),
    Scan(Key),
}

pub fn suffix(kind: IndexKind, field: &str) -> Option<String> {
    match kind {
        IndexKind::Primary => None,
        IndexKind::Unique => Some(format!("_by_unique_{}", field)),
        IndexKind::Index => Some(format!("_by_{}", field)),
    }
}

pub fn table_prefix(table: &str) -> Key {
    Key::new(vec![table.into()])
}

fn namespace(table: &str, suffix: &Option<String>) -> KeyPart {
    match suffix {
        Some(s) => KeyPart::Text(format!("{}{}", table, s)),
        None => KeyPart::from(table),
    }
}

pub fn to_key_part(field: &str, value: &Value) -> Result<KeyPart, Error> {
    match value {
        Value::String(s) => Ok(KeyPart::Text(s.clone())),
        Value::Int(i) => Ok(KeyPart::Integer(*i)),
        Value::Float(f) => Ok(KeyPart::Float(*f)),
        Value::Bool(b) => Ok(KeyPart::Boolean(*b)),
        Value::Bytes(b) => Ok(KeyPart::Bytes(b.clone())),
        Value::Timestamp(ts) => Ok(KeyPart::Timestamp(*ts)),
        other => Err(Error::Key(format!("field {} holds a {} which cannot be part of a key", field, other.type_name()))),
    }
}

/// Arrays expand to one part per element.
fn key_parts(field: &str, value: &Value) -> Result<Vec<KeyPart>, Error> {
    match value {
        Value::Array(items) => items.iter().map(|item| to_key_part(field, item)).collect(),
        scalar => Ok(vec![to_key_part(field, scalar)?]),
    }
}

fn present<'a>(data: &'a Record, field: &str) -> Option<&'a Value> {
    data.get(field).filter(|v| !v.is_null())
}

/// Identity of a record: the table followed by every primary value. Equals the primary key for scalar primaries.
pub fn identity(table: &str, schema: &Schema, data: &Record) -> Result<Option<Key>, Error> {
    let Some(field) = schema.primary_field()? else { return Ok(None) };
    let Some(value) = present(data, &field.name) else { return Ok(None) };
    let mut parts = vec![KeyPart::from(table)];
    parts.extend(key_parts(&field.name, value)?);
    Ok(Some(Key::new(parts)))
}

/// Checks that a schema has exactly one primary field and that annotated fields hold keyable types.
pub fn validate_schema(table: &str, schema: &Schema) -> Result<(), Error> {
    let keyed = schema.key_fields()?;
    let primaries = keyed.iter().filter(|(_, kind)| *kind == IndexKind::Primary).count();
    if primaries != 1 {
        return Err(Error::Key(format!("table {} must have exactly one primary field, found {}", table, primaries)));
    }
    for (field, _) in keyed {
        let keyable = match &field.field_type {
            FieldType::Array(inner) => inner.is_scalar(),
            other => other.is_scalar(),
        };
        if !keyable {
            return Err(Error::Key(format!("field {}.{} of type {:?} cannot be used as a key", table, field.name, field.field_type)));
        }
    }
    Ok(())
}

/// Physical keys of one record, in schema field order. Absent or null fields produce no key.
pub fn derive_keys(table: &str, schema: &Schema, data: &Record) -> Result<Vec<DerivedKey>, Error> {
    let keyed = schema.key_fields()?;
    let primary_parts = match keyed.iter().find(|(_, kind)| *kind == IndexKind::Primary) {
        Some((field, _)) => match present(data, &field.name) {
            Some(value) => Some(key_parts(&field.name, value)?),
            None => None,
        },
        None => None,
    };

    let mut derived = Vec::new();
    for (field, kind) in keyed {
        let Some(value) = present(data, &field.name) else { continue };
        let suffix = suffix(kind, &field.name);
        let ns = namespace(table, &suffix);
        for part in key_parts(&field.name, value)? {
            let access_key = AccessKey { kind, field: field.name.clone(), value: part.clone(), suffix: suffix.clone() };
            match kind {
                IndexKind::Primary | IndexKind::Unique => {
                    derived.push(DerivedKey { access_key, key: Key::new(vec![ns.clone(), part]) });
                }
                IndexKind::Index => {
                    let primaries = primary_parts.as_ref().ok_or_else(|| {
                        Error::Key(format!("index field {}.{} requires the primary value to be present", table, field.name))
                    })?;
                    for primary in primaries {
                        derived.push(DerivedKey {
                            access_key: access_key.clone(),
                            key: Key::new(vec![ns.clone(), part.clone(), primary.clone()]),
                        });
                    }
                }
            }
        }
    }
    Ok(derived)
}

/// Picks the first derivable filter field by priority primary, unique, index; falls back to a table scan.
/// Array expectations fan out to one key or prefix per element.
pub fn lookup_path(table: &str, schema: &Schema, filter: &Record) -> Result<LookupPath, Error> {
    let keyed = schema.key_fields()?;
    for wanted in [IndexKind::Primary, IndexKind::Unique, IndexKind::Index] {
        for (field, kind) in keyed.iter().filter(|(_, kind)| *kind == wanted) {
            let Some(value) = present(filter, &field.name) else { continue };
            if matches!(value, Value::Array(items) if items.is_empty()) {
                continue;
            }
            let Ok(parts) = key_parts(&field.name, value) else { continue };
            let ns = namespace(table, &suffix(*kind, &field.name));
            let keys = parts.into_iter().map(|part| Key::new(vec![ns.clone(), part])).collect();
            return Ok(match kind {
                IndexKind::Index => LookupPath::Prefixes(keys),
                _ => LookupPath::Keys(keys),
            });
        }
    }
    Ok(LookupPath::Scan(table_prefix(table)))
}
