use crate::error::Error;
use crate::value::{Record, Value};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    String,
    Int,
    Float,
    Bool,
    Bytes,
    Timestamp,
    Array(Box<FieldType>),
    Object,
    Any,
}

impl FieldType {
    pub fn is_scalar(&self) -> bool {
        !matches!(self, FieldType::Array(_) | FieldType::Object | FieldType::Any)
    }

    fn name(&self) -> String {
        match self {
            FieldType::String => "string".into(),
            FieldType::Int => "int".into(),
            FieldType::Float => "float".into(),
            FieldType::Bool => "bool".into(),
            FieldType::Bytes => "bytes".into(),
            FieldType::Timestamp => "timestamp".into(),
            FieldType::Array(inner) => format!("array<{}>", inner.name()),
            FieldType::Object => "object".into(),
            FieldType::Any => "any".into(),
        }
    }

    /// Checks `value` against the type, widening int to float, narrowing integral floats
    /// to int and reading RFC 3339 strings as timestamps.
    fn coerce(&self, value: &Value) -> Result<Value, String> {
        let mismatch = || Err(format!("expected {}, got {}", self.name(), value.type_name()));
        match (self, value) {
            (FieldType::Any, v) => Ok(v.clone()),
            (FieldType::String, Value::String(_))
            | (FieldType::Int, Value::Int(_))
            | (FieldType::Float, Value::Float(_))
            | (FieldType::Bool, Value::Bool(_))
            | (FieldType::Bytes, Value::Bytes(_))
            | (FieldType::Timestamp, Value::Timestamp(_))
            | (FieldType::Object, Value::Object(_)) => Ok(value.clone()),
            (FieldType::Float, Value::Int(i)) => Ok(Value::Float(*i as f64)),
            (FieldType::Int, Value::Float(f)) if f.is_finite() && f.fract() == 0.0 => Ok(Value::Int(*f as i64)),
            (FieldType::Timestamp, Value::String(s)) => DateTime::parse_from_rfc3339(s)
                .map(|ts| Value::Timestamp(ts.with_timezone(&Utc)))
                .map_err(|e| format!("invalid timestamp {:?}: {}", s, e)),
            (FieldType::Array(inner), Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(i, item)| inner.coerce(item).map_err(|e| format!("[{}] {}", i, e)))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            _ => mismatch(),
        }
    }
}

/// Annotation carried by a field description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexKind {
    Primary,
    Unique,
    Index,
}

pub type DefaultFn = Arc<dyn Fn() -> Value + Send + Sync>;

#[derive(Clone)]
pub struct Field {
    pub name: String,
    pub field_type: FieldType,
    pub optional: bool,
    pub nullable: bool,
    pub description: Option<String>,
    default: Option<DefaultFn>,
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("field_type", &self.field_type)
            .field("optional", &self.optional)
            .field("nullable", &self.nullable)
            .field("description", &self.description)
            .field("default", &self.default.is_some())
            .finish()
    }
}

impl Field {
    pub fn new(name: &str, field_type: FieldType) -> Self {
        Field { name: name.to_string(), field_type, optional: false, nullable: false, description: None, default: None }
    }

    pub fn string(name: &str) -> Self {
        Self::new(name, FieldType::String)
    }

    pub fn int(name: &str) -> Self {
        Self::new(name, FieldType::Int)
    }

    pub fn float(name: &str) -> Self {
        Self::new(name, FieldType::Float)
    }

    pub fn bool(name: &str) -> Self {
        Self::new(name, FieldType::Bool)
    }

    pub fn bytes(name: &str) -> Self {
        Self::new(name, FieldType::Bytes)
    }

    pub fn timestamp(name: &str) -> Self {
        Self::new(name, FieldType::Timestamp)
    }

    pub fn array(name: &str, items: FieldType) -> Self {
        Self::new(name, FieldType::Array(Box::new(items)))
    }

    pub fn object(name: &str) -> Self {
        Self::new(name, FieldType::Object)
    }

    /// Sets the description; `"primary"`, `"unique"` or `"index"` make the field a key.
    pub fn describe(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn default_value(self, value: impl Into<Value>) -> Self {
        let value = value.into();
        self.default_with(move || value.clone())
    }

    pub fn default_with(mut self, generator: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        self.default = Some(Arc::new(generator));
        self
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    pub fn index_kind(&self) -> Result<Option<IndexKind>, Error> {
        let description = match self.description.as_deref().map(str::trim) {
            None | Some("") => return Ok(None),
            Some(d) => d,
        };
        let mut kinds = Vec::new();
        for property in description.split(',').map(str::trim) {
            let kind = match property {
                "primary" => IndexKind::Primary,
                "unique" => IndexKind::Unique,
                "index" => IndexKind::Index,
                other => {
                    return Err(Error::Key(format!(
                        "field {} has invalid key property {:?} in {:?}, supported are primary, unique and index",
                        self.name, other, description
                    )))
                }
            };
            kinds.push(kind);
        }
        if kinds.len() > 1 {
            return Err(Error::Key(format!("field {} carries more than one key property: {:?}", self.name, description)));
        }
        Ok(kinds.pop())
    }

    fn parse_present(&self, value: &Value) -> Result<Value, String> {
        if value.is_null() {
            return if self.nullable { Ok(Value::Null) } else { Err(format!("expected {}, got null", self.field_type.name())) };
        }
        self.field_type.coerce(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError(pub Vec<FieldIssue>);

impl ValidationError {
    pub fn issues(&self) -> &[FieldIssue] {
        &self.0
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation failed")?;
        for (i, issue) in self.0.iter().enumerate() {
            write!(f, "{} {}: {}", if i == 0 { ":" } else { ";" }, issue.field, issue.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Ordered field list of one table.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Schema { fields }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Annotated fields in declaration order.
    pub fn key_fields(&self) -> Result<Vec<(&Field, IndexKind)>, Error> {
        let mut keyed = Vec::new();
        for field in &self.fields {
            if let Some(kind) = field.index_kind()? {
                keyed.push((field, kind));
            }
        }
        Ok(keyed)
    }

    pub fn primary_field(&self) -> Result<Option<&Field>, Error> {
        Ok(self.key_fields()?.into_iter().find(|(_, kind)| *kind == IndexKind::Primary).map(|(f, _)| f))
    }

    /// Full validation of a record: defaults fill absent fields, unknown fields are dropped.
    pub fn parse(&self, input: &Record) -> Result<Record, ValidationError> {
        let mut out = Record::new();
        let mut issues = Vec::new();
        for field in &self.fields {
            match input.get(&field.name) {
                Some(value) if value.is_null() && field.optional && !field.nullable => {}
                Some(value) => match field.parse_present(value) {
                    Ok(v) => {
                        out.insert(field.name.clone(), v);
                    }
                    Err(message) => issues.push(FieldIssue { field: field.name.clone(), message }),
                },
                None => {
                    if let Some(default) = &field.default {
                        out.insert(field.name.clone(), default());
                    } else if !field.optional {
                        issues.push(FieldIssue { field: field.name.clone(), message: "required".to_string() });
                    }
                }
            }
        }
        if issues.is_empty() { Ok(out) } else { Err(ValidationError(issues)) }
    }

    /// Validates only the fields present in `patch`; no defaults, no required check.
    pub fn parse_patch(&self, patch: &Record) -> Result<Record, ValidationError> {
        let mut out = Record::new();
        let mut issues = Vec::new();
        for (name, value) in patch {
            let Some(field) = self.field(name) else { continue };
            let parsed = if value.is_null() && field.optional { Ok(Value::Null) } else { field.parse_present(value) };
            match parsed {
                Ok(v) => {
                    out.insert(name.clone(), v);
                }
                Err(message) => issues.push(FieldIssue { field: name.clone(), message }),
            }
        }
        if issues.is_empty() { Ok(out) } else { Err(ValidationError(issues)) }
    }

    /// Best-effort coercion of query values, keeping any value that does not fit its field type.
    /// An array against a scalar field is coerced element-wise.
    pub fn coerce_filter(&self, filter: &Record) -> Record {
        filter
            .iter()
            .map(|(name, value)| {
                let coerced = match (self.field(name), value) {
                    (Some(field), Value::Array(items)) if field.field_type.is_scalar() => Value::Array(
                        items.iter().map(|item| field.field_type.coerce(item).unwrap_or_else(|_| item.clone())).collect(),
                    ),
                    (Some(field), v) if !v.is_null() => field.field_type.coerce(v).unwrap_or_else(|_| v.clone()),
                    (_, v) => v.clone(),
                };
                (name.clone(), coerced)
            })
            .collect()
    }
}
