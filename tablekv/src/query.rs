use crate::storage::Versionstamp;
use crate::value::{Record, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Equality filter, optionally pinned to the versionstamp a record was read at.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Where {
    pub fields: Record,
    pub versionstamp: Option<Versionstamp>,
}

impl Where {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    pub fn versionstamp(mut self, versionstamp: Versionstamp) -> Self {
        self.versionstamp = Some(versionstamp);
        self
    }
}

impl From<Record> for Where {
    fn from(fields: Record) -> Self {
        Where { fields, versionstamp: None }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Select(pub BTreeSet<String>);

impl Select {
    pub fn fields<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        Select(names.into_iter().map(str::to_string).collect())
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains(field)
    }
}

pub type IncludeMap = BTreeMap<String, Include>;

#[derive(Debug, Clone, PartialEq)]
pub enum Include {
    All,
    Nested(IncludeQuery),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncludeQuery {
    pub select: Option<Select>,
    pub include: IncludeMap,
}

impl IncludeQuery {
    pub fn select<'a>(mut self, names: impl IntoIterator<Item = &'a str>) -> Self {
        self.select = Some(Select::fields(names));
        self
    }

    pub fn include(mut self, relation: &str, include: Include) -> Self {
        self.include.insert(relation.to_string(), include);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindArgs {
    pub filter: Where,
    pub select: Option<Select>,
    pub include: IncludeMap,
    pub skip: Option<usize>,
    pub take: Option<usize>,
}

impl FindArgs {
    pub fn new(filter: impl Into<Where>) -> Self {
        FindArgs { filter: filter.into(), ..Default::default() }
    }

    pub fn all() -> Self {
        Self::default()
    }

    pub fn select<'a>(mut self, names: impl IntoIterator<Item = &'a str>) -> Self {
        self.select = Some(Select::fields(names));
        self
    }

    pub fn include(mut self, relation: &str, include: Include) -> Self {
        self.include.insert(relation.to_string(), include);
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn take(mut self, take: usize) -> Self {
        self.take = Some(take);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateArgs {
    pub data: Record,
    pub select: Option<Select>,
}

impl CreateArgs {
    pub fn new(data: Record) -> Self {
        CreateArgs { data, select: None }
    }

    pub fn select<'a>(mut self, names: impl IntoIterator<Item = &'a str>) -> Self {
        self.select = Some(Select::fields(names));
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateManyArgs {
    pub data: Vec<Record>,
    pub select: Option<Select>,
}

impl CreateManyArgs {
    pub fn new(data: Vec<Record>) -> Self {
        CreateManyArgs { data, select: None }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateArgs {
    pub filter: Where,
    pub data: Record,
    pub select: Option<Select>,
}

impl UpdateArgs {
    pub fn new(filter: impl Into<Where>, data: Record) -> Self {
        UpdateArgs { filter: filter.into(), data, select: None }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteArgs {
    pub filter: Where,
}

impl DeleteArgs {
    pub fn new(filter: impl Into<Where>) -> Self {
        DeleteArgs { filter: filter.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteResponse {
    pub deleted: usize,
    pub versionstamp: Option<Versionstamp>,
}

/// Record value returned to callers with the versionstamp of its last write.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub value: Record,
    pub versionstamp: Versionstamp,
}

impl Document {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.value.get(field)
    }
}
