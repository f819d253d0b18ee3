use crate::storage::{Entry, MaybeEntry};
use crate::value::{Record, Value};

const NULL: Value = Value::Null;

/// Present entries whose value satisfies every filter field.
pub fn filter<E: Into<MaybeEntry>>(entries: impl IntoIterator<Item = E>, filter: &Record) -> Vec<Entry> {
    entries
        .into_iter()
        .filter_map(|e| e.into().into_entry())
        .filter(|entry| matches(&entry.value, filter))
        .collect()
}

pub fn matches(record: &Record, filter: &Record) -> bool {
    filter.iter().all(|(field, expected)| is_matching_value(expected, record.get(field).unwrap_or(&NULL)))
}

/// An array expectation matches the equal array or any of its elements;
/// a scalar expectation matches an array-valued field containing it.
pub fn is_matching_value(expected: &Value, stored: &Value) -> bool {
    match expected {
        Value::Array(options) => stored == expected || options.iter().any(|option| matches_scalar(option, stored)),
        scalar => matches_scalar(scalar, stored),
    }
}

fn matches_scalar(expected: &Value, stored: &Value) -> bool {
    match stored {
        Value::Array(items) if !matches!(expected, Value::Array(_)) => items.iter().any(|item| item == expected),
        _ => stored == expected,
    }
}
