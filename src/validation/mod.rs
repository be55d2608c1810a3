//! Structural validation of parsed (untyped) rule and destination lists.
//!
//! Both validators run on `serde_json::Value` before anything is converted
//! into document types, so a rejected edit never reaches the document.

mod destinations;
mod rules;

pub use destinations::*;
pub use rules::*;

use serde_json::{Map, Value};

use crate::document::value_kind;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("content cannot be empty")]
    EmptyInput,
    #[error("the root element must be a list, got {found}")]
    NotAList { found: &'static str },
    #[error("entry {index} is null; define it or remove the dash")]
    NullEntry { index: usize },
    #[error("entry {index} must be a mapping, got {found}")]
    NotAnObject { index: usize, found: &'static str },
    #[error("missing key '{0}'")]
    MissingKey(String),
    #[error("entry {index} must have a non-empty '{field}'")]
    MissingRequiredField { index: usize, field: &'static str },
}

/// The candidate's elements, or the error for a missing or non-list root.
pub(crate) fn list_items(candidate: &Value) -> Result<&[Value], SchemaError> {
    match candidate {
        Value::Null => Err(SchemaError::EmptyInput),
        Value::Array(items) => Ok(items),
        other => Err(SchemaError::NotAList {
            found: value_kind(other),
        }),
    }
}

/// One element as a mapping. An empty YAML list item parses as null, which
/// gets its own error so the message can say so.
pub(crate) fn as_entry(index: usize, item: &Value) -> Result<&Map<String, Value>, SchemaError> {
    match item {
        Value::Object(map) => Ok(map),
        Value::Null => Err(SchemaError::NullEntry { index }),
        other => Err(SchemaError::NotAnObject {
            index,
            found: value_kind(other),
        }),
    }
}
