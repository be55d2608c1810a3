use serde_json::Value;

use super::{as_entry, list_items, SchemaError};

/// Fields every destination must carry as a non-empty string.
const REQUIRED_FIELDS: &[&str] = &["name", "url"];

/// Validate a parsed destination list. Entries are checked in order, each
/// one fully before the next.
pub fn validate_destinations(candidate: &Value) -> Result<(), SchemaError> {
    for (index, item) in list_items(candidate)?.iter().enumerate() {
        let entry = as_entry(index, item)?;
        for &field in REQUIRED_FIELDS {
            match entry.get(field) {
                Some(Value::String(s)) if !s.is_empty() => {}
                _ => return Err(SchemaError::MissingRequiredField { index, field }),
            }
        }
    }
    Ok(())
}
