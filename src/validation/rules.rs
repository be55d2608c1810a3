use serde_json::{Map, Value};
use std::borrow::Cow;

use super::{as_entry, list_items, SchemaError};
use crate::document::{ConfigDocument, Rule};

/// Where the required rule shape comes from.
///
/// The shape is data, not a type: every key present in the schema rule
/// (recursively, through nested mappings) must be present in each candidate
/// rule. Values are never type-checked; a string where a boolean is
/// expected passes.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleSchema {
    /// Shape of a live rule value, normally the document's fallback rule.
    /// A non-mapping value imposes no keys at all.
    Live(Value),
    /// Shape of the synthesized fallback rule, independent of any document.
    Canonical,
}

impl RuleSchema {
    pub fn from_rule(rule: &Rule) -> Self {
        Self::Live(serde_json::to_value(rule).unwrap_or_default())
    }

    /// The document's fallback rule, or the canonical shape if it has none.
    pub fn from_document(doc: &ConfigDocument) -> Self {
        doc.fallback_rule()
            .map(Self::from_rule)
            .unwrap_or(Self::Canonical)
    }

    fn shape(&self) -> Cow<'_, Value> {
        match self {
            Self::Live(value) => Cow::Borrowed(value),
            Self::Canonical => Cow::Owned(serde_json::to_value(Rule::fallback()).unwrap_or_default()),
        }
    }
}

/// Validate a parsed rule list against a schema rule.
///
/// Returns the first problem found. Within one mapping, keys that hold
/// nested mappings in the schema are checked before leaf keys, and nested
/// mappings are descended only after every key at the current level is
/// present.
pub fn validate_rules(candidate: &Value, schema: &RuleSchema) -> Result<(), SchemaError> {
    let items = list_items(candidate)?;
    let shape = schema.shape();
    for (index, item) in items.iter().enumerate() {
        let entry = as_entry(index, item)?;
        if let Value::Object(required) = &*shape {
            let mut missing = Vec::new();
            walk(required, entry, &format!("rule[{index}]"), &mut missing, true);
            if let Some(path) = missing.into_iter().next() {
                return Err(SchemaError::MissingKey(path));
            }
        }
    }
    Ok(())
}

/// Every missing key path across all well-formed entries, in check order.
/// Entries that are null or not mappings are skipped.
pub fn missing_keys(candidate: &Value, schema: &RuleSchema) -> Vec<String> {
    let mut missing = Vec::new();
    let Ok(items) = list_items(candidate) else {
        return missing;
    };
    let shape = schema.shape();
    let Value::Object(required) = &*shape else {
        return missing;
    };
    for (index, item) in items.iter().enumerate() {
        if let Ok(entry) = as_entry(index, item) {
            walk(required, entry, &format!("rule[{index}]"), &mut missing, false);
        }
    }
    missing
}

fn walk(
    required: &Map<String, Value>,
    candidate: &Map<String, Value>,
    path: &str,
    missing: &mut Vec<String>,
    stop_at_first: bool,
) {
    let (nested, leaves): (Vec<_>, Vec<_>) =
        required.iter().partition(|(_, value)| value.is_object());

    for (key, _) in nested.iter().chain(leaves.iter()) {
        if !candidate.contains_key(key.as_str()) {
            missing.push(format!("{path}.{key}"));
            if stop_at_first {
                return;
            }
        }
    }

    for (key, value) in nested {
        // Presence is all that is checked; a non-mapping value stops descent.
        if let (Value::Object(sub_required), Some(Value::Object(sub_candidate))) =
            (value, candidate.get(key.as_str()))
        {
            walk(
                sub_required,
                sub_candidate,
                &format!("{path}.{key}"),
                missing,
                stop_at_first,
            );
            if stop_at_first && !missing.is_empty() {
                return;
            }
        }
    }
}
