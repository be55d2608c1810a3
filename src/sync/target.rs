use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::document::{ConfigDocument, Destination, Rule};
use crate::validation::{validate_destinations, validate_rules, RuleSchema, SchemaError};

/// A list-valued sub-tree of the document that can be edited as YAML.
pub trait SyncTarget {
    type Item: Serialize + DeserializeOwned + Clone;

    /// Short name used in log lines.
    fn label(&self) -> &'static str;

    /// The sub-tree as it currently stands in the document.
    fn current(&self, doc: &ConfigDocument) -> Vec<Self::Item>;

    /// Structural check of freshly parsed text. Targets without a validator
    /// accept everything.
    fn validate(&self, _candidate: &Value, _doc: &ConfigDocument) -> Result<(), SchemaError> {
        Ok(())
    }

    /// Return the document with the sub-tree replaced.
    fn adopt(&self, doc: &ConfigDocument, items: Vec<Self::Item>) -> ConfigDocument;
}

/// The destination list.
#[derive(Debug, Clone, Copy, Default)]
pub struct Destinations;

impl SyncTarget for Destinations {
    type Item = Destination;

    fn label(&self) -> &'static str {
        "destinations"
    }

    fn current(&self, doc: &ConfigDocument) -> Vec<Destination> {
        doc.destinations.clone()
    }

    fn validate(&self, candidate: &Value, _doc: &ConfigDocument) -> Result<(), SchemaError> {
        validate_destinations(candidate)
    }

    fn adopt(&self, doc: &ConfigDocument, items: Vec<Destination>) -> ConfigDocument {
        doc.apply(|d| d.with_destinations(items))
    }
}

/// Which shape edited rules are checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchemaMode {
    /// The live fallback rule of the document being edited.
    #[default]
    Live,
    /// The synthesized fallback rule.
    Canonical,
}

/// Every rule except the fallback rule, which is edited through the
/// toggles instead and always re-inserted at index 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct VisibleRules {
    pub schema: SchemaMode,
}

impl SyncTarget for VisibleRules {
    type Item = Rule;

    fn label(&self) -> &'static str {
        "rules"
    }

    fn current(&self, doc: &ConfigDocument) -> Vec<Rule> {
        doc.visible_rules()
    }

    fn validate(&self, candidate: &Value, doc: &ConfigDocument) -> Result<(), SchemaError> {
        let schema = match self.schema {
            SchemaMode::Live => RuleSchema::from_document(doc),
            SchemaMode::Canonical => RuleSchema::Canonical,
        };
        validate_rules(candidate, &schema)
    }

    fn adopt(&self, doc: &ConfigDocument, items: Vec<Rule>) -> ConfigDocument {
        doc.apply(|d| d.with_visible_rules(items))
    }
}

/// Wraps a target and skips its validator.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unchecked<T>(pub T);

impl<T: SyncTarget> SyncTarget for Unchecked<T> {
    type Item = T::Item;

    fn label(&self) -> &'static str {
        self.0.label()
    }

    fn current(&self, doc: &ConfigDocument) -> Vec<Self::Item> {
        self.0.current(doc)
    }

    fn adopt(&self, doc: &ConfigDocument, items: Vec<Self::Item>) -> ConfigDocument {
        self.0.adopt(doc, items)
    }
}
