//! The canonical configuration document: AI settings, destinations and
//! routing rules, with the mandatory fallback rule kept at index 0.
//!
//! Every edit is a pure `next = updater(prev)` transform. Nothing in here
//! touches the network or shared state.

mod defaults;
pub mod io;
pub mod lint;
pub mod migrate;
mod types;

pub use defaults::*;
pub use io::*;
pub use lint::*;
pub use types::*;
pub(crate) use types::null_as_default;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use migrate::PayloadShape;

/// Backend payload that cannot be turned into a document.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("config payload must be an object, got {0}")]
    NotAnObject(&'static str),
    #[error("invalid config payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid YAML document: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Short name of a JSON value's kind, for diagnostics.
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}

// ============================================================================
// Document
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigDocument {
    #[serde(deserialize_with = "types::null_as_default")]
    pub ai: AiSettings,
    #[serde(deserialize_with = "types::null_as_default")]
    pub destinations: Vec<Destination>,
    #[serde(deserialize_with = "types::null_as_default")]
    pub rules: Vec<Rule>,
}

impl Default for ConfigDocument {
    fn default() -> Self {
        Self {
            ai: AiSettings::default(),
            destinations: Vec::new(),
            rules: vec![Rule::fallback()],
        }
    }
}

/// Parse a backend payload into a document.
///
/// Accepts the nested shape, the legacy flat shape, and either one wrapped
/// in a `{"config": ...}` envelope. Missing fields take their defaults and
/// the result is always normalized.
pub fn load(raw: Value) -> Result<ConfigDocument, FormatError> {
    let map = match migrate::unwrap_envelope(raw) {
        Value::Null => return Ok(ConfigDocument::default()),
        Value::Object(map) => map,
        other => return Err(FormatError::NotAnObject(value_kind(&other))),
    };

    let doc = match migrate::detect_shape(&map) {
        PayloadShape::Nested => serde_json::from_value(Value::Object(map))?,
        PayloadShape::LegacyFlat => {
            info!("Migrating legacy flat config payload");
            migrate::from_legacy(map)?
        }
        PayloadShape::Empty => ConfigDocument::default(),
    };

    Ok(doc.normalized())
}

/// Apply a pure transform to a document.
pub fn apply<F>(doc: &ConfigDocument, updater: F) -> ConfigDocument
where
    F: FnOnce(ConfigDocument) -> ConfigDocument,
{
    updater(doc.clone())
}

impl ConfigDocument {
    /// The nested wire shape. `load(doc.serialize()) == doc` for any
    /// normalized document.
    pub fn serialize(&self) -> Value {
        serde_json::to_value(self).unwrap_or_default()
    }

    pub fn apply<F>(&self, updater: F) -> ConfigDocument
    where
        F: FnOnce(ConfigDocument) -> ConfigDocument,
    {
        apply(self, updater)
    }

    /// Enforce the rule-list invariants: exactly one fallback rule, at
    /// index 0, and every preprompt within the length limit.
    pub fn normalized(mut self) -> Self {
        let mut fallback = None;
        let mut rest = Vec::with_capacity(self.rules.len());
        for rule in self.rules.drain(..) {
            if !rule.is_fallback() {
                rest.push(rule.clamp_preprompt());
            } else if fallback.is_none() {
                fallback = Some(rule.clamp_preprompt());
            } else {
                warn!("Dropping duplicate '{}' rule", DEFAULT_RULE_NAME);
            }
        }

        let fallback = fallback.unwrap_or_else(|| {
            info!("No '{}' rule in config, synthesizing one", DEFAULT_RULE_NAME);
            Rule::fallback()
        });

        self.rules = std::iter::once(fallback).chain(rest).collect();
        self
    }

    pub fn fallback_rule(&self) -> Option<&Rule> {
        self.rules.iter().find(|r| r.is_fallback())
    }

    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.name == name)
    }

    /// Rules shown in the free-text rules editor: everything but the
    /// fallback rule.
    pub fn visible_rules(&self) -> Vec<Rule> {
        self.rules.iter().filter(|r| !r.is_fallback()).cloned().collect()
    }

    pub fn enabled_destinations(&self) -> impl Iterator<Item = &Destination> {
        self.destinations.iter().filter(|d| d.enabled)
    }

    // ------------------------------------------------------------------------
    // Updates
    // ------------------------------------------------------------------------

    /// Switch providers. Ollama settings are kept as they are.
    pub fn with_provider(mut self, provider: AiProvider) -> Self {
        self.ai.provider = provider;
        self
    }

    pub fn with_ollama_url(mut self, url: impl Into<String>) -> Self {
        self.ai.ollama.url = url.into();
        self
    }

    pub fn with_ollama_model(mut self, model: impl Into<String>) -> Self {
        self.ai.ollama.model = model.into();
        self
    }

    pub fn with_destinations(mut self, destinations: Vec<Destination>) -> Self {
        self.destinations = destinations;
        self
    }

    /// Set the fallback rule's preprompt, clamped to the length limit.
    pub fn with_fallback_preprompt(self, preprompt: &str) -> Self {
        let mut doc = self.normalized();
        doc.rules[0].preprompt = clamp_preprompt(preprompt);
        doc
    }

    /// Reassemble the rule list from an edited set of visible rules. The
    /// current fallback rule stays at index 0; entries claiming the
    /// fallback name are dropped.
    pub fn with_visible_rules(self, visible: Vec<Rule>) -> Self {
        let mut doc = self.normalized();
        let fallback = doc.rules.remove(0);
        let mut rules = Vec::with_capacity(visible.len() + 1);
        rules.push(fallback);
        for rule in visible {
            if rule.is_fallback() {
                warn!(
                    "Ignoring edited rule named '{}'; the fallback rule is edited separately",
                    DEFAULT_RULE_NAME
                );
                continue;
            }
            rules.push(rule.clamp_preprompt());
        }
        doc.rules = rules;
        doc
    }
}
