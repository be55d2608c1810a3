//! YAML text buffers bound to a list in the document.
//!
//! Text flows into the document on every accepted edit. The document flows
//! back into the text only on construction and [`Synchronizer::reload`], so
//! a document change made elsewhere never rewrites a buffer mid-edit.

mod debounce;
mod target;

pub use debounce::*;
pub use target::*;

use serde_json::Value;
use tracing::debug;

use crate::document::ConfigDocument;
use crate::validation::SchemaError;

/// User text that is not valid YAML, or does not fit the document types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid YAML: {message}")]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    fn new(message: impl std::fmt::Display) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("invalid structure: {0}")]
    Schema(#[from] SchemaError),
}

/// Monotonic edit counter; higher is newer.
pub type Revision = u64;

/// Parse buffer text. Blank text is an empty list, not an error.
pub fn parse_yaml(text: &str) -> Result<Value, ParseError> {
    if text.trim().is_empty() {
        return Ok(Value::Array(Vec::new()));
    }
    serde_yaml::from_str(text).map_err(ParseError::new)
}

pub struct Synchronizer<T: SyncTarget> {
    target: T,
    text: String,
    revision: Revision,
    committed: Revision,
    last_valid: Vec<T::Item>,
    error: Option<SyncError>,
}

impl<T: SyncTarget> Synchronizer<T> {
    /// Bind a buffer to `target`, rendering its current value once.
    pub fn new(target: T, doc: &ConfigDocument) -> Self {
        let items = target.current(doc);
        Self {
            text: render(&items),
            target,
            revision: 0,
            committed: 0,
            last_valid: items,
            error: None,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Error from the latest committed edit, if it was rejected.
    pub fn error(&self) -> Option<&SyncError> {
        self.error.as_ref()
    }

    /// The last value that made it into the document.
    pub fn last_valid(&self) -> &[T::Item] {
        &self.last_valid
    }

    pub fn revision(&self) -> Revision {
        self.revision
    }

    /// Whether staged text has not been committed yet.
    pub fn has_pending(&self) -> bool {
        self.committed != self.revision
    }

    /// Record new buffer text without parsing it.
    pub fn stage(&mut self, text: impl Into<String>) -> Revision {
        self.text = text.into();
        self.revision += 1;
        self.revision
    }

    /// Parse and adopt the buffer as of `revision`.
    ///
    /// Returns `Ok(None)` when newer text has been staged since, so only the
    /// latest keystroke's result is ever applied.
    pub fn commit(
        &mut self,
        revision: Revision,
        doc: &ConfigDocument,
    ) -> Result<Option<ConfigDocument>, SyncError> {
        if revision != self.revision {
            debug!(
                "Skipping stale {} edit (revision {} < {})",
                self.target.label(),
                revision,
                self.revision
            );
            return Ok(None);
        }
        self.adopt_buffer(doc).map(Some)
    }

    /// Stage and commit in one step.
    pub fn edit(
        &mut self,
        text: impl Into<String>,
        doc: &ConfigDocument,
    ) -> Result<ConfigDocument, SyncError> {
        self.stage(text);
        self.adopt_buffer(doc)
    }

    /// Re-render the buffer from the document, discarding unsaved text.
    /// Used after the document is (re)loaded from the backend.
    pub fn reload(&mut self, doc: &ConfigDocument) {
        let items = self.target.current(doc);
        self.text = render(&items);
        self.last_valid = items;
        self.error = None;
        self.revision += 1;
        self.committed = self.revision;
    }

    fn adopt_buffer(&mut self, doc: &ConfigDocument) -> Result<ConfigDocument, SyncError> {
        self.committed = self.revision;

        let parsed = match parse_yaml(&self.text) {
            Ok(value) => value,
            Err(e) => return self.reject(e.into()),
        };

        if let Err(e) = self.target.validate(&parsed, doc) {
            return self.reject(e.into());
        }

        // Reachable only without a validator: a bare `null` reads as empty.
        let parsed = match parsed {
            Value::Null => Value::Array(Vec::new()),
            other => other,
        };

        let items: Vec<T::Item> = match serde_json::from_value(parsed) {
            Ok(items) => items,
            Err(e) => return self.reject(ParseError::new(e).into()),
        };

        debug!("Adopted {} {} from text", items.len(), self.target.label());
        let next = self.target.adopt(doc, items);
        // Adoption may drop entries, e.g. a hand-typed fallback rule.
        self.last_valid = self.target.current(&next);
        self.error = None;
        Ok(next)
    }

    fn reject(&mut self, error: SyncError) -> Result<ConfigDocument, SyncError> {
        debug!("Rejected {} edit: {}", self.target.label(), error);
        self.error = Some(error.clone());
        Err(error)
    }
}

fn render<S: serde::Serialize>(items: &S) -> String {
    serde_yaml::to_string(items).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Destination, Rule, DEFAULT_RULE_NAME};
    use pretty_assertions::assert_eq;

    fn doc() -> ConfigDocument {
        ConfigDocument::default().with_destinations(vec![Destination {
            name: "Telegram".into(),
            enabled: true,
            url: "tgram://t/c".into(),
        }])
    }

    #[test]
    fn initial_text_renders_sub_tree() {
        let sync = Synchronizer::new(Destinations, &doc());
        assert!(sync.text().contains("name: Telegram"));
        assert!(sync.text().contains("tgram://t/c"));
        assert_eq!(sync.last_valid().len(), 1);
        assert!(sync.error().is_none());
    }

    #[test]
    fn valid_edit_propagates() {
        let doc = doc();
        let mut sync = Synchronizer::new(Destinations, &doc);
        let next = sync
            .edit("- name: ntfy\n  enabled: true\n  url: ntfy://alerts\n", &doc)
            .unwrap();

        assert_eq!(next.destinations.len(), 1);
        assert_eq!(next.destinations[0].name, "ntfy");
        assert_eq!(next.rules, doc.rules);
        assert!(!sync.has_pending());
    }

    #[test]
    fn blank_text_is_empty_list() {
        let doc = doc();
        let mut sync = Synchronizer::new(Destinations, &doc);
        let next = sync.edit("   \n", &doc).unwrap();
        assert!(next.destinations.is_empty());
    }

    #[test]
    fn broken_yaml_keeps_last_valid() {
        let doc = doc();
        let mut sync = Synchronizer::new(Destinations, &doc);
        let err = sync.edit("- name: [unclosed\n", &doc).unwrap_err();

        assert!(matches!(err, SyncError::Parse(_)));
        assert!(err.to_string().starts_with("invalid YAML"));
        assert_eq!(sync.error(), Some(&err));
        assert_eq!(sync.last_valid(), doc.destinations.as_slice());
        // The broken text stays in the buffer for the user to fix.
        assert_eq!(sync.text(), "- name: [unclosed\n");
    }

    #[test]
    fn null_entry_rejected() {
        let doc = doc();
        let mut sync = Synchronizer::new(Destinations, &doc);
        let err = sync
            .edit("- name: Telegram\n  url: tgram://t/c\n-\n", &doc)
            .unwrap_err();
        assert_eq!(err, SyncError::Schema(SchemaError::NullEntry { index: 1 }));
        assert_eq!(sync.last_valid(), doc.destinations.as_slice());
    }

    #[test]
    fn error_clears_after_fix() {
        let doc = doc();
        let mut sync = Synchronizer::new(Destinations, &doc);
        assert!(sync.edit("- name: ''\n  url: x\n", &doc).is_err());
        assert!(sync.error().is_some());

        sync.edit("- name: a\n  url: x\n", &doc).unwrap();
        assert!(sync.error().is_none());
    }

    #[test]
    fn type_mismatch_surfaces_as_parse_error() {
        let doc = doc();
        let mut sync = Synchronizer::new(Destinations, &doc);
        let err = sync
            .edit("- name: a\n  url: x\n  enabled: [1, 2]\n", &doc)
            .unwrap_err();
        assert!(matches!(err, SyncError::Parse(_)));
    }

    #[test]
    fn stale_revision_is_skipped() {
        let doc = doc();
        let mut sync = Synchronizer::new(Destinations, &doc);
        let first = sync.stage("- name: a\n  url: x\n");
        let second = sync.stage("- name: b\n  url: y\n");
        assert!(sync.has_pending());

        assert_eq!(sync.commit(first, &doc).unwrap(), None);
        let next = sync.commit(second, &doc).unwrap().unwrap();
        assert_eq!(next.destinations[0].name, "b");
    }

    #[test]
    fn external_change_does_not_overwrite_buffer() {
        let doc = doc();
        let mut sync = Synchronizer::new(Destinations, &doc);
        sync.stage("- name: half-typ");

        // Some other editor changes the destinations...
        let elsewhere = doc.apply(|d| d.with_destinations(Vec::new()));
        assert!(elsewhere.destinations.is_empty());
        // ...and the buffer is left alone until an explicit reload.
        assert_eq!(sync.text(), "- name: half-typ");

        sync.reload(&elsewhere);
        assert_eq!(sync.text(), "[]\n");
        assert!(!sync.has_pending());
    }

    #[test]
    fn rules_editor_hides_and_restores_fallback() {
        let doc = ConfigDocument::default();
        let mut sync = Synchronizer::new(VisibleRules::default(), &doc);
        assert_eq!(sync.text(), "[]\n");

        let mut rule = Rule::fallback();
        rule.name = "disk".into();
        let text = serde_yaml::to_string(&vec![rule]).unwrap();
        let next = sync.edit(text, &doc).unwrap();

        let names: Vec<&str> = next.rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec![DEFAULT_RULE_NAME, "disk"]);
    }

    #[test]
    fn last_valid_follows_adopted_rules() {
        let doc = ConfigDocument::default();
        let mut sync = Synchronizer::new(VisibleRules::default(), &doc);

        let mut disk = Rule::fallback();
        disk.name = "disk".into();
        let text = serde_yaml::to_string(&vec![Rule::fallback(), disk]).unwrap();
        let next = sync.edit(text, &doc).unwrap();

        let names: Vec<&str> = sync.last_valid().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["disk"]);
        assert_eq!(sync.last_valid(), next.visible_rules().as_slice());
    }

    #[test]
    fn incomplete_rule_rejected_without_partial_adoption() {
        let doc = ConfigDocument::default();
        let mut sync = Synchronizer::new(VisibleRules::default(), &doc);
        let err = sync.edit("- name: x\n", &doc).unwrap_err();
        assert_eq!(
            err,
            SyncError::Schema(SchemaError::MissingKey("rule[0].match".into()))
        );
        assert!(sync.last_valid().is_empty());
    }

    #[test]
    fn unchecked_target_accepts_null_as_empty() {
        let doc = doc();
        let mut sync = Synchronizer::new(Unchecked(Destinations), &doc);
        let next = sync.edit("~\n", &doc).unwrap();
        assert!(next.destinations.is_empty());

        // Without a validator, missing fields fall back to defaults.
        let next = sync.edit("- name: only-name\n", &doc).unwrap();
        assert_eq!(next.destinations[0].url, "");
    }
}
