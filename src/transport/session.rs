use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use super::{ConfigTransport, TransportError};
use crate::document::{document_fingerprint, ConfigDocument};
use crate::reconcile::{self, EnabledPolicy, PolicyTable, SubToggle};

/// Transient status message shown after a load or save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Loaded,
    Saved,
    LoadFailed(String),
    SaveFailed(String),
}

impl Notice {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::LoadFailed(_) | Self::SaveFailed(_))
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loaded => write!(f, "Configuration loaded"),
            Self::Saved => write!(f, "Configuration saved"),
            Self::LoadFailed(e) => write!(f, "Failed to load configuration: {e}"),
            Self::SaveFailed(e) => write!(f, "Failed to save configuration: {e}"),
        }
    }
}

/// A save in flight. Holds the document as it was when the save started, so
/// the session stays free for further edits until [`EditorSession::finish_save`].
pub struct PendingSave<T: ConfigTransport> {
    transport: Arc<T>,
    snapshot: ConfigDocument,
}

impl<T: ConfigTransport> PendingSave<T> {
    pub fn document(&self) -> &ConfigDocument {
        &self.snapshot
    }

    /// Post the snapshot. Does not borrow the session.
    pub async fn send(self) -> SaveOutcome {
        let result = self.transport.save_config(&self.snapshot).await;
        SaveOutcome {
            fingerprint: document_fingerprint(&self.snapshot),
            result,
        }
    }
}

/// What came back from a [`PendingSave`], to be handed to
/// [`EditorSession::finish_save`].
#[derive(Debug)]
pub struct SaveOutcome {
    fingerprint: String,
    result: Result<(), TransportError>,
}

/// The single writer of a document: owns it, applies edits to it, and moves
/// it across the transport.
///
/// Load and save failures never touch the document. They are reported
/// through the returned error and a [`Notice`].
pub struct EditorSession<T: ConfigTransport> {
    transport: Arc<T>,
    doc: ConfigDocument,
    policies: PolicyTable,
    saved_fingerprint: Option<String>,
    notice: Option<Notice>,
}

impl<T: ConfigTransport> EditorSession<T> {
    pub fn new(transport: T) -> Self {
        Self::with_document(transport, ConfigDocument::default())
    }

    pub fn with_document(transport: T, doc: ConfigDocument) -> Self {
        Self {
            transport: Arc::new(transport),
            doc: doc.normalized(),
            policies: PolicyTable::new(),
            saved_fingerprint: None,
            notice: None,
        }
    }

    pub fn document(&self) -> &ConfigDocument {
        &self.doc
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn policies(&self) -> &PolicyTable {
        &self.policies
    }

    pub fn policies_mut(&mut self) -> &mut PolicyTable {
        &mut self.policies
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn take_notice(&mut self) -> Option<Notice> {
        self.notice.take()
    }

    /// Whether the document differs from what was last loaded or saved.
    /// A session that has never talked to the backend is always dirty.
    pub fn is_dirty(&self) -> bool {
        self.saved_fingerprint.as_deref() != Some(document_fingerprint(&self.doc).as_str())
    }

    /// Replace the document with the result of a pure update.
    pub fn apply<F>(&mut self, updater: F)
    where
        F: FnOnce(ConfigDocument) -> ConfigDocument,
    {
        self.doc = self.doc.apply(updater);
    }

    /// Adopt a document produced elsewhere, e.g. by a synchronizer.
    pub fn replace(&mut self, doc: ConfigDocument) {
        self.doc = doc;
    }

    /// Flip a delivery toggle on the named rule, reconciling its `enabled`
    /// flag under that rule's policy.
    pub fn set_toggle(&mut self, rule_name: &str, which: SubToggle, value: bool) {
        let policy = self.policies.policy_for(rule_name);
        self.doc = reconcile::set_sub_toggle(&self.doc, rule_name, which, value, policy);
    }

    pub fn set_rule_enabled(&mut self, rule_name: &str, value: bool) {
        let policy = self.policies.policy_for(rule_name);
        if policy == EnabledPolicy::DerivedOr {
            warn!(
                "Rule '{}' derives its enabled flag from its toggles; ignoring direct set",
                rule_name
            );
        }
        self.doc = reconcile::set_rule_enabled(&self.doc, rule_name, value, policy);
    }

    /// Fetch the document from the backend. On failure the current document
    /// is kept as is.
    pub async fn load(&mut self) -> Result<&ConfigDocument, TransportError> {
        match self.transport.load_config().await {
            Ok(doc) => {
                self.saved_fingerprint = Some(document_fingerprint(&doc));
                self.doc = doc;
                self.notice = Some(Notice::Loaded);
                Ok(&self.doc)
            }
            Err(e) => {
                warn!("Config load failed: {}", e);
                self.notice = Some(Notice::LoadFailed(e.to_string()));
                Err(e)
            }
        }
    }

    /// Persist the document as it stands now and wait for the answer.
    pub async fn save(&mut self) -> Result<(), TransportError> {
        let outcome = self.begin_save().send().await;
        self.finish_save(outcome)
    }

    /// Snapshot the document for saving. Edits made after this call are not
    /// part of the save and keep the session dirty once it completes.
    pub fn begin_save(&self) -> PendingSave<T> {
        PendingSave {
            transport: self.transport.clone(),
            snapshot: self.doc.clone(),
        }
    }

    /// Record the result of a save. On failure the document is kept exactly
    /// as the user has it.
    pub fn finish_save(&mut self, outcome: SaveOutcome) -> Result<(), TransportError> {
        match outcome.result {
            Ok(()) => {
                self.saved_fingerprint = Some(outcome.fingerprint);
                self.notice = Some(Notice::Saved);
                info!("Saved document {}", short(&self.saved_fingerprint));
                Ok(())
            }
            Err(e) => {
                warn!("Config save failed: {}", e);
                self.notice = Some(Notice::SaveFailed(e.to_string()));
                Err(e)
            }
        }
    }
}

fn short(fingerprint: &Option<String>) -> &str {
    fingerprint.as_deref().map(|f| &f[..f.len().min(12)]).unwrap_or("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{AiProvider, DEFAULT_RULE_NAME};
    use crate::transport::{LogRecord, NotificationQuery, NotificationRecord};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// In-memory backend that can be told to fail.
    #[derive(Default)]
    struct FakeBackend {
        stored: Mutex<Option<ConfigDocument>>,
        fail: Mutex<bool>,
    }

    #[async_trait]
    impl ConfigTransport for FakeBackend {
        async fn load_config(&self) -> Result<ConfigDocument, TransportError> {
            if *self.fail.lock() {
                return Err(TransportError::Status { status: 500, body: "down".into() });
            }
            Ok(self.stored.lock().clone().unwrap_or_default())
        }

        async fn save_config(&self, doc: &ConfigDocument) -> Result<(), TransportError> {
            if *self.fail.lock() {
                return Err(TransportError::Rejected("Invalid configuration format".into()));
            }
            *self.stored.lock() = Some(doc.clone());
            Ok(())
        }

        async fn notifications(
            &self,
            _query: &NotificationQuery,
        ) -> Result<Vec<NotificationRecord>, TransportError> {
            Ok(Vec::new())
        }

        async fn logs(&self, _level: Option<&str>) -> Result<Vec<LogRecord>, TransportError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn save_then_clean() {
        let mut session = EditorSession::new(FakeBackend::default());
        assert!(session.is_dirty());

        session.apply(|d| d.with_provider(AiProvider::MetaAi));
        session.save().await.unwrap();
        assert!(!session.is_dirty());
        assert_eq!(session.notice(), Some(&Notice::Saved));

        let stored = session.transport().stored.lock().clone().unwrap();
        assert_eq!(stored.ai.provider, AiProvider::MetaAi);
    }

    #[tokio::test]
    async fn edits_during_save_stay_dirty() {
        let mut session = EditorSession::new(FakeBackend::default());
        session.apply(|d| d.with_provider(AiProvider::MetaAi));

        let pending = session.begin_save();
        session.apply(|d| d.with_ollama_model("llama3"));
        let outcome = pending.send().await;
        session.finish_save(outcome).unwrap();

        // The backend got the document as it was when the save started.
        let stored = session.transport().stored.lock().clone().unwrap();
        assert_eq!(stored.ai.provider, AiProvider::MetaAi);
        assert_ne!(stored.ai.ollama.model, "llama3");
        assert_eq!(session.document().ai.ollama.model, "llama3");
        assert!(session.is_dirty());
        assert_eq!(session.notice(), Some(&Notice::Saved));
    }

    #[tokio::test]
    async fn save_runs_alongside_edits() {
        let mut session = EditorSession::new(FakeBackend::default());
        let pending = session.begin_save();
        let in_flight = tokio::spawn(pending.send());

        session.set_toggle(DEFAULT_RULE_NAME, SubToggle::Original, false);
        let outcome = in_flight.await.unwrap();
        session.finish_save(outcome).unwrap();

        assert!(session.is_dirty());
        session.save().await.unwrap();
        assert!(!session.is_dirty());
    }

    #[tokio::test]
    async fn failed_save_keeps_document() {
        let backend = FakeBackend::default();
        *backend.fail.lock() = true;
        let mut session = EditorSession::new(backend);
        session.apply(|d| d.with_ollama_model("llama3"));
        let before = session.document().clone();

        assert!(session.save().await.is_err());
        assert_eq!(session.document(), &before);
        assert!(session.notice().unwrap().is_error());
        assert!(session.is_dirty());
    }

    #[tokio::test]
    async fn failed_load_keeps_document() {
        let backend = FakeBackend::default();
        *backend.fail.lock() = true;
        let mut session = EditorSession::new(backend);
        session.apply(|d| d.with_ollama_url("http://gpu:11434"));
        let before = session.document().clone();

        assert!(session.load().await.is_err());
        assert_eq!(session.document(), &before);
        assert!(matches!(session.take_notice(), Some(Notice::LoadFailed(_))));
        assert!(session.notice().is_none());
    }

    #[tokio::test]
    async fn toggles_follow_policy_table() {
        let mut session = EditorSession::new(FakeBackend::default());
        session.set_toggle(DEFAULT_RULE_NAME, SubToggle::Original, false);
        session.set_toggle(DEFAULT_RULE_NAME, SubToggle::AiSummary, false);
        assert!(!session.document().fallback_rule().unwrap().enabled);

        session
            .policies_mut()
            .set(DEFAULT_RULE_NAME, EnabledPolicy::Direct);
        session.set_rule_enabled(DEFAULT_RULE_NAME, true);
        assert!(session.document().fallback_rule().unwrap().enabled);
    }
}
