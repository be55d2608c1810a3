//! Command handlers behind the `relaybell` binary.

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDateTime;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::*;
use crate::document::{
    self, lint_document, migrate, ConfigDocument, LintWarning, DEFAULT_RULE_NAME,
};
use crate::poll::{Poller, Snapshot, View};
use crate::reconcile::{EnabledPolicy, FallbackState};
use crate::settings::Settings;
use crate::sync::{Destinations, SyncTarget, Synchronizer, VisibleRules};
use crate::transport::{
    parse_record_timestamp, ConfigTransport, EditorSession, HttpTransport, LogRecord,
    NotificationQuery, NotificationRecord,
};

const DEFAULT_DOCUMENT_FILE: &str = "relaybell-config.yaml";
const DEFAULT_SETTINGS_FILE: &str = "relaybell.json";

pub fn transport(settings: &Settings) -> HttpTransport {
    HttpTransport::new(settings.api_url.clone(), settings.timeout())
}

async fn open_session(settings: &Settings) -> Result<EditorSession<HttpTransport>> {
    let mut session = EditorSession::new(transport(settings));
    debug!("Loading configuration from {}", session.transport().base_url());
    session
        .load()
        .await
        .with_context(|| format!("Cannot load configuration from {}", settings.api_url))?;
    Ok(session)
}

async fn save_if_dirty(session: &mut EditorSession<HttpTransport>) -> Result<()> {
    if !session.is_dirty() {
        println!("No changes");
        return Ok(());
    }
    session.save().await.context("Cannot save configuration")?;
    if let Some(notice) = session.take_notice() {
        println!("{notice}");
    }
    Ok(())
}

fn report_lint(warnings: &[LintWarning]) {
    for warning in warnings {
        warn!("{}", warning);
    }
}

// ============================================================================
// Document checks
// ============================================================================

fn yaml_of(value: &Value) -> Result<String> {
    Ok(serde_yaml::to_string(value)?)
}

/// Load a raw document and run its lists through the same editors the UI
/// uses, so a file is accepted exactly when hand-typing it would be.
pub fn check_document(raw: Value) -> Result<ConfigDocument> {
    let unwrapped = migrate::unwrap_envelope(raw.clone());
    let doc = document::load(raw)?;

    let Value::Object(map) = unwrapped else {
        return Ok(doc);
    };
    if migrate::detect_shape(&map) != migrate::PayloadShape::Nested {
        // Migrated documents are built from typed fields.
        return Ok(doc);
    }

    let mut errors = Vec::new();

    if let Some(destinations) = map.get("destinations").filter(|v| !v.is_null()) {
        let mut editor = Synchronizer::new(Destinations, &doc);
        if let Err(e) = editor.edit(yaml_of(destinations)?, &doc) {
            errors.push(format!("destinations: {e}"));
        }
    }

    if let Some(Value::Array(rules)) = map.get("rules") {
        let visible: Vec<Value> = rules
            .iter()
            .filter(|r| r.get("name").and_then(Value::as_str) != Some(DEFAULT_RULE_NAME))
            .cloned()
            .collect();
        let mut editor = Synchronizer::new(VisibleRules::default(), &doc);
        if let Err(e) = editor.edit(yaml_of(&Value::Array(visible))?, &doc) {
            errors.push(format!("rules: {e}"));
        }
    }

    if !errors.is_empty() {
        bail!("{}", errors.join("\n"));
    }
    Ok(doc)
}

// ============================================================================
// config
// ============================================================================

pub async fn config(settings: &Settings, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show { json } => {
            let session = open_session(settings).await?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&session.document().serialize())?
                );
            } else {
                print!("{}", document::to_yaml(session.document())?);
            }
        }
        ConfigAction::Pull { file } => {
            let session = open_session(settings).await?;
            document::write_yaml_file(&file, session.document())?;
            println!("Wrote {}", file.display());
        }
        ConfigAction::Push { file } => {
            let doc = check_document(document::read_document_value(&file)?)
                .with_context(|| format!("'{}' is not a valid document", file.display()))?;
            report_lint(&lint_document(&doc));

            let mut session = EditorSession::with_document(transport(settings), doc);
            session.save().await.context("Cannot save configuration")?;
            println!("Uploaded {}", file.display());
        }
        ConfigAction::Validate { file } => {
            let doc = check_document(document::read_document_value(&file)?)
                .with_context(|| format!("'{}' is not a valid document", file.display()))?;
            let warnings = lint_document(&doc);
            for warning in &warnings {
                println!("warning: {warning}");
            }
            println!(
                "{} is valid ({} destinations, {} rules, {} warnings)",
                file.display(),
                doc.destinations.len(),
                doc.rules.len(),
                warnings.len()
            );
        }
        ConfigAction::Init {
            file,
            settings_file,
        } => {
            let default_name = if settings_file {
                DEFAULT_SETTINGS_FILE
            } else {
                DEFAULT_DOCUMENT_FILE
            };
            let path = file.unwrap_or_else(|| PathBuf::from(default_name));
            if path.exists() {
                bail!("'{}' already exists", path.display());
            }
            if settings_file {
                Settings::write_default(&path)?;
            } else {
                document::write_yaml_file(&path, &ConfigDocument::default())?;
            }
            info!("Created {}", path.display());
        }
    }
    Ok(())
}

// ============================================================================
// destinations / rules
// ============================================================================

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read '{}'", path.display()))
}

pub async fn edit_list<S: SyncTarget>(
    settings: &Settings,
    target: S,
    action: ListAction,
) -> Result<()> {
    let mut session = open_session(settings).await?;
    let label = target.label();
    let mut editor = Synchronizer::new(target, session.document());

    match action {
        ListAction::Get { file: None } => print!("{}", editor.text()),
        ListAction::Get { file: Some(path) } => {
            std::fs::write(&path, editor.text())
                .with_context(|| format!("Failed to write '{}'", path.display()))?;
            println!("Wrote {} to {}", label, path.display());
        }
        ListAction::Set { file } => {
            let text = read_text(&file)?;
            let next = editor
                .edit(text, session.document())
                .map_err(|e| anyhow!("{} in '{}': {}", label, file.display(), e))?;
            report_lint(&lint_document(&next));
            session.replace(next);
            save_if_dirty(&mut session).await?;
        }
    }
    Ok(())
}

// ============================================================================
// toggle / provider
// ============================================================================

pub async fn toggle(settings: &Settings, opts: ToggleOpts) -> Result<()> {
    let mut session = open_session(settings).await?;
    if session.document().rule(&opts.rule).is_none() {
        bail!("No rule named '{}'", opts.rule);
    }
    if opts.direct {
        session.policies_mut().set(opts.rule.clone(), EnabledPolicy::Direct);
    }

    session.set_toggle(&opts.rule, opts.which, opts.state.is_on());

    if let Some(rule) = session.document().rule(&opts.rule) {
        println!(
            "{}: {:?}, enabled = {}",
            rule.name,
            FallbackState::of(rule),
            rule.enabled
        );
    }
    save_if_dirty(&mut session).await
}

pub async fn provider(settings: &Settings, opts: ProviderOpts) -> Result<()> {
    let mut session = open_session(settings).await?;
    session.apply(|d| {
        let mut d = d.with_provider(opts.provider);
        if let Some(url) = opts.url {
            d = d.with_ollama_url(url);
        }
        if let Some(model) = opts.model {
            d = d.with_ollama_model(model);
        }
        d
    });
    save_if_dirty(&mut session).await
}

// ============================================================================
// Read-only views
// ============================================================================

fn print_notifications(records: &[NotificationRecord]) {
    for record in records {
        println!("{} [{}] {}", record.timestamp, record.client, record.original);
        if !record.ai.is_empty() {
            println!("    ai: {}", record.ai);
        }
    }
}

fn print_logs(records: &[LogRecord]) {
    for record in records {
        println!("{} {:<8} {}", record.timestamp, record.level, record.message);
    }
}

/// Count records stamped after `since`. Also returns the newest stamp seen,
/// for the next call. Unparseable stamps are not counted.
fn count_newer<'a>(
    stamps: impl Iterator<Item = &'a str>,
    since: Option<NaiveDateTime>,
) -> (usize, Option<NaiveDateTime>) {
    let mut newest = since;
    let mut fresh = 0;
    for stamp in stamps.filter_map(parse_record_timestamp) {
        if since.map_or(true, |s| stamp > s) {
            fresh += 1;
        }
        newest = newest.max(Some(stamp));
    }
    (fresh, newest)
}

fn notification_query(settings: &Settings, limit: Option<u32>) -> NotificationQuery {
    NotificationQuery {
        limit: limit.unwrap_or(settings.notification_limit),
        ..NotificationQuery::default()
    }
}

pub async fn notifications(settings: &Settings, opts: NotificationsOpts) -> Result<()> {
    let query = NotificationQuery {
        start_date: opts.since,
        end_date: opts.until,
        ..notification_query(settings, opts.limit)
    };
    let records = transport(settings).notifications(&query).await?;
    print_notifications(&records);
    Ok(())
}

pub async fn logs(settings: &Settings, opts: LogsOpts) -> Result<()> {
    let records = transport(settings).logs(opts.level.as_deref()).await?;
    print_logs(&records);
    Ok(())
}

pub async fn watch(settings: &Settings, opts: WatchOpts) -> Result<()> {
    let view = match opts.view {
        WatchView::Notifications => View::Notifications(notification_query(settings, opts.limit)),
        WatchView::Logs => View::Logs { level: opts.level },
    };
    let interval = opts
        .interval
        .map(|s| std::time::Duration::from_secs(s.max(1)))
        .unwrap_or_else(|| settings.poll_interval());

    let poller = Poller::new(Arc::new(transport(settings)), view, interval);
    let slot = poller.slot();
    let handle = poller.start();
    info!("Refreshing every {}s, Ctrl-C to stop", interval.as_secs());

    let mut seen: Option<NaiveDateTime> = None;
    loop {
        tokio::select! {
            snapshot = slot.changed() => match snapshot {
                Some(Snapshot::Notifications(records)) => {
                    let (fresh, newest) =
                        count_newer(records.iter().map(|r| r.timestamp.as_str()), seen);
                    seen = newest;
                    println!("--- {} notifications, {} new ---", records.len(), fresh);
                    print_notifications(&records);
                }
                Some(Snapshot::Logs(records)) => {
                    let (fresh, newest) =
                        count_newer(records.iter().map(|r| r.timestamp.as_str()), seen);
                    seen = newest;
                    println!("--- {} log lines, {} new ---", records.len(), fresh);
                    print_logs(&records);
                }
                None => {}
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    poller.stop();
    if let Some(handle) = handle {
        handle.abort();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn check_accepts_complete_document() {
        let raw = json!({
            "destinations": [{"name": "ntfy", "enabled": true, "url": "ntfy://alerts"}],
            "rules": [ConfigDocument::default().rules[0].clone()],
        });
        let doc = check_document(raw).unwrap();
        assert_eq!(doc.destinations[0].name, "ntfy");
    }

    #[test]
    fn check_reports_structural_errors() {
        let raw = json!({
            "destinations": [{"name": "", "url": "x"}],
            "rules": [{"name": "x"}],
        });
        let err = check_document(raw).unwrap_err().to_string();
        assert!(err.contains("destinations"));
        assert!(err.contains("rule[0].match"));
    }

    #[test]
    fn check_skips_default_rule_entries() {
        let raw = json!({
            "rules": [{"name": DEFAULT_RULE_NAME, "enabled": false}],
        });
        let doc = check_document(raw).unwrap();
        assert!(!doc.fallback_rule().unwrap().enabled);
    }

    #[test]
    fn newer_records_are_counted_once() {
        let first = ["2024-03-01 09:30:00", "2024-03-02 08:00:00", "not a time"];
        let (fresh, seen) = count_newer(first.into_iter(), None);
        assert_eq!(fresh, 2);
        assert_eq!(seen, parse_record_timestamp("2024-03-02 08:00:00"));

        let second = ["2024-03-02 08:00:00", "2024-03-02 08:05:00"];
        let (fresh, seen) = count_newer(second.into_iter(), seen);
        assert_eq!(fresh, 1);
        assert_eq!(seen, parse_record_timestamp("2024-03-02 08:05:00"));
    }

    #[test]
    fn legacy_documents_are_not_structurally_checked() {
        let raw = json!({"config": {"enable_ai": false, "ntfy": {"enabled": true, "topic": "alerts"}}});
        let doc = check_document(raw).unwrap();
        assert_eq!(doc.destinations.len(), 1);
    }
}
