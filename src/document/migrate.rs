//! Migration of backend payloads into the canonical document shape.
//!
//! Earlier backends stored a flat document: a global preprompt, `enable_ai`
//! / `show_original` switches and one block per hard-coded chat channel.
//! Everything downstream only ever sees the nested `ai` / `destinations` /
//! `rules` shape, so the flat form is converted here, once.

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};
use url::Url;

use super::defaults::*;
use super::types::*;
use super::{ConfigDocument, FormatError};

/// Keys that identify the nested document shape.
const NESTED_KEYS: &[&str] = &["ai", "destinations", "rules"];

/// Keys that only appear in the legacy flat shape.
const LEGACY_KEYS: &[&str] = &[
    "preprompt",
    "enable_ai",
    "show_original",
    "ntfy",
    "telegram",
    "slack",
    "discord",
    "gotify",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    Nested,
    LegacyFlat,
    /// Neither shape; every field takes its default.
    Empty,
}

pub fn detect_shape(map: &Map<String, Value>) -> PayloadShape {
    if NESTED_KEYS.iter().any(|k| map.contains_key(*k)) {
        PayloadShape::Nested
    } else if LEGACY_KEYS.iter().any(|k| map.contains_key(*k)) {
        PayloadShape::LegacyFlat
    } else {
        PayloadShape::Empty
    }
}

/// Strip a `{ "config": { ... } }` envelope if that is all the payload holds.
pub fn unwrap_envelope(raw: Value) -> Value {
    match raw {
        Value::Object(mut map) if map.len() == 1 && matches!(map.get("config"), Some(Value::Object(_))) => {
            map.remove("config").unwrap_or(Value::Null)
        }
        other => other,
    }
}

// ============================================================================
// Legacy Flat Shape
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LegacyConfig {
    preprompt: Option<String>,
    enable_ai: Option<bool>,
    show_original: Option<bool>,
    ntfy: Option<LegacyChannel>,
    telegram: Option<LegacyChannel>,
    slack: Option<LegacyChannel>,
    discord: Option<LegacyChannel>,
    gotify: Option<LegacyChannel>,
}

/// Union of every field the per-channel blocks ever carried.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LegacyChannel {
    enabled: bool,
    bot_token: String,
    chat_id: String,
    token: String,
    app_token: String,
    webhook_url: String,
    webhook_id: String,
    server_url: String,
    topic: String,
}

pub fn from_legacy(map: Map<String, Value>) -> Result<ConfigDocument, FormatError> {
    let legacy: LegacyConfig = serde_json::from_value(Value::Object(map))?;

    let enable_ai = legacy.enable_ai.unwrap_or(true);
    // With AI off the original message is the only thing left to send.
    let show_original = !enable_ai || legacy.show_original.unwrap_or(true);

    let mut fallback = Rule::fallback();
    if let Some(preprompt) = legacy.preprompt {
        fallback.preprompt = preprompt;
    }
    fallback.notify.ai_summary.enabled = enable_ai;
    fallback.notify.original_message.enabled = show_original;
    fallback.enabled = enable_ai || show_original;

    let channels = [
        ("ntfy", legacy.ntfy, ntfy_url as fn(&LegacyChannel) -> Option<String>),
        ("Telegram", legacy.telegram, telegram_url),
        ("Slack", legacy.slack, slack_url),
        ("Discord", legacy.discord, discord_url),
        ("Gotify", legacy.gotify, gotify_url),
    ];

    let mut destinations = Vec::new();
    for (name, channel, build_url) in channels {
        let Some(channel) = channel else { continue };
        match build_url(&channel) {
            Some(url) => {
                debug!("Migrated legacy channel '{}' to destination", name);
                destinations.push(Destination {
                    name: name.to_string(),
                    enabled: channel.enabled,
                    url,
                });
            }
            None => warn!(
                "Legacy channel '{}' is missing required fields, not migrated",
                name
            ),
        }
    }

    Ok(ConfigDocument {
        ai: AiSettings::default(),
        destinations,
        rules: vec![fallback.clamp_preprompt()],
    })
}

fn first_non_empty<'a>(candidates: &[&'a str]) -> Option<&'a str> {
    candidates.iter().copied().find(|s| !s.trim().is_empty())
}

/// `host[:port][/path]` of a server URL, without a trailing slash.
fn server_location(raw: &str) -> Option<(bool, String)> {
    let parsed = Url::parse(raw.trim()).ok()?;
    let host = parsed.host_str()?;
    let mut location = match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    let path = parsed.path().trim_end_matches('/');
    location.push_str(path);
    Some((parsed.scheme() == "https", location))
}

fn ntfy_url(channel: &LegacyChannel) -> Option<String> {
    let topic = first_non_empty(&[channel.topic.as_str()])?;
    let server = channel.server_url.trim().trim_end_matches('/');
    if server.is_empty() || server == NTFY_PUBLIC_SERVER {
        return Some(format!("ntfy://{topic}"));
    }
    let (secure, location) = server_location(server)?;
    let scheme = if secure { "ntfys" } else { "ntfy" };
    Some(format!("{scheme}://{location}/{topic}"))
}

fn telegram_url(channel: &LegacyChannel) -> Option<String> {
    let token = first_non_empty(&[channel.bot_token.as_str(), channel.token.as_str()])?;
    let chat_id = first_non_empty(&[channel.chat_id.as_str()])?;
    Some(format!("tgram://{token}/{chat_id}"))
}

fn slack_url(channel: &LegacyChannel) -> Option<String> {
    if let Some(url) = first_non_empty(&[channel.webhook_url.as_str()]) {
        return Some(url.to_string());
    }
    let token = first_non_empty(&[channel.token.as_str()])?;
    let webhook_id = first_non_empty(&[channel.webhook_id.as_str()])?;
    Some(format!("slack://{token}/{webhook_id}"))
}

fn discord_url(channel: &LegacyChannel) -> Option<String> {
    if let Some(url) = first_non_empty(&[channel.webhook_url.as_str()]) {
        return Some(url.to_string());
    }
    let webhook_id = first_non_empty(&[channel.webhook_id.as_str()])?;
    let token = first_non_empty(&[channel.token.as_str()])?;
    Some(format!("discord://{webhook_id}/{token}"))
}

fn gotify_url(channel: &LegacyChannel) -> Option<String> {
    let token = first_non_empty(&[channel.app_token.as_str(), channel.token.as_str()])?;
    let (secure, location) = server_location(first_non_empty(&[channel.server_url.as_str()])?)?;
    let scheme = if secure { "gotifys" } else { "gotify" };
    Some(format!("{scheme}://{location}/{token}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn detects_shapes() {
        assert_eq!(detect_shape(&object(json!({"rules": []}))), PayloadShape::Nested);
        assert_eq!(
            detect_shape(&object(json!({"enable_ai": true}))),
            PayloadShape::LegacyFlat
        );
        assert_eq!(
            detect_shape(&object(json!({"gui_theme": "dark"}))),
            PayloadShape::Empty
        );
    }

    #[test]
    fn envelope_unwrapped_only_when_alone() {
        let inner = json!({"rules": []});
        assert_eq!(unwrap_envelope(json!({"config": inner.clone()})), inner);

        let mixed = json!({"config": {}, "rules": []});
        assert_eq!(unwrap_envelope(mixed.clone()), mixed);
    }

    #[test]
    fn ai_disabled_forces_original_on() {
        let doc = from_legacy(object(json!({
            "enable_ai": false,
            "show_original": false,
            "preprompt": "tl;dr"
        })))
        .unwrap();

        let rule = &doc.rules[0];
        assert!(rule.is_fallback());
        assert_eq!(rule.preprompt, "tl;dr");
        assert!(!rule.notify.ai_summary.enabled);
        assert!(rule.notify.original_message.enabled);
        assert!(rule.enabled);
    }

    #[test]
    fn channels_become_destinations() {
        let doc = from_legacy(object(json!({
            "telegram": {"enabled": true, "bot_token": "123:abc", "chat_id": "42"},
            "ntfy": {"enabled": true, "server_url": "https://ntfy.sh", "topic": "alerts"},
            "gotify": {"enabled": false, "server_url": "https://push.example.com:8443/", "app_token": "tok"},
            "discord": {"enabled": false, "webhook_url": "", "token": ""}
        })))
        .unwrap();

        let urls: Vec<(&str, &str, bool)> = doc
            .destinations
            .iter()
            .map(|d| (d.name.as_str(), d.url.as_str(), d.enabled))
            .collect();
        assert_eq!(
            urls,
            vec![
                ("ntfy", "ntfy://alerts", true),
                ("Telegram", "tgram://123:abc/42", true),
                ("Gotify", "gotifys://push.example.com:8443/tok", false),
            ]
        );
    }

    #[test]
    fn self_hosted_ntfy_keeps_server() {
        let channel = LegacyChannel {
            topic: "ops".into(),
            server_url: "http://10.0.0.5:8080".into(),
            ..Default::default()
        };
        assert_eq!(ntfy_url(&channel).as_deref(), Some("ntfy://10.0.0.5:8080/ops"));
    }
}
