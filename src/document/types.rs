use serde::{Deserialize, Deserializer, Serialize};

use super::defaults::*;

/// Deserialize an explicit `null` as the field's default value.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ============================================================================
// AI Settings
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AiProvider {
    MetaAi,
    #[default]
    Ollama,
}

impl std::str::FromStr for AiProvider {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "meta_ai" | "meta-ai" => Ok(Self::MetaAi),
            "ollama" => Ok(Self::Ollama),
            _ => Err(format!("invalid AI provider: {s}")),
        }
    }
}

/// Ollama connection settings.
///
/// Only consulted when the provider is [`AiProvider::Ollama`], but always
/// persisted so switching providers back and forth keeps them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaSettings {
    pub url: String,
    pub model: String,
}

impl Default for OllamaSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_OLLAMA_URL.to_string(),
            model: DEFAULT_OLLAMA_MODEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AiSettings {
    pub provider: AiProvider,
    #[serde(deserialize_with = "null_as_default")]
    pub ollama: OllamaSettings,
}

// ============================================================================
// Destinations
// ============================================================================

/// A named notification endpoint (apprise-style URL).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Destination {
    pub name: String,
    pub enabled: bool,
    pub url: String,
}

// ============================================================================
// Rules
// ============================================================================

/// Sender filter for a rule. Keeps whichever form the user wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceMatch {
    One(String),
    Many(Vec<String>),
}

impl Default for SourceMatch {
    fn default() -> Self {
        Self::One(String::new())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RuleMatch {
    #[serde(deserialize_with = "null_as_default")]
    pub source: SourceMatch,
    pub og_text_regex: String,
    pub ai_text_regex: String,
}

/// Whether one message variant is sent, and an optional regex gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DeliveryToggle {
    pub enabled: bool,
    pub match_regex: String,
}

impl DeliveryToggle {
    pub fn on() -> Self {
        Self {
            enabled: true,
            match_regex: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RuleNotify {
    #[serde(deserialize_with = "null_as_default")]
    pub destinations: Vec<String>,
    pub original_message: DeliveryToggle,
    pub ai_summary: DeliveryToggle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Rule {
    pub name: String,
    pub enabled: bool,
    pub preprompt: String,
    #[serde(rename = "match")]
    pub match_on: RuleMatch,
    pub notify: RuleNotify,
}

impl Rule {
    /// The synthesized fallback rule: matches everything, sends both
    /// variants to every enabled destination.
    pub fn fallback() -> Self {
        Self {
            name: DEFAULT_RULE_NAME.to_string(),
            enabled: true,
            preprompt: DEFAULT_PREPROMPT.to_string(),
            match_on: RuleMatch::default(),
            notify: RuleNotify {
                destinations: Vec::new(),
                original_message: DeliveryToggle::on(),
                ai_summary: DeliveryToggle::on(),
            },
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.name == DEFAULT_RULE_NAME
    }

    /// Whether AI summarization runs for messages matched by this rule.
    pub fn uses_ai(&self) -> bool {
        !self.preprompt.is_empty()
    }

    /// Truncate the preprompt to [`MAX_PREPROMPT_CHARS`] characters.
    pub fn clamp_preprompt(mut self) -> Self {
        self.preprompt = clamp_preprompt(&self.preprompt);
        self
    }
}

/// Truncate on a character boundary, never splitting a code point.
pub fn clamp_preprompt(preprompt: &str) -> String {
    match preprompt.char_indices().nth(MAX_PREPROMPT_CHARS) {
        Some((cut, _)) => preprompt[..cut].to_string(),
        None => preprompt.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(AiProvider::MetaAi).unwrap(),
            serde_json::json!("meta_ai")
        );
        assert_eq!("meta-ai".parse::<AiProvider>().unwrap(), AiProvider::MetaAi);
        assert!("openai".parse::<AiProvider>().is_err());
    }

    #[test]
    fn source_keeps_written_form() {
        let one: SourceMatch = serde_json::from_value(serde_json::json!("10.0.0.1")).unwrap();
        assert_eq!(one, SourceMatch::One("10.0.0.1".into()));

        let many: SourceMatch =
            serde_json::from_value(serde_json::json!(["a", "", "b"])).unwrap();
        assert_eq!(
            many,
            SourceMatch::Many(vec!["a".into(), String::new(), "b".into()])
        );
    }

    #[test]
    fn rule_match_field_uses_reserved_name() {
        let value = serde_json::to_value(Rule::fallback()).unwrap();
        assert!(value.get("match").is_some());
        assert!(value.get("match_on").is_none());
    }

    #[test]
    fn partial_rule_fills_defaults() {
        let rule: Rule = serde_json::from_value(serde_json::json!({
            "name": "disk",
            "notify": { "destinations": null }
        }))
        .unwrap();
        assert_eq!(rule.name, "disk");
        assert!(!rule.enabled);
        assert!(rule.notify.destinations.is_empty());
    }

    #[test]
    fn clamp_respects_char_boundaries() {
        let long = "é".repeat(MAX_PREPROMPT_CHARS + 10);
        let clamped = clamp_preprompt(&long);
        assert_eq!(clamped.chars().count(), MAX_PREPROMPT_CHARS);
        assert_eq!(clamp_preprompt("short"), "short");
    }
}
