//! Derived `enabled` flags.
//!
//! A rule that sends neither the original message nor the AI summary does
//! nothing, so under [`EnabledPolicy::DerivedOr`] its `enabled` flag is the
//! OR of the two delivery toggles. The fallback rule uses that policy by
//! default; other rules keep a user-set flag ([`EnabledPolicy::Direct`]).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::document::{ConfigDocument, DeliveryToggle, Rule, DEFAULT_RULE_NAME};

/// One of a rule's two delivery toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubToggle {
    Original,
    AiSummary,
}

impl std::str::FromStr for SubToggle {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "original" | "original_message" | "original-message" => Ok(Self::Original),
            "ai" | "ai_summary" | "ai-summary" => Ok(Self::AiSummary),
            _ => Err(format!("invalid toggle: {s}")),
        }
    }
}

/// How a rule's `enabled` flag relates to its delivery toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EnabledPolicy {
    /// `enabled` is set by the user and never recomputed.
    #[default]
    Direct,
    /// `enabled` is `original_message.enabled || ai_summary.enabled`.
    DerivedOr,
}

/// Delivery state of the fallback rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackState {
    Off,
    OriginalOnly,
    AiOnly,
    Both,
}

impl FallbackState {
    pub fn of(rule: &Rule) -> Self {
        match (
            rule.notify.original_message.enabled,
            rule.notify.ai_summary.enabled,
        ) {
            (false, false) => Self::Off,
            (true, false) => Self::OriginalOnly,
            (false, true) => Self::AiOnly,
            (true, true) => Self::Both,
        }
    }

    pub fn is_enabled(self) -> bool {
        self != Self::Off
    }
}

/// Per-rule enabled policies, keyed by rule name. Unlisted rules are
/// `Direct`, except the fallback rule, which is `DerivedOr`.
#[derive(Debug, Clone, Default)]
pub struct PolicyTable {
    overrides: HashMap<String, EnabledPolicy>,
}

impl PolicyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, rule_name: impl Into<String>, policy: EnabledPolicy) {
        self.overrides.insert(rule_name.into(), policy);
    }

    pub fn policy_for(&self, rule_name: &str) -> EnabledPolicy {
        match self.overrides.get(rule_name) {
            Some(policy) => *policy,
            None if rule_name == DEFAULT_RULE_NAME => EnabledPolicy::DerivedOr,
            None => EnabledPolicy::Direct,
        }
    }
}

fn toggle_mut(rule: &mut Rule, which: SubToggle) -> &mut DeliveryToggle {
    match which {
        SubToggle::Original => &mut rule.notify.original_message,
        SubToggle::AiSummary => &mut rule.notify.ai_summary,
    }
}

/// Recompute `enabled` according to `policy`.
pub fn reconcile_rule(mut rule: Rule, policy: EnabledPolicy) -> Rule {
    if policy == EnabledPolicy::DerivedOr {
        rule.enabled = FallbackState::of(&rule).is_enabled();
    }
    rule
}

/// Set one delivery toggle of the named rule and reconcile its `enabled`
/// flag. The other toggle is left as it is. Unknown rule names leave the
/// document unchanged.
pub fn set_sub_toggle(
    doc: &ConfigDocument,
    rule_name: &str,
    which: SubToggle,
    value: bool,
    policy: EnabledPolicy,
) -> ConfigDocument {
    doc.apply(|mut d| {
        if let Some(rule) = d.rules.iter_mut().find(|r| r.name == rule_name) {
            toggle_mut(rule, which).enabled = value;
            *rule = reconcile_rule(std::mem::take(rule), policy);
            debug!(
                "Rule '{}': {:?} -> {}, enabled = {}",
                rule_name, which, value, rule.enabled
            );
        }
        d
    })
}

/// Toggle handler for the fallback rule: sets `which` to `value` and
/// derives `enabled` as `value || <other toggle>`.
pub fn on_sub_toggle_change(which: SubToggle, value: bool, doc: &ConfigDocument) -> ConfigDocument {
    let doc = doc.clone().normalized();
    set_sub_toggle(&doc, DEFAULT_RULE_NAME, which, value, EnabledPolicy::DerivedOr)
}

/// Set a rule's `enabled` flag directly. Under `DerivedOr` the flag is
/// recomputed from the toggles instead, so the request is ignored.
pub fn set_rule_enabled(
    doc: &ConfigDocument,
    rule_name: &str,
    value: bool,
    policy: EnabledPolicy,
) -> ConfigDocument {
    doc.apply(|mut d| {
        if let Some(rule) = d.rules.iter_mut().find(|r| r.name == rule_name) {
            rule.enabled = value;
            *rule = reconcile_rule(std::mem::take(rule), policy);
        }
        d
    })
}
