use regex::RegexBuilder;
use std::collections::HashSet;

use super::{ConfigDocument, Rule};

/// A finding from [`lint_document`]. Findings are advisory; nothing in the
/// editing engine refuses a document because of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintWarning {
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for LintWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Check a document for problems the dispatch engine would trip over.
pub fn lint_document(doc: &ConfigDocument) -> Vec<LintWarning> {
    let mut warnings = Vec::new();

    let mut seen = HashSet::new();
    for (i, dest) in doc.destinations.iter().enumerate() {
        if !seen.insert(dest.name.as_str()) {
            warnings.push(LintWarning {
                path: format!("destinations[{i}].name"),
                message: format!("duplicate destination name '{}'", dest.name),
            });
        }
    }

    // Toggles and policies find rules by name and stop at the first match.
    let mut rule_names = HashSet::new();
    for (i, rule) in doc.rules.iter().enumerate() {
        if rule.name.trim().is_empty() {
            warnings.push(LintWarning {
                path: format!("rule[{i}].name"),
                message: "rule name is empty".to_string(),
            });
        } else if !rule_names.insert(rule.name.as_str()) {
            warnings.push(LintWarning {
                path: format!("rule[{i}].name"),
                message: format!("duplicate rule name '{}'", rule.name),
            });
        }
        lint_rule(i, rule, &seen, &mut warnings);
    }

    warnings
}

fn lint_rule(index: usize, rule: &Rule, known: &HashSet<&str>, warnings: &mut Vec<LintWarning>) {
    let prefix = format!("rule[{index}]");

    let patterns = [
        ("match.og_text_regex", &rule.match_on.og_text_regex),
        ("match.ai_text_regex", &rule.match_on.ai_text_regex),
        (
            "notify.original_message.match_regex",
            &rule.notify.original_message.match_regex,
        ),
        ("notify.ai_summary.match_regex", &rule.notify.ai_summary.match_regex),
    ];
    for (field, pattern) in patterns {
        if pattern.is_empty() {
            continue;
        }
        // Same flags the dispatch engine matches with.
        if let Err(e) = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .dot_matches_new_line(true)
            .build()
        {
            warnings.push(LintWarning {
                path: format!("{prefix}.{field}"),
                message: format!("invalid regex: {e}"),
            });
        }
    }

    for name in &rule.notify.destinations {
        if !known.contains(name.as_str()) {
            warnings.push(LintWarning {
                path: format!("{prefix}.notify.destinations"),
                message: format!("unknown destination '{name}'"),
            });
        }
    }

    if rule.notify.ai_summary.enabled && !rule.uses_ai() {
        warnings.push(LintWarning {
            path: format!("{prefix}.notify.ai_summary.enabled"),
            message: "AI summary enabled but preprompt is empty, no summary is produced"
                .to_string(),
        });
    }
}
