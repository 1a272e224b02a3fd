//! Rule-based risk classification, used as the validator's reply when no
//! external LLM validator is configured (spec §4.3 "Risk classification").

use axis_types::{ActionCategory, RiskLevel, Step};

/// One row of the gear/action → category table. `action_prefix` matches
/// case-insensitively against the start of `Step::action`, so a single row
/// covers an entire family (e.g. `"delete"` covers `delete_file`,
/// `deleteMany`).
struct Rule {
    gear: Option<&'static str>,
    action_prefix: &'static str,
    category: ActionCategory,
    base_risk: RiskLevel,
}

const RULES: &[Rule] = &[
    Rule { gear: None, action_prefix: "read", category: ActionCategory::ReadFiles, base_risk: RiskLevel::Low },
    Rule { gear: None, action_prefix: "list", category: ActionCategory::ReadFiles, base_risk: RiskLevel::Low },
    Rule { gear: None, action_prefix: "write", category: ActionCategory::WriteFiles, base_risk: RiskLevel::Medium },
    Rule { gear: None, action_prefix: "append", category: ActionCategory::WriteFiles, base_risk: RiskLevel::Medium },
    Rule { gear: None, action_prefix: "delete", category: ActionCategory::DeleteFiles, base_risk: RiskLevel::High },
    Rule { gear: None, action_prefix: "remove", category: ActionCategory::DeleteFiles, base_risk: RiskLevel::High },
    Rule { gear: None, action_prefix: "fetch", category: ActionCategory::NetworkRequest, base_risk: RiskLevel::Medium },
    Rule { gear: None, action_prefix: "http", category: ActionCategory::NetworkRequest, base_risk: RiskLevel::Medium },
    Rule { gear: None, action_prefix: "request", category: ActionCategory::NetworkRequest, base_risk: RiskLevel::Medium },
    Rule { gear: Some("shell"), action_prefix: "", category: ActionCategory::Shell, base_risk: RiskLevel::High },
    Rule { gear: None, action_prefix: "exec", category: ActionCategory::Shell, base_risk: RiskLevel::High },
    Rule { gear: None, action_prefix: "pay", category: ActionCategory::Payment, base_risk: RiskLevel::Critical },
    Rule { gear: None, action_prefix: "charge", category: ActionCategory::Payment, base_risk: RiskLevel::Critical },
    Rule { gear: None, action_prefix: "credential", category: ActionCategory::CredentialAccess, base_risk: RiskLevel::High },
    Rule { gear: None, action_prefix: "secret", category: ActionCategory::CredentialAccess, base_risk: RiskLevel::High },
    Rule { gear: None, action_prefix: "auth", category: ActionCategory::CredentialAccess, base_risk: RiskLevel::High },
];

/// Classifies a single step against the rule table. Falls through to
/// `ActionCategory::Other` at `RiskLevel::Medium` when nothing matches -
/// an unrecognized action is treated as moderately risky rather than safe.
fn classify_step(step: &Step) -> (ActionCategory, RiskLevel) {
    let action_lower = step.action.to_lowercase();
    let gear_lower = step.gear.to_lowercase();

    for rule in RULES {
        if let Some(gear) = rule.gear {
            if gear_lower != gear {
                continue;
            }
        }
        if rule.action_prefix.is_empty() || action_lower.starts_with(rule.action_prefix) {
            return (rule.category.clone(), rule.base_risk);
        }
    }

    (ActionCategory::Other(step.action.clone()), RiskLevel::Medium)
}

/// Classifies every step in a plan, applying the composite rule that a
/// `credential_access` step followed later in the plan by a
/// `network_request` step raises that later step (and the plan's overall
/// risk) to `Critical` (spec §4.3 "Composite rules").
pub fn classify_steps(steps: &[Step]) -> Vec<(ActionCategory, RiskLevel)> {
    let mut classified: Vec<(ActionCategory, RiskLevel)> = steps.iter().map(classify_step).collect();

    let mut saw_credential_access = false;
    for (category, risk) in classified.iter_mut() {
        if matches!(category, ActionCategory::NetworkRequest) && saw_credential_access {
            *risk = RiskLevel::Critical;
        }
        if matches!(category, ActionCategory::CredentialAccess) {
            saw_credential_access = true;
        }
    }

    classified
}

/// The plan's overall risk: the highest risk among its steps, or `Low` for
/// an empty plan.
pub fn overall_risk(classified: &[(ActionCategory, RiskLevel)]) -> RiskLevel {
    classified.iter().map(|(_, risk)| *risk).max().unwrap_or(RiskLevel::Low)
}
