use serde::{Deserialize, Serialize};

use crate::plan::RiskLevel;

/// The validator's overall disposition on a plan (spec §3 "Validation
/// Result").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Approved,
    NeedsRevision,
    NeedsUserApproval,
    Rejected,
}

/// A category assigned to a step by the rule-based risk classifier
/// (spec §4.3 "Risk classification"). Open-ended in the source system;
/// modeled here as a known set plus an escape hatch so a future category
/// doesn't require a schema migration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionCategory {
    ReadFiles,
    WriteFiles,
    DeleteFiles,
    NetworkRequest,
    Shell,
    Payment,
    CredentialAccess,
    Other(String),
}

/// Per-step validation outcome (spec §3).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepValidation {
    pub step_id: String,
    pub verdict: Verdict,
    pub category: ActionCategory,
    pub risk_level: RiskLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

/// What the validator emits for a full-path plan (spec §3 "Validation
/// Result", §4.3 step 3-4).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub verdict: Verdict,
    pub overall_risk: RiskLevel,
    pub steps: Vec<StepValidation>,
}

impl ValidationResult {
    /// The highest risk level observed across all per-step results,
    /// independent of whatever `overall_risk` the validator itself
    /// reported - used by the rule-based classifier (`axis-policy`) to
    /// compute `overall_risk` in the first place.
    pub fn max_step_risk(&self) -> Option<RiskLevel> {
        self.steps.iter().map(|s| s.risk_level).max()
    }
}
