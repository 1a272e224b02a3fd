use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::job_id::JobId;

/// Risk assigned to a step, used to route approval (spec §3, §4.3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn name(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One unit of work within a plan, executed as one sandboxed tool call
/// (spec §3 "Execution Plan", GLOSSARY "Step").
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub gear: String,
    pub action: String,
    pub parameters: HashMap<String, serde_json::Value>,
    pub risk_level: RiskLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Hint that no memory writeback is needed for this step's plan.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal_skip: Option<bool>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// A stripped view of a [`Step`] - exactly the fields the validator may
/// see (spec §4.3 step 3, the information barrier). Constructed only by
/// `axis-pipeline`'s stripping logic, never by the planner directly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrippedStep {
    pub id: String,
    pub gear: String,
    pub action: String,
    pub parameters: HashMap<String, serde_json::Value>,
    pub risk_level: RiskLevel,
}

impl From<&Step> for StrippedStep {
    fn from(step: &Step) -> Self {
        StrippedStep {
            id: step.id.clone(),
            gear: step.gear.clone(),
            action: step.action.clone(),
            parameters: step.parameters.clone(),
            risk_level: step.risk_level,
        }
    }
}

/// What the planner emits on the full path (spec §3 "Execution Plan").
///
/// Invariant: frozen after validation - a retry produces a new `Plan` with
/// a new `id`, never a mutation of this one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub id: String,
    pub job_id: JobId,
    pub steps: Vec<Step>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// A stripped view of an [`ExecutionPlan`], sent to the validator.
/// Keys are exactly `{id, jobId, steps}`; each step's keys are exactly
/// `{id, gear, action, parameters, riskLevel}` - the invariant tested in
/// spec §8 "Information barrier".
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrippedPlan {
    pub id: String,
    pub job_id: JobId,
    pub steps: Vec<StrippedStep>,
}

impl ExecutionPlan {
    pub fn strip(&self) -> StrippedPlan {
        StrippedPlan {
            id: self.id.clone(),
            job_id: self.job_id,
            steps: self.steps.iter().map(StrippedStep::from).collect(),
        }
    }
}

/// The planner's reply to `plan.request` (spec §4.3 step 1).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "path", rename_all = "snake_case")]
pub enum PlannerReply {
    Fast { text: String },
    Full { plan: ExecutionPlan },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_plan() -> ExecutionPlan {
        ExecutionPlan {
            id: "plan-1".into(),
            job_id: JobId::new(),
            reasoning: Some("because the user asked nicely".into()),
            metadata: HashMap::from([("source".into(), serde_json::json!("planner-v2"))]),
            steps: vec![Step {
                id: "s1".into(),
                gear: "file-manager".into(),
                action: "read_file".into(),
                parameters: HashMap::from([("path".into(), serde_json::json!("todo.txt"))]),
                risk_level: RiskLevel::Low,
                description: Some("read the todo file".into()),
                journal_skip: Some(true),
                metadata: HashMap::from([("cost".into(), serde_json::json!(0.01))]),
            }],
        }
    }

    #[test]
    fn strip_drops_reasoning_metadata_and_step_extras() {
        let stripped = sample_plan().strip();
        let json = serde_json::to_value(&stripped).unwrap();
        let keys: std::collections::BTreeSet<_> =
            json.as_object().unwrap().keys().cloned().collect();
        assert_eq!(
            keys,
            ["id", "job_id", "steps"].into_iter().map(String::from).collect()
        );

        let step_json = &json["steps"][0];
        let step_keys: std::collections::BTreeSet<_> =
            step_json.as_object().unwrap().keys().cloned().collect();
        assert_eq!(
            step_keys,
            ["id", "gear", "action", "parameters", "risk_level"]
                .into_iter()
                .map(String::from)
                .collect()
        );
    }
}
