//! Default validator used when no external LLM validator is configured
//! (spec §4.3 "Risk classification": "The result becomes the validator's
//! reply when no LLM is configured").

use async_trait::async_trait;
use axis_policy::{classify_steps, overall_risk};
use axis_types::{RiskLevel, StepValidation, StrippedPlan, ValidationResult, Verdict};

use crate::collaborators::Validator;
use crate::error::PipelineError;

/// Steps at or above this risk are routed to `needs_user_approval` rather
/// than auto-approved, matching the validator's role as a human-approval
/// gate rather than a pure rubber stamp.
const APPROVAL_THRESHOLD: RiskLevel = RiskLevel::High;

pub struct RuleBasedValidator;

#[async_trait]
impl Validator for RuleBasedValidator {
    async fn validate(&self, stripped: StrippedPlan) -> Result<ValidationResult, PipelineError> {
        let steps: Vec<axis_types::Step> = stripped
            .steps
            .iter()
            .map(|s| axis_types::Step {
                id: s.id.clone(),
                gear: s.gear.clone(),
                action: s.action.clone(),
                parameters: s.parameters.clone(),
                risk_level: s.risk_level,
                description: None,
                journal_skip: None,
                metadata: Default::default(),
            })
            .collect();

        let classified = classify_steps(&steps);
        let risk = overall_risk(&classified);

        let step_validations: Vec<StepValidation> = stripped
            .steps
            .iter()
            .zip(classified.iter())
            .map(|(step, (category, risk_level))| StepValidation {
                step_id: step.id.clone(),
                verdict: if *risk_level >= APPROVAL_THRESHOLD { Verdict::NeedsUserApproval } else { Verdict::Approved },
                category: category.clone(),
                risk_level: *risk_level,
                reasoning: None,
            })
            .collect();

        let verdict = if step_validations.iter().any(|s| s.verdict == Verdict::NeedsUserApproval) {
            Verdict::NeedsUserApproval
        } else {
            Verdict::Approved
        };

        Ok(ValidationResult { verdict, overall_risk: risk, steps: step_validations })
    }
}
