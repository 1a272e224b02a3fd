//! Fast-path structural verification (spec §4.3 step 2). Codifies the
//! single merged check set the spec names - see DESIGN.md's resolution of
//! Open Question 1, which rejects reading this as a choice between two
//! variant sets.

const DEFERRED_ACTION_PHRASES: &[&str] = &[
    "i already did",
    "i have already completed",
    "i've already completed",
    "i already performed",
    "i've already done",
];

const INABILITY_PHRASES: &[&str] = &[
    "i cannot access",
    "i can't access",
    "i don't have access",
    "i do not have access",
    "i am unable to access",
    "i'm unable to access",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FastPathViolation {
    PlanShapeSubstring,
    ToolReference,
    DeferredActionPhrase,
    InabilityPhrase,
}

/// Checks `text` against the four structural rules. `known_identifiers`
/// is the set of registered tool/action names (check b); `tools_available`
/// gates check d, which only applies when the Job actually had tools to
/// refuse (spec: "if any tools are available").
pub fn verify(text: &str, known_identifiers: &[String], tools_available: bool) -> Result<(), FastPathViolation> {
    let lower = text.to_lowercase();

    if lower.contains("\"steps\"") && (lower.contains("\"gear\"") || lower.contains("\"action\"")) {
        return Err(FastPathViolation::PlanShapeSubstring);
    }

    for identifier in known_identifiers {
        let needle = identifier.to_lowercase();
        if !needle.is_empty() && lower.contains(&needle) {
            return Err(FastPathViolation::ToolReference);
        }
    }

    if DEFERRED_ACTION_PHRASES.iter().any(|phrase| lower.contains(phrase)) {
        return Err(FastPathViolation::DeferredActionPhrase);
    }

    if tools_available && INABILITY_PHRASES.iter().any(|phrase| lower.contains(phrase)) {
        return Err(FastPathViolation::InabilityPhrase);
    }

    Ok(())
}
