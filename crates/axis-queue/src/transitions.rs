//! State-machine legality for Job status transitions (spec §4.1).
//!
//! Checks are grouped and ordered the way the journal invariant groups are
//! ordered in the teacher crate's `invariants` module: cheap structural
//! checks first (is this edge in the table at all?), then the checks that
//! depend on richer context (is the current row's actual status the `from`
//! the caller believes it to hold?). Each check function takes the minimum
//! state it needs and returns on the first violation, rather than
//! accumulating - `axis-queue::store` calls them in sequence inside one
//! compare-and-swap critical section.

use axis_types::JobStatus;

/// The fixed edge set from spec §4.1 "State machine". `Cancelled` is
/// reachable from every non-terminal status, so it is checked separately
/// rather than duplicated into each arm's allowed-target list.
fn allowed_targets(from: JobStatus) -> &'static [JobStatus] {
    use JobStatus::*;
    match from {
        // `Failed` here covers fast-path verification exhausting its retry
        // budget (spec §4.3 step 2) - a failure discovered before a plan
        // ever reaches the validator. `Completed` covers a verified
        // fast-path text reply, which never produces a plan to validate
        // or execute (see DESIGN.md Open Question resolution 5).
        Pending => &[Planning],
        Planning => &[Validating, Failed, Completed],
        // `Planning` here covers a `needs_revision` verdict looping back to
        // step 1 with `failureState.revisionCount` incremented (spec §4.3
        // step 4) - the only backward edge in the table.
        Validating => &[Executing, AwaitingApproval, Failed, Planning],
        AwaitingApproval => &[Executing, Failed],
        Executing => &[Completed, Failed],
        Completed | Failed | Cancelled => &[],
    }
}

/// `true` iff `from -> to` is a legal edge in the state machine, including
/// the blanket "any non-terminal -> cancelled" rule.
///
/// Grounded on the same "ordered, short-circuiting check" shape as
/// `invariants::structural::check`, reduced to the single group this
/// domain needs: there are no side-effect/control-flow/join-set groups
/// here, because a Job has no concurrent sub-events to reconcile - its
/// entire legality question is "is this edge in the table."
pub fn is_valid_transition(from: JobStatus, to: JobStatus) -> bool {
    if from == to {
        return false;
    }
    if to == JobStatus::Cancelled && !from.is_terminal() {
        return true;
    }
    allowed_targets(from).contains(&to)
}
