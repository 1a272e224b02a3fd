//! Job state machine, persistent queue contract, and crash recovery
//! (spec §4.1).
//!
//! Built the way the teacher crate builds journal invariants: a pure
//! legality check ([`transitions::is_valid_transition`]) kept separate
//! from the store that enforces it, so the rule table can be tested in
//! isolation from concurrency concerns.

pub mod store;
pub mod transitions;

pub use store::{InMemoryJobStore, JobStore, RecoveryResult, StatusListener, TransitionArtifacts};
pub use transitions::is_valid_transition;
