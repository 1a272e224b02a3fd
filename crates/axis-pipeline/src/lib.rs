pub mod barrier;
pub mod caching_planner;
pub mod collaborators;
pub mod error;
pub mod fastpath;
pub mod orchestrator;
pub mod rule_validator;

pub use caching_planner::CachingPlanner;
pub use collaborators::{
    ExecuteOutcome, ExecuteRequest, FailureState, MemoryWriter, Planner, PlanRequest, ReflectRequest, ToolRuntime, Validator,
};
pub use error::PipelineError;
pub use orchestrator::{Pipeline, PipelineConfig};
pub use rule_validator::RuleBasedValidator;
