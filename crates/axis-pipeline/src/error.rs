use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("queue error: {0}")]
    Queue(#[from] axis_types::QueueError),
    #[error("planner dispatch failed: {0}")]
    Planner(String),
    #[error("validator dispatch failed: {0}")]
    Validator(String),
    #[error("tool runtime dispatch failed: {0}")]
    ToolRuntime(String),
    #[error("memory writer dispatch failed: {0}")]
    MemoryWriter(String),
    #[error("fast-path verification failed after exhausting the retry budget")]
    FastPathVerificationExhausted,
    #[error("plan revision budget exhausted")]
    RevisionBudgetExhausted,
    #[error("plan rejected by validator")]
    PlanRejected,
    #[error("job cancelled")]
    Cancelled,
}
