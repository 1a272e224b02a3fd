pub mod builder;
pub mod config;
pub mod lifecycle;
pub mod metrics;
pub mod metrics_collaborators;
pub mod router_collaborators;
pub mod sandbox_tool_runtime;
pub mod worker_pool;

pub use builder::{Axis, AxisBuilder};
pub use config::{AxisConfig, ConfigError};
pub use lifecycle::{LifecycleError, LifecycleManager, TeardownHook};
pub use metrics::{DurationHistogram, MetricsCollector, MetricsSnapshot};
pub use metrics_collaborators::{MetricsRecordingToolRuntime, MetricsRecordingValidator};
pub use router_collaborators::{RouterDispatchedMemoryWriter, RouterDispatchedPlanner, RouterDispatchedToolRuntime, RouterDispatchedValidator};
pub use sandbox_tool_runtime::{GearRegistration, SandboxToolRuntime};
pub use worker_pool::{WorkerPool, WorkerPoolConfig};
