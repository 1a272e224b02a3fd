//! Sandbox supervisor (spec §4.6): spawns each tool execution in an
//! isolated child process with declared filesystem, network, and
//! environment limits, and validates its signed responses.
//!
//! Structured the way the teacher crate splits a long-lived runtime
//! handle (`WasmEngine`) from one-shot resource loading
//! (`ComponentLoader`): [`host::SandboxHost`] owns the heartbeat and the
//! liveness registry; [`spawner::SandboxSpawner`] resolves one
//! [`manifest::GearEntryPoint`] into a running child per call.

pub mod env;
pub mod error;
pub mod host;
pub mod ipc;
pub mod manifest;
pub mod profile;
pub mod secrets;
pub mod spawner;
pub mod validate;

pub use error::SandboxError;
pub use host::{SandboxHost, SandboxHostConfig};
pub use manifest::{GearEntryPoint, GearManifest, Permissions, ResourceLimits};
pub use spawner::{SandboxSpawner, SpawnedGear};
