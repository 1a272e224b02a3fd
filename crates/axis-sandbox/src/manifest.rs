use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Declared permissions for one Gear (spec §4.6 "Contract").
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Permissions {
    /// Glob patterns for readable paths, anchored at the workspace base.
    #[serde(default)]
    pub read_paths: Vec<String>,
    /// Glob patterns for writable paths, anchored at the workspace base.
    #[serde(default)]
    pub write_paths: Vec<String>,
    /// Domains this gear may reach outbound. Empty means no networking.
    #[serde(default)]
    pub network_domains: Vec<String>,
    /// Environment variable names to pass through unchanged.
    #[serde(default)]
    pub env_vars: Vec<String>,
    /// Names of declared secrets this gear needs injected.
    #[serde(default)]
    pub secrets: Vec<String>,
    #[serde(default)]
    pub shell_allowed: bool,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub max_memory_bytes: u64,
    pub max_cpu_seconds: u64,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_memory_bytes: 256 * 1024 * 1024,
            max_cpu_seconds: 30,
        }
    }
}

/// Declarative shape of one Gear (spec §4.6, GLOSSARY "Tool (Gear)").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GearManifest {
    pub id: String,
    pub actions: Vec<String>,
    #[serde(default)]
    pub permissions: Permissions,
    #[serde(default)]
    pub resource_limits: ResourceLimits,
}

/// Where to find the executable for a Gear. `Registry` is intentionally
/// left unresolved - see DESIGN.md's Open Question resolution #4.
#[derive(Clone, Debug)]
pub enum GearEntryPoint {
    FilePath(PathBuf),
    Registry(String),
}
