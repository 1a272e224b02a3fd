//! Resolves a [`GearEntryPoint`] into a spawned, sandboxed child process.
//!
//! Directly grounded on `component_loader::ComponentLoader` - a small
//! struct wrapping the host, with one `load`/`spawn` method branching on
//! the source variant. `ComponentSource::Registry` was `unimplemented!()`
//! in the teacher; `GearEntryPoint::Registry` stays that way here too,
//! since neither the teacher nor spec.md describes a registry resolution
//! protocol (DESIGN.md Open Question #4).

use std::collections::HashMap;
use std::process::Stdio;

use tokio::process::Command;

use crate::error::SandboxError;
use crate::host::{send_signal, SandboxHost, Signal};
use crate::manifest::{GearEntryPoint, GearManifest};

pub struct SandboxSpawner {
    host: SandboxHost,
}

/// A spawned gear process plus the host-assigned tracking id needed to
/// signal or await it later.
pub struct SpawnedGear {
    pub tracking_id: u64,
    pub child: tokio::process::Child,
}

impl SandboxSpawner {
    pub fn new(host: SandboxHost) -> Self {
        Self { host }
    }

    /// Spawn the gear's entry point with the given environment and
    /// working directory, wiring stdin/stdout as pipes for the signed
    /// IPC framing (spec §4.6 "IPC").
    pub async fn spawn(
        &self,
        manifest: &GearManifest,
        entry_point: GearEntryPoint,
        workspace: &str,
        env: HashMap<String, String>,
    ) -> Result<SpawnedGear, SandboxError> {
        let path = match entry_point {
            GearEntryPoint::FilePath(path) => path,
            GearEntryPoint::Registry(name) => {
                return Err(SandboxError::UnresolvedEntryPoint(name));
            }
        };

        let mut command = Command::new(path);
        command
            .current_dir(workspace)
            .env_clear()
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn()?;
        let pid = child.id().unwrap_or(0);
        let tracking_id = self.host.track(pid);

        tracing::info!(gear = %manifest.id, pid, "gear process spawned");
        Ok(SpawnedGear { tracking_id, child })
    }

    /// Cancellation path (spec §5): send SIGTERM immediately and arm the
    /// host's heartbeat to escalate to SIGKILL once the kill timeout
    /// elapses without the caller having reaped the child itself.
    pub fn terminate(&self, spawned: &SpawnedGear) {
        if let Some(pid) = spawned.child.id() {
            send_signal(pid, Signal::Term);
        }
        self.host.mark_signaled(spawned.tracking_id);
    }

    pub fn forget(&self, spawned: &SpawnedGear) {
        self.host.untrack(spawned.tracking_id);
    }
}
