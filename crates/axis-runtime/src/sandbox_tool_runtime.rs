//! `ToolRuntime` backed directly by `axis-sandbox` (spec §6 "Tool runtime
//! (consumed): the sandbox supervisor is an implementation of this
//! handler"). Unlike the `Planner`/`Validator`/`MemoryWriter` adapters,
//! tool execution isn't an `axis_router::Handler` lookup - each call
//! spawns its own child process, so this talks to `SandboxSpawner`
//! directly rather than going through `Router::dispatch`.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use axis_pipeline::{ExecuteOutcome, ExecuteRequest, PipelineError, ToolRuntime};
use axis_sandbox::ipc::{sign_request, verify_response, GearOutcome, GearRequest};
use axis_sandbox::{GearEntryPoint, GearManifest, SandboxSpawner};
use ed25519_dalek::{SigningKey, VerifyingKey};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use uuid::Uuid;

/// Everything needed to spawn and authenticate one kind of Gear.
pub struct GearRegistration {
    pub manifest: GearManifest,
    pub entry_point: GearEntryPoint,
    pub verifying_key: VerifyingKey,
}

pub struct SandboxToolRuntime {
    spawner: SandboxSpawner,
    signing_key: SigningKey,
    gears: Mutex<HashMap<String, GearRegistration>>,
    workspace: String,
    tool_version: String,
    kill_timeout: Duration,
}

impl SandboxToolRuntime {
    pub fn new(spawner: SandboxSpawner, signing_key: SigningKey, workspace: impl Into<String>, tool_version: impl Into<String>, kill_timeout: Duration) -> Self {
        Self {
            spawner,
            signing_key,
            gears: Mutex::new(HashMap::new()),
            workspace: workspace.into(),
            tool_version: tool_version.into(),
            kill_timeout,
        }
    }

    pub fn register_gear(&self, registration: GearRegistration) {
        self.gears.lock().expect("gear registry mutex poisoned").insert(registration.manifest.id.clone(), registration);
    }

    fn lookup(&self, gear: &str) -> Option<(GearManifest, GearEntryPoint, VerifyingKey)> {
        let guard = self.gears.lock().expect("gear registry mutex poisoned");
        guard.get(gear).map(|r| (r.manifest.clone(), r.entry_point.clone(), r.verifying_key))
    }
}

#[async_trait]
impl ToolRuntime for SandboxToolRuntime {
    async fn execute(&self, request: ExecuteRequest) -> Result<ExecuteOutcome, PipelineError> {
        let (manifest, entry_point, verifying_key) = self
            .lookup(&request.gear)
            .ok_or_else(|| PipelineError::ToolRuntime(format!("no gear registered for {:?}", request.gear)))?;

        let env = axis_sandbox::env::build_environment(&manifest, &self.workspace, &self.tool_version, None);

        let mut spawned = self
            .spawner
            .spawn(&manifest, entry_point, &self.workspace, env)
            .await
            .map_err(|e| PipelineError::ToolRuntime(e.to_string()))?;

        let correlation_id = Uuid::new_v4().to_string();
        let parameters = serde_json::to_value(&request.parameters).map_err(|e| PipelineError::ToolRuntime(e.to_string()))?;
        let gear_request = GearRequest { correlation_id: correlation_id.clone(), action: request.action.clone(), parameters };
        let frame = sign_request(&self.signing_key, &gear_request).map_err(|e| PipelineError::ToolRuntime(e.to_string()))?;

        let started = std::time::Instant::now();
        let outcome = self.round_trip(&mut spawned, &frame, &verifying_key, &correlation_id).await;

        match &outcome {
            Ok(_) => self.spawner.forget(&spawned),
            Err(_) => self.spawner.terminate(&spawned),
        }
        let _ = started;

        outcome
    }
}

impl SandboxToolRuntime {
    async fn round_trip(
        &self,
        spawned: &mut axis_sandbox::SpawnedGear,
        frame: &str,
        verifying_key: &VerifyingKey,
        correlation_id: &str,
    ) -> Result<ExecuteOutcome, PipelineError> {
        let mut stdin = spawned.child.stdin.take().ok_or_else(|| PipelineError::ToolRuntime("gear process has no stdin pipe".into()))?;
        let stdout = spawned.child.stdout.take().ok_or_else(|| PipelineError::ToolRuntime("gear process has no stdout pipe".into()))?;

        stdin.write_all(frame.as_bytes()).await.map_err(|e| PipelineError::ToolRuntime(e.to_string()))?;
        stdin.flush().await.map_err(|e| PipelineError::ToolRuntime(e.to_string()))?;
        drop(stdin);

        let mut reader = BufReader::new(stdout);
        let read_frame = tokio::time::timeout(self.kill_timeout, read_response_frame(&mut reader));

        let response_frame = match read_frame.await {
            Ok(Ok(frame)) => frame,
            Ok(Err(err)) => return Err(PipelineError::ToolRuntime(err.to_string())),
            Err(_) => {
                return Ok(ExecuteOutcome::Err {
                    code: "tool_kill_timeout".into(),
                    message: "gear did not respond before the kill timeout".into(),
                    retriable: true,
                })
            }
        };

        let response = verify_response(verifying_key, &response_frame, correlation_id).map_err(|e| PipelineError::ToolRuntime(e.to_string()))?;

        Ok(match response.outcome {
            GearOutcome::Ok { result, duration_ms } => ExecuteOutcome::Ok { result, duration_ms },
            GearOutcome::Err { code, message, retriable } => ExecuteOutcome::Err { code, message, retriable },
        })
    }
}

/// Reads the two-line `{body}\n{signature_hex}\n` frame produced by
/// `sign_request`'s mirror on the child side.
async fn read_response_frame<R: tokio::io::AsyncBufRead + Unpin>(reader: &mut R) -> std::io::Result<String> {
    let mut body = String::new();
    reader.read_line(&mut body).await?;
    let mut signature = String::new();
    reader.read_line(&mut signature).await?;
    Ok(format!("{body}{signature}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axis_sandbox::{Permissions, ResourceLimits, SandboxHost, SandboxHostConfig};
    use rand_core::OsRng;
    use std::path::PathBuf;

    fn manifest(id: &str) -> GearManifest {
        GearManifest { id: id.to_string(), actions: vec!["read_file".into()], permissions: Permissions::default(), resource_limits: ResourceLimits::default() }
    }

    #[test]
    fn unregistered_gear_is_rejected_before_any_spawn_attempt() {
        let signing_key = SigningKey::generate(&mut OsRng);
        let host = SandboxHost::build(SandboxHostConfig::default());
        let runtime = SandboxToolRuntime::new(SandboxSpawner::new(host), signing_key, "/tmp", "1.0.0", Duration::from_secs(1));
        assert!(runtime.lookup("unknown-gear").is_none());
        let _ = manifest("x");
        let _ = PathBuf::new();
    }
}
