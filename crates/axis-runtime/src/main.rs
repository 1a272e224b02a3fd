//! Binary entry point: loads configuration, wires every crate together
//! through `AxisBuilder`, runs startup in the six ordered phases (spec
//! §4.5), then waits for SIGTERM/SIGINT and tears down in reverse.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use axis_router::{KeyRegistry, NullAuditWriter, ReplayWindow, Router};
use axis_runtime::router_collaborators::{RouterDispatchedMemoryWriter, RouterDispatchedPlanner, RouterDispatchedValidator};
use axis_runtime::sandbox_tool_runtime::SandboxToolRuntime;
use axis_runtime::{AxisBuilder, AxisConfig, LifecycleManager};
use axis_sandbox::{SandboxHost, SandboxHostConfig, SandboxSpawner};
use ed25519_dalek::SigningKey;
use rand_core::OsRng;
use tracing_subscriber::EnvFilter;

const SELF_COMPONENT_ID: &str = "axis-core";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))).init();

    let config_path = std::env::var("AXIS_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("axis.toml"));
    let env: HashMap<String, String> = std::env::vars().collect();
    let config = AxisConfig::load(&config_path, &env)?;

    let lifecycle = Arc::new(LifecycleManager::new());
    lifecycle.start_config(&config).map_err(|e| anyhow::anyhow!(e.to_string()))?;
    lifecycle.start_database().map_err(|e| anyhow::anyhow!(e.to_string()))?;
    lifecycle.start_axis_core(&config).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    // Signing identity this process dispatches under. A deployment with a
    // secrets vault (outside this crate, spec §4 Non-goals) would load this
    // from there instead of generating an ephemeral one.
    let signing_key = SigningKey::generate(&mut OsRng);

    let keys = KeyRegistry::new();
    keys.register(SELF_COMPONENT_ID, signing_key.verifying_key());
    keys.register("planner", signing_key.verifying_key());
    keys.register("validator", signing_key.verifying_key());
    keys.register("memory-writer", signing_key.verifying_key());
    let router = Arc::new(Router::new(
        keys,
        ReplayWindow::new(config.replay_window_ms, config.max_replay_window_size),
        Arc::new(NullAuditWriter),
    ));

    lifecycle
        .start_components(|| {
            // External components register their own handlers with the
            // Router over whatever transport they use (spec §4 Non-goals:
            // that transport lives outside this crate). Nothing to do
            // in-process here.
            Ok(())
        })
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let sandbox_host = SandboxHost::build(SandboxHostConfig { tool_kill_timeout_ms: config.tool_kill_timeout_ms, ..SandboxHostConfig::default() });
    let tool_runtime = Arc::new(SandboxToolRuntime::new(
        SandboxSpawner::new(sandbox_host),
        signing_key.clone(),
        config.data_dir.clone(),
        env!("CARGO_PKG_VERSION"),
        std::time::Duration::from_millis(config.tool_kill_timeout_ms),
    ));

    let axis = AxisBuilder::new(config, signing_key.clone(), SELF_COMPONENT_ID)
        .router(router.clone())
        .planner(Arc::new(RouterDispatchedPlanner::new(router.clone(), signing_key.clone(), SELF_COMPONENT_ID, "planner")))
        .validator(Arc::new(RouterDispatchedValidator::new(router.clone(), signing_key.clone(), SELF_COMPONENT_ID, "validator")))
        .tool_runtime(tool_runtime)
        .memory_writer(Arc::new(RouterDispatchedMemoryWriter::new(router, signing_key, SELF_COMPONENT_ID, "memory-writer")))
        .build()
        .map_err(|e| anyhow::anyhow!(e))?;

    lifecycle
        .start_recovery(axis.queue.as_ref(), chrono::Duration::milliseconds(2 * axis.config.job_timeout_ms as i64))
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    lifecycle.start_bridge(&axis.worker_pool).await.map_err(|e| anyhow::anyhow!(e.to_string()))?;

    LifecycleManager::wait_for_shutdown_signal().await;

    axis.worker_pool.stop().await;
    lifecycle.shutdown().await;

    Ok(())
}
