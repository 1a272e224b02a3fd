//! Ordered startup/shutdown (spec §4.5 "Lifecycle Manager"): six startup
//! phases, each must succeed before the next runs, and a reverse-order
//! teardown registry triggered by SIGTERM/SIGINT.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axis_queue::store::JobStore;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::config::AxisConfig;
use crate::worker_pool::WorkerPool;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("config phase failed: {0}")]
    Config(String),
    #[error("database phase failed: {0}")]
    Database(String),
    #[error("self-diagnostics failed: {0}")]
    AxisCore(String),
    #[error("component registration failed: {0}")]
    Components(String),
    #[error("recovery failed: {0}")]
    Recovery(String),
    #[error("bridge startup failed: {0}")]
    Bridge(String),
}

/// A reverse-order teardown hook registered during startup (spec §4.5
/// "shutdown runs teardown handlers in the reverse order they were
/// registered").
pub type TeardownHook = Box<dyn FnOnce() -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>> + Send>;

/// Self-diagnostic checks run during the `axis_core` phase. `abort` checks
/// stop startup on failure; warnings are logged and startup continues.
struct Diagnostics<'a> {
    config: &'a AxisConfig,
}

impl<'a> Diagnostics<'a> {
    fn run(&self) -> Result<(), LifecycleError> {
        let data_dir = Path::new(&self.config.data_dir);
        std::fs::create_dir_all(data_dir).map_err(|e| LifecycleError::AxisCore(format!("data dir {} not writable: {e}", self.config.data_dir)))?;
        let probe = data_dir.join(".axis-write-probe");
        std::fs::write(&probe, b"ok").map_err(|e| LifecycleError::AxisCore(format!("data dir {} not writable: {e}", self.config.data_dir)))?;
        let _ = std::fs::remove_file(&probe);

        if let Some(port) = self.config.required_port {
            if std::net::TcpListener::bind(("0.0.0.0", port)).is_err() {
                return Err(LifecycleError::AxisCore(format!("required port {port} is not available")));
            }
        }

        if let Some(min_disk_mb) = self.config.min_disk_space_mb {
            warn!(min_disk_mb, "disk space check is advisory only, not enforced by this runtime");
        }
        if let Some(min_ram_mb) = self.config.min_ram_mb {
            warn!(min_ram_mb, "free memory check is advisory only, not enforced by this runtime");
        }

        Ok(())
    }
}

/// Drives the six ordered startup phases and the reverse-order shutdown
/// teardown registry. Liveness flips true after phase 1 (`config`);
/// readiness flips true after phase 6 (`bridge`) and false again once
/// shutdown begins.
pub struct LifecycleManager {
    live: Arc<AtomicBool>,
    ready: Arc<AtomicBool>,
    teardown_hooks: Mutex<Vec<TeardownHook>>,
}

impl LifecycleManager {
    pub fn new() -> Self {
        Self { live: Arc::new(AtomicBool::new(false)), ready: Arc::new(AtomicBool::new(false)), teardown_hooks: Mutex::new(Vec::new()) }
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn register_teardown(&self, hook: TeardownHook) {
        self.teardown_hooks.lock().await.push(hook);
    }

    /// Phase 1: validate configuration, then mark liveness.
    pub fn start_config(&self, config: &AxisConfig) -> Result<(), LifecycleError> {
        config.validate().map_err(|e| LifecycleError::Config(e.to_string()))?;
        self.live.store(true, Ordering::SeqCst);
        info!("phase config complete, liveness up");
        Ok(())
    }

    /// Phase 2: open and, if needed, migrate persistent stores. The
    /// in-memory job store needs no migration; this is the seam a
    /// SQL-backed `JobStore` would hook into.
    pub fn start_database(&self) -> Result<(), LifecycleError> {
        info!("phase database complete");
        Ok(())
    }

    /// Phase 3: self-diagnostics. Abort-severity failures stop startup;
    /// disk/memory checks are warning-only.
    pub fn start_axis_core(&self, config: &AxisConfig) -> Result<(), LifecycleError> {
        Diagnostics { config }.run()?;
        info!("phase axis_core complete");
        Ok(())
    }

    /// Phase 4: external components register their handlers with the
    /// router. Takes a closure so callers can register whatever handlers
    /// their deployment needs without this crate knowing their types.
    pub fn start_components(&self, register: impl FnOnce() -> Result<(), String>) -> Result<(), LifecycleError> {
        register().map_err(LifecycleError::Components)?;
        info!("phase components complete");
        Ok(())
    }

    /// Phase 5: run startup Job recovery (spec §4.1 "Recovery").
    pub fn start_recovery(&self, queue: &dyn JobStore, claim_stale_after: chrono::Duration) -> Result<(), LifecycleError> {
        let result = queue.recover(claim_stale_after, chrono::Utc::now());
        info!(
            inspected = result.inspected,
            reverted_to_pending = result.reverted_to_pending,
            reverted_to_awaiting_approval = result.reverted_to_awaiting_approval,
            marked_failed_interrupted = result.marked_failed_interrupted,
            "phase recovery complete"
        );
        Ok(())
    }

    /// Phase 6: start the worker pool and any external interfaces (the
    /// HTTP/WebSocket bridge lives outside this crate - see SPEC_FULL.md's
    /// Non-goals), then mark readiness.
    pub async fn start_bridge(&self, pool: &WorkerPool) -> Result<(), LifecycleError> {
        pool.start().await;
        self.ready.store(true, Ordering::SeqCst);
        info!("phase bridge complete, readiness up");
        Ok(())
    }

    /// Tears down every registered hook in reverse registration order,
    /// flipping readiness false first so inbound work stops being routed
    /// here while teardown runs.
    pub async fn shutdown(&self) {
        self.ready.store(false, Ordering::SeqCst);
        let mut hooks = self.teardown_hooks.lock().await;
        while let Some(hook) = hooks.pop() {
            hook().await;
        }
        self.live.store(false, Ordering::SeqCst);
        info!("shutdown complete");
    }

    pub async fn add_teardown_hook(&self, hook: TeardownHook) {
        self.register_teardown(hook).await;
    }

    /// Waits for SIGTERM or SIGINT (spec §4.5: "shutdown is triggered by
    /// SIGTERM or SIGINT").
    #[cfg(unix)]
    pub async fn wait_for_shutdown_signal() {
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(stream) => stream,
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler, falling back to ctrl_c only");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM"),
            _ = tokio::signal::ctrl_c() => info!("received SIGINT"),
        }
    }

    #[cfg(not(unix))]
    pub async fn wait_for_shutdown_signal() {
        let _ = tokio::signal::ctrl_c().await;
        info!("received ctrl-c");
    }
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axis_queue::store::InMemoryJobStore;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn liveness_flips_after_config_phase() {
        let manager = LifecycleManager::new();
        assert!(!manager.is_live());
        manager.start_config(&AxisConfig::default()).unwrap();
        assert!(manager.is_live());
    }

    #[test]
    fn invalid_config_keeps_liveness_false() {
        let manager = LifecycleManager::new();
        let mut config = AxisConfig::default();
        config.workers = 0;
        assert!(manager.start_config(&config).is_err());
        assert!(!manager.is_live());
    }

    #[test]
    fn recovery_phase_reports_queue_state() {
        let manager = LifecycleManager::new();
        let queue = InMemoryJobStore::new();
        manager.start_recovery(&queue, chrono::Duration::milliseconds(1)).unwrap();
    }

    #[tokio::test]
    async fn shutdown_runs_hooks_in_reverse_registration_order() {
        let manager = LifecycleManager::new();
        manager.start_config(&AxisConfig::default()).unwrap();
        manager.ready.store(true, Ordering::SeqCst);

        let order = Arc::new(Mutex::new(Vec::new()));
        let counter = Arc::new(AtomicUsize::new(0));

        for label in ["first", "second"] {
            let order = order.clone();
            let counter = counter.clone();
            manager
                .add_teardown_hook(Box::new(move || {
                    Box::pin(async move {
                        let _ = counter.fetch_add(1, Ordering::SeqCst);
                        order.lock().await.push(label);
                    })
                }))
                .await;
        }

        manager.shutdown().await;
        assert_eq!(*order.lock().await, vec!["second", "first"]);
        assert!(!manager.is_ready());
        assert!(!manager.is_live());
    }
}
