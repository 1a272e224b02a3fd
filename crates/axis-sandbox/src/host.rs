//! Long-lived sandbox host: owns a background heartbeat that polls
//! child-process liveness and kill-timeout deadlines.
//!
//! Directly grounded on `engine::EngineConfig::build_engine`'s shape - a
//! config struct builds a handle, spawning a background thread that ticks
//! a shared counter via a weak reference until the handle is dropped.
//! There, the tick increments a wasmtime epoch; here, it sweeps a
//! registry of in-flight children for ones past their kill deadline and
//! escalates from SIGTERM to SIGKILL.
//!
//! The registry tracks child processes by PID rather than owning their
//! `tokio::process::Child` handle - the spawner keeps that handle for
//! stdin/stdout IPC framing, so the host can only signal, never read or
//! write.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

/// The deadline past which a signaled child should be escalated from
/// SIGTERM to SIGKILL (spec §5 "Cancellation & timeouts").
struct Tracked {
    pid: u32,
    sigterm_sent_at: Option<Instant>,
}

#[derive(Debug, Clone)]
pub struct SandboxHostConfig {
    pub heartbeat_interval_ms: u64,
    pub tool_kill_timeout_ms: u64,
}

impl Default for SandboxHostConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: 500,
            tool_kill_timeout_ms: 10_000,
        }
    }
}

struct Registry {
    children: HashMap<u64, Tracked>,
    next_id: u64,
}

/// Owns the heartbeat thread; holds an `Arc` so the registry outlives
/// individual sandbox calls but is torn down when the last handle drops,
/// at which point the heartbeat thread's weak upgrade starts failing and
/// it exits - identical lifetime discipline to `WasmEngine`'s epoch
/// ticker.
#[derive(Clone)]
pub struct SandboxHost {
    registry: Arc<Mutex<Registry>>,
}

impl SandboxHost {
    pub fn build(config: SandboxHostConfig) -> Self {
        let registry = Arc::new(Mutex::new(Registry {
            children: HashMap::new(),
            next_id: 0,
        }));
        let weak: Weak<Mutex<Registry>> = Arc::downgrade(&registry);
        let interval = Duration::from_millis(config.heartbeat_interval_ms);
        let kill_timeout = Duration::from_millis(config.tool_kill_timeout_ms);

        std::thread::spawn(move || loop {
            std::thread::sleep(interval);
            match weak.upgrade() {
                Some(registry) => sweep(&registry, kill_timeout),
                None => break,
            }
        });

        Self { registry }
    }

    /// Register a freshly spawned child's PID for liveness tracking.
    /// Returns an opaque tracking id used to mark it signaled and to
    /// untrack it once the caller has reaped it itself.
    pub fn track(&self, pid: u32) -> u64 {
        let mut guard = self.registry.lock().expect("sandbox host mutex poisoned");
        let id = guard.next_id;
        guard.next_id += 1;
        guard.children.insert(
            id,
            Tracked {
                pid,
                sigterm_sent_at: None,
            },
        );
        id
    }

    pub fn mark_signaled(&self, id: u64) {
        let mut guard = self.registry.lock().expect("sandbox host mutex poisoned");
        if let Some(tracked) = guard.children.get_mut(&id) {
            tracked.sigterm_sent_at.get_or_insert(Instant::now());
        }
    }

    pub fn untrack(&self, id: u64) {
        let mut guard = self.registry.lock().expect("sandbox host mutex poisoned");
        guard.children.remove(&id);
    }

    pub fn tracked_count(&self) -> usize {
        self.registry.lock().expect("sandbox host mutex poisoned").children.len()
    }
}

fn sweep(registry: &Mutex<Registry>, kill_timeout: Duration) {
    let guard = registry.lock().expect("sandbox host mutex poisoned");
    for tracked in guard.children.values() {
        let Some(signaled_at) = tracked.sigterm_sent_at else {
            continue;
        };
        if signaled_at.elapsed() >= kill_timeout {
            tracing::warn!(pid = tracked.pid, "kill timeout exceeded, escalating to SIGKILL");
            send_signal(tracked.pid, Signal::Kill);
        }
    }
}

pub enum Signal {
    Term,
    Kill,
}

#[cfg(unix)]
pub fn send_signal(pid: u32, signal: Signal) {
    let sig = match signal {
        Signal::Term => libc::SIGTERM,
        Signal::Kill => libc::SIGKILL,
    };
    unsafe {
        libc::kill(pid as libc::pid_t, sig);
    }
}

#[cfg(not(unix))]
pub fn send_signal(_pid: u32, _signal: Signal) {
    tracing::warn!("process signaling is not implemented on this platform");
}
