//! OS-specific sandbox profile construction (spec §4.6).
//!
//! Two textual profile shapes, built declaratively from a [`GearManifest`]
//! the same way the teacher's `EngineConfig::build_engine` turns a small
//! config struct into a concrete, enforced runtime object - here the
//! "runtime object" is a policy string handed to the platform sandbox
//! primitive rather than a `wasmtime::Engine`.

use crate::manifest::GearManifest;

/// A macOS `sandbox-exec`-style textual policy: deny by default, then
/// punch exactly the declared holes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeatbeltProfile(pub String);

pub fn build_seatbelt_profile(manifest: &GearManifest, workspace: &str, sandbox_tmp: &str) -> SeatbeltProfile {
    let mut lines = vec![
        "(version 1)".to_string(),
        "(deny default)".to_string(),
        format!("(allow file-read* file-write* (subpath \"{workspace}\"))"),
        format!("(allow file-read* file-write* (subpath \"{sandbox_tmp}\"))"),
    ];

    for pattern in &manifest.permissions.read_paths {
        lines.push(format!("(allow file-read* (subpath \"{pattern}\"))"));
    }
    for pattern in &manifest.permissions.write_paths {
        lines.push(format!("(allow file-write* (subpath \"{pattern}\"))"));
    }
    if !manifest.permissions.network_domains.is_empty() {
        lines.push("(allow network-outbound)".to_string());
    }

    SeatbeltProfile(lines.join("\n"))
}

/// A Linux seccomp-style syscall allowlist, extended conditionally.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeccompProfile {
    pub allowed_syscalls: Vec<&'static str>,
    pub max_memory_bytes: u64,
}

const BASE_SYSCALLS: &[&str] = &[
    "read", "write", "open", "openat", "close", "stat", "fstat", "lstat", "mmap", "munmap",
    "brk", "exit", "exit_group", "rt_sigaction", "rt_sigreturn", "futex", "clock_gettime",
];

const ALWAYS_BLOCKED: &[&str] = &["ptrace", "mount", "reboot"];

pub fn build_seccomp_profile(manifest: &GearManifest) -> SeccompProfile {
    let mut allowed: Vec<&'static str> = BASE_SYSCALLS.to_vec();

    if !manifest.permissions.network_domains.is_empty() {
        allowed.push("socket");
        allowed.push("connect");
        allowed.push("getaddrinfo");
    }
    if manifest.permissions.shell_allowed {
        allowed.push("execve");
        allowed.push("fork");
        allowed.push("vfork");
        allowed.push("clone");
    }

    debug_assert!(
        ALWAYS_BLOCKED.iter().all(|blocked| !allowed.contains(blocked)),
        "a blocked syscall leaked into the allowlist"
    );

    SeccompProfile {
        allowed_syscalls: allowed,
        max_memory_bytes: manifest.resource_limits.max_memory_bytes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Permissions;

    fn manifest(permissions: Permissions) -> GearManifest {
        GearManifest {
            id: "file-manager".into(),
            actions: vec!["read_file".into()],
            permissions,
            resource_limits: Default::default(),
        }
    }

    #[test]
    fn seatbelt_denies_by_default_and_allows_workspace() {
        let profile = build_seatbelt_profile(&manifest(Permissions::default()), "/ws", "/tmp/sb1");
        assert!(profile.0.contains("(deny default)"));
        assert!(profile.0.contains("/ws"));
        assert!(profile.0.contains("/tmp/sb1"));
        assert!(!profile.0.contains("network-outbound"));
    }

    #[test]
    fn seatbelt_allows_network_only_when_domains_declared() {
        let permissions = Permissions {
            network_domains: vec!["api.example.com".into()],
            ..Default::default()
        };
        let profile = build_seatbelt_profile(&manifest(permissions), "/ws", "/tmp/sb1");
        assert!(profile.0.contains("network-outbound"));
    }

    #[test]
    fn seccomp_blocks_execve_unless_shell_declared() {
        let without_shell = build_seccomp_profile(&manifest(Permissions::default()));
        assert!(!without_shell.allowed_syscalls.contains(&"execve"));

        let permissions = Permissions {
            shell_allowed: true,
            ..Default::default()
        };
        let with_shell = build_seccomp_profile(&manifest(permissions));
        assert!(with_shell.allowed_syscalls.contains(&"execve"));
    }

    #[test]
    fn seccomp_never_allows_ptrace_mount_or_reboot() {
        let permissions = Permissions {
            shell_allowed: true,
            network_domains: vec!["example.com".into()],
            ..Default::default()
        };
        let profile = build_seccomp_profile(&manifest(permissions));
        for blocked in ALWAYS_BLOCKED {
            assert!(!profile.allowed_syscalls.contains(blocked));
        }
    }
}
