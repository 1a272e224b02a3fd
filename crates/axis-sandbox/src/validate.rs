//! Path and domain validation (spec §4.6 "Path validation", "Domain
//! validation"). Pulled out of the profile-building code since both the
//! sandbox profile *and* the runtime IPC layer need to re-check paths a
//! gear actually touches, not just the ones declared up front.

use std::net::IpAddr;
use std::path::{Component, Path};

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::error::SandboxError;

/// Build a matcher for a set of glob patterns, anchored at `base`.
pub fn build_path_matcher(patterns: &[String], base: &Path) -> Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let anchored = base.join(pattern);
        builder.add(Glob::new(&anchored.to_string_lossy())?);
    }
    builder.build()
}

/// A path is allowed iff, after canonicalization (or lexical
/// normalization when the path doesn't yet exist), it stays within the
/// workspace base and matches one of the declared glob patterns. `..`
/// traversal and absolute paths outside `base` are always rejected.
pub fn validate_path(path: &Path, base: &Path, matcher: &GlobSet) -> Result<(), SandboxError> {
    let normalized = normalize_lexically(path);

    if !normalized.starts_with(base) {
        return Err(SandboxError::PathNotAllowed {
            path: path.display().to_string(),
        });
    }
    if !matcher.is_match(&normalized) {
        return Err(SandboxError::PathNotAllowed {
            path: path.display().to_string(),
        });
    }
    Ok(())
}

/// Resolve `.`/`..` components without touching the filesystem, so a
/// not-yet-created output path can still be validated before the write.
fn normalize_lexically(path: &Path) -> std::path::PathBuf {
    let mut out = std::path::PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// `true` iff `ip` falls in a private or link-local range: IPv4 `10/8`,
/// `172.16/12`, `192.168/16`, `127/8`, or IPv6 loopback / `fe80::/10`.
/// Checked by octet/segment range rather than string prefix so addresses
/// like `172.20.5.5` or `172.31.0.1` are caught, not just `172.16.*`.
fn is_private_or_link_local(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let o = v4.octets();
            o[0] == 10 || (o[0] == 172 && (16..=31).contains(&o[1])) || (o[0] == 192 && o[1] == 168) || o[0] == 127
        }
        IpAddr::V6(v6) => v6.is_loopback() || (v6.segments()[0] & 0xffc0) == 0xfe80,
    }
}

/// `true` iff `domain` is reachable per the declared allowlist (spec
/// §4.6 "Domain validation"). Private IPv4 ranges, IPv6 loopback/link-local,
/// and `localhost` are rejected unconditionally, even if present in the
/// declared list.
pub fn validate_domain(domain: &str, allowed: &[String]) -> Result<(), SandboxError> {
    let domain = domain.trim().to_ascii_lowercase();

    if domain == "localhost" {
        return Err(SandboxError::DomainNotAllowed { domain });
    }

    if let Ok(ip) = domain.parse::<IpAddr>() {
        if is_private_or_link_local(&ip) {
            return Err(SandboxError::DomainNotAllowed { domain });
        }
    }

    let matches = allowed.iter().any(|candidate| {
        let candidate = candidate.to_ascii_lowercase();
        domain == candidate || domain.ends_with(&format!(".{candidate}"))
    });

    if matches {
        Ok(())
    } else {
        Err(SandboxError::DomainNotAllowed { domain })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn parent_traversal_outside_base_is_rejected() {
        let base = PathBuf::from("/workspace");
        let matcher = build_path_matcher(&["**".to_string()], &base).unwrap();
        let malicious = PathBuf::from("/workspace/../etc/passwd");
        assert!(validate_path(&malicious, &base, &matcher).is_err());
    }

    #[test]
    fn path_within_declared_glob_is_allowed() {
        let base = PathBuf::from("/workspace");
        let matcher = build_path_matcher(&["data/*.txt".to_string()], &base).unwrap();
        let ok = PathBuf::from("/workspace/data/todos.txt");
        assert!(validate_path(&ok, &base, &matcher).is_ok());
    }

    #[test]
    fn path_outside_declared_glob_is_rejected() {
        let base = PathBuf::from("/workspace");
        let matcher = build_path_matcher(&["data/*.txt".to_string()], &base).unwrap();
        let outside = PathBuf::from("/workspace/secrets/keys.pem");
        assert!(validate_path(&outside, &base, &matcher).is_err());
    }

    #[test]
    fn exact_and_subdomain_match_allowed() {
        let allowed = vec!["example.com".to_string()];
        assert!(validate_domain("example.com", &allowed).is_ok());
        assert!(validate_domain("api.example.com", &allowed).is_ok());
        assert!(validate_domain("evil.com", &allowed).is_err());
    }

    #[test]
    fn private_ranges_always_rejected_even_if_declared() {
        let allowed = vec!["10.0.0.1".to_string(), "localhost".to_string()];
        assert!(validate_domain("10.0.0.1", &allowed).is_err());
        assert!(validate_domain("localhost", &allowed).is_err());
        assert!(validate_domain("192.168.1.1", &allowed).is_err());
        assert!(validate_domain("127.0.0.1", &allowed).is_err());
    }

    #[test]
    fn full_172_16_slash_12_range_is_rejected() {
        let allowed = vec!["172.20.5.5".to_string(), "172.31.0.1".to_string()];
        assert!(validate_domain("172.20.5.5", &allowed).is_err());
        assert!(validate_domain("172.31.0.1", &allowed).is_err());
    }

    #[test]
    fn addresses_just_outside_172_16_slash_12_are_not_private() {
        let allowed = vec!["172.15.0.1".to_string(), "172.32.0.1".to_string()];
        assert!(validate_domain("172.15.0.1", &allowed).is_ok());
        assert!(validate_domain("172.32.0.1", &allowed).is_ok());
    }

    #[test]
    fn ipv6_link_local_range_is_rejected_beyond_literal_fe80_prefix() {
        let allowed = vec!["fe80::1".to_string(), "febf::1".to_string()];
        assert!(validate_domain("fe80::1", &allowed).is_err());
        assert!(validate_domain("febf::1", &allowed).is_err());
        assert!(validate_domain("::1", &allowed).is_err());
    }
}
