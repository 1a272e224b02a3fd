//! Minimal environment construction for a spawned Gear (spec §4.6
//! "Environment construction"). Never inherits the parent process's
//! environment wholesale - only `PATH`, the fixed identity triple, an
//! optional `SECRETS_DIR`, and exactly the declared env vars pass through.

use std::collections::HashMap;
use std::env;

use crate::manifest::GearManifest;

pub fn build_environment(
    manifest: &GearManifest,
    workspace: &str,
    tool_version: &str,
    secrets_dir: Option<&str>,
) -> HashMap<String, String> {
    let mut vars = HashMap::new();

    if let Ok(path) = env::var("PATH") {
        vars.insert("PATH".to_string(), path);
    }
    vars.insert("WORKSPACE".to_string(), workspace.to_string());
    vars.insert("TOOL_ID".to_string(), manifest.id.clone());
    vars.insert("TOOL_VERSION".to_string(), tool_version.to_string());

    if let Some(dir) = secrets_dir {
        vars.insert("SECRETS_DIR".to_string(), dir.to_string());
    }

    for name in &manifest.permissions.env_vars {
        if let Ok(value) = env::var(name) {
            vars.insert(name.clone(), value);
        }
    }

    vars
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Permissions;

    #[test]
    fn never_carries_home_or_user_unless_declared() {
        let manifest = GearManifest {
            id: "file-manager".into(),
            actions: vec![],
            permissions: Permissions::default(),
            resource_limits: Default::default(),
        };
        let env = build_environment(&manifest, "/ws", "1.0.0", None);
        assert!(!env.contains_key("HOME"));
        assert!(!env.contains_key("USER"));
        assert_eq!(env.get("WORKSPACE"), Some(&"/ws".to_string()));
        assert_eq!(env.get("TOOL_ID"), Some(&"file-manager".to_string()));
    }

    #[test]
    fn secrets_dir_present_only_when_provided() {
        let manifest = GearManifest {
            id: "file-manager".into(),
            actions: vec![],
            permissions: Permissions::default(),
            resource_limits: Default::default(),
        };
        assert!(!build_environment(&manifest, "/ws", "1.0.0", None).contains_key("SECRETS_DIR"));
        assert!(build_environment(&manifest, "/ws", "1.0.0", Some("/tmp/s1")).contains_key("SECRETS_DIR"));
    }
}
