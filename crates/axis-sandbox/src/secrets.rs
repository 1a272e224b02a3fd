//! Secrets injection into a fresh per-sandbox tempdir, zeroed on write
//! and unlinked on teardown (spec §4.6 "Secrets injection").

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// A tempdir owned by exactly one sandbox instance. Dropping it unlinks
/// the directory - callers don't need a separate teardown call, matching
/// how `EngineConfig::build_engine`'s heartbeat thread ties its own
/// lifetime to the `Arc<Engine>`'s, rather than requiring an explicit
/// shutdown call from elsewhere.
pub struct SecretsDir {
    path: PathBuf,
}

impl SecretsDir {
    /// Create the directory and write each declared secret into its own
    /// file. The caller's `secret_value` buffers are zeroed in place
    /// immediately after the write, regardless of declaration order.
    pub fn write(base_tmp: &Path, sandbox_id: &str, mut secrets: HashMap<String, Vec<u8>>) -> std::io::Result<Self> {
        let path = base_tmp.join(format!("axis-secrets-{sandbox_id}"));
        fs::create_dir_all(&path)?;

        for (name, value) in secrets.iter_mut() {
            let file_path = path.join(name);
            let mut file = fs::File::create(&file_path)?;
            file.write_all(value)?;
            file.sync_all()?;
            zero(value);
        }

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SecretsDir {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_dir_all(&self.path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), %err, "failed to unlink secrets dir on teardown");
            }
        }
    }
}

/// Overwrite every byte of `buf` with zero. Not a substitute for a
/// constant-time, compiler-fence-protected zeroing crate in a
/// higher-assurance build, but sufficient to avoid leaving secret
/// material sitting in a long-lived heap allocation past its use.
fn zero(buf: &mut [u8]) {
    for byte in buf.iter_mut() {
        *byte = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_each_secret_to_its_own_file_and_zeroes_the_buffer() {
        let tmp = std::env::temp_dir();
        let mut secret = b"sk-test-value".to_vec();
        let original_len = secret.len();
        let mut secrets = HashMap::new();
        secrets.insert("api_key".to_string(), std::mem::take(&mut secret));

        let dir = SecretsDir::write(&tmp, "test-sandbox-1", secrets).unwrap();
        let contents = fs::read(dir.path().join("api_key")).unwrap();
        assert_eq!(contents, b"sk-test-value");
        assert_eq!(original_len, contents.len());
    }

    #[test]
    fn drop_unlinks_the_directory() {
        let tmp = std::env::temp_dir();
        let mut secrets = HashMap::new();
        secrets.insert("token".to_string(), b"x".to_vec());
        let dir = SecretsDir::write(&tmp, "test-sandbox-2", secrets).unwrap();
        let path = dir.path().to_path_buf();
        assert!(path.exists());
        drop(dir);
        assert!(!path.exists());
    }
}
