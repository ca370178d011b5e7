//! MD5 fingerprint of an SSH public key, as the provider expects in `ssh_keys`.
//!
//! Computed by shelling out to `ssh-keygen`. The call blocks the calling
//! thread; it runs once at startup, before any workflow begins.

use std::{
    io,
    path::{Path, PathBuf},
    process::Command,
};

use thiserror::Error;
use tracing::debug;

const SSH_KEYGEN: &str = "ssh-keygen";
const MD5_PREFIX: &str = "MD5:";

#[derive(Debug, Error)]
pub enum FingerprintError {
    #[error("public key file '{}' does not exist", .0.display())]
    MissingKeyFile(PathBuf),
    #[error("failed to run ssh-keygen: {0}")]
    Spawn(#[source] io::Error),
    #[error("ssh-keygen exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("ssh-keygen output has no MD5 fingerprint: {0}")]
    Unrecognized(String),
}

pub fn md5_fingerprint(public_key: &Path) -> Result<String, FingerprintError> {
    if !public_key.is_file() {
        return Err(FingerprintError::MissingKeyFile(public_key.to_path_buf()));
    }

    let output = Command::new(SSH_KEYGEN)
        .args(["-E", "md5", "-lf"])
        .arg(public_key)
        .output()
        .map_err(FingerprintError::Spawn)?;

    if !output.status.success() {
        return Err(FingerprintError::Failed {
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let fingerprint = parse_md5_fingerprint(&stdout)
        .ok_or_else(|| FingerprintError::Unrecognized(stdout.trim().to_string()))?;
    debug!(key = %public_key.display(), fingerprint, "fingerprint: computed");
    Ok(fingerprint.to_string())
}

/// Extracts `aa:bb:...` from `2048 MD5:aa:bb:... user@host (RSA)`.
pub fn parse_md5_fingerprint(output: &str) -> Option<&str> {
    let start = output.find(MD5_PREFIX)? + MD5_PREFIX.len();
    let fingerprint = output[start..].split_whitespace().next()?;
    Some(fingerprint).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ssh_keygen_md5_output() {
        let output = "2048 MD5:3b:16:bf:e4:8b:00:8b:b8:59:8c:a9:d3:f0:19:45:fa user@host (RSA)\n";
        assert_eq!(
            parse_md5_fingerprint(output),
            Some("3b:16:bf:e4:8b:00:8b:b8:59:8c:a9:d3:f0:19:45:fa")
        );
    }

    #[test]
    fn rejects_output_without_md5_token() {
        assert_eq!(parse_md5_fingerprint("256 SHA256:abc user@host (ED25519)"), None);
        assert_eq!(parse_md5_fingerprint("256 MD5: "), None);
    }

    #[test]
    fn missing_key_file_fails_before_spawning() {
        let err = md5_fingerprint(Path::new("/nonexistent/cloud-shepard/id_rsa.pub"))
            .expect_err("missing file");
        assert!(matches!(err, FingerprintError::MissingKeyFile(_)));
    }
}
