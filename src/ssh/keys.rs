use std::path::{Path, PathBuf};

use tracing::debug;

use crate::process::ProcessRunner;
use crate::{CliError, Result};

/// File name of the throwaway key pair under `~/.ssh/`
pub const TEMP_KEY_NAME: &str = "netsells-cli-ssm-ssh-tmp";
const TEMP_KEY_COMMENT: &str = "netsells-cli-ssm-ssh-session";

/// Path of the temporary private key, or `None` without a home directory
pub fn temp_key_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|dirs| dirs.home_dir().join(".ssh").join(TEMP_KEY_NAME))
}

fn public_key_path(private_key: &Path) -> PathBuf {
    let mut path = private_key.as_os_str().to_owned();
    path.push(".pub");
    PathBuf::from(path)
}

fn remove_if_present(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Replace the key pair at `private_key` with a fresh passphrase-less
/// ed25519 pair and return the validated public key line.
pub async fn regenerate_key(private_key: &Path) -> Result<String> {
    remove_if_present(private_key)?;
    let public_key = public_key_path(private_key);
    remove_if_present(&public_key)?;

    if let Some(dir) = private_key.parent() {
        std::fs::create_dir_all(dir)?;
    }

    let path = private_key.display().to_string();
    debug!(%path, "Generating temporary SSH key");

    ProcessRunner::new()
        .with_command([
            "ssh-keygen",
            "-t",
            "ed25519",
            "-N",
            "",
            "-f",
            path.as_str(),
            "-C",
            TEMP_KEY_COMMENT,
        ])
        .with_failure_echo(false)
        .run()
        .await?;

    let key = std::fs::read_to_string(&public_key)?.trim().to_string();
    validate_public_key(&key)?;
    Ok(key)
}

/// Validate that a string is a single-line OpenSSH public key that can be
/// embedded in a single-quoted shell string.
pub fn validate_public_key(key: &str) -> Result<()> {
    let key = key.trim();

    if key.is_empty() {
        return Err(CliError::SshKeyInvalid("SSH key is empty".to_string()));
    }

    // Reject multi-line keys (security: prevents authorized_keys injection)
    if key.contains('\n') || key.contains('\r') {
        return Err(CliError::SshKeyInvalid(
            "SSH key contains multiple lines. Only single-line keys are supported.".to_string(),
        ));
    }

    if key.contains('\'') || key.contains(',') {
        return Err(CliError::SshKeyInvalid(
            "SSH key contains quote or comma characters".to_string(),
        ));
    }

    let valid_prefixes = ["ssh-rsa ", "ssh-ed25519 ", "ecdsa-sha2-nistp"];
    if !valid_prefixes.iter().any(|prefix| key.starts_with(prefix)) {
        return Err(CliError::SshKeyInvalid(format!(
            "Invalid SSH public key format. Must start with 'ssh-rsa', 'ssh-ed25519', or 'ecdsa-sha2-nistp*'. Got: {}...",
            key.chars().take(30).collect::<String>()
        )));
    }

    let parts: Vec<&str> = key.split_whitespace().collect();
    if parts.len() < 2 {
        return Err(CliError::SshKeyInvalid(
            "SSH key appears malformed (missing key data)".to_string(),
        ));
    }

    let key_material = parts[1];
    if !key_material
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '=')
    {
        return Err(CliError::SshKeyInvalid(
            "SSH key material contains invalid characters (expected base64)".to_string(),
        ));
    }

    // ed25519 material is 68 characters, RSA/ECDSA longer
    if key_material.len() < 50 {
        return Err(CliError::SshKeyInvalid(
            "SSH key material too short (expected at least 50 characters)".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ED25519: &str =
        "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIGxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx netsells-cli-ssm-ssh-session";

    #[test]
    fn test_validate_ed25519_key() {
        assert!(validate_public_key(ED25519).is_ok());
    }

    #[test]
    fn test_validate_ecdsa_key() {
        let key = "ecdsa-sha2-nistp256 AAAAE2VjZHNhLXNoYTItbmlzdHAyNTYAAAAIbmlzdHAyNTYAAABBBFxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx user@host";
        assert!(validate_public_key(key).is_ok());
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(validate_public_key("").is_err());
        assert!(validate_public_key("not-a-valid-key").is_err());
        assert!(validate_public_key("ssh-rsa").is_err());
        assert!(validate_public_key("ssh-rsa AAAAB3NzaC1yc2EAAAADAQABAAABgQDK user@host").is_err());
    }

    #[test]
    fn test_rejects_shell_breaking_characters() {
        let quoted = format!("{}'; rm -rf ~; echo '", ED25519);
        assert!(validate_public_key(&quoted).is_err());
        let comma = format!("{},x", ED25519);
        assert!(validate_public_key(&comma).is_err());
    }

    #[test]
    fn test_multiline_key_rejected() {
        let key = format!("{}\n{}", ED25519, ED25519);
        assert!(validate_public_key(&key).is_err());
    }

    #[test]
    fn test_public_key_path() {
        assert_eq!(
            public_key_path(Path::new("/home/dev/.ssh/netsells-cli-ssm-ssh-tmp")),
            PathBuf::from("/home/dev/.ssh/netsells-cli-ssm-ssh-tmp.pub")
        );
    }

    #[test]
    fn test_remove_if_present_tolerates_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing");
        assert!(remove_if_present(&path).is_ok());

        std::fs::write(&path, "x").unwrap();
        remove_if_present(&path).unwrap();
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_regenerate_key_replaces_existing_pair() {
        if crate::checks::is_missing_binary("ssh-keygen") {
            return;
        }

        let dir = tempfile::tempdir().unwrap();
        let private_key = dir.path().join(".ssh").join(TEMP_KEY_NAME);
        std::fs::create_dir_all(private_key.parent().unwrap()).unwrap();
        std::fs::write(&private_key, "stale").unwrap();
        std::fs::write(public_key_path(&private_key), "stale").unwrap();

        let key = regenerate_key(&private_key).await.unwrap();

        assert!(key.starts_with("ssh-ed25519 "));
        assert!(key.ends_with(TEMP_KEY_COMMENT));
        assert_ne!(std::fs::read_to_string(&private_key).unwrap(), "stale");
    }
}
