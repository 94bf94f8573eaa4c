//! Up-front checks for the binaries and files a command depends on.

use std::path::Path;

use crate::{CliError, Result};

/// Compose files every docker command works with
pub const COMPOSE_FILES: [&str; 2] = ["docker-compose.yml", "docker-compose.prod.yml"];

pub fn is_missing_binary(binary: &str) -> bool {
    which::which(binary).is_err()
}

pub fn missing_binaries(required: &[&str]) -> Vec<String> {
    required
        .iter()
        .filter(|binary| is_missing_binary(binary))
        .map(|binary| binary.to_string())
        .collect()
}

pub fn missing_files(dir: &Path, required: &[&str]) -> Vec<String> {
    required
        .iter()
        .filter(|file| !dir.join(file).exists())
        .map(|file| file.to_string())
        .collect()
}

/// Fail listing every missing binary, not just the first
pub fn require_binaries(required: &[&str]) -> Result<()> {
    let missing = missing_binaries(required);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(CliError::MissingBinaries(missing))
    }
}

/// Fail listing every file missing from the working directory
pub fn require_files(required: &[&str]) -> Result<()> {
    let missing = missing_files(&std::env::current_dir()?, required);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(CliError::MissingFiles(missing))
    }
}
