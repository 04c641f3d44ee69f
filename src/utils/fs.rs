//! File system helpers.
//!
//! Writes that other processes (IDEs, the dependency resolver) may observe go
//! through [`atomic_write`], which writes to a sibling temporary file and
//! renames it into place so a reader never sees a half-written file.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Create `path` and all missing parents.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Create the parent directory of `path` if it has one.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    Ok(())
}

/// Write `content` to `path` through a temporary file and an atomic rename.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    ensure_parent_dir(path)?;

    let temp_path = temp_sibling(path);
    {
        let mut file = fs::File::create(&temp_path)
            .with_context(|| format!("Failed to create temp file: {}", temp_path.display()))?;

        file.write_all(content)
            .with_context(|| format!("Failed to write to temp file: {}", temp_path.display()))?;

        file.sync_all().with_context(|| "Failed to sync file to disk")?;
    }

    fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to rename temp file to: {}", path.display()))?;

    Ok(())
}

/// Copy `from` to `to` atomically, creating parent directories.
pub fn atomic_copy(from: &Path, to: &Path) -> Result<()> {
    ensure_parent_dir(to)?;
    let temp_path = temp_sibling(to);
    fs::copy(from, &temp_path).with_context(|| {
        format!("Failed to copy {} to {}", from.display(), temp_path.display())
    })?;
    fs::rename(&temp_path, to)
        .with_context(|| format!("Failed to rename temp file to: {}", to.display()))?;
    Ok(())
}

/// SHA-256 of a file, hex encoded.
pub fn calculate_checksum(path: &Path) -> Result<String> {
    let content = fs::read(path)
        .with_context(|| format!("Failed to read file for checksum: {}", path.display()))?;

    let mut hasher = Sha256::new();
    hasher.update(&content);
    Ok(hex::encode(hasher.finalize()))
}

/// Location of the fingerprint stored next to a task output.
pub fn fingerprint_path(output: &Path) -> PathBuf {
    let mut name = output.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(crate::constants::FINGERPRINT_EXTENSION);
    output.with_file_name(name)
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
