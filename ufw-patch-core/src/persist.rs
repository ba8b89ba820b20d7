use std::fs;
use std::io::{self, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info};

use crate::target::TargetFile;

/// Errors that can occur while writing a patched file back to disk.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to back up {path} to {backup}: {source}")]
    Backup {
        path: PathBuf,
        backup: PathBuf,
        source: io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistOptions {
    /// Copy the existing file aside before replacing it.
    pub backup: bool,
    /// Mode for the written file. `None` keeps the existing file's mode,
    /// or `0o644` for a new file.
    pub mode: Option<u32>,
}

impl Default for PersistOptions {
    fn default() -> Self {
        Self {
            backup: true,
            mode: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PersistOutcome {
    /// Content on disk already matched; nothing written.
    Unchanged,
    /// File replaced; `backup` holds the previous content if one was made.
    Written { backup: Option<PathBuf> },
}

/// Write `file` to `path` via a temp file in the same directory and a rename.
pub fn persist(
    path: &Path,
    file: &TargetFile,
    options: PersistOptions,
) -> Result<PersistOutcome, PersistError> {
    write_atomic(path, file.render().as_bytes(), options)
}

/// Write owner-only (`0600`) content such as `ipsec.secrets` or private keys.
pub fn write_secret_file(
    path: &Path,
    contents: &[u8],
    backup: bool,
) -> Result<PersistOutcome, PersistError> {
    write_atomic(
        path,
        contents,
        PersistOptions {
            backup,
            mode: Some(0o600),
        },
    )
}

/// Atomically replace `path` with `contents`.
pub fn write_atomic(
    path: &Path,
    contents: &[u8],
    options: PersistOptions,
) -> Result<PersistOutcome, PersistError> {
    let existing = match fs::read(path) {
        Ok(bytes) => Some(bytes),
        Err(err) if err.kind() == io::ErrorKind::NotFound => None,
        Err(source) => {
            return Err(PersistError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let existing_mode = if existing.is_some() {
        fs::metadata(path)
            .map(|m| m.permissions().mode() & 0o7777)
            .ok()
    } else {
        None
    };

    let mode_matches = match options.mode {
        Some(mode) => existing_mode == Some(mode),
        None => true,
    };
    if existing.as_deref() == Some(contents) && mode_matches {
        debug!(path = %path.display(), "content unchanged, skipping write");
        return Ok(PersistOutcome::Unchanged);
    }

    let backup = match (&existing, options.backup) {
        (Some(_), true) => Some(backup_file(path)?),
        _ => None,
    };

    let mode = options.mode.or(existing_mode).unwrap_or(0o644);
    replace(path, contents, mode).map_err(|source| PersistError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), backup = ?backup, "wrote file");

    Ok(PersistOutcome::Written { backup })
}

fn replace(path: &Path, contents: &[u8], mode: u32) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.as_file()
        .set_permissions(fs::Permissions::from_mode(mode))?;
    temp.write_all(contents)?;
    temp.flush()?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|err| err.error)?;
    Ok(())
}

/// Copy `path` to `<path>.bak-<timestamp>` and return the backup path.
pub fn backup_file(path: &Path) -> Result<PathBuf, PersistError> {
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S").to_string();
    let backup = next_free_backup_path(path, &stamp);
    fs::copy(path, &backup).map_err(|source| PersistError::Backup {
        path: path.to_path_buf(),
        backup: backup.clone(),
        source,
    })?;
    Ok(backup)
}

fn next_free_backup_path(path: &Path, stamp: &str) -> PathBuf {
    let base = format!("{}.bak-{stamp}", path.display());
    let mut candidate = PathBuf::from(&base);
    let mut n = 1;
    while candidate.exists() {
        candidate = PathBuf::from(format!("{base}-{n}"));
        n += 1;
    }
    candidate
}
