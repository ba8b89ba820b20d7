use std::path::PathBuf;

use thiserror::Error;
use ufw_patch_core::{PatchError, PersistError};

use crate::runner::CommandError;

/// Everything that can stop a provisioning run.
///
/// None of these are retried. The host is left as it is, with backups of
/// any file that was already replaced.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// A required field is empty or malformed. Raised before any mutation.
    #[error("invalid input: {0}")]
    InputValidation(String),
    /// An external command could not be started or exited non-zero.
    #[error(transparent)]
    Command(#[from] CommandError),
    /// A rule block could not be placed in a firewall file.
    #[error("failed to patch {file}: {source}")]
    Patch { file: PathBuf, source: PatchError },
    #[error(transparent)]
    Persist(#[from] PersistError),
    /// A step reported success but its expected output is missing.
    #[error("expected {path} to exist after {step}, but it does not")]
    PostconditionMissing { step: String, path: PathBuf },
    #[error("could not detect the default network interface: {0}")]
    InterfaceUndetected(String),
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Settings(#[from] crate::settings::SettingsLoadError),
}

impl ProvisionError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InputValidation(msg.into())
    }
}
