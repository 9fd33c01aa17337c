use std::path::PathBuf;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T, E = GenvError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum GenvError {
    #[error("Invalid download URL template '{template}': {reason}")]
    Template { template: String, reason: String },

    #[error("Version {version} of {tool} is not installed, please install it first")]
    NotInstalled { tool: String, version: String },

    #[error("Invalid version '{version}': {reason}")]
    InvalidVersion { version: String, reason: String },

    #[error("Lock {} is held by another process", path.display())]
    LockContention { path: PathBuf },

    #[error("The environment for {tool} has already been locked by this process")]
    LockAlreadyHeld { tool: String },

    #[error("Failed to download {version} from {url}: {source}")]
    Fetch {
        version: String,
        url: String,
        #[source]
        source: BoxError,
    },

    #[error("Failed to build {repo} at {reference} ({step}): {source}")]
    Build {
        repo: String,
        reference: String,
        step: String,
        #[source]
        source: BoxError,
    },

    #[error("Installer reported success for {version} but {} does not exist", path.display())]
    InstallIncomplete { version: String, path: PathBuf },

    #[error("{operation} was cancelled")]
    Cancelled { operation: String },

    #[error("Could not parse profile at {}: {source}", path.display())]
    Profile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl GenvError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        GenvError::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn cancelled(operation: impl Into<String>) -> Self {
        GenvError::Cancelled {
            operation: operation.into(),
        }
    }
}
