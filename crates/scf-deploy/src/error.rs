//! Error types for scf-deploy

use std::fmt;
use std::path::PathBuf;

use scf_deploy_sdk::ClientError;
use thiserror::Error;

/// Result type alias for fatal-error operations
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal errors. Any of these aborts the whole invocation.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Template not found: {}", .0.display())]
    TemplateNotFound(PathBuf),

    #[error("Invalid template '{}': {reason}", path.display())]
    TemplateInvalid { path: PathBuf, reason: String },

    #[error("Function file or path not found by CodeUri '{0}'")]
    CodePathNotFound(String),

    #[error("Unsupported CodeUri '{0}'")]
    UnsupportedCodeUri(String),

    #[error("Upload of '{key}' to COS bucket '{bucket}' failed: {source}")]
    Upload {
        bucket: String,
        key: String,
        #[source]
        source: ClientError,
    },

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Failed to walk code directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Packaging task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn template_invalid(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::TemplateInvalid {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// What a failed deploy call was made for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployErrorKind {
    Function,
    Trigger,
}

impl fmt::Display for DeployErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeployErrorKind::Function => f.write_str("function"),
            DeployErrorKind::Trigger => f.write_str("trigger"),
        }
    }
}

/// Non-fatal, per-item deploy failure recorded in the ledger
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Deploy {kind} failure. Error: {message}")]
pub struct DeployError {
    pub kind: DeployErrorKind,
    pub message: String,
    pub request_id: Option<String>,
}

impl DeployError {
    pub fn function(err: ClientError) -> Self {
        Self::from_client(DeployErrorKind::Function, err)
    }

    pub fn trigger(err: ClientError) -> Self {
        Self::from_client(DeployErrorKind::Trigger, err)
    }

    fn from_client(kind: DeployErrorKind, err: ClientError) -> Self {
        Self {
            kind,
            message: err.message,
            request_id: err.request_id,
        }
    }
}
