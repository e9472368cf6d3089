//! Error taxonomy shared by the chunking, ranking, sync and cache layers.
//!
//! Library functions return [`Result<T>`]; the `fctx` binary wraps these in
//! `anyhow` for reporting.

use std::path::Path;

use thiserror::Error;

/// Errors produced by the retrieval core.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed query, parameters, manifest shape or selection source.
    #[error("validation error: {0}")]
    Validation(String),

    /// No explicit documents were supplied and no usable cached corpus exists.
    #[error("documents required: no cached documents for entity '{entity}' (profile '{profile}'); run `fctx sync {entity} --profile {profile}` or pass --doc")]
    DocumentsRequired { entity: String, profile: String },

    /// Missing local file, cached document, or filing absent from a provider.
    #[error("not found: {0}")]
    NotFound(String),

    /// Persisted or fetched content that could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// Transport failure talking to a remote collaborator.
    #[error("http error: {0}")]
    Http(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for the retrieval core.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Error::Parse(msg.into())
    }

    /// True for conditions the sync orchestrator may skip over.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Map an I/O error on `path`, turning `ENOENT` into [`Error::NotFound`].
    pub fn from_io(err: std::io::Error, path: &Path) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Error::NotFound(format!("file does not exist: {}", path.display()))
        } else {
            Error::Io(err)
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Http(err.to_string())
    }
}

/// Convenience for building a `NotFound` from a path.
pub(crate) fn missing_path(path: &Path) -> Error {
    Error::NotFound(format!("file does not exist: {}", path.display()))
}

