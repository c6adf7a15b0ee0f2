//! Unified error type for summary generation.

use std::path::PathBuf;

use thiserror::Error;

/// Phase of an update run, named in user-visible errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Cache,
    Generate,
    Index,
    Sign,
    Install,
    Gc,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Cache => "cache",
            Phase::Generate => "generate",
            Phase::Index => "index",
            Phase::Sign => "sign",
            Phase::Install => "install",
            Phase::Gc => "gc",
        };
        f.write_str(name)
    }
}

/// All errors that can occur while updating repository summaries.
#[derive(Error, Debug)]
pub enum SummaryError {
    /// I/O error without a more specific path (plumbing-level).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// I/O error on a specific repository file.
    #[error("I/O error on {path}: {source}")]
    IoPath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A loaded commit, summary, index, or diff failed a structural check.
    #[error("invalid {what}: {reason}")]
    InvalidFrame { what: String, reason: String },

    /// A referenced object is not present in the object store.
    #[error("missing object {checksum}")]
    MissingObject { checksum: String },

    /// The signing provider failed; the index is not installed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// The run was cancelled; no further writes were made.
    #[error("operation cancelled")]
    Cancelled,

    /// A failure tagged with the update phase it happened in.
    #[error("{phase}: {source}")]
    InPhase {
        phase: Phase,
        #[source]
        source: Box<SummaryError>,
    },
}

impl SummaryError {
    pub fn invalid(what: impl Into<String>, reason: impl Into<String>) -> Self {
        SummaryError::InvalidFrame {
            what: what.into(),
            reason: reason.into(),
        }
    }

    pub fn io_path(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SummaryError::IoPath {
            path: path.into(),
            source,
        }
    }

    /// Wrap the error with the update phase it occurred in. Cancellation is
    /// left untagged so callers can always match on it directly.
    pub fn in_phase(self, phase: Phase) -> Self {
        match self {
            SummaryError::Cancelled => SummaryError::Cancelled,
            other => SummaryError::InPhase {
                phase,
                source: Box::new(other),
            },
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, SummaryError::Cancelled)
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, SummaryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_path_display() {
        let err = SummaryError::io_path(
            "/repo/summary.idx",
            std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
        );
        let msg = err.to_string();
        assert!(msg.contains("/repo/summary.idx"));
        assert!(msg.contains("file not found"));
    }

    #[test]
    fn test_phase_tagging() {
        let err = SummaryError::invalid("summary", "truncated ref map").in_phase(Phase::Generate);
        let msg = err.to_string();
        assert!(msg.starts_with("generate:"), "got: {}", msg);
        assert!(format!("{:?}", err).contains("truncated ref map"));
    }

    #[test]
    fn test_cancelled_is_never_phase_tagged() {
        let err = SummaryError::Cancelled.in_phase(Phase::Gc);
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_io_error_from_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: SummaryError = io_err.into();
        assert!(matches!(err, SummaryError::Io(_)));
    }
}
