//! Error types for the integrity gate.
//!
//! Two families exist and they never mix:
//!
//! - [`IntegrityError`] is surfaced to the host, and only at startup
//!   (policy loading, validation, runtime construction).
//! - [`ProbeError`] never leaves a probe slot. The registry turns it into
//!   neutral evidence carrying `probe_error:<reason>`.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced to the host application.
#[derive(Debug, Error)]
pub enum IntegrityError {
    /// The policy is semantically invalid (thresholds, weights, probe list).
    #[error("Configuration error: {message}")]
    ConfigError {
        /// What is wrong with the configuration.
        message: String,
    },

    /// The policy file could not be read.
    #[error("Failed to read policy file {}: {source}", path.display())]
    PolicyIo {
        /// Location of the policy file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The policy document is not valid JSON for the expected schema.
    #[error("Failed to parse policy: {0}")]
    PolicyParse(#[from] serde_json::Error),

    /// The evaluation runtime could not be started.
    #[error("Runtime error: {message}")]
    RuntimeError {
        /// Error message.
        message: String,
    },
}

impl IntegrityError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Whether this error means the configuration itself was rejected.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::ConfigError { .. } | Self::PolicyIo { .. } | Self::PolicyParse(_)
        )
    }
}

/// Failures inside a single probe.
///
/// Every variant maps to a short, path-free reason code via
/// [`ProbeError::reason`].
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The probe did not finish within `probe_timeout_ms`.
    #[error("probe timed out")]
    Timeout,

    /// The probe panicked.
    #[error("probe panicked")]
    Panicked,

    /// An I/O operation failed in a way that says nothing about trust.
    #[error("probe I/O failure: {0:?}")]
    Io(io::ErrorKind),

    /// The artifact was created but the payload write failed.
    #[error("artifact payload write failed")]
    PartialWrite,

    /// The probe has no indicator source on this platform.
    #[error("probe unsupported on this platform")]
    Unsupported,

    /// Anything else.
    #[error("probe internal fault: {reason}")]
    Internal {
        /// Categorical reason; never a path or file content.
        reason: String,
    },
}

impl ProbeError {
    /// Reason code placed after `probe_error:` in evidence detail.
    #[must_use]
    pub fn reason(&self) -> String {
        match self {
            Self::Timeout => "timeout".into(),
            Self::Panicked => "panic".into(),
            Self::Io(kind) => format!("io_{}", io_kind_code(*kind)),
            Self::PartialWrite => "partial_write".into(),
            Self::Unsupported => "unsupported_platform".into(),
            Self::Internal { reason } => reason.clone(),
        }
    }
}

impl From<io::Error> for ProbeError {
    fn from(err: io::Error) -> Self {
        Self::Io(err.kind())
    }
}

fn io_kind_code(kind: io::ErrorKind) -> &'static str {
    match kind {
        io::ErrorKind::NotFound => "not_found",
        io::ErrorKind::PermissionDenied => "permission_denied",
        io::ErrorKind::AlreadyExists => "already_exists",
        io::ErrorKind::InvalidInput => "invalid_input",
        io::ErrorKind::TimedOut => "timed_out",
        io::ErrorKind::Interrupted => "interrupted",
        io::ErrorKind::WriteZero => "write_zero",
        io::ErrorKind::UnexpectedEof => "unexpected_eof",
        _ => "other",
    }
}
