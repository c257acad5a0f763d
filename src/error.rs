//! Error taxonomy for SDK population.
//!
//! [`SdkError`] names the cause, [`PopulateError`] adds where in the
//! pipeline it happened and which packaging technology was in use.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::sdk::PackageType;

/// Result alias used throughout the library.
pub type SdkResult<T> = std::result::Result<T, SdkError>;

/// Underlying cause of a failed population step.
#[derive(Debug, Error)]
pub enum SdkError {
    /// Unrecognized or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Manifest file missing or malformed.
    #[error("manifest '{path}': {reason}", path = .path.display())]
    ManifestParse { path: PathBuf, reason: String },

    /// Index, configuration or database refresh step of a backend failed.
    #[error("{operation} failed: {detail}")]
    BackendTransaction {
        operation: &'static str,
        detail: String,
    },

    /// Installing a mandatory category failed.
    #[error("installing [{packages}] failed: {detail}")]
    Install { packages: String, detail: String },

    /// A hook command exited non-zero or could not be spawned.
    #[error("hook `{command}` failed (exit code {code}): {detail}")]
    HookExecution {
        command: String,
        code: i32,
        detail: String,
    },

    /// Filesystem operation failed.
    #[error("{action} '{path}': {source}", path = .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SdkError {
    /// Build a `map_err` adapter that attaches an action and a path to an io error.
    pub fn io(
        action: &'static str,
        path: impl Into<PathBuf>,
    ) -> impl FnOnce(std::io::Error) -> SdkError {
        let path = path.into();
        move |source| SdkError::Io {
            action,
            path,
            source,
        }
    }

    /// Shorthand for a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Shorthand for a backend transaction error.
    pub fn backend(operation: &'static str, detail: impl fmt::Display) -> Self {
        Self::BackendTransaction {
            operation,
            detail: detail.to_string(),
        }
    }
}

/// Pipeline phase a fatal error is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Output directory wipe/creation and adapter construction.
    Prepare,
    /// Target sysroot population.
    TargetInstall,
    /// Host/native sysroot population.
    HostInstall,
    /// Backend finalization and universal fixups.
    Finalize,
    /// Pre/post hook commands.
    Hook,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Prepare => write!(f, "prepare"),
            Phase::TargetInstall => write!(f, "target-install"),
            Phase::HostInstall => write!(f, "host-install"),
            Phase::Finalize => write!(f, "finalize"),
            Phase::Hook => write!(f, "hook"),
        }
    }
}

/// Fatal population error: the cause plus the phase and technology.
#[derive(Debug)]
pub struct PopulateError {
    pub phase: Phase,
    pub technology: Option<PackageType>,
    pub source: SdkError,
}

impl PopulateError {
    pub fn new(phase: Phase, technology: Option<PackageType>, source: SdkError) -> Self {
        Self {
            phase,
            technology,
            source,
        }
    }
}

impl fmt::Display for PopulateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.technology {
            Some(tech) => write!(f, "{} phase failed ({} backend): {}", self.phase, tech, self.source),
            None => write!(f, "{} phase failed: {}", self.phase, self.source),
        }
    }
}

impl std::error::Error for PopulateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Attach a phase to an [`SdkResult`].
pub(crate) trait PhaseExt<T> {
    fn in_phase(self, phase: Phase, technology: Option<PackageType>) -> Result<T, PopulateError>;
}

impl<T> PhaseExt<T> for SdkResult<T> {
    fn in_phase(self, phase: Phase, technology: Option<PackageType>) -> Result<T, PopulateError> {
        self.map_err(|source| PopulateError::new(phase, technology, source))
    }
}
