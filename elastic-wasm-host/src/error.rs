//! Fatal host errors
//!
//! Guest-caused problems inside a capability call are reported to the guest
//! as a `StatusCode` and never show up here. A `HostError` ends the run.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Lifecycle step a run failed in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Load,
    Compile,
    Instantiate,
    Invoke,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Load => "load",
            Self::Compile => "compile",
            Self::Instantiate => "instantiate",
            Self::Invoke => "invoke",
        };
        f.write_str(name)
    }
}

/// Errors that abort loading or running a guest module
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Failed to read guest binary {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Engine creation failed: {0}")]
    EngineCreation(#[source] anyhow::Error),

    #[error("Module compilation failed: {0}")]
    Compilation(#[source] anyhow::Error),

    #[error("Host function registration failed: {0}")]
    Registration(#[source] anyhow::Error),

    #[error("Instantiation failed: {0}")]
    Instantiation(#[source] anyhow::Error),

    #[error("Required export not found: {0}")]
    MissingExport(&'static str),

    #[error("Export '{name}' has an incompatible type: {source}")]
    IncompatibleExport {
        name: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("Guest call failed: {function} - {source}")]
    Invocation {
        function: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("Fuel exhausted (CPU limit exceeded)")]
    FuelExhausted,
}

impl HostError {
    /// Lifecycle step the error belongs to
    pub fn phase(&self) -> Phase {
        match self {
            Self::Load { .. } => Phase::Load,
            Self::EngineCreation(_) | Self::Compilation(_) => Phase::Compile,
            Self::Registration(_)
            | Self::Instantiation(_)
            | Self::MissingExport(_)
            | Self::IncompatibleExport { .. } => Phase::Instantiate,
            Self::Invocation { .. } | Self::FuelExhausted => Phase::Invoke,
        }
    }
}
