// Error types shared by the library modules.
// - `ConfigError` covers everything that can go wrong before the first
//   network call and is fatal for the process.
// - `GraphUploadError` covers authentication, Graph calls and local I/O
//   during the upload run; `app::run` reports these without crashing.

use reqwest::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

/// Failure to assemble the settings needed to talk to Graph.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required key is absent, not a scalar, or blank.
    #[error("Missing configuration value '{0}'.")]
    MissingSetting(String),

    /// The required base settings file does not exist.
    #[error("The configuration file '{}' was not found.", .0.display())]
    MissingFile(PathBuf),

    #[error("Failed to read configuration file '{}'", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration file '{}'", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Failure while authenticating or calling the document graph.
#[derive(Error, Debug)]
pub enum GraphUploadError {
    /// The identity endpoint refused the client credentials.
    #[error("Authentication failed ({status}): {message}")]
    Authentication { status: StatusCode, message: String },

    /// Graph answered with a non-success status.
    #[error("{message}")]
    Service {
        status: StatusCode,
        code: Option<String>,
        message: String,
    },

    /// Transport level failure (DNS, TLS, connection reset, ...).
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GraphUploadError {
    /// True for faults reported by the Graph service itself.
    pub fn is_service(&self) -> bool {
        matches!(self, GraphUploadError::Service { .. })
    }

    /// HTTP status attached to the error, when the remote side answered.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            GraphUploadError::Authentication { status, .. }
            | GraphUploadError::Service { status, .. } => Some(*status),
            GraphUploadError::Request(e) => e.status(),
            _ => None,
        }
    }
}

/// Result alias for the upload run.
pub type Result<T> = std::result::Result<T, GraphUploadError>;
