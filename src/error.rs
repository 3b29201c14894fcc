//! Error taxonomy for a deployment run.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::models::Phase;

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("failed to start ssh session: {0}")]
    Spawn(String),

    #[error("pty I/O error while {phase}: {source}")]
    Io {
        phase: Phase,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out after {waited:?} while {phase}")]
    Timeout { phase: Phase, waited: Duration },

    #[error("remote host asked for the password again; credential was rejected")]
    AuthRejected,

    #[error("connection closed while {phase}")]
    ConnectionClosed { phase: Phase },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to parse config file {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl DeployError {
    pub fn io(phase: Phase, source: std::io::Error) -> Self {
        DeployError::Io { phase, source }
    }
}

pub type Result<T> = std::result::Result<T, DeployError>;
