//! Enums used throughout the deployment driver
//!
//! This module contains the session phase, the synchronization strategy
//! and line terminator types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Phase of a deployment session. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Spawned,         // ssh child started, nothing read yet
    Authenticating,  // Waiting for the password prompt
    Settling,        // Credential sent, waiting for the remote shell
    SendingCommands, // Writing the command script
    Relaying,        // Copying remote output to stdout until EOF
    Terminated,      // Child reaped
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Spawned => "starting",
            Phase::Authenticating => "authenticating",
            Phase::Settling => "waiting for the shell prompt",
            Phase::SendingCommands => "sending commands",
            Phase::Relaying => "relaying output",
            Phase::Terminated => "finishing",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How the driver decides the remote shell is ready for the next line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    #[default]
    Prompt, // Read until a shell prompt marker shows up
    Timed,  // Fixed sleeps, output is not inspected
}

impl SyncMode {
    pub fn label(&self) -> &'static str {
        match self {
            SyncMode::Prompt => "prompt",
            SyncMode::Timed => "timed",
        }
    }
}

/// Terminator appended to a line written to the PTY
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Newline,        // Credential: "\n"
    CarriageReturn, // Commands: "\r", what the Enter key sends
}

impl LineEnding {
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            LineEnding::Newline => b"\n",
            LineEnding::CarriageReturn => b"\r",
        }
    }
}
