//! PTY (pseudo-terminal) handling for the ssh session.
//!
//! This module encapsulates all PTY-related functionality:
//! - `spawn`: ssh process spawning with PTY setup
//! - `stream`: reader thread delivering output as channel events
//! - `state`: prompt and marker matching over recent output
//! - `input`: line writing to the PTY

mod input;
mod spawn;
mod state;
mod stream;

pub use input::write_line;
pub use spawn::{spawn_session, RemoteChild, Session};
pub use state::{LineScanner, MatchBuffer, Utf8Decoder};
pub use stream::{OutputStream, StreamEvent};
