//! Data models for the deployment driver
//!
//! This module contains the core data structures:
//! - Command script loaded from config or the embedded default
//! - Enums for session phase and synchronization strategy

pub mod enums;
pub mod script;

// Re-exports for convenient access
pub use enums::{LineEnding, Phase, SyncMode};
pub use script::CommandScript;
