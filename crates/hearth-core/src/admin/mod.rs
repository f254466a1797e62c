//! Administration surface: typed command verbs, read-only queries and the
//! handler that maps them onto orchestrator, topology and coordinator
//! operations.
//!
//! The core only defines the verbs and the handler; the HTTP/WebSocket
//! layer that carries them lives out of tree and registers its listener
//! handles with the shutdown coordinator via [`AdminListener`].

pub mod commands;
pub mod error;
pub mod handler;

pub use commands::{
    AdminCommand, AdminQuery, AdminResponse, DeviceSummary, SettingsSnapshot,
};
pub use error::AdminError;
pub use handler::{AdminHandler, AdminListener};

#[cfg(test)]
mod tests;
