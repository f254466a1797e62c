use thiserror::Error;

/// Errors specific to the administration surface.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error("Unknown admin command '{0}'")]
    UnknownCommand(String),

    #[error("Unknown admin query '{0}'")]
    UnknownQuery(String),

    #[error("Invalid payload for '{command}': {message}")]
    InvalidPayload { command: String, message: String },

    #[error("Command '{command}' rejected: {reason}")]
    Rejected { command: String, reason: String },
}
