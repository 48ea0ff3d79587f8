//! Error types for command dispatch failures.
//!
//! Every variant renders as the text a client sees after `Error: `. Only
//! transport failures and oversized lines end the connection.

use std::io;

use thiserror::Error;

use gpib_bus::BusError;

/// Errors surfaced while serving a client.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The `++` command is not in the command table.
    #[error("Unknown command '++{command}'")]
    UnknownCommand { command: String },

    /// A command argument was missing, malformed or out of range.
    #[error("Invalid argument for ++{command}: {message}")]
    InvalidArgument { command: &'static str, message: String },

    /// The command needs an instrument but the client has none.
    #[error("No GPIB device addressed")]
    NotAddressed,

    /// The command exists only in Prologix device mode.
    #[error("++{command} is not supported in controller mode")]
    DeviceModeOnly { command: &'static str },

    /// A line exceeded the framing limit.
    #[error("line too long: {size} bytes exceeds {max_size} byte limit")]
    LineTooLong { size: usize, max_size: usize },

    /// Reading from or writing to the client failed.
    #[error("client I/O error: {0}")]
    Io(#[from] io::Error),

    /// The bus or instrument reported a failure.
    #[error("{0}")]
    Bus(#[from] BusError),
}

impl DispatchError {
    /// Whether the connection must close after reporting this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::LineTooLong { .. } | Self::Io(_))
    }

    /// Creates an unknown command error.
    pub fn unknown_command(command: impl Into<String>) -> Self {
        Self::UnknownCommand {
            command: command.into(),
        }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(command: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            command,
            message: message.into(),
        }
    }

    /// Creates a line too long error.
    pub fn line_too_long(size: usize, max_size: usize) -> Self {
        Self::LineTooLong { size, max_size }
    }
}
