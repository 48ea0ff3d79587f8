use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::address::GpibAddress;

/// Failures surfaced by a [`crate::GpibBackend`] or the shared bus.
#[derive(Debug, Error)]
pub enum BusError {
    /// Nothing answered at the address.
    #[error("no device at GPIB address {address}")]
    NoDevice { address: GpibAddress },
    /// The device did not respond before the deadline.
    #[error("timed out after {} ms waiting for GPIB address {address}", timeout.as_millis())]
    Timeout {
        address: GpibAddress,
        timeout: Duration,
    },
    /// The backend cannot perform the operation.
    #[error("{operation} is not supported by the {backend} bus")]
    Unsupported {
        backend: &'static str,
        operation: &'static str,
    },
    /// The upstream controller answered with something unexpected.
    #[error("upstream protocol error: {message}")]
    Protocol { message: String },
    /// Transport failure talking to the hardware.
    #[error("bus I/O failed: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl BusError {
    /// Convenience constructor for [`BusError::Protocol`].
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Whether the error reflects a device that stayed silent.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
