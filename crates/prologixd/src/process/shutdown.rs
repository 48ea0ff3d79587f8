//! Blocking wait for the operator to stop the emulator.

use std::io;

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use thiserror::Error;
use tracing::info;

use super::PROCESS_TARGET;

const TERMINATION_SIGNALS: [i32; 4] = [SIGTERM, SIGINT, SIGQUIT, SIGHUP];

/// Something the launcher can block on until shutdown should begin.
#[cfg_attr(test, mockall::automock)]
pub trait ShutdownSignal: Send + Sync {
    /// Blocks until shutdown should proceed.
    fn wait(&self) -> Result<(), ShutdownError>;
}

/// Failures waiting for a termination signal.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Registering the signal handlers was refused.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Error reported by `signal-hook`.
        #[source]
        source: io::Error,
    },
}

/// Waits for the first termination signal delivered to the process.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemShutdownSignal;

impl ShutdownSignal for SystemShutdownSignal {
    fn wait(&self) -> Result<(), ShutdownError> {
        let mut signals =
            Signals::new(TERMINATION_SIGNALS).map_err(|source| ShutdownError::Install { source })?;
        let received = signals.forever().next();
        info!(target: PROCESS_TARGET, signal = ?received, "stopping on signal");
        Ok(())
    }
}
