//! Lifecycle events surfaced to operators through `tracing`.

use std::sync::Arc;

use prologix_config::{BusKind, Config};

use crate::bootstrap::BootstrapError;
use crate::bus::BusStartupError;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer notified as the daemon starts its configuration and bus.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked before the bus backend is started.
    fn bus_starting(&self, kind: BusKind);

    /// Invoked once the bus backend is ready for sessions.
    fn bus_ready(&self, kind: BusKind, interface: &str);

    /// Invoked when the bus backend fails to start.
    fn bus_failed(&self, error: &BusStartupError);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn bus_starting(&self, kind: BusKind) {
        (**self).bus_starting(kind);
    }

    fn bus_ready(&self, kind: BusKind, interface: &str) {
        (**self).bus_ready(kind, interface);
    }

    fn bus_failed(&self, error: &BusStartupError) {
        (**self).bus_failed(error);
    }
}

/// Reporter that writes each event as a structured log record.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting emulator bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            listen = %config.listen(),
            bus = %config.bus(),
            read_timeout_ms = config.read_timeout_ms,
            log_filter = %config.log_filter(),
            log_format = %config.log_format(),
            "emulator bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "emulator bootstrap failed"
        );
    }

    fn bus_starting(&self, kind: BusKind) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bus_starting",
            bus = %kind,
            "starting GPIB bus"
        );
    }

    fn bus_ready(&self, kind: BusKind, interface: &str) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bus_ready",
            bus = %kind,
            interface,
            "GPIB bus ready"
        );
    }

    fn bus_failed(&self, error: &BusStartupError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bus_failed",
            bus = %error.kind,
            message = %error.message(),
            error = ?error,
            "GPIB bus failed to start"
        );
    }
}
