//! Health reporter double that keeps every event for assertions.

use std::sync::Mutex;

use prologix_config::{BusKind, Config};

use crate::bootstrap::BootstrapError;
use crate::bus::BusStartupError;
use crate::health::HealthReporter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    BootstrapStarting,
    BootstrapSucceeded,
    BootstrapFailed(String),
    BusStarting(BusKind),
    BusReady { kind: BusKind, interface: String },
    BusFailed { kind: BusKind, message: String },
}

#[derive(Debug, Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    #[must_use]
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(HealthEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn bus_starting(&self, kind: BusKind) {
        self.record(HealthEvent::BusStarting(kind));
    }

    fn bus_ready(&self, kind: BusKind, interface: &str) {
        self.record(HealthEvent::BusReady {
            kind,
            interface: interface.to_owned(),
        });
    }

    fn bus_failed(&self, error: &BusStartupError) {
        self.record(HealthEvent::BusFailed {
            kind: error.kind,
            message: error.message().to_owned(),
        });
    }
}
