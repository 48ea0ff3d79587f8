//! Bus provider double: builds the simulated bench from configuration, keeps
//! a handle to it and can be told to fail.

use std::sync::{Arc, Mutex};

use gpib_bus::{GpibBackend, SimulatedBackend};
use prologix_config::{BusKind, Config};

use crate::bus::{BusProvider, BusStartupError, simulated_bench};

#[derive(Clone, Default)]
pub struct RecordingBusProvider {
    state: Arc<Mutex<ProviderState>>,
}

#[derive(Default)]
struct ProviderState {
    starts: Vec<BusKind>,
    failure: Option<String>,
    bench: Option<SimulatedBackend>,
}

impl RecordingBusProvider {
    pub fn fail_with(&self, message: impl Into<String>) {
        self.state.lock().expect("provider mutex poisoned").failure = Some(message.into());
    }

    #[must_use]
    pub fn recorded_starts(&self) -> Vec<BusKind> {
        self.state
            .lock()
            .expect("provider mutex poisoned")
            .starts
            .clone()
    }

    /// Bench handed to the most recent bus.
    #[must_use]
    pub fn bench(&self) -> SimulatedBackend {
        self.state
            .lock()
            .expect("provider mutex poisoned")
            .bench
            .clone()
            .expect("bus was started")
    }
}

impl BusProvider for RecordingBusProvider {
    fn start_bus(&self, config: &Config) -> Result<Box<dyn GpibBackend>, BusStartupError> {
        let mut state = self.state.lock().expect("provider mutex poisoned");
        state.starts.push(config.bus());
        if let Some(message) = state.failure.clone() {
            return Err(BusStartupError::new(config.bus(), message));
        }
        let bench = simulated_bench(&config.instruments())?;
        state.bench = Some(bench.clone());
        Ok(Box::new(bench))
    }
}
