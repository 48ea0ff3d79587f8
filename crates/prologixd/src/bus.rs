//! Construction of the GPIB backend selected by configuration.
//!
//! The daemon owns exactly one bus. A [`BusProvider`] turns the resolved
//! [`Config`] into the backend behind it: either the simulated bench or a
//! relay to an upstream Prologix controller.

use gpib_bus::{GpibAddress, GpibBackend, PrologixUpstream, SimulatedBackend};
use thiserror::Error;

use prologix_config::{BusKind, Config, InstrumentDirective};

const BUS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::bus");

/// Errors surfaced when the bus backend fails to start.
#[derive(Debug, Error)]
#[error("{kind} bus failed to start: {message}")]
pub struct BusStartupError {
    /// Backend that failed.
    pub kind: BusKind,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl BusStartupError {
    /// Builds an error without an underlying source.
    #[must_use]
    pub fn new(kind: BusKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Builds an error that wraps an underlying source.
    #[must_use]
    pub fn with_source(
        kind: BusKind,
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Human-readable message describing the failure.
    #[must_use]
    pub fn message(&self) -> &str {
        self.message.as_str()
    }
}

/// Trait implemented by types capable of starting the bus backend.
pub trait BusProvider {
    /// Starts the backend described by `config`.
    fn start_bus(&self, config: &Config) -> Result<Box<dyn GpibBackend>, BusStartupError>;
}

/// Provider used in production.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBusProvider;

impl BusProvider for SystemBusProvider {
    fn start_bus(&self, config: &Config) -> Result<Box<dyn GpibBackend>, BusStartupError> {
        match config.bus() {
            BusKind::Simulated => Ok(Box::new(simulated_bench(&config.instruments())?)),
            BusKind::Prologix => {
                let upstream = config.upstream().ok_or_else(|| {
                    BusStartupError::new(BusKind::Prologix, "no upstream controller configured")
                })?;
                let relay =
                    PrologixUpstream::connect(upstream.host(), upstream.port(), config.read_timeout())
                        .map_err(|error| {
                            BusStartupError::with_source(
                                BusKind::Prologix,
                                format!("cannot reach upstream controller {upstream}"),
                                error,
                            )
                        })?;
                Ok(Box::new(relay))
            }
        }
    }
}

/// Builds a simulated bench holding one instrument per directive.
///
/// # Errors
///
/// Returns [`BusStartupError`] when a directive names an invalid address.
pub fn simulated_bench(
    instruments: &[InstrumentDirective],
) -> Result<SimulatedBackend, BusStartupError> {
    let bench = SimulatedBackend::new();
    for directive in instruments {
        let address = GpibAddress::new(directive.primary, directive.secondary).map_err(|error| {
            BusStartupError::with_source(
                BusKind::Simulated,
                format!("invalid instrument '{directive}'"),
                error,
            )
        })?;
        tracing::debug!(
            target: BUS_TARGET,
            %address,
            identity = %directive.identity,
            "simulated instrument installed"
        );
        bench.add_instrument(address, directive.identity.clone());
    }
    Ok(bench)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn builtin_bench_holds_both_counters_and_meters() {
        let bench = simulated_bench(&prologix_config::default_instruments()).expect("bench");
        let addresses: Vec<String> = bench.addresses().iter().map(ToString::to_string).collect();
        assert_eq!(addresses, ["22", "23"]);
    }

    #[rstest]
    #[case(InstrumentDirective::new(31, None, "ACME"))]
    #[case(InstrumentDirective::new(5, Some(12), "ACME"))]
    fn rejects_out_of_range_instruments(#[case] directive: InstrumentDirective) {
        let error = simulated_bench(&[directive]).expect_err("invalid address");
        assert_eq!(error.kind, BusKind::Simulated);
    }

    #[rstest]
    fn prologix_bus_without_upstream_fails() {
        let config = Config {
            bus: BusKind::Prologix,
            upstream: None,
            ..Config::default()
        };
        let error = SystemBusProvider
            .start_bus(&config)
            .err()
            .expect("missing upstream");
        assert_eq!(error.kind, BusKind::Prologix);
    }
}
