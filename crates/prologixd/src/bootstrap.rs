//! Startup orchestration: configuration, telemetry and the shared bus.

use std::sync::Arc;

use ortho_config::OrthoError;
use thiserror::Error;

use gpib_bus::GpibBus;
use prologix_config::{Config, ConfigError};

use crate::bus::{BusProvider, BusStartupError};
use crate::health::HealthReporter;
use crate::telemetry::{self, TelemetryError, TelemetryHandle};

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the daemon configuration.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader that always yields the configuration it was built with.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps a fixed configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Configuration loaded but violates a constraint.
    #[error("invalid configuration: {source}")]
    InvalidConfiguration {
        /// Constraint that failed.
        #[source]
        source: ConfigError,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// The bus backend could not be started.
    #[error("failed to start the GPIB bus: {source}")]
    Bus {
        /// Backend failure.
        #[source]
        source: BusStartupError,
    },
}

/// Result of a successful bootstrap: configuration plus a live bus.
#[derive(Debug)]
pub struct Daemon {
    config: Config,
    bus: Arc<GpibBus>,
    telemetry: TelemetryHandle,
}

impl Daemon {
    /// Accessor for the resolved configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shared bus every client connection talks through.
    #[must_use]
    pub fn bus(&self) -> &Arc<GpibBus> {
        &self.bus
    }

    /// Accessor for the telemetry handle, primarily useful for testing.
    #[must_use]
    pub fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }
}

/// Bootstraps the daemon using the supplied collaborators.
///
/// # Errors
///
/// Returns [`BootstrapError`] for the first stage that fails; the reporter
/// has already been told about it.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
    provider: &dyn BusProvider,
) -> Result<Daemon, BootstrapError> {
    reporter.bootstrap_starting();
    let fail = |error: BootstrapError| {
        reporter.bootstrap_failed(&error);
        error
    };

    let config = loader
        .load()
        .map_err(|source| fail(BootstrapError::Configuration { source }))?;
    config
        .validate()
        .map_err(|source| fail(BootstrapError::InvalidConfiguration { source }))?;
    let telemetry = telemetry::initialise(&config)
        .map_err(|source| fail(BootstrapError::Telemetry { source }))?;

    let kind = config.bus();
    reporter.bus_starting(kind);
    let backend = match provider.start_bus(&config) {
        Ok(backend) => backend,
        Err(source) => {
            reporter.bus_failed(&source);
            return Err(fail(BootstrapError::Bus { source }));
        }
    };
    let bus = Arc::new(GpibBus::new(config.interface(), backend));
    reporter.bus_ready(kind, bus.interface());
    reporter.bootstrap_succeeded(&config);

    Ok(Daemon {
        config,
        bus,
        telemetry,
    })
}
