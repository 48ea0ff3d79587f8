//! Prologix GPIB-Ethernet controller emulator.
//!
//! The daemon accepts TCP clients on the Prologix port and speaks the
//! controller's `++` command set. Every client shares one GPIB bus, built at
//! startup from [`prologix_config::Config`]: either an in-memory bench of
//! simulated instruments or a relay to a real controller upstream.
//!
//! Startup runs in a fixed order. Configuration is loaded and validated,
//! telemetry is installed, the bus backend is started, and only then does the
//! listener bind. Each stage reports through a [`HealthReporter`] so a failed
//! start is visible in the logs before the process exits.
//!
//! Bus access is serialised: a data line and the read that collects its
//! answer run as one transaction, so concurrent clients never see each
//! other's instrument traffic.

mod bootstrap;
mod bus;
mod dispatch;
mod health;
mod process;
mod telemetry;
mod transport;

pub use bootstrap::{
    BootstrapError, ConfigLoader, Daemon, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
};
pub use bus::{BusProvider, BusStartupError, SystemBusProvider, simulated_bench};
pub use dispatch::DispatchError;
pub use health::{HealthReporter, StructuredHealthReporter};
pub use process::{LaunchError, run_daemon};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
