//! Launch sequencing: bootstrap, bind, serve, stop.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

use gpib_bus::GpibAddress;
use prologix_config::Config;

use crate::bootstrap::{ConfigLoader, Daemon, SystemConfigLoader, bootstrap_with};
use crate::bus::{BusProvider, SystemBusProvider};
use crate::dispatch::{ClientDefaults, DispatchConnectionHandler};
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::transport::{ListenerHandle, SocketListener};

use super::PROCESS_TARGET;
use super::errors::LaunchError;
use super::shutdown::{ShutdownSignal, SystemShutdownSignal};

/// Collaborators needed to launch the emulator.
pub(crate) struct LaunchPlan<L, P, S> {
    pub(crate) loader: L,
    pub(crate) reporter: Arc<dyn HealthReporter>,
    pub(crate) provider: P,
    pub(crate) shutdown: S,
}

/// A bootstrapped emulator accepting clients.
pub(crate) struct Runtime {
    daemon: Daemon,
    local_addr: SocketAddr,
    listener: ListenerHandle,
}

impl Runtime {
    /// Bootstraps the daemon and starts accepting clients.
    pub(crate) fn start(
        loader: &dyn ConfigLoader,
        reporter: Arc<dyn HealthReporter>,
        provider: &dyn BusProvider,
    ) -> Result<Self, LaunchError> {
        let daemon = bootstrap_with(loader, reporter, provider)?;
        let defaults = client_defaults(daemon.config());
        let listener = SocketListener::bind(daemon.config().listen())?;
        let local_addr = listener.local_addr();
        let handler = Arc::new(DispatchConnectionHandler::new(
            Arc::clone(daemon.bus()),
            defaults,
        ));
        let listener = listener.start(handler)?;
        info!(
            target: PROCESS_TARGET,
            %local_addr,
            bus = daemon.bus().backend_name(),
            "emulator accepting clients"
        );
        Ok(Self {
            daemon,
            local_addr,
            listener,
        })
    }

    /// Address the listener is bound to.
    pub(crate) fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    #[cfg(test)]
    pub(crate) fn daemon(&self) -> &Daemon {
        &self.daemon
    }

    /// Blocks on `shutdown`, then stops accepting clients.
    pub(crate) fn run_until(self, shutdown: &dyn ShutdownSignal) -> Result<(), LaunchError> {
        let waited = shutdown.wait();
        self.stop()?;
        waited.map_err(LaunchError::from)
    }

    /// Stops accepting clients and waits for the acceptor to exit.
    pub(crate) fn stop(self) -> Result<(), LaunchError> {
        self.listener.shutdown();
        self.listener.join()?;
        info!(
            target: PROCESS_TARGET,
            bus = self.daemon.bus().backend_name(),
            interface = self.daemon.bus().interface(),
            "shutdown sequence completed"
        );
        Ok(())
    }
}

/// Bootstrap has already validated the default address range.
fn client_defaults(config: &Config) -> ClientDefaults {
    ClientDefaults {
        read_timeout: config.read_timeout(),
        address: config
            .default_address()
            .and_then(|value| GpibAddress::primary(value).ok()),
    }
}

/// Runs the emulator with production collaborators until a termination
/// signal arrives.
///
/// # Errors
///
/// Returns [`LaunchError`] when bootstrap, binding or signal handling fails.
pub fn run_daemon() -> Result<(), LaunchError> {
    run_daemon_with(LaunchPlan {
        loader: SystemConfigLoader,
        reporter: Arc::new(StructuredHealthReporter::new()),
        provider: SystemBusProvider,
        shutdown: SystemShutdownSignal,
    })
}

/// Runs the emulator with injected collaborators.
pub(crate) fn run_daemon_with<L, P, S>(plan: LaunchPlan<L, P, S>) -> Result<(), LaunchError>
where
    L: ConfigLoader,
    P: BusProvider,
    S: ShutdownSignal,
{
    let LaunchPlan {
        loader,
        reporter,
        provider,
        shutdown,
    } = plan;
    Runtime::start(&loader, reporter, &provider)?.run_until(&shutdown)
}
