//! Shared bus and per-address sessions.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::{debug, warn};

use crate::BUS_TARGET;
use crate::address::GpibAddress;
use crate::backend::{GpibBackend, ReadOutcome, ReadTermination};
use crate::error::BusError;

struct BusState {
    backend: Box<dyn GpibBackend>,
    sessions: HashMap<GpibAddress, usize>,
}

/// The single physical bus shared by every client connection.
///
/// All traffic funnels through one mutex so that a write and the read that
/// collects its answer can never interleave with another client's traffic.
/// A connection thread that panics mid-transaction does not take the bus down:
/// the next caller takes the lock over and carries on.
pub struct GpibBus {
    interface: String,
    backend_name: &'static str,
    state: Mutex<BusState>,
}

impl GpibBus {
    /// Wraps a backend as the bus for `interface` (for example `GPIB0`).
    #[must_use]
    pub fn new(interface: impl Into<String>, backend: Box<dyn GpibBackend>) -> Self {
        let backend_name = backend.name();
        Self {
            interface: interface.into(),
            backend_name,
            state: Mutex::new(BusState {
                backend,
                sessions: HashMap::new(),
            }),
        }
    }

    /// Interface name used in resource strings.
    #[must_use]
    pub fn interface(&self) -> &str {
        self.interface.as_str()
    }

    /// Name reported by the backend.
    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.backend_name
    }

    /// Resource name for `address` on this interface.
    #[must_use]
    pub fn resource_name(&self, address: GpibAddress) -> String {
        address.resource_name(&self.interface)
    }

    /// Acquires a session for `address`, opening the device on first use.
    ///
    /// # Errors
    ///
    /// Returns the backend's error when the device cannot be opened.
    pub fn open_session(self: &Arc<Self>, address: GpibAddress) -> Result<Session, BusError> {
        let mut state = self.lock();
        let count = state.sessions.get(&address).copied().unwrap_or(0);
        if count == 0 {
            state.backend.open(address)?;
            debug!(
                target: BUS_TARGET,
                resource = %self.resource_name(address),
                "opened GPIB session"
            );
        }
        state.sessions.insert(address, count + 1);
        Ok(Session {
            bus: Arc::clone(self),
            address,
        })
    }

    /// Number of live sessions for `address`.
    #[must_use]
    pub fn session_count(&self, address: GpibAddress) -> usize {
        self.lock().sessions.get(&address).copied().unwrap_or(0)
    }

    /// Runs `operation` with exclusive access to the backend.
    ///
    /// # Errors
    ///
    /// Propagates the operation's error.
    pub fn transaction<R>(
        &self,
        operation: impl FnOnce(&mut dyn GpibBackend) -> Result<R, BusError>,
    ) -> Result<R, BusError> {
        let mut state = self.lock();
        operation(state.backend.as_mut())
    }

    /// Reports whether any device asserts SRQ.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub fn service_request(&self) -> Result<bool, BusError> {
        self.transaction(|backend| backend.service_request())
    }

    /// Pulses Interface Clear.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub fn interface_clear(&self) -> Result<(), BusError> {
        self.transaction(|backend| backend.interface_clear())
    }

    /// Triggers every listed device in one bus operation.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub fn trigger(&self, addresses: &[GpibAddress]) -> Result<(), BusError> {
        self.transaction(|backend| backend.trigger(addresses))
    }

    /// Serial polls a device that need not have a session.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub fn serial_poll(&self, address: GpibAddress, timeout: Duration) -> Result<u8, BusError> {
        self.transaction(|backend| backend.serial_poll(address, timeout))
    }

    fn release(&self, address: GpibAddress) {
        let mut state = self.lock();
        let remaining = match state.sessions.get_mut(&address) {
            Some(count) => {
                *count = count.saturating_sub(1);
                *count
            }
            None => return,
        };
        if remaining == 0 {
            state.sessions.remove(&address);
            state.backend.close(address);
            debug!(
                target: BUS_TARGET,
                resource = %self.resource_name(address),
                "closed GPIB session"
            );
        }
    }

    fn lock(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!(
                target: BUS_TARGET,
                interface = %self.interface,
                "recovering bus after a panic during a transaction"
            );
            self.state.clear_poison();
            poisoned.into_inner()
        })
    }
}

impl fmt::Debug for GpibBus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("GpibBus")
            .field("interface", &self.interface)
            .field("backend", &self.backend_name)
            .finish_non_exhaustive()
    }
}

/// A lease on one device address. Dropping it releases the lease.
#[derive(Debug)]
pub struct Session {
    bus: Arc<GpibBus>,
    address: GpibAddress,
}

impl Session {
    /// Address this session talks to.
    #[must_use]
    pub fn address(&self) -> GpibAddress {
        self.address
    }

    /// Resource name of the device.
    #[must_use]
    pub fn resource_name(&self) -> String {
        self.bus.resource_name(self.address)
    }

    /// Writes `data` in one bus transaction.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub fn write(&self, data: &[u8], eoi: bool, timeout: Duration) -> Result<(), BusError> {
        let address = self.address;
        self.bus
            .transaction(|backend| backend.write(address, data, eoi, timeout))
    }

    /// Reads a response in one bus transaction.
    ///
    /// # Errors
    ///
    /// Propagates backend failures, including timeouts.
    pub fn read(
        &self,
        termination: ReadTermination,
        timeout: Duration,
    ) -> Result<ReadOutcome, BusError> {
        let address = self.address;
        self.bus
            .transaction(|backend| backend.read(address, termination, timeout))
    }

    /// Writes `data` and reads the response without releasing the bus between
    /// the two.
    ///
    /// # Errors
    ///
    /// Propagates backend failures from either half.
    pub fn query(
        &self,
        data: &[u8],
        eoi: bool,
        termination: ReadTermination,
        timeout: Duration,
    ) -> Result<ReadOutcome, BusError> {
        let address = self.address;
        self.bus.transaction(|backend| {
            backend.write(address, data, eoi, timeout)?;
            backend.read(address, termination, timeout)
        })
    }

    /// Sends Selected Device Clear.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub fn clear(&self) -> Result<(), BusError> {
        let address = self.address;
        self.bus.transaction(|backend| backend.clear(address))
    }

    /// Triggers this device.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub fn trigger(&self) -> Result<(), BusError> {
        self.bus.trigger(&[self.address])
    }

    /// Serial polls this device.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub fn serial_poll(&self, timeout: Duration) -> Result<u8, BusError> {
        self.bus.serial_poll(self.address, timeout)
    }

    /// Returns the device to front-panel control.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub fn go_to_local(&self) -> Result<(), BusError> {
        let address = self.address;
        self.bus.transaction(|backend| backend.go_to_local(address))
    }

    /// Disables the device's front-panel controls.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub fn local_lockout(&self) -> Result<(), BusError> {
        let address = self.address;
        self.bus
            .transaction(|backend| backend.local_lockout(address))
    }

    /// The bus this session belongs to.
    #[must_use]
    pub fn bus(&self) -> &Arc<GpibBus> {
        &self.bus
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.bus.release(self.address);
    }
}
