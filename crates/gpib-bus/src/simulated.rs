//! In-memory bench of instruments for running without hardware.
//!
//! Each instrument keeps an output queue, a status byte and a transcript of
//! the most recent messages written to it. A new message discards any reply
//! still waiting to be read, as an interrupted query does on a real bus. Clones
//! share the same bench, so a test can keep a
//! handle for inspection after boxing another clone into a [`crate::GpibBus`].

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::trace;

use crate::BUS_TARGET;
use crate::address::GpibAddress;
use crate::backend::{GpibBackend, ReadOutcome, ReadTermination};
use crate::error::BusError;

/// Status byte bit reporting a pending service request.
pub const RQS_BIT: u8 = 0x40;

/// Number of messages each instrument keeps in its transcript.
pub const TRANSCRIPT_LIMIT: usize = 256;

const SCPI_NO_ERROR: &str = "+0,\"No error\"";
const HP_NO_ERROR: &str = "0,\"NO ERROR\"";

/// Front-panel state of a simulated instrument.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RemoteState {
    /// Front panel active.
    #[default]
    Local,
    /// Addressed by the controller.
    Remote,
    /// Remote with the front panel locked out.
    Lockout,
}

#[derive(Debug, Default)]
struct Instrument {
    identity: String,
    output: VecDeque<u8>,
    status_byte: u8,
    writes: VecDeque<Vec<u8>>,
    remote: RemoteState,
    triggers: usize,
    open: bool,
}

impl Instrument {
    fn new(identity: String) -> Self {
        Self {
            identity,
            ..Self::default()
        }
    }

    fn accept(&mut self, data: &[u8]) {
        if self.writes.len() == TRANSCRIPT_LIMIT {
            self.writes.pop_front();
        }
        self.writes.push_back(data.to_vec());
        if !self.output.is_empty() {
            trace!(target: BUS_TARGET, bytes = self.output.len(), "unread reply discarded");
            self.output.clear();
        }
        if self.remote == RemoteState::Local {
            self.remote = RemoteState::Remote;
        }
        let text = String::from_utf8_lossy(data);
        let message = text.trim_end_matches(['\r', '\n']).trim();
        if let Some(response) = self.respond(message) {
            self.output.extend(response.as_bytes());
            self.output.push_back(b'\n');
        }
    }

    fn respond(&mut self, message: &str) -> Option<String> {
        let command = message.to_ascii_uppercase();
        match command.as_str() {
            "*IDN?" | "ID?" => Some(self.identity.clone()),
            "*STB?" => Some(self.status_byte.to_string()),
            ":SYST:ERR?" | "SYST:ERR?" | ":SYSTEM:ERROR?" | "SYSTEM:ERROR?" => {
                Some(SCPI_NO_ERROR.to_owned())
            }
            "ERRSTR?" => Some(HP_NO_ERROR.to_owned()),
            "*CLS" => {
                self.status_byte = 0;
                None
            }
            "*TRG" => {
                self.triggers += 1;
                None
            }
            _ if command.contains('?') => Some(message.to_owned()),
            _ => None,
        }
    }

    fn take_output(&mut self, termination: ReadTermination) -> Vec<u8> {
        match termination {
            ReadTermination::Char(stop) => {
                let end = self
                    .output
                    .iter()
                    .position(|byte| *byte == stop)
                    .map_or(self.output.len(), |index| index + 1);
                self.output.drain(..end).collect()
            }
            ReadTermination::Eoi | ReadTermination::Timeout => self.output.drain(..).collect(),
        }
    }
}

#[derive(Debug, Default)]
struct Bench {
    instruments: BTreeMap<GpibAddress, Instrument>,
    interface_clears: usize,
}

/// Backend serving a bench of simulated instruments.
#[derive(Debug, Clone, Default)]
pub struct SimulatedBackend {
    bench: Arc<Mutex<Bench>>,
}

impl SimulatedBackend {
    /// Creates an empty bench.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an instrument answering `*IDN?` with `identity`.
    #[must_use]
    pub fn with_instrument(self, address: GpibAddress, identity: impl Into<String>) -> Self {
        self.add_instrument(address, identity);
        self
    }

    /// Adds or replaces an instrument.
    pub fn add_instrument(&self, address: GpibAddress, identity: impl Into<String>) {
        self.bench()
            .instruments
            .insert(address, Instrument::new(identity.into()));
    }

    /// Addresses of every instrument on the bench.
    #[must_use]
    pub fn addresses(&self) -> Vec<GpibAddress> {
        self.bench().instruments.keys().copied().collect()
    }

    /// Sets the status byte of an instrument, which asserts SRQ when
    /// [`RQS_BIT`] is set.
    pub fn set_status_byte(&self, address: GpibAddress, status: u8) {
        if let Some(instrument) = self.bench().instruments.get_mut(&address) {
            instrument.status_byte = status;
        }
    }

    /// The last [`TRANSCRIPT_LIMIT`] messages written to `address`, oldest
    /// first.
    #[must_use]
    pub fn writes(&self, address: GpibAddress) -> Vec<Vec<u8>> {
        self.bench()
            .instruments
            .get(&address)
            .map(|instrument| instrument.writes.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether a session currently holds `address` open.
    #[must_use]
    pub fn is_open(&self, address: GpibAddress) -> bool {
        self.bench()
            .instruments
            .get(&address)
            .is_some_and(|instrument| instrument.open)
    }

    /// Front-panel state of `address`.
    #[must_use]
    pub fn remote_state(&self, address: GpibAddress) -> Option<RemoteState> {
        self.bench()
            .instruments
            .get(&address)
            .map(|instrument| instrument.remote)
    }

    /// Number of triggers `address` has received.
    #[must_use]
    pub fn trigger_count(&self, address: GpibAddress) -> usize {
        self.bench()
            .instruments
            .get(&address)
            .map_or(0, |instrument| instrument.triggers)
    }

    /// Number of Interface Clear pulses seen.
    #[must_use]
    pub fn interface_clear_count(&self) -> usize {
        self.bench().interface_clears
    }

    fn bench(&self) -> MutexGuard<'_, Bench> {
        // The bench holds plain data, so a poisoned guard is still usable.
        self.bench
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn with_device<R>(
        &self,
        address: GpibAddress,
        action: impl FnOnce(&mut Instrument) -> Result<R, BusError>,
    ) -> Result<R, BusError> {
        let mut bench = self.bench();
        let instrument = bench
            .instruments
            .get_mut(&address)
            .ok_or(BusError::NoDevice { address })?;
        action(instrument)
    }
}

impl GpibBackend for SimulatedBackend {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn open(&mut self, address: GpibAddress) -> Result<(), BusError> {
        self.with_device(address, |instrument| {
            instrument.open = true;
            Ok(())
        })
    }

    fn close(&mut self, address: GpibAddress) {
        if let Some(instrument) = self.bench().instruments.get_mut(&address) {
            instrument.open = false;
        }
    }

    fn write(
        &mut self,
        address: GpibAddress,
        data: &[u8],
        _eoi: bool,
        _timeout: Duration,
    ) -> Result<(), BusError> {
        trace!(target: BUS_TARGET, %address, bytes = data.len(), "simulated write");
        self.with_device(address, |instrument| {
            instrument.accept(data);
            Ok(())
        })
    }

    fn read(
        &mut self,
        address: GpibAddress,
        termination: ReadTermination,
        timeout: Duration,
    ) -> Result<ReadOutcome, BusError> {
        self.with_device(address, |instrument| {
            if instrument.output.is_empty() {
                return Err(BusError::Timeout { address, timeout });
            }
            let data = instrument.take_output(termination);
            let eoi = instrument.output.is_empty();
            Ok(ReadOutcome::new(data, eoi))
        })
    }

    fn clear(&mut self, address: GpibAddress) -> Result<(), BusError> {
        self.with_device(address, |instrument| {
            instrument.output.clear();
            instrument.status_byte = 0;
            Ok(())
        })
    }

    fn trigger(&mut self, addresses: &[GpibAddress]) -> Result<(), BusError> {
        for address in addresses {
            self.with_device(*address, |instrument| {
                instrument.triggers += 1;
                Ok(())
            })?;
        }
        Ok(())
    }

    fn serial_poll(&mut self, address: GpibAddress, _timeout: Duration) -> Result<u8, BusError> {
        self.with_device(address, |instrument| {
            let status = instrument.status_byte;
            instrument.status_byte &= !RQS_BIT;
            Ok(status)
        })
    }

    fn service_request(&mut self) -> Result<bool, BusError> {
        Ok(self
            .bench()
            .instruments
            .values()
            .any(|instrument| instrument.status_byte & RQS_BIT != 0))
    }

    fn interface_clear(&mut self) -> Result<(), BusError> {
        self.bench().interface_clears += 1;
        Ok(())
    }

    fn go_to_local(&mut self, address: GpibAddress) -> Result<(), BusError> {
        self.with_device(address, |instrument| {
            instrument.remote = RemoteState::Local;
            Ok(())
        })
    }

    fn local_lockout(&mut self, address: GpibAddress) -> Result<(), BusError> {
        self.with_device(address, |instrument| {
            instrument.remote = RemoteState::Lockout;
            Ok(())
        })
    }
}
