//! Per-client Prologix state and the bus operations it drives.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use gpib_bus::{GpibAddress, GpibBus, ReadOutcome, ReadTermination, Session};

use super::DISPATCH_TARGET;
use super::errors::DispatchError;

/// Terminator appended to instrument data, selected with `++eos`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum Eos {
    #[default]
    CrLf,
    Cr,
    Lf,
    None,
}

impl Eos {
    pub(crate) fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::CrLf),
            1 => Some(Self::Cr),
            2 => Some(Self::Lf),
            3 => Some(Self::None),
            _ => None,
        }
    }

    pub(crate) fn code(self) -> u8 {
        match self {
            Self::CrLf => 0,
            Self::Cr => 1,
            Self::Lf => 2,
            Self::None => 3,
        }
    }

    pub(crate) fn terminator(self) -> &'static [u8] {
        match self {
            Self::CrLf => b"\r\n",
            Self::Cr => b"\r",
            Self::Lf => b"\n",
            Self::None => b"",
        }
    }
}

/// Values a client starts with and returns to on `++rst`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ClientDefaults {
    pub(crate) read_timeout: Duration,
    pub(crate) address: Option<GpibAddress>,
}

/// Prologix settings kept per connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ClientSettings {
    pub(crate) auto_read: bool,
    pub(crate) eoi: bool,
    pub(crate) eos: Eos,
    pub(crate) eot_enable: bool,
    pub(crate) eot_char: u8,
    pub(crate) read_timeout: Duration,
    pub(crate) savecfg: bool,
}

impl ClientSettings {
    fn with_timeout(read_timeout: Duration) -> Self {
        Self {
            auto_read: false,
            eoi: true,
            eos: Eos::CrLf,
            eot_enable: false,
            eot_char: b'\n',
            read_timeout,
            savecfg: true,
        }
    }
}

/// One TCP client: its settings and at most one active session.
pub(crate) struct ClientConnection {
    bus: Arc<GpibBus>,
    defaults: ClientDefaults,
    pub(crate) settings: ClientSettings,
    session: Option<Session>,
}

impl ClientConnection {
    /// Builds a client, opening the default address when one is configured.
    ///
    /// A default address with no device behind it leaves the client
    /// unaddressed rather than refusing the connection.
    pub(crate) fn new(bus: Arc<GpibBus>, defaults: ClientDefaults) -> Self {
        let mut client = Self {
            bus,
            defaults,
            settings: ClientSettings::with_timeout(defaults.read_timeout),
            session: None,
        };
        client.open_default();
        client
    }

    fn open_default(&mut self) {
        if let Some(address) = self.defaults.address
            && let Err(error) = self.select(address)
        {
            debug!(
                target: DISPATCH_TARGET,
                %address,
                %error,
                "default address unavailable"
            );
        }
    }

    pub(crate) fn bus(&self) -> &Arc<GpibBus> {
        &self.bus
    }

    pub(crate) fn address(&self) -> Option<GpibAddress> {
        self.session.as_ref().map(Session::address)
    }

    fn session(&self) -> Result<&Session, DispatchError> {
        self.session.as_ref().ok_or(DispatchError::NotAddressed)
    }

    /// Points the client at `address`. The new session opens before the old
    /// one is released, so re-selecting the same address keeps it open.
    pub(crate) fn select(&mut self, address: GpibAddress) -> Result<(), DispatchError> {
        if self.address() == Some(address) {
            return Ok(());
        }
        let session = self.bus.open_session(address)?;
        debug!(
            target: DISPATCH_TARGET,
            resource = %session.resource_name(),
            "client addressed instrument"
        );
        self.session = Some(session);
        Ok(())
    }

    /// Restores power-on settings and drops the session.
    pub(crate) fn reset(&mut self) {
        self.session = None;
        self.settings = ClientSettings::with_timeout(self.defaults.read_timeout);
        self.open_default();
    }

    /// Sends a data line to the instrument. Returns the response when the line
    /// is a query and auto-read is on.
    pub(crate) fn send_data(&self, data: &[u8]) -> Result<Option<Vec<u8>>, DispatchError> {
        let session = self.session()?;
        let mut message = Vec::with_capacity(data.len() + 2);
        message.extend_from_slice(data);
        message.extend_from_slice(self.settings.eos.terminator());
        let eoi = self.settings.eoi;
        let timeout = self.settings.read_timeout;

        if self.settings.auto_read && data.contains(&b'?') {
            let outcome = session.query(&message, eoi, ReadTermination::Eoi, timeout)?;
            Ok(Some(self.render(outcome)))
        } else {
            session.write(&message, eoi, timeout)?;
            Ok(None)
        }
    }

    /// Reads from the instrument until `termination`.
    pub(crate) fn read(&self, termination: ReadTermination) -> Result<Vec<u8>, DispatchError> {
        let outcome = self
            .session()?
            .read(termination, self.settings.read_timeout)?;
        Ok(self.render(outcome))
    }

    fn render(&self, outcome: ReadOutcome) -> Vec<u8> {
        let ReadOutcome { mut data, eoi } = outcome;
        if eoi && self.settings.eot_enable {
            data.push(self.settings.eot_char);
        }
        data
    }

    pub(crate) fn clear(&self) -> Result<(), DispatchError> {
        Ok(self.session()?.clear()?)
    }

    pub(crate) fn go_to_local(&self) -> Result<(), DispatchError> {
        Ok(self.session()?.go_to_local()?)
    }

    pub(crate) fn local_lockout(&self) -> Result<(), DispatchError> {
        Ok(self.session()?.local_lockout()?)
    }

    /// Serial polls `target`, or the addressed instrument when `None`.
    pub(crate) fn serial_poll(&self, target: Option<GpibAddress>) -> Result<u8, DispatchError> {
        let address = match target {
            Some(address) => address,
            None => self.session()?.address(),
        };
        Ok(self.bus.serial_poll(address, self.settings.read_timeout)?)
    }

    /// Triggers `targets`, or the addressed instrument when empty.
    pub(crate) fn trigger(&self, targets: &[GpibAddress]) -> Result<(), DispatchError> {
        if targets.is_empty() {
            return Ok(self.session()?.trigger()?);
        }
        Ok(self.bus.trigger(targets)?)
    }
}

impl fmt::Debug for ClientConnection {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ClientConnection")
            .field("address", &self.address())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
