//! Hardware abstraction for the controller side of the bus.

use std::time::Duration;

use crate::address::GpibAddress;
use crate::error::BusError;

/// How a read decides that the device has finished talking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadTermination {
    /// Read until the timeout expires.
    Timeout,
    /// Read until the talker asserts EOI.
    Eoi,
    /// Read until the given byte arrives, or EOI.
    Char(u8),
}

/// Bytes returned by a read together with the EOI state of the last byte.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadOutcome {
    /// Payload as received, including any device terminator.
    pub data: Vec<u8>,
    /// Whether the final byte carried EOI.
    pub eoi: bool,
}

impl ReadOutcome {
    /// Builds an outcome.
    #[must_use]
    pub fn new(data: impl Into<Vec<u8>>, eoi: bool) -> Self {
        Self {
            data: data.into(),
            eoi,
        }
    }
}

/// Operations a GPIB controller performs on behalf of the emulator.
///
/// Implementations are driven exclusively through [`crate::GpibBus`], which
/// holds them behind a mutex, so methods take `&mut self` and never see two
/// callers at once.
#[cfg_attr(test, mockall::automock)]
pub trait GpibBackend: Send {
    /// Short name used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Prepares the device at `address` for traffic.
    fn open(&mut self, address: GpibAddress) -> Result<(), BusError>;

    /// Releases resources held for `address`.
    fn close(&mut self, address: GpibAddress);

    /// Sends `data` to the listener, asserting EOI on the last byte when `eoi`.
    fn write(
        &mut self,
        address: GpibAddress,
        data: &[u8],
        eoi: bool,
        timeout: Duration,
    ) -> Result<(), BusError>;

    /// Addresses the device to talk and collects its response.
    fn read(
        &mut self,
        address: GpibAddress,
        termination: ReadTermination,
        timeout: Duration,
    ) -> Result<ReadOutcome, BusError>;

    /// Sends Selected Device Clear.
    fn clear(&mut self, address: GpibAddress) -> Result<(), BusError>;

    /// Sends Group Execute Trigger to every listed device.
    fn trigger(&mut self, addresses: &[GpibAddress]) -> Result<(), BusError>;

    /// Performs a serial poll and returns the status byte.
    fn serial_poll(&mut self, address: GpibAddress, timeout: Duration) -> Result<u8, BusError>;

    /// Reports whether SRQ is asserted.
    fn service_request(&mut self) -> Result<bool, BusError>;

    /// Pulses Interface Clear.
    fn interface_clear(&mut self) -> Result<(), BusError>;

    /// Sends Go To Local to the device.
    fn go_to_local(&mut self, address: GpibAddress) -> Result<(), BusError>;

    /// Sends Local Lockout with the device addressed to listen.
    fn local_lockout(&mut self, address: GpibAddress) -> Result<(), BusError>;
}
