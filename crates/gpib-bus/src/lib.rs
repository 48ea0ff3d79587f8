//! GPIB bus access for the Prologix emulator.
//!
//! A [`GpibBus`] owns the one backend that talks to instruments and serialises
//! every operation behind a mutex. Clients lease a [`Session`] per address;
//! sessions for the same address share one open handle, which the backend
//! closes when the last lease is dropped. A write and the read collecting its
//! answer can be issued as one [`Session::query`] so no other client's traffic
//! lands in between.
//!
//! Two backends ship with the crate: [`SimulatedBackend`], an in-memory bench
//! of instruments, and [`PrologixUpstream`], which relays to a real Prologix
//! GPIB-Ethernet controller.

mod address;
mod backend;
mod bus;
mod error;
mod simulated;
mod upstream;

pub use address::{AddressError, GpibAddress, PRIMARY_RANGE, SECONDARY_RANGE};
#[cfg(test)]
pub(crate) use backend::MockGpibBackend;
pub use backend::{GpibBackend, ReadOutcome, ReadTermination};
pub use bus::{GpibBus, Session};
pub use error::BusError;
pub use simulated::{RQS_BIT, RemoteState, SimulatedBackend, TRANSCRIPT_LIMIT};
pub use upstream::{PrologixUpstream, escape};

/// Tracing target for bus activity.
pub const BUS_TARGET: &str = "gpib_bus";

#[cfg(test)]
mod tests;
