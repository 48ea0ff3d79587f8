//! Prologix command dispatch for connected clients.
//!
//! Each connection is served by [`DispatchConnectionHandler`] on its own
//! thread. Bytes from the client are framed into lines (see `framing`); lines
//! starting with `++` run through the static command table and everything else
//! is instrument data for the client's addressed device.
//!
//! ## Protocol
//!
//! ```text
//! ++addr 23        (silent)
//! ++auto 1         (silent)
//! ID?              -> HP3458A
//! ++bogus          -> Error: Unknown command '++bogus'
//! ```
//!
//! Errors are reported as a single `Error: ...` line and the connection stays
//! open, except for transport failures and lines longer than 64 KiB.

mod client;
mod errors;
mod framing;
mod handler;
mod response;
mod table;

pub(crate) use self::client::ClientDefaults;
pub use self::errors::DispatchError;
pub(crate) use self::handler::DispatchConnectionHandler;

pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");
