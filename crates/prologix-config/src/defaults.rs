use crate::bus::{BusKind, InstrumentDirective};
use crate::endpoint::TcpEndpoint;
use crate::logging::LogFormat;

/// Port used by Prologix GPIB-Ethernet controllers.
pub const DEFAULT_PROLOGIX_PORT: u16 = 1234;

/// Default log filter expression used by the daemon.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Board name used in resource names.
pub const DEFAULT_INTERFACE: &str = "GPIB0";

/// Instrument timeout applied to new clients.
pub const DEFAULT_READ_TIMEOUT_MS: u32 = 2000;

/// Smallest value accepted by `++read_tmo_ms`.
pub const MIN_READ_TIMEOUT_MS: u32 = 1;

/// Largest value accepted by `++read_tmo_ms`.
pub const MAX_READ_TIMEOUT_MS: u32 = 3000;

/// Highest GPIB primary address.
pub const MAX_PRIMARY_ADDRESS: u8 = 30;

/// Listens on every interface, as the hardware controller does.
pub fn default_listen_endpoint() -> TcpEndpoint {
    TcpEndpoint::new("0.0.0.0", DEFAULT_PROLOGIX_PORT)
}

/// Default log filter expression used by the daemon.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the daemon.
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Default bus backend.
pub fn default_bus_kind() -> BusKind {
    BusKind::Simulated
}

/// Default board name.
pub fn default_interface() -> String {
    DEFAULT_INTERFACE.to_owned()
}

/// Default `++read_tmo_ms` value.
pub fn default_read_timeout_ms() -> u32 {
    DEFAULT_READ_TIMEOUT_MS
}

/// Built-in simulated bench: an HP 3458A multimeter and an HP 53131A counter.
pub fn default_instruments() -> Vec<InstrumentDirective> {
    vec![
        InstrumentDirective::new(22, None, "HEWLETT-PACKARD,53131A,0,4806"),
        InstrumentDirective::new(23, None, "HP3458A"),
    ]
}
