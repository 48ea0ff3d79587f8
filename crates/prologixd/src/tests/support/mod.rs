//! Shared doubles and helpers for the daemon test suites.

mod client;
mod provider;
mod reporter;

use prologix_config::{Config, InstrumentDirective, LogFormat, TcpEndpoint};

pub use client::TestClient;
pub use provider::RecordingBusProvider;
pub use reporter::{HealthEvent, RecordingHealthReporter};

/// Loopback configuration with a two-instrument bench and short timeouts.
pub fn loopback_config() -> Config {
    Config {
        listen: TcpEndpoint::new("127.0.0.1", 0),
        log_format: LogFormat::Compact,
        read_timeout_ms: 100,
        instruments: vec![
            InstrumentDirective::new(22, None, "HEWLETT-PACKARD,53131A,0,4806"),
            InstrumentDirective::new(23, None, "HP3458A"),
        ],
        ..Config::default()
    }
}

/// Strips surrounding double quotes from a step argument.
pub fn strip_quotes(text: &str) -> &str {
    text.trim_matches('"')
}
