//! Shared configuration for the Prologix GPIB-Ethernet emulator.
//!
//! [`Config`] is assembled by `ortho_config` from built-in defaults, an
//! optional TOML file (`--config-path` or `PROLOGIX_CONFIG_PATH`), the
//! `PROLOGIX_*` environment and command-line flags, in increasing order of
//! precedence. The daemon validates the merged result once at startup so
//! operators see configuration mistakes before the listener binds.

mod bus;
mod defaults;
mod endpoint;
mod logging;

use std::borrow::Cow;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use bus::{BusKind, InstrumentDirective, InstrumentDirectiveParseError};
pub use defaults::{
    DEFAULT_INTERFACE, DEFAULT_LOG_FILTER, DEFAULT_PROLOGIX_PORT, DEFAULT_READ_TIMEOUT_MS,
    MAX_PRIMARY_ADDRESS, MAX_READ_TIMEOUT_MS, MIN_READ_TIMEOUT_MS, default_bus_kind, default_instruments,
    default_interface, default_listen_endpoint, default_log_filter, default_log_filter_string,
    default_log_format, default_read_timeout_ms,
};
pub use endpoint::{EndpointParseError, TcpEndpoint};
pub use logging::{LogFormat, LogFormatParseError};

/// Resolved configuration for the emulator daemon.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "PROLOGIX")]
pub struct Config {
    /// TCP endpoint accepting Prologix clients.
    #[ortho_config(default = defaults::default_listen_endpoint())]
    #[serde(default = "defaults::default_listen_endpoint")]
    pub listen: TcpEndpoint,
    /// `tracing` filter expression.
    #[ortho_config(default = defaults::default_log_filter_string())]
    #[serde(default = "defaults::default_log_filter_string")]
    pub log_filter: String,
    /// Log output format.
    #[ortho_config(default = defaults::default_log_format())]
    #[serde(default = "defaults::default_log_format")]
    pub log_format: LogFormat,
    /// Bus backend driving the instruments.
    #[ortho_config(default = defaults::default_bus_kind())]
    #[serde(default = "defaults::default_bus_kind")]
    pub bus: BusKind,
    /// Board name used when rendering VISA-style resource names.
    #[ortho_config(default = defaults::default_interface())]
    #[serde(default = "defaults::default_interface")]
    pub interface: String,
    /// Upstream controller used by the `prologix` bus backend.
    #[serde(default)]
    pub upstream: Option<TcpEndpoint>,
    /// Initial `++read_tmo_ms` value handed to every client.
    #[ortho_config(default = defaults::default_read_timeout_ms())]
    #[serde(default = "defaults::default_read_timeout_ms")]
    pub read_timeout_ms: u32,
    /// Primary address a freshly connected client starts on.
    #[serde(default)]
    pub default_address: Option<u8>,
    /// Simulated instruments as `PAD[:SAD]=IDN` directives.
    #[ortho_config(merge_strategy = "append")]
    #[serde(default)]
    pub instruments: Vec<InstrumentDirective>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen_endpoint(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            bus: default_bus_kind(),
            interface: default_interface(),
            upstream: None,
            read_timeout_ms: default_read_timeout_ms(),
            default_address: None,
            instruments: Vec::new(),
        }
    }
}

impl Config {
    /// Endpoint the acceptor binds.
    #[must_use]
    pub fn listen(&self) -> &TcpEndpoint {
        &self.listen
    }

    /// Log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Log output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Selected bus backend.
    #[must_use]
    pub fn bus(&self) -> BusKind {
        self.bus
    }

    /// GPIB board name, for example `GPIB0`.
    #[must_use]
    pub fn interface(&self) -> &str {
        self.interface.as_str()
    }

    /// Upstream controller endpoint, when configured.
    #[must_use]
    pub fn upstream(&self) -> Option<&TcpEndpoint> {
        self.upstream.as_ref()
    }

    /// Initial per-client read timeout.
    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.read_timeout_ms))
    }

    /// Primary address new clients start on.
    #[must_use]
    pub fn default_address(&self) -> Option<u8> {
        self.default_address
    }

    /// Simulated bench, falling back to the built-in instruments when none
    /// are configured.
    #[must_use]
    pub fn instruments(&self) -> Cow<'_, [InstrumentDirective]> {
        if self.instruments.is_empty() {
            Cow::Owned(default_instruments())
        } else {
            Cow::Borrowed(self.instruments.as_slice())
        }
    }

    /// Checks cross-field constraints that `ortho_config` cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the read timeout is outside the Prologix
    /// range, the default address is not a primary address, or the `prologix`
    /// bus lacks an upstream endpoint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_READ_TIMEOUT_MS..=MAX_READ_TIMEOUT_MS).contains(&self.read_timeout_ms) {
            return Err(ConfigError::ReadTimeout {
                value: self.read_timeout_ms,
            });
        }
        if let Some(value) = self.default_address
            && value > MAX_PRIMARY_ADDRESS
        {
            return Err(ConfigError::DefaultAddress { value });
        }
        if self.bus == BusKind::Prologix && self.upstream.is_none() {
            return Err(ConfigError::MissingUpstream);
        }
        Ok(())
    }
}

/// Constraint violations detected by [`Config::validate`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Read timeout outside the 1–3000 ms window accepted by `++read_tmo_ms`.
    #[error(
        "read timeout {value} ms is outside {MIN_READ_TIMEOUT_MS}..={MAX_READ_TIMEOUT_MS} ms"
    )]
    ReadTimeout { value: u32 },
    /// Default address beyond the primary range.
    #[error("default address {value} is outside 0..={MAX_PRIMARY_ADDRESS}")]
    DefaultAddress { value: u8 },
    /// The `prologix` bus needs somewhere to forward traffic to.
    #[error("bus 'prologix' requires an upstream endpoint")]
    MissingUpstream,
}
