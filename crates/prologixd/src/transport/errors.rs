use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use prologix_config::TcpEndpoint;

/// Failures binding the Prologix port or running its acceptor.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The configured host name could not be resolved.
    #[error("cannot resolve listen endpoint {endpoint}: {source}")]
    Resolve {
        /// Endpoint taken from configuration.
        endpoint: TcpEndpoint,
        /// Resolver failure.
        #[source]
        source: io::Error,
    },
    /// Resolution succeeded but produced no socket addresses.
    #[error("listen endpoint {endpoint} resolved to no addresses")]
    Unresolved {
        /// Endpoint taken from configuration.
        endpoint: TcpEndpoint,
    },
    /// Binding failed, typically because the port is in use.
    #[error("cannot bind the Prologix port at {addr}: {source}")]
    Bind {
        /// Last address tried.
        addr: SocketAddr,
        /// Error returned by `bind`.
        #[source]
        source: io::Error,
    },
    /// Querying the bound address or switching to non-blocking accept failed.
    #[error("cannot configure the Prologix listener: {source}")]
    Configure {
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },
    /// The accept loop panicked and could not be joined cleanly.
    #[error("Prologix acceptor thread panicked")]
    AcceptorPanicked,
}
