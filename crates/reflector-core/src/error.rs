//! Error types for the reflector system
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

use crate::oracle::IpFamily;

/// Result type alias for reflector operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the reflector system
#[derive(Error, Debug)]
pub enum Error {
    /// Bad caller input (empty oracle set, malformed endpoint, ...)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Endpoint scheme not handled by any transport
    #[error("unsupported URI scheme: {0}")]
    UnsupportedScheme(String),

    /// DNS produced no record of the requested address family
    #[error("no {family} address for host {host}")]
    NoAddressForFamily {
        /// Host that was resolved
        host: String,
        /// Family that was requested
        family: IpFamily,
    },

    /// Send/receive/per-query deadline exceeded
    #[error("timed out: {0}")]
    Timeout(String),

    /// Wire-format violation in an oracle's reply
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// STUN mapped-address family code outside {IPv4, IPv6}
    #[error("unsupported mapped-address family code {0:#04x}")]
    UnsupportedFamily(u8),

    /// The race exhausted every oracle without a usable address
    #[error("cannot obtain an address from any oracle")]
    NoConsensus,

    /// The caller's cancellation token fired
    #[error("operation cancelled")]
    Cancelled,

    /// Network-related errors
    #[error("network error: {0}")]
    Network(#[from] std::io::Error),

    /// TLS setup or handshake errors
    #[error("TLS error: {0}")]
    Tls(String),

    /// JSON deserialization errors (oracle bodies, config)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create an unsupported scheme error
    pub fn unsupported_scheme(scheme: impl Into<String>) -> Self {
        Self::UnsupportedScheme(scheme.into())
    }

    /// Create a "no address for family" error
    pub fn no_address_for_family(host: impl Into<String>, family: IpFamily) -> Self {
        Self::NoAddressForFamily {
            host: host.into(),
            family,
        }
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a malformed response error
    pub fn malformed_response(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    /// Create a TLS error
    pub fn tls(msg: impl Into<String>) -> Self {
        Self::Tls(msg.into())
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
