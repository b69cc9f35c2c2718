//! Oracle descriptors, transports, and address families
//!
//! An oracle is a third-party endpoint that reports back the IP address
//! it observed the caller connecting from. Descriptors are immutable,
//! constructed once, and held for the process lifetime; the set the
//! caller supplies is ordered and deduplicated by endpoint.

use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// Transport used to query an oracle
///
/// The set of transports is closed: every oracle is either an HTTP(S)
/// endpoint answered over a TLS-wrapped socket or a STUN server answered
/// over UDP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    /// HTTP/1.1 over a raw (optionally TLS-wrapped) TCP socket
    TlsHttp,
    /// STUN binding discovery over UDP
    UdpStun,
}

impl Transport {
    /// The transport implied by a URI scheme, if any
    pub fn for_scheme(scheme: &str) -> Option<Self> {
        match scheme {
            "http" | "https" => Some(Self::TlsHttp),
            "stun" => Some(Self::UdpStun),
            _ => None,
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TlsHttp => write!(f, "tls-http"),
            Self::UdpStun => write!(f, "udp-stun"),
        }
    }
}

/// IP address family (v4 or v6)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpFamily {
    V4,
    V6,
}

impl IpFamily {
    /// Whether `addr` belongs to this family
    pub fn matches(&self, addr: &IpAddr) -> bool {
        match self {
            Self::V4 => addr.is_ipv4(),
            Self::V6 => addr.is_ipv6(),
        }
    }
}

impl fmt::Display for IpFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V4 => write!(f, "IPv4"),
            Self::V6 => write!(f, "IPv6"),
        }
    }
}

/// Immutable record of one address oracle
///
/// Invariant: the endpoint scheme agrees with the transport
/// (`http`/`https` for [`Transport::TlsHttp`], `stun` for
/// [`Transport::UdpStun`]), and the endpoint carries a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleDescriptor {
    id: String,
    endpoint: Url,
    transport: Transport,
}

impl OracleDescriptor {
    /// Create a descriptor, validating scheme/transport agreement
    pub fn new(id: impl Into<String>, endpoint: Url, transport: Transport) -> Result<Self> {
        match Transport::for_scheme(endpoint.scheme()) {
            Some(implied) if implied == transport => {}
            Some(_) => {
                return Err(Error::invalid_input(format!(
                    "scheme {} does not match transport {}",
                    endpoint.scheme(),
                    transport
                )));
            }
            None => return Err(Error::unsupported_scheme(endpoint.scheme())),
        }

        if endpoint.host_str().is_none() {
            return Err(Error::invalid_input(format!(
                "oracle endpoint {endpoint} has no host"
            )));
        }

        Ok(Self {
            id: id.into(),
            endpoint,
            transport,
        })
    }

    /// Parse a descriptor from a URL string, inferring the transport
    /// from the scheme
    pub fn parse(id: impl Into<String>, endpoint: &str) -> Result<Self> {
        let url = Url::parse(endpoint)
            .map_err(|e| Error::invalid_input(format!("invalid oracle URL {endpoint}: {e}")))?;
        let transport = Transport::for_scheme(url.scheme())
            .ok_or_else(|| Error::unsupported_scheme(url.scheme()))?;
        Self::new(id, url, transport)
    }

    /// Stable identity used to key race results
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The oracle's endpoint URL
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Transport used to query this oracle
    pub fn transport(&self) -> Transport {
        self.transport
    }
}

/// Ordered collection of oracles, deduplicated by endpoint
#[derive(Debug, Clone, Default)]
pub struct OracleSet {
    oracles: Vec<OracleDescriptor>,
}

impl OracleSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an oracle, preserving insertion order
    ///
    /// Returns `false` (leaving the set unchanged) when an oracle with
    /// the same endpoint is already present.
    pub fn push(&mut self, oracle: OracleDescriptor) -> bool {
        if self.oracles.iter().any(|o| o.endpoint == oracle.endpoint) {
            return false;
        }
        self.oracles.push(oracle);
        true
    }

    /// Number of oracles in the set
    pub fn len(&self) -> usize {
        self.oracles.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.oracles.is_empty()
    }

    /// Iterate the oracles in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &OracleDescriptor> {
        self.oracles.iter()
    }
}

impl FromIterator<OracleDescriptor> for OracleSet {
    fn from_iter<I: IntoIterator<Item = OracleDescriptor>>(iter: I) -> Self {
        let mut set = Self::new();
        for oracle in iter {
            set.push(oracle);
        }
        set
    }
}
