//! Per-transport client registry and the built-in oracle table
//!
//! The registry maps each [`Transport`] to the client that serves it,
//! so the engine never hardcodes an if-else chain over transports.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use reflector_core::registry::{builtin_oracles, OracleRegistry};
//!
//! let registry = OracleRegistry::new();
//! registry.register_client(Arc::new(HttpOracleClient::new()));
//! registry.register_client(Arc::new(StunOracleClient::new()));
//!
//! let (reflector, _events) = Reflector::new(Arc::new(registry));
//! let address = reflector.reflect(&builtin_oracles(), &request).await?;
//! ```

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::warn;

use crate::oracle::{OracleDescriptor, OracleSet, Transport};
use crate::traits::OracleClient;

/// Well-known public oracles, in preference order
///
/// HTTP reflectors answer with a bare IP token; the STUN servers are
/// cheap connectionless fallbacks.
const BUILTIN_ORACLES: &[(&str, &str)] = &[
    ("ipify", "https://api.ipify.org"),
    ("ifconfig", "https://ifconfig.me/ip"),
    ("icanhazip", "https://icanhazip.com"),
    ("checkip-aws", "https://checkip.amazonaws.com"),
    ("google-stun", "stun://stun.l.google.com:19302"),
    ("cloudflare-stun", "stun://stun.cloudflare.com:3478"),
];

/// Client registry for transport-based query dispatch
///
/// ## Thread Safety
///
/// Interior mutability with RwLock: registration happens during
/// startup, lookups happen concurrently from query tasks.
#[derive(Default)]
pub struct OracleRegistry {
    clients: RwLock<HashMap<Transport, Arc<dyn OracleClient>>>,
}

impl OracleRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client under the transport it reports
    ///
    /// A later registration for the same transport replaces the
    /// earlier one.
    pub fn register_client(&self, client: Arc<dyn OracleClient>) {
        let mut clients = self.clients.write().unwrap();
        clients.insert(client.transport(), client);
    }

    /// Look up the client serving `transport`
    pub fn client_for(&self, transport: Transport) -> Option<Arc<dyn OracleClient>> {
        let clients = self.clients.read().unwrap();
        clients.get(&transport).cloned()
    }

    /// Check if a client is registered for `transport`
    pub fn has_client(&self, transport: Transport) -> bool {
        let clients = self.clients.read().unwrap();
        clients.contains_key(&transport)
    }

    /// List the transports with a registered client
    pub fn list_transports(&self) -> Vec<Transport> {
        let clients = self.clients.read().unwrap();
        clients.keys().copied().collect()
    }
}

/// The built-in oracle set, ordered and deduplicated
pub fn builtin_oracles() -> OracleSet {
    let mut set = OracleSet::new();
    for (id, endpoint) in BUILTIN_ORACLES {
        match OracleDescriptor::parse(*id, endpoint) {
            Ok(oracle) => {
                set.push(oracle);
            }
            Err(e) => {
                warn!("skipping builtin oracle {}: {}", id, e);
            }
        }
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::oracle::IpFamily;
    use async_trait::async_trait;
    use std::net::IpAddr;
    use tokio_util::sync::CancellationToken;

    struct NullClient(Transport);

    #[async_trait]
    impl OracleClient for NullClient {
        async fn query(
            &self,
            _oracle: &OracleDescriptor,
            _family: IpFamily,
            _cancel: CancellationToken,
        ) -> Result<Option<IpAddr>> {
            Ok(None)
        }

        fn transport(&self) -> Transport {
            self.0
        }
    }

    #[test]
    fn registration_and_lookup() {
        let registry = OracleRegistry::new();
        assert!(!registry.has_client(Transport::TlsHttp));

        registry.register_client(Arc::new(NullClient(Transport::TlsHttp)));

        assert!(registry.has_client(Transport::TlsHttp));
        assert!(!registry.has_client(Transport::UdpStun));
        assert!(registry.client_for(Transport::TlsHttp).is_some());
        assert_eq!(registry.list_transports(), vec![Transport::TlsHttp]);
    }

    #[test]
    fn builtin_table_parses_and_dedups() {
        let set = builtin_oracles();
        assert_eq!(set.len(), BUILTIN_ORACLES.len());
        assert!(set.iter().any(|o| o.transport() == Transport::TlsHttp));
        assert!(set.iter().any(|o| o.transport() == Transport::UdpStun));
    }
}
