// # Oracle Client Trait
//
// Defines the interface for querying one address oracle over one
// transport.
//
// ## Implementations
//
// - TLS-HTTP (raw socket): `reflector-http` crate
// - STUN over UDP: `reflector-stun` crate
//
// ## Usage
//
// ```rust,ignore
// use reflector_core::traits::OracleClient;
//
// let client = /* OracleClient implementation */;
// let address = client.query(&oracle, IpFamily::V4, cancel).await?;
// ```

use std::net::IpAddr;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::oracle::{IpFamily, OracleDescriptor, Transport};

/// Trait for oracle transport implementations
///
/// One implementation exists per [`Transport`] variant. Implementations
/// must be thread-safe: the race orchestrator shares a single client
/// across all concurrent queries of that transport.
///
/// ## Responsibilities
///
/// - Resolve the oracle host to an address of the requested family
///   (fail with `NoAddressForFamily` when there is none)
/// - Own the socket/stream for the duration of the query; release it on
///   every exit path
/// - Observe `cancel` at every suspension point and fail with
///   `Error::Cancelled` promptly when it fires
///
/// ## Forbidden
///
/// - Retrying internally: the race re-selects other oracles; a single
///   query maps to a single network exchange
/// - Sharing sockets between concurrent queries
#[async_trait]
pub trait OracleClient: Send + Sync {
    /// Ask one oracle which address it observed
    ///
    /// # Returns
    ///
    /// - `Ok(Some(addr))`: the oracle reported an address
    /// - `Ok(None)`: the oracle answered but produced no usable address
    ///   (e.g. connected but sent no parseable response)
    /// - `Err(Error)`: the query failed (unreachable, timed out,
    ///   malformed reply, cancelled)
    async fn query(
        &self,
        oracle: &OracleDescriptor,
        family: IpFamily,
        cancel: CancellationToken,
    ) -> Result<Option<IpAddr>>;

    /// The transport this client serves
    fn transport(&self) -> Transport;
}
