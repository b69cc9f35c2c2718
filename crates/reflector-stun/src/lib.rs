// # STUN Oracle Transport
//
// Hand-rolled STUN binding client over UDP: encode a binding request,
// await one reply, extract the MAPPED-ADDRESS attribute.
//
// ## Scope
//
// A deliberate subset of RFC 5389 sufficient for binding discovery: no
// message integrity, no fingerprint, no retransmission. STUN is used
// here purely as a cheap, low-latency, connectionless oracle; the race
// layer above owns all retry-like behavior by querying other oracles.
//
// ## Transaction IDs
//
// The 96-bit transaction ID needs uniqueness, not secrecy. The client
// owns its RNG explicitly and can be seeded for deterministic tests.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::net::{UdpSocket, lookup_host};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use reflector_core::error::{Error, Result};
use reflector_core::oracle::{IpFamily, OracleDescriptor, Transport};
use reflector_core::traits::OracleClient;

/// STUN magic cookie (RFC 5389 §6)
const MAGIC_COOKIE: u32 = 0x2112_A442;
/// Binding request message type
const BINDING_REQUEST: u16 = 0x0001;
/// Binding success response message type
const BINDING_SUCCESS: u16 = 0x0101;
/// MAPPED-ADDRESS attribute type
const ATTR_MAPPED_ADDRESS: u16 = 0x0001;
/// Address family codes inside MAPPED-ADDRESS
const FAMILY_V4: u8 = 0x01;
const FAMILY_V6: u8 = 0x02;

/// Fixed STUN header length
const HEADER_LEN: usize = 20;
/// Default STUN port
const DEFAULT_PORT: u16 = 3478;
/// Largest datagram we accept
const MAX_DATAGRAM: usize = 1500;

const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(3);
const DEFAULT_RECV_TIMEOUT: Duration = Duration::from_secs(3);

/// Encode a 20-byte binding request, network byte order throughout
pub fn encode_binding_request(transaction_id: [u8; 12]) -> [u8; HEADER_LEN] {
    let mut msg = [0u8; HEADER_LEN];
    msg[0..2].copy_from_slice(&BINDING_REQUEST.to_be_bytes());
    msg[2..4].copy_from_slice(&0u16.to_be_bytes());
    msg[4..8].copy_from_slice(&MAGIC_COOKIE.to_be_bytes());
    msg[8..20].copy_from_slice(&transaction_id);
    msg
}

/// Decode a binding response down to the mapped endpoint
///
/// Validates the message type and magic cookie, then walks the TLV
/// attributes for MAPPED-ADDRESS and returns on the first match.
pub fn decode_binding_response(msg: &[u8]) -> Result<SocketAddr> {
    if msg.len() < HEADER_LEN {
        return Err(Error::malformed_response(
            "STUN reply shorter than the fixed header",
        ));
    }

    let msg_type = u16::from_be_bytes([msg[0], msg[1]]);
    if msg_type != BINDING_SUCCESS {
        return Err(Error::malformed_response(format!(
            "unexpected STUN message type {msg_type:#06x}"
        )));
    }

    let cookie = u32::from_be_bytes([msg[4], msg[5], msg[6], msg[7]]);
    if cookie != MAGIC_COOKIE {
        return Err(Error::malformed_response("magic cookie mismatch"));
    }

    let mut pos = HEADER_LEN;
    while pos + 4 <= msg.len() {
        let attr_type = u16::from_be_bytes([msg[pos], msg[pos + 1]]);
        let attr_len = u16::from_be_bytes([msg[pos + 2], msg[pos + 3]]) as usize;
        pos += 4;
        if pos + attr_len > msg.len() {
            return Err(Error::malformed_response("truncated STUN attribute"));
        }
        if attr_type == ATTR_MAPPED_ADDRESS {
            return decode_mapped_address(&msg[pos..pos + attr_len]);
        }
        pos += attr_len;
    }

    Err(Error::malformed_response(
        "no MAPPED-ADDRESS attribute in reply",
    ))
}

/// Decode one MAPPED-ADDRESS value: reserved byte, family code, port,
/// family-sized address
fn decode_mapped_address(value: &[u8]) -> Result<SocketAddr> {
    if value.len() < 4 {
        return Err(Error::malformed_response("MAPPED-ADDRESS too short"));
    }

    let family = value[1];
    let port = u16::from_be_bytes([value[2], value[3]]);

    match family {
        FAMILY_V4 => {
            if value.len() < 8 {
                return Err(Error::malformed_response("truncated IPv4 mapped address"));
            }
            let mut octets = [0u8; 4];
            octets.copy_from_slice(&value[4..8]);
            Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::from(octets)), port))
        }
        FAMILY_V6 => {
            if value.len() < 20 {
                return Err(Error::malformed_response("truncated IPv6 mapped address"));
            }
            let mut octets = [0u8; 16];
            octets.copy_from_slice(&value[4..20]);
            Ok(SocketAddr::new(IpAddr::V6(Ipv6Addr::from(octets)), port))
        }
        other => Err(Error::UnsupportedFamily(other)),
    }
}

/// STUN binding oracle client
pub struct StunOracleClient {
    send_timeout: Duration,
    recv_timeout: Duration,
    rng: Mutex<StdRng>,
}

impl StunOracleClient {
    /// Create a client with the default 3s send/receive deadlines
    pub fn new() -> Self {
        Self::with_timeouts(DEFAULT_SEND_TIMEOUT, DEFAULT_RECV_TIMEOUT)
    }

    /// Create a client with explicit send/receive deadlines
    pub fn with_timeouts(send_timeout: Duration, recv_timeout: Duration) -> Self {
        Self {
            send_timeout,
            recv_timeout,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Seed the transaction-ID RNG, for deterministic tests
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    fn next_transaction_id(&self) -> [u8; 12] {
        let mut txid = [0u8; 12];
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.fill(&mut txid[..]);
        txid
    }

    /// Perform one binding exchange and return the mapped endpoint
    pub async fn communicate(
        &self,
        oracle: &OracleDescriptor,
        family: IpFamily,
        cancel: CancellationToken,
    ) -> Result<SocketAddr> {
        tokio::select! {
            _ = cancel.cancelled() => Err(Error::Cancelled),
            outcome = self.communicate_inner(oracle, family) => outcome,
        }
    }

    async fn communicate_inner(
        &self,
        oracle: &OracleDescriptor,
        family: IpFamily,
    ) -> Result<SocketAddr> {
        let endpoint = oracle.endpoint();
        if endpoint.scheme() != "stun" {
            return Err(Error::unsupported_scheme(endpoint.scheme()));
        }
        let host = endpoint
            .host_str()
            .ok_or_else(|| Error::invalid_input(format!("oracle endpoint {endpoint} has no host")))?;
        let port = endpoint.port().unwrap_or(DEFAULT_PORT);

        let mut candidates = lookup_host((host, port)).await?;
        let server = candidates
            .find(|addr| family.matches(&addr.ip()))
            .ok_or_else(|| Error::no_address_for_family(host, family))?;

        let bind_addr = match family {
            IpFamily::V4 => "0.0.0.0:0",
            IpFamily::V6 => "[::]:0",
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(server).await?;

        let request = encode_binding_request(self.next_transaction_id());
        trace!("oracle {} binding request to {}", oracle.id(), server);

        timeout(self.send_timeout, socket.send(&request))
            .await
            .map_err(|_| Error::timeout("STUN send deadline exceeded"))??;

        let mut buf = [0u8; MAX_DATAGRAM];
        let n = timeout(self.recv_timeout, socket.recv(&mut buf))
            .await
            .map_err(|_| Error::timeout("STUN receive deadline exceeded"))??;

        decode_binding_response(&buf[..n])
    }
}

impl Default for StunOracleClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OracleClient for StunOracleClient {
    async fn query(
        &self,
        oracle: &OracleDescriptor,
        family: IpFamily,
        cancel: CancellationToken,
    ) -> Result<Option<IpAddr>> {
        let mapped = self.communicate(oracle, family, cancel).await?;
        Ok(Some(mapped.ip()))
    }

    fn transport(&self) -> Transport {
        Transport::UdpStun
    }
}
