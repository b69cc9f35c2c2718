// # HTTP Oracle Transport
//
// This crate queries HTTP(S) address oracles over a raw TCP socket: no
// high-level HTTP client, just a TLS handshake, one pipelined request,
// and a byte-wise scan for the end of the header block.
//
// ## Why raw
//
// Oracle responses are a single token; a full HTTP client buys nothing
// here, and owning the socket keeps the connect family-pinned (the OS
// must not silently fall back from v6 to v4 or vice versa) and the
// resource lifetime explicit.
//
// ## Contract
//
// `communicate` returns the still-open response stream positioned at
// the first body byte, or `None` when the server closed the connection
// before completing a header block ("connected but got no parseable
// headers", which is distinct from an error). Exactly one TCP
// connection and at most one TLS handshake per call; no internal
// retries.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpSocket, TcpStream, lookup_host};
use tokio_rustls::TlsConnector;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use url::Url;

use reflector_core::error::{Error, Result};
use reflector_core::oracle::{IpFamily, OracleDescriptor, Transport};
use reflector_core::parse::parse_simple_address;
use reflector_core::traits::OracleClient;

/// User-Agent sent with every oracle request
const USER_AGENT: &str = "reflector/0.1";

/// Default capacity for buffering the response stream
pub const DEFAULT_BUFFER_HINT: usize = 4096;

/// Response stream handed back to the caller, positioned after the
/// header terminator
pub type BodyReader = Box<dyn AsyncRead + Send + Unpin>;

/// Detector for the `CR LF CR LF` header terminator
///
/// Fixed four-byte pattern with a running count of how many terminator
/// bytes are currently matched; feeding one byte at a time keeps
/// detection correct when the terminator is split across reads.
#[derive(Debug, Default)]
struct TerminatorScanner {
    matched: usize,
}

impl TerminatorScanner {
    const TERMINATOR: [u8; 4] = *b"\r\n\r\n";

    /// Feed one byte; returns true once the full terminator has passed
    fn push(&mut self, byte: u8) -> bool {
        if byte == Self::TERMINATOR[self.matched] {
            self.matched += 1;
        } else if byte == b'\r' {
            // A stray CR can still start a fresh terminator.
            self.matched = 1;
        } else {
            self.matched = 0;
        }
        self.matched == Self::TERMINATOR.len()
    }
}

/// Read byte-by-byte until the header terminator has been consumed
///
/// Returns false when the stream ends first; the reader is then
/// exhausted and useless.
async fn read_past_headers<R>(reader: &mut R) -> Result<bool>
where
    R: AsyncRead + Unpin,
{
    let mut scanner = TerminatorScanner::default();
    let mut byte = [0u8; 1];
    loop {
        let n = reader.read(&mut byte).await?;
        if n == 0 {
            return Ok(false);
        }
        if scanner.push(byte[0]) {
            return Ok(true);
        }
    }
}

/// Format the single pipelined request for an oracle endpoint
fn format_request(endpoint: &Url, host: &str) -> String {
    let mut target = endpoint.path().to_string();
    if let Some(query) = endpoint.query() {
        target.push('?');
        target.push_str(query);
    }
    format!(
        "GET {target} HTTP/1.1\r\n\
         Host: {host}\r\n\
         User-Agent: {USER_AGENT}\r\n\
         Accept: application/json\r\n\
         Connection: close\r\n\
         \r\n"
    )
}

/// Resolve `host` and pick the first address of the requested family
async fn resolve_for_family(host: &str, port: u16, family: IpFamily) -> Result<SocketAddr> {
    let mut candidates = lookup_host((host, port)).await?;
    candidates
        .find(|addr| family.matches(&addr.ip()))
        .ok_or_else(|| Error::no_address_for_family(host, family))
}

/// Connect with a socket created explicitly for the requested family
async fn connect_with_family(addr: SocketAddr, family: IpFamily) -> Result<TcpStream> {
    let socket = match family {
        IpFamily::V4 => TcpSocket::new_v4()?,
        IpFamily::V6 => TcpSocket::new_v6()?,
    };
    Ok(socket.connect(addr).await?)
}

/// Raw-socket TLS-HTTP oracle client
///
/// The rustls configuration accepts only validation-error-free chains
/// against the webpki root store with standard hostname verification;
/// there is no override hook.
pub struct HttpOracleClient {
    connector: TlsConnector,
    buffer_hint: usize,
}

impl HttpOracleClient {
    /// Create a client with the default buffer hint
    pub fn new() -> Self {
        Self::with_buffer_hint(DEFAULT_BUFFER_HINT)
    }

    /// Create a client buffering response streams with `buffer_hint`
    pub fn with_buffer_hint(buffer_hint: usize) -> Self {
        let mut roots = rustls::RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let config = rustls::ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();

        Self {
            connector: TlsConnector::from(Arc::new(config)),
            buffer_hint: buffer_hint.max(1),
        }
    }

    /// Open the connection, send the request, and position the stream
    /// at the first body byte
    ///
    /// `Ok(None)` means the connection closed before a complete header
    /// block arrived. The returned reader is the caller's to drop;
    /// every other resource is released on all exit paths.
    pub async fn communicate(
        &self,
        oracle: &OracleDescriptor,
        family: IpFamily,
        buffer_hint: usize,
        cancel: CancellationToken,
    ) -> Result<Option<BodyReader>> {
        tokio::select! {
            _ = cancel.cancelled() => Err(Error::Cancelled),
            outcome = self.communicate_inner(oracle, family, buffer_hint) => outcome,
        }
    }

    async fn communicate_inner(
        &self,
        oracle: &OracleDescriptor,
        family: IpFamily,
        buffer_hint: usize,
    ) -> Result<Option<BodyReader>> {
        let endpoint = oracle.endpoint();
        let use_tls = match endpoint.scheme() {
            "https" => true,
            "http" => false,
            other => return Err(Error::unsupported_scheme(other)),
        };
        let host = endpoint
            .host_str()
            .ok_or_else(|| Error::invalid_input(format!("oracle endpoint {endpoint} has no host")))?;
        let port = endpoint.port().unwrap_or(if use_tls { 443 } else { 80 });

        let addr = resolve_for_family(host, port, family).await?;
        trace!("oracle {} resolved to {}", oracle.id(), addr);

        let tcp = connect_with_family(addr, family).await?;
        let request = format_request(endpoint, host);

        if use_tls {
            let server_name = rustls::pki_types::ServerName::try_from(host.to_string())
                .map_err(|e| Error::tls(format!("invalid server name {host}: {e}")))?;
            let mut tls = self.connector.connect(server_name, tcp).await?;
            tls.write_all(request.as_bytes()).await?;
            finish_exchange(tls, buffer_hint).await
        } else {
            let mut tcp = tcp;
            tcp.write_all(request.as_bytes()).await?;
            finish_exchange(tcp, buffer_hint).await
        }
    }
}

impl Default for HttpOracleClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Scan past the header block and hand the stream to the caller
async fn finish_exchange<S>(stream: S, buffer_hint: usize) -> Result<Option<BodyReader>>
where
    S: AsyncRead + tokio::io::AsyncWrite + Send + Unpin + 'static,
{
    let mut reader = BufReader::with_capacity(buffer_hint.max(1), stream);
    if !read_past_headers(&mut reader).await? {
        return Ok(None);
    }
    Ok(Some(Box::new(reader)))
}

#[async_trait]
impl OracleClient for HttpOracleClient {
    async fn query(
        &self,
        oracle: &OracleDescriptor,
        family: IpFamily,
        cancel: CancellationToken,
    ) -> Result<Option<IpAddr>> {
        let Some(body) = self
            .communicate(oracle, family, self.buffer_hint, cancel)
            .await?
        else {
            debug!(
                "oracle {} closed the connection before completing headers",
                oracle.id()
            );
            return Ok(None);
        };
        parse_simple_address(body).await
    }

    fn transport(&self) -> Transport {
        Transport::TlsHttp
    }
}
