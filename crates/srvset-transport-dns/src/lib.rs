// # DNS Exchange Transport
//
// UDP/TCP implementation of the srvset `Exchange` trait.
//
// ## Behavior
//
// - One exchange sends one message and returns the server's response,
//   whatever its response code
// - Every request gets a fresh random message id; a response carrying a
//   different id is a transport error
// - UDP attempts that time out are resent up to `retries` times; a request
//   that produced a response is never resent
// - A UDP response with the TC bit set is retried once over TCP
// - `transport = "tcp"` always uses TCP (2-byte length prefix, RFC 1035 §4.2.2)
//
// ## Not Implemented
//
// - TSIG / SIG(0) signing: updates are sent unsigned
// - Connection pooling: every TCP exchange opens its own connection

use async_trait::async_trait;
use hickory_proto::ProtoError;
use hickory_proto::op::Message;
use srvset_core::config::{ResolverConfig, TransportProtocol};
use srvset_core::registry::Registry;
use srvset_core::traits::{Exchange, ExchangeFactory};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tracing::{debug, warn};

/// Maximum UDP response size accepted (EDNS(0) sized buffer)
const MAX_UDP_RESPONSE_SIZE: usize = 4096;

/// Transport-level failures
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The server name did not resolve to an address
    #[error("Cannot resolve server address {0}")]
    Resolve(String),

    /// No response within the configured timeout
    #[error("Timed out waiting for {0}")]
    Timeout(SocketAddr),

    /// Socket failure
    #[error("I/O error talking to {addr}: {source}")]
    Io {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The response does not answer our request
    #[error("Response id {got} does not match request id {expected}")]
    IdMismatch { expected: u16, got: u16 },

    /// The message could not be encoded or the response decoded
    #[error("Malformed DNS message: {0}")]
    Proto(#[from] ProtoError),

    /// The message does not fit a TCP frame
    #[error("Message of {0} bytes exceeds the TCP frame limit")]
    TooLarge(usize),
}

impl From<TransportError> for srvset_core::Error {
    fn from(err: TransportError) -> Self {
        srvset_core::Error::exchange(err.to_string())
    }
}

/// DNS exchange over UDP with TCP fallback, or TCP only
#[derive(Debug, Clone)]
pub struct DnsExchange {
    /// `host:port` of the server
    address: String,

    /// Preferred transport
    protocol: TransportProtocol,

    /// Per-attempt timeout
    timeout: Duration,

    /// Resends after a UDP timeout
    retries: usize,
}

impl DnsExchange {
    /// Create an exchange for `address` (`host:port`)
    pub fn new(address: impl Into<String>, protocol: TransportProtocol) -> Self {
        Self {
            address: address.into(),
            protocol,
            timeout: Duration::from_secs(10),
            retries: 3,
        }
    }

    /// Create an exchange from resolver configuration
    pub fn from_config(config: &ResolverConfig) -> Self {
        Self::new(config.address(), config.transport)
            .with_timeout(Duration::from_secs(config.timeout_secs))
            .with_retries(config.retries)
    }

    /// Set the per-attempt timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the number of UDP resends after a timeout
    pub fn with_retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }

    async fn resolve(&self) -> Result<SocketAddr, TransportError> {
        tokio::net::lookup_host(&self.address)
            .await
            .map_err(|_| TransportError::Resolve(self.address.clone()))?
            .next()
            .ok_or_else(|| TransportError::Resolve(self.address.clone()))
    }

    async fn send(&self, mut message: Message, is_update: bool) -> Result<Message, TransportError> {
        let id: u16 = rand::random();
        message.set_id(id);
        let request = message.to_vec()?;
        let addr = self.resolve().await?;
        let kind = if is_update { "update" } else { "query" };

        let reply = match self.protocol {
            TransportProtocol::Tcp => self.send_tcp(addr, &request).await?,
            TransportProtocol::Udp => {
                let reply = self.send_udp(addr, &request).await?;
                if Message::from_vec(&reply)?.truncated() {
                    debug!(server = %addr, id, kind, "UDP response truncated, retrying over TCP");
                    self.send_tcp(addr, &request).await?
                } else {
                    reply
                }
            }
        };

        let response = Message::from_vec(&reply)?;
        if response.id() != id {
            return Err(TransportError::IdMismatch {
                expected: id,
                got: response.id(),
            });
        }

        debug!(
            server = %addr,
            id,
            kind,
            rcode = %response.response_code(),
            answers = response.answers().len(),
            "DNS exchange complete"
        );
        Ok(response)
    }

    async fn send_udp(&self, addr: SocketAddr, request: &[u8]) -> Result<Vec<u8>, TransportError> {
        let io = |source| TransportError::Io { addr, source };

        let bind_addr: SocketAddr = if addr.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        let socket = UdpSocket::bind(bind_addr).await.map_err(io)?;
        socket.connect(addr).await.map_err(io)?;

        let mut buf = vec![0u8; MAX_UDP_RESPONSE_SIZE];
        for attempt in 0..=self.retries {
            socket.send(request).await.map_err(io)?;

            match tokio::time::timeout(self.timeout, socket.recv(&mut buf)).await {
                Ok(received) => {
                    let len = received.map_err(io)?;
                    buf.truncate(len);
                    return Ok(buf);
                }
                Err(_) => {
                    warn!(server = %addr, attempt = attempt + 1, "UDP attempt timed out");
                }
            }
        }

        Err(TransportError::Timeout(addr))
    }

    async fn send_tcp(&self, addr: SocketAddr, request: &[u8]) -> Result<Vec<u8>, TransportError> {
        let io = |source| TransportError::Io { addr, source };

        if request.len() > usize::from(u16::MAX) {
            return Err(TransportError::TooLarge(request.len()));
        }

        let exchange = async {
            let mut stream = TcpStream::connect(addr).await.map_err(io)?;
            stream.set_nodelay(true).map_err(io)?;
            write_frame(&mut stream, request).await.map_err(io)?;
            let reply = read_frame(&mut stream).await.map_err(io)?;
            Ok::<_, TransportError>(reply)
        };

        tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| TransportError::Timeout(addr))?
    }
}

/// Write one length-prefixed DNS message
async fn write_frame<W>(writer: &mut W, message: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let len = u16::try_from(message.len()).map_err(|_| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "message exceeds TCP frame limit")
    })?;

    let mut frame = Vec::with_capacity(message.len() + 2);
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(message);

    writer.write_all(&frame).await?;
    writer.flush().await
}

/// Read one length-prefixed DNS message
async fn read_frame<R>(reader: &mut R) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let len = reader.read_u16().await?;
    let mut message = vec![0u8; usize::from(len)];
    reader.read_exact(&mut message).await?;
    Ok(message)
}

#[async_trait]
impl Exchange for DnsExchange {
    async fn exchange(&self, message: Message, is_update: bool) -> srvset_core::Result<Message> {
        Ok(self.send(message, is_update).await?)
    }

    fn transport_name(&self) -> &'static str {
        self.protocol.as_str()
    }
}

/// Factory creating [`DnsExchange`]s from resolver configuration
#[derive(Debug, Default)]
pub struct DnsExchangeFactory;

impl ExchangeFactory for DnsExchangeFactory {
    fn create(&self, config: &ResolverConfig) -> srvset_core::Result<Arc<dyn Exchange>> {
        config.validate()?;
        Ok(Arc::new(DnsExchange::from_config(config)))
    }
}

/// Register the `udp` and `tcp` transports
pub fn register(registry: &Registry) -> srvset_core::Result<()> {
    registry.register_exchange("udp", Box::new(DnsExchangeFactory))?;
    registry.register_exchange("tcp", Box::new(DnsExchangeFactory))?;
    Ok(())
}
