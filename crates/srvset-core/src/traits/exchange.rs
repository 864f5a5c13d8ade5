// # Exchange Trait
//
// Defines the transport primitive every reconciliation cycle talks through.
//
// ## Implementations
//
// - UDP/TCP: `srvset-transport-dns` crate
// - Tests: in-memory authoritative zones
//
// ## Usage
//
// ```rust,ignore
// use srvset_core::Exchange;
// use srvset_core::message::srv_query;
//
// async fn read(exchange: &dyn Exchange) -> srvset_core::Result<()> {
//     let query = srv_query("_sip._tcp.example.org.", false)?;
//     let response = exchange.exchange(query, false).await?;
//     println!("{} answer(s)", response.answers().len());
//     Ok(())
// }
// ```

use async_trait::async_trait;
use hickory_proto::op::Message;

/// Trait for DNS exchange transports
///
/// An exchange sends one DNS message to the configured server and waits for
/// its response. It performs both ordinary queries and RFC 2136 updates.
///
/// # Contract
///
/// - Return the server's response whatever its response code; interpreting
///   the code is the caller's job.
/// - Return `Err` only when no response could be obtained (timeout, socket
///   error, undecodable reply).
/// - Never retry a request that produced a response, and never reorder or
///   split the sections of the message it was given.
/// - Hold no per-owner state: cycles for different owner names may share one
///   exchange concurrently.
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Send `message` and return the server's response
    ///
    /// `is_update` marks RFC 2136 transactions so transports can route or
    /// sign them differently from plain queries.
    async fn exchange(&self, message: Message, is_update: bool) -> Result<Message, crate::Error>;

    /// Transport name (for logging/debugging)
    fn transport_name(&self) -> &'static str;
}

/// Helper trait for constructing exchanges from resolver configuration
pub trait ExchangeFactory: Send + Sync {
    /// Create an Exchange from resolver configuration
    fn create(
        &self,
        config: &crate::config::ResolverConfig,
    ) -> Result<std::sync::Arc<dyn Exchange>, crate::Error>;
}
