use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio::{net::TcpStream, time::timeout};

use crate::{
    error::RpcError,
    message::{Reply, Request},
    types::Value,
    util,
};

/// Default per-call deadline. A peer that does not answer within this
/// window counts as unreachable for the current round.
pub const CALL_TIMEOUT: Duration = Duration::from_millis(250);

/// Outbound side of the RPC surface. The proposer talks to remote peers
/// exclusively through this seam; self-calls bypass it entirely.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Transport<C: Value>: Send + Sync {
    /// One request/response exchange with the peer at `addr`. Any
    /// failure, timeout included, means the reply was not received.
    async fn call(&self, addr: &str, request: Request<C>) -> Result<Reply<C>, RpcError>;
}

/// Dial-per-call TCP transport carrying length-prefixed bincode frames.
pub struct TcpTransport {
    call_timeout: Duration,
}

impl TcpTransport {
    pub fn new(call_timeout: Duration) -> Self {
        Self { call_timeout }
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new(CALL_TIMEOUT)
    }
}

#[async_trait]
impl<C> Transport<C> for TcpTransport
where
    C: Value,
{
    async fn call(&self, addr: &str, request: Request<C>) -> Result<Reply<C>, RpcError> {
        timeout(self.call_timeout, async {
            let mut stream = TcpStream::connect(addr).await?;
            util::send_message(&mut stream, &request).await?;
            util::recv_message(&mut stream).await
        })
        .await
        .map_err(|_| RpcError::Timeout(self.call_timeout))?
    }
}
