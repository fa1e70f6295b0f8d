use crate::error::{BlockchainError, Result};
use crate::network::{NodeId, Packet, PeerRecord};
use log::debug;
use serde::{Deserialize, Serialize};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// What the bootstrap node hands a joining node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinResponse {
    /// Bootstrap's peer table as it stood when the joiner was registered
    pub peers: Vec<PeerRecord>,
    pub id: NodeId,
    pub addr: String,
    pub bootstrap: PeerRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum Reply {
    Ack,
    Join(JoinResponse),
    Rejected { reason: String },
}

/// Carries a packet to the node listening at `addr` and returns its reply.
pub trait Transport: Send + Sync {
    fn send(&self, addr: &str, packet: &Packet) -> Result<Reply>;
}

/// One JSON-encoded wire packet per TCP connection, answered by one reply.
pub struct TcpTransport {
    timeout: Duration,
}

impl TcpTransport {
    pub fn new(timeout: Duration) -> TcpTransport {
        TcpTransport { timeout }
    }

    fn resolve(addr: &str) -> Result<SocketAddr> {
        addr.to_socket_addrs()
            .map_err(|e| BlockchainError::Network(format!("Invalid address {addr}: {e}")))?
            .next()
            .ok_or_else(|| BlockchainError::Network(format!("No address found for {addr}")))
    }
}

impl Transport for TcpTransport {
    fn send(&self, addr: &str, packet: &Packet) -> Result<Reply> {
        let socket_addr = Self::resolve(addr)?;
        debug!("Sending {} packet to {socket_addr}", packet.kind);

        let stream = TcpStream::connect_timeout(&socket_addr, self.timeout)
            .map_err(|e| BlockchainError::Network(format!("Failed to connect to {addr}: {e}")))?;
        stream
            .set_write_timeout(Some(self.timeout))
            .map_err(|e| BlockchainError::Network(format!("Failed to set write timeout: {e}")))?;
        stream
            .set_read_timeout(Some(self.timeout))
            .map_err(|e| BlockchainError::Network(format!("Failed to set read timeout: {e}")))?;

        serde_json::to_writer(&stream, &packet.to_wire())
            .map_err(|e| BlockchainError::Network(format!("Failed to send data: {e}")))?;
        stream
            .shutdown(Shutdown::Write)
            .map_err(|e| BlockchainError::Network(format!("Failed to finish request: {e}")))?;

        let reply: Reply = serde_json::from_reader(&stream)
            .map_err(|e| BlockchainError::Network(format!("Failed to read reply from {addr}: {e}")))?;
        match reply {
            Reply::Rejected { reason } => Err(BlockchainError::Network(format!(
                "{addr} rejected {} packet: {reason}",
                packet.kind
            ))),
            reply => Ok(reply),
        }
    }
}
