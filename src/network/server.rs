use crate::error::{BlockchainError, Result};
use crate::network::{OverlayNode, Packet, Reply, WirePacket};
use log::{debug, error, info, warn};
use serde_json::Deserializer;
use std::io::BufReader;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const TCP_READ_TIMEOUT: u64 = 60;

/// Accepts overlay connections and hands each packet to the node.
pub struct Server {
    listener: TcpListener,
    node: Arc<OverlayNode>,
}

impl Server {
    pub fn bind(addr: &str, node: Arc<OverlayNode>) -> Result<Server> {
        let listener = TcpListener::bind(addr)
            .map_err(|e| BlockchainError::Network(format!("Failed to bind to {addr}: {e}")))?;
        Ok(Server { listener, node })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| BlockchainError::Network(format!("Failed to read local address: {e}")))
    }

    /// Serves forever, one thread per connection.
    pub fn run(&self) -> Result<()> {
        info!("Server listening on {}", self.local_addr()?);

        for stream in self.listener.incoming() {
            match stream {
                Ok(stream) => {
                    let peer_addr = match stream.peer_addr() {
                        Ok(addr) => addr,
                        Err(e) => {
                            error!("Failed to get peer address: {e}");
                            continue;
                        }
                    };

                    let node = Arc::clone(&self.node);
                    thread::spawn(move || {
                        if let Err(e) = Self::handle_connection(&node, stream, peer_addr) {
                            error!("Error handling connection from {peer_addr}: {e}");
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {e}");
                }
            }
        }

        Ok(())
    }

    /// Runs the accept loop on its own thread.
    pub fn spawn(self) -> JoinHandle<()> {
        thread::spawn(move || {
            if let Err(e) = self.run() {
                error!("Server stopped: {e}");
            }
        })
    }

    fn handle_connection(node: &OverlayNode, stream: TcpStream, peer_addr: SocketAddr) -> Result<()> {
        stream
            .set_read_timeout(Some(Duration::from_secs(TCP_READ_TIMEOUT)))
            .map_err(|e| BlockchainError::Network(format!("Failed to set read timeout: {e}")))?;

        let reader = BufReader::new(&stream);
        let wire = Deserializer::from_reader(reader)
            .into_iter::<WirePacket>()
            .next()
            .ok_or_else(|| BlockchainError::Network("Connection closed before a packet".to_string()))?
            .map_err(|e| BlockchainError::Network(format!("Failed to deserialize packet: {e}")))?;

        let observed_host = peer_addr.ip().to_string();
        let reply = match Packet::from_wire(&wire)
            .and_then(|packet| node.handle_packet(packet, &observed_host))
        {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Rejected {} packet from {peer_addr}: {e}", wire.kind);
                Reply::Rejected {
                    reason: e.to_string(),
                }
            }
        };

        serde_json::to_writer(&stream, &reply)
            .map_err(|e| BlockchainError::Network(format!("Failed to send reply: {e}")))?;
        if let Err(e) = stream.shutdown(Shutdown::Both) {
            debug!("Failed to shut down connection from {peer_addr}: {e}");
        }
        Ok(())
    }
}
