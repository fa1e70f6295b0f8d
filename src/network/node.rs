use crate::error::{BlockchainError, Result};
use crate::network::router::{route, Route};
use crate::network::seen::{SeenSet, SEEN_CAPACITY};
use crate::network::{
    JoinResponse, MessageQueue, NodeId, Packet, PacketType, PeerRecord, PeerTable, Reply, Router,
    SendType, Transport, HOP_LIMIT_DEFAULT,
};
use crate::utils::sha256_digest;
use log::{debug, info, warn};
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, RwLock};

/// The ID and address this node is known by. Both start out as the node's own
/// guesses and are replaced by whatever the bootstrap assigns on join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalIdentity {
    pub id: NodeId,
    pub addr: String,
}

/// One participant in the flooding overlay.
///
/// Inbound packets arrive through [`OverlayNode::handle_packet`]; everything
/// else is an outbound operation. No lock is held while a packet is in flight,
/// so handlers may re-enter this node through the transport.
pub struct OverlayNode {
    identity: RwLock<LocalIdentity>,
    listen_addr: String,
    cpu_power: i64,
    net_power: i64,
    hop_limit: u32,
    peers: Arc<PeerTable>,
    messages: MessageQueue,
    router: Router,
    /// Nodes whose LEAVE has already been relayed
    seen_leaves: SeenSet<NodeId>,
    /// Broadcasts already handled, by originator and payload digest
    seen_broadcasts: SeenSet<(NodeId, Vec<u8>)>,
}

impl OverlayNode {
    pub fn new(listen_addr: &str, transport: Arc<dyn Transport>) -> OverlayNode {
        let peers = Arc::new(PeerTable::new());
        OverlayNode {
            identity: RwLock::new(LocalIdentity {
                id: NodeId::random(),
                addr: listen_addr.to_string(),
            }),
            listen_addr: listen_addr.to_string(),
            cpu_power: 0,
            net_power: 0,
            hop_limit: HOP_LIMIT_DEFAULT,
            router: Router::new(Arc::clone(&peers), transport),
            peers,
            messages: MessageQueue::new(),
            seen_leaves: SeenSet::new(SEEN_CAPACITY),
            seen_broadcasts: SeenSet::new(SEEN_CAPACITY),
        }
    }

    pub fn with_capacity(mut self, cpu_power: i64, net_power: i64) -> OverlayNode {
        self.cpu_power = cpu_power;
        self.net_power = net_power;
        self
    }

    /// Hop budget stamped on every packet this node originates.
    pub fn with_hop_limit(mut self, hop_limit: u32) -> OverlayNode {
        self.hop_limit = hop_limit;
        self
    }

    pub fn identity(&self) -> Result<LocalIdentity> {
        self.identity
            .read()
            .map(|identity| identity.clone())
            .map_err(|e| BlockchainError::Lock(format!("Failed to acquire identity lock: {e}")))
    }

    pub fn id(&self) -> Result<NodeId> {
        Ok(self.identity()?.id)
    }

    pub fn listen_addr(&self) -> &str {
        &self.listen_addr
    }

    pub fn own_record(&self) -> Result<PeerRecord> {
        let identity = self.identity()?;
        Ok(PeerRecord {
            id: identity.id,
            addr: identity.addr,
            cpu_power: self.cpu_power,
            net_power: self.net_power,
        })
    }

    pub fn peers(&self) -> &PeerTable {
        &self.peers
    }

    pub fn messages(&self) -> &MessageQueue {
        &self.messages
    }

    /// Takes every queued message from `peer_id`.
    pub fn drain_messages(&self, peer_id: &NodeId) -> Vec<Packet> {
        self.messages.drain(peer_id)
    }

    fn outgoing(&self, kind: PacketType, data: &[u8]) -> Result<Packet> {
        let identity = self.identity()?;
        Ok(Packet::new(kind, identity.id, &identity.addr, data).with_hop_limit(self.hop_limit))
    }

    fn known_addr(&self, peer_id: &NodeId) -> Result<String> {
        Ok(self
            .peers
            .get(peer_id)?
            .map(|peer| peer.addr)
            .unwrap_or_default())
    }

    /// Asks the bootstrap node at `bootstrap_addr` for an identity and its
    /// view of the overlay.
    pub fn join(&self, bootstrap_addr: &str) -> Result<()> {
        let packet = self
            .outgoing(PacketType::Join, self.listen_addr.as_bytes())?
            .to(NodeId::default(), bootstrap_addr);

        let response = match self.router.transmit(bootstrap_addr, &packet)? {
            Reply::Join(response) => response,
            other => {
                return Err(BlockchainError::Network(format!(
                    "Unexpected reply to JOIN from {bootstrap_addr}: {other:?}"
                )))
            }
        };

        {
            let mut identity = self.identity.write().map_err(|e| {
                BlockchainError::Lock(format!("Failed to acquire identity lock: {e}"))
            })?;
            identity.id = response.id.clone();
            identity.addr = response.addr.clone();
        }

        let known = response.peers.len();
        self.peers.merge(response.peers, &response.id)?;
        self.peers.insert(response.bootstrap)?;
        info!(
            "Joined overlay via {bootstrap_addr} as {} at {} ({known} peers reported)",
            response.id, response.addr
        );
        Ok(())
    }

    pub fn ping(&self, peer_id: &NodeId) -> Result<()> {
        let packet = self
            .outgoing(PacketType::Ping, b"")?
            .to(peer_id.clone(), &self.known_addr(peer_id)?);
        self.router.send_singlecast(&packet)
    }

    /// Answers a ping, straight to `peer_addr` when it is given.
    pub fn pong(&self, peer_id: &NodeId, peer_addr: &str) -> Result<()> {
        let packet = self
            .outgoing(PacketType::Pong, b"")?
            .to(peer_id.clone(), peer_addr);
        if peer_addr.is_empty() {
            return self.router.send_singlecast(&packet);
        }
        self.router.transmit(peer_addr, &packet).map(|_| ())
    }

    pub fn send_msg(&self, peer_id: &NodeId, data: &[u8]) -> Result<()> {
        let packet = self
            .outgoing(PacketType::Send, data)?
            .to(peer_id.clone(), &self.known_addr(peer_id)?);
        self.router.send_singlecast(&packet)
    }

    pub fn broadcast_msg(&self, data: &[u8]) -> Result<()> {
        let packet = self
            .outgoing(PacketType::Broadcast, data)?
            .with_send_type(SendType::Broadcast);
        self.router.broadcast_flood(&packet)
    }

    /// Replies to a broadcast from `peer_id`.
    pub fn broadcast_response(&self, peer_id: &NodeId, data: &[u8]) -> Result<()> {
        let packet = self
            .outgoing(PacketType::BroadcastResponse, data)?
            .to(peer_id.clone(), &self.known_addr(peer_id)?);
        self.router.send_singlecast(&packet)
    }

    /// Tells every peer this node is going away.
    pub fn leave(&self) -> Result<()> {
        let packet = self
            .outgoing(PacketType::Leave, b"")?
            .with_send_type(SendType::Broadcast);
        self.router.broadcast_flood(&packet)?;
        info!("Left the overlay");
        Ok(())
    }

    /// Processes one inbound packet. `observed_host` is the remote host the
    /// packet came from as seen by the listener.
    pub fn handle_packet(&self, packet: Packet, observed_host: &str) -> Result<Reply> {
        debug!(
            "Received {} packet from {} ({} hops left)",
            packet.kind, packet.source_id, packet.hop_limit
        );

        // JOIN carries no destination yet, so it never goes through routing
        if packet.kind == PacketType::Join {
            return self.handle_join(&packet, observed_host).map(Reply::Join);
        }

        let local_id = self.id()?;
        if packet.kind == PacketType::Pong && packet.source_id != local_id {
            self.peers
                .upsert_addr(&packet.source_id, &packet.source_addr)?;
        }

        match route(&packet, &local_id) {
            Route::Mine => self.deliver(packet)?,
            Route::Boomerang => debug!("Dropped own {} packet", packet.kind),
            Route::Expired => debug!(
                "Dropped {} packet from {}: hop limit exhausted",
                packet.kind, packet.source_id
            ),
            Route::Forward(next) => self.relay(&next, self.router.forward(&next)),
        }
        Ok(Reply::Ack)
    }

    fn handle_join(&self, packet: &Packet, observed_host: &str) -> Result<JoinResponse> {
        let claimed = std::str::from_utf8(&packet.data)
            .map_err(|e| BlockchainError::Decode(format!("JOIN address is not UTF-8: {e}")))?;
        let port = claimed
            .rsplit(':')
            .next()
            .and_then(|port| port.parse::<u16>().ok())
            .ok_or_else(|| {
                BlockchainError::Decode(format!("JOIN address has no valid port: {claimed:?}"))
            })?;

        let addr = match observed_host.parse::<IpAddr>() {
            Ok(ip) => SocketAddr::new(ip, port).to_string(),
            Err(_) => format!("{observed_host}:{port}"),
        };
        let id = NodeId::random();

        let peers = self.peers.register(PeerRecord::new(id.clone(), &addr))?;
        info!("Admitted {id} at {addr} (claimed {claimed})");

        Ok(JoinResponse {
            peers,
            id,
            addr,
            bootstrap: self.own_record()?,
        })
    }

    fn deliver(&self, packet: Packet) -> Result<()> {
        match packet.kind {
            PacketType::Ping => self.pong(&packet.source_id, &packet.source_addr)?,
            PacketType::Send | PacketType::BroadcastResponse => self.messages.enqueue(packet),
            PacketType::Broadcast => {
                let key = (packet.source_id.clone(), sha256_digest(&packet.data));
                if !self.seen_broadcasts.insert(key)? {
                    debug!("Dropped repeated broadcast from {}", packet.source_id);
                    return Ok(());
                }
                if let Some(next) = packet.next_hop() {
                    self.relay(&next, self.router.broadcast_flood(&next));
                }
                self.messages.enqueue(packet);
            }
            PacketType::Leave => {
                // Only the first copy is relayed, whether or not the
                // leaving node was ever in this table
                if !self.seen_leaves.insert(packet.source_id.clone())? {
                    return Ok(());
                }
                if let Some(next) = packet.next_hop() {
                    self.relay(&next, self.router.broadcast_flood(&next));
                }
                self.peers.remove(&packet.source_id)?;
            }
            PacketType::Pong | PacketType::Join => {}
        }
        Ok(())
    }

    fn relay(&self, packet: &Packet, sent: Result<()>) {
        if let Err(e) = sent {
            warn!(
                "Failed to relay {} packet from {}: {e}",
                packet.kind, packet.source_id
            );
        }
    }
}
