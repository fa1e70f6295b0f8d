use crate::error::{BlockchainError, Result};
use crate::network::{NodeId, Packet, PeerTable, Reply, SendType, Transport};
use log::warn;
use std::sync::Arc;

/// Where an inbound packet goes at this node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Addressed to this node
    Mine,
    /// This node's own packet came back around a cycle
    Boomerang,
    /// Hop budget ran out
    Expired,
    /// Pass on this copy, one hop already spent
    Forward(Packet),
}

/// Decides what to do with `packet` at the node identified by `local_id`.
pub fn route(packet: &Packet, local_id: &NodeId) -> Route {
    if &packet.destination_id == local_id {
        return Route::Mine;
    }
    if &packet.source_id == local_id {
        return Route::Boomerang;
    }
    match packet.next_hop() {
        Some(next) => Route::Forward(next),
        None => Route::Expired,
    }
}

/// Outbound half of the overlay: singlecast and flood over the peer table.
pub struct Router {
    peers: Arc<PeerTable>,
    transport: Arc<dyn Transport>,
}

impl Router {
    pub fn new(peers: Arc<PeerTable>, transport: Arc<dyn Transport>) -> Router {
        Router { peers, transport }
    }

    /// Sends to one address and returns the reply.
    pub fn transmit(&self, addr: &str, packet: &Packet) -> Result<Reply> {
        self.transport.send(addr, packet)
    }

    /// Sends straight to the destination when its address is known, from the
    /// peer table or the packet itself. Otherwise floods every peer except
    /// the packet's source and lets them carry it on.
    pub fn send_singlecast(&self, packet: &Packet) -> Result<()> {
        let known = self.peers.get(&packet.destination_id)?.map(|peer| peer.addr);
        let target = known.or_else(|| {
            (!packet.destination_addr.is_empty()).then(|| packet.destination_addr.clone())
        });

        match target {
            Some(addr) => self.transmit(&addr, packet).map(|_| ()),
            None => self.fan_out(packet, |_, _| packet.clone()),
        }
    }

    /// One-hop fan-out: a copy addressed to each peer except the source.
    pub fn broadcast_flood(&self, packet: &Packet) -> Result<()> {
        self.fan_out(packet, |peer_id, peer_addr| {
            packet.clone().to(peer_id.clone(), peer_addr)
        })
    }

    /// Sends a forwarded copy the same way its originator did.
    pub fn forward(&self, packet: &Packet) -> Result<()> {
        match packet.send_type {
            SendType::Singlecast => self.send_singlecast(packet),
            SendType::Broadcast => self.broadcast_flood(packet),
        }
    }

    // Every peer is attempted; the table lock is released before any send
    fn fan_out<F>(&self, packet: &Packet, address: F) -> Result<()>
    where
        F: Fn(&NodeId, &str) -> Packet,
    {
        let peers = self.peers.snapshot()?;
        let mut failures = Vec::new();

        for peer in peers.iter().filter(|p| p.id != packet.source_id) {
            let copy = address(&peer.id, &peer.addr);
            if let Err(e) = self.transmit(&peer.addr, &copy) {
                warn!("Failed to send {} packet to {}: {e}", packet.kind, peer.addr);
                failures.push(e);
            }
        }

        match failures.len() {
            0 => Ok(()),
            n => Err(BlockchainError::Network(format!(
                "{n} peer(s) unreachable, first failure: {}",
                failures[0]
            ))),
        }
    }
}
