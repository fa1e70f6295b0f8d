//! Shared fixtures: funded ledgers, signed transfers and an in-memory overlay

use crate::core::{Amount, Block, Ledger, Miner, PublicKey, Transaction};
use crate::error::{BlockchainError, Result};
use crate::network::{NodeId, OverlayNode, Packet, PacketType, Reply, Transport};
use crate::wallet::{Signer, Wallet};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

/// A ledger whose genesis block pays each `(key, amount)` from `issuer`.
pub fn funded_ledger(issuer: &Wallet, allocations: &[(&PublicKey, Amount)]) -> Ledger {
    let transactions = allocations
        .iter()
        .map(|(key, amount)| signed_tx(issuer, key, *amount))
        .collect();
    let mut genesis = Block::new_genesis(transactions, 1).unwrap();
    Miner::new().mine_block(&mut genesis).unwrap();
    Ledger::new(genesis).unwrap()
}

/// A transfer from `from` to `to`, signed by `from`.
pub fn signed_tx(from: &Wallet, to: &PublicKey, amount: Amount) -> Transaction {
    let mut tx = Transaction::new(from.public_key().clone(), to.clone(), amount, b"").unwrap();
    tx.sign_with(from).unwrap();
    tx
}

/// Address book standing in for the network: nodes are found by listen address
/// and packets are handled synchronously on the sender's thread.
#[derive(Default)]
pub struct MemoryHub {
    nodes: Mutex<HashMap<String, Weak<OverlayNode>>>,
    deliveries: Mutex<Vec<(String, PacketType)>>,
}

impl MemoryHub {
    pub fn new() -> Arc<MemoryHub> {
        Arc::new(MemoryHub::default())
    }

    pub fn register(&self, node: &Arc<OverlayNode>) {
        self.nodes
            .lock()
            .unwrap()
            .insert(node.listen_addr().to_string(), Arc::downgrade(node));
    }

    pub fn deliveries_of(&self, kind: PacketType) -> usize {
        let deliveries = self.deliveries.lock().unwrap();
        deliveries.iter().filter(|(_, k)| *k == kind).count()
    }

    pub fn deliveries_to(&self, addr: &str) -> usize {
        let deliveries = self.deliveries.lock().unwrap();
        deliveries.iter().filter(|(a, _)| a == addr).count()
    }

    pub fn total_deliveries(&self) -> usize {
        self.deliveries.lock().unwrap().len()
    }

    fn lookup(&self, addr: &str) -> Option<Arc<OverlayNode>> {
        self.nodes.lock().unwrap().get(addr).and_then(Weak::upgrade)
    }
}

/// Transport for one node on the hub; `host` is what receivers observe as
/// the sender's address.
pub struct MemoryTransport {
    hub: Arc<MemoryHub>,
    host: String,
}

impl Transport for MemoryTransport {
    fn send(&self, addr: &str, packet: &Packet) -> Result<Reply> {
        self.hub
            .deliveries
            .lock()
            .unwrap()
            .push((addr.to_string(), packet.kind));
        // Looked up and released before handling; handlers send onwards
        let node = self
            .hub
            .lookup(addr)
            .ok_or_else(|| BlockchainError::Network(format!("Nothing listening at {addr}")))?;
        node.handle_packet(packet.clone(), &self.host)
    }
}

/// A node listening at `host:port` on `hub`.
pub fn spawn_node(hub: &Arc<MemoryHub>, host: &str, port: u16) -> Arc<OverlayNode> {
    spawn_node_with_hops(hub, host, port, crate::network::HOP_LIMIT_DEFAULT)
}

pub fn spawn_node_with_hops(
    hub: &Arc<MemoryHub>,
    host: &str,
    port: u16,
    hop_limit: u32,
) -> Arc<OverlayNode> {
    let transport = Arc::new(MemoryTransport {
        hub: Arc::clone(hub),
        host: host.to_string(),
    });
    let node = Arc::new(
        OverlayNode::new(&format!("{host}:{port}"), transport).with_hop_limit(hop_limit),
    );
    hub.register(&node);
    node
}

/// Puts every node in every other node's peer table.
pub fn fully_connect(nodes: &[&Arc<OverlayNode>]) {
    for node in nodes {
        let local_id: NodeId = node.id().unwrap();
        for other in nodes {
            let record = other.own_record().unwrap();
            if record.id != local_id {
                node.peers().insert(record).unwrap();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_funded_ledger_pays_allocations() {
        let issuer = Wallet::new().unwrap();
        let alice = Wallet::new().unwrap();
        let ledger = funded_ledger(&issuer, &[(alice.public_key(), 25.0)]);

        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.account_balance(alice.public_key(), None, &[]), 25.0);
        assert!(ledger.chain_is_valid());
    }

    #[test]
    fn test_signed_tx_verifies() {
        let alice = Wallet::new().unwrap();
        let bob = Wallet::new().unwrap();
        assert!(signed_tx(&alice, bob.public_key(), 3.0).verify_signature());
    }

    #[test]
    fn test_unknown_destinations() {
        let hub = MemoryHub::new();
        let a = spawn_node(&hub, "10.0.0.1", 8080);
        assert!(a.send_msg(&NodeId::random(), b"x").is_ok());
        assert!(a.join("10.9.9.9:1").is_err());
    }
}
