use crate::error::{BlockchainError, Result};
use crate::network::NodeId;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// What a node knows about another node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRecord {
    pub id: NodeId,
    pub addr: String,
    /// Informational capacity scores
    pub cpu_power: i64,
    pub net_power: i64,
}

impl PeerRecord {
    pub fn new(id: NodeId, addr: &str) -> PeerRecord {
        PeerRecord {
            id,
            addr: addr.to_string(),
            cpu_power: 0,
            net_power: 0,
        }
    }
}

/// Known peers keyed by exact ID bytes.
///
/// Every operation is one critical section and none of them touch the
/// network, so the lock is never held across a send.
pub struct PeerTable {
    inner: Mutex<HashMap<NodeId, PeerRecord>>,
}

impl Default for PeerTable {
    fn default() -> Self {
        Self::new()
    }
}

impl PeerTable {
    pub fn new() -> PeerTable {
        PeerTable {
            inner: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<NodeId, PeerRecord>>> {
        self.inner
            .lock()
            .map_err(|e| BlockchainError::Lock(format!("Failed to acquire peer lock: {e}")))
    }

    /// Inserts or overwrites the record for `peer.id`.
    pub fn insert(&self, peer: PeerRecord) -> Result<()> {
        let mut peers = self.lock()?;
        if peers.insert(peer.id.clone(), peer.clone()).is_none() {
            info!("Registered peer {} at {}", peer.id, peer.addr);
        }
        Ok(())
    }

    /// Records `addr` for `id`, keeping any capacity scores already known.
    pub fn upsert_addr(&self, id: &NodeId, addr: &str) -> Result<()> {
        let mut peers = self.lock()?;
        match peers.get_mut(id) {
            Some(peer) => peer.addr = addr.to_string(),
            None => {
                info!("Discovered peer {id} at {addr}");
                peers.insert(id.clone(), PeerRecord::new(id.clone(), addr));
            }
        }
        Ok(())
    }

    /// Registers a newly joined peer and returns the table as it stood just
    /// before, both under one lock so concurrent joiners see each other.
    pub fn register(&self, peer: PeerRecord) -> Result<Vec<PeerRecord>> {
        let mut peers = self.lock()?;
        let before = peers.values().cloned().collect();
        info!("Registered peer {} at {}", peer.id, peer.addr);
        peers.insert(peer.id.clone(), peer);
        Ok(before)
    }

    /// Adds every record except the one for `local_id`.
    pub fn merge(&self, records: Vec<PeerRecord>, local_id: &NodeId) -> Result<()> {
        let mut peers = self.lock()?;
        for record in records.into_iter().filter(|r| &r.id != local_id) {
            peers.insert(record.id.clone(), record);
        }
        Ok(())
    }

    pub fn remove(&self, id: &NodeId) -> Result<Option<PeerRecord>> {
        let removed = self.lock()?.remove(id);
        if let Some(peer) = &removed {
            info!("Removed peer {} at {}", peer.id, peer.addr);
        }
        Ok(removed)
    }

    pub fn get(&self, id: &NodeId) -> Result<Option<PeerRecord>> {
        Ok(self.lock()?.get(id).cloned())
    }

    pub fn contains(&self, id: &NodeId) -> Result<bool> {
        Ok(self.lock()?.contains_key(id))
    }

    /// Copy of every record, for iterating without holding the lock.
    pub fn snapshot(&self) -> Result<Vec<PeerRecord>> {
        Ok(self.lock()?.values().cloned().collect())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }
}
