//! Flooding peer-to-peer overlay
//!
//! Nodes join through a bootstrap node, keep a table of known peers and pass
//! packets along by direct send or one-hop flooding, bounded by a hop budget.

pub mod message_queue;
pub mod node;
pub mod packet;
pub mod peer_table;
pub mod router;
pub mod seen;
pub mod server;
pub mod transport;

pub use message_queue::MessageQueue;
pub use node::{LocalIdentity, OverlayNode};
pub use packet::{
    NodeId, Packet, PacketType, SendType, WirePacket, HOP_LIMIT_DEFAULT, NODE_ID_LEN,
    PROTOCOL_VERSION,
};
pub use peer_table::{PeerRecord, PeerTable};
pub use router::{route, Route, Router};
pub use seen::{SeenSet, SEEN_CAPACITY};
pub use server::Server;
pub use transport::{JoinResponse, Reply, TcpTransport, Transport};
