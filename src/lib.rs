//! # Floodchain
//!
//! A small proof-of-work ledger next to a flooding peer-to-peer overlay.
//!
//! ## Layout
//! - `core/`: transactions, blocks, the miner and the ledger that admits
//!   blocks and validates the chain
//! - `wallet/`: the `Signer` trait and an in-process P-384 wallet
//! - `storage/`: the pending transaction pool
//! - `network/`: packets, the peer table, routing, the overlay node and its
//!   TCP server and transport
//! - `config/`: defaults, TOML file and environment overrides
//! - `utils/`: hashing, ECDSA helpers, encodings and the seeded random source
//! - `cli/`: argument parsing for the `floodchain` binary
//!
//! ## Where to start
//! 1. `core/blockchain.rs` for balances, block admission and chain validation
//! 2. `core/proof_of_work.rs` for how a block gets sealed
//! 3. `network/node.rs` for what a node does with each packet type
//! 4. `network/router.rs` for singlecast and flooding

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod network;
pub mod storage;
pub mod utils;
pub mod wallet;

#[cfg(test)]
pub mod testnet;

pub use cli::{Command, Opt};
pub use config::{Config, GLOBAL_CONFIG};
pub use core::{
    leading_zero_bytes, Amount, Block, Ledger, Miner, PublicKey, Signature, Transaction,
};
pub use error::{BlockchainError, Result};
pub use network::{
    JoinResponse, MessageQueue, NodeId, OverlayNode, Packet, PacketType, PeerRecord, PeerTable,
    Reply, Router, SendType, Server, TcpTransport, Transport, WirePacket,
};
pub use storage::TransactionPool;
pub use utils::{current_timestamp, gen_rand_bytes, new_key_pair, sha256_digest};
pub use wallet::{Signer, Wallet};
