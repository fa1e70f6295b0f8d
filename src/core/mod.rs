//! Core ledger functionality
//!
//! Transactions, blocks, the proof-of-work miner and the ledger that
//! admits and validates blocks.

pub mod block;
pub mod blockchain;
pub mod proof_of_work;
pub mod transaction;

pub use block::{leading_zero_bytes, Block, HASH_LEN};
pub use blockchain::Ledger;
pub use proof_of_work::{Miner, DEFAULT_NONCE_LEN};
pub use transaction::{Amount, PublicKey, Signature, Transaction, TRANSACTION_VERSION};
