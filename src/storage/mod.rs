//! Node-local state that is not part of the ledger
//!
//! Currently just the pool of pending transactions.

pub mod memory_pool;

pub use memory_pool::TransactionPool;
