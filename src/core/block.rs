use crate::core::Transaction;
use crate::error::Result;
use crate::utils::{current_timestamp, put_length_prefixed, sha256_digest};
use data_encoding::HEXLOWER;
use serde::{Deserialize, Serialize};

/// Length of a block hash in bytes, and therefore the largest difficulty
/// a block can carry.
pub const HASH_LEN: u32 = 32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    index: u64,
    hash: Vec<u8>,
    prev_hash: Vec<u8>,
    timestamp: u64,
    /// Exact number of leading zero bytes the hash must have
    difficulty: u32,
    nonce: Vec<u8>,
    transactions: Vec<Transaction>,
}

impl Block {
    /// Creates an unsealed candidate block. The hash and nonce are filled in
    /// by mining, the index and previous hash by ledger admission.
    pub fn new_block(index: u64, transactions: Vec<Transaction>, difficulty: u32) -> Result<Block> {
        Ok(Block {
            index,
            hash: Vec::new(),
            prev_hash: Vec::new(),
            timestamp: current_timestamp()?,
            difficulty,
            nonce: Vec::new(),
            transactions,
        })
    }

    /// The first block of a ledger. Its transactions are the initial allocation.
    pub fn new_genesis(transactions: Vec<Transaction>, difficulty: u32) -> Result<Block> {
        Block::new_block(0, transactions, difficulty)
    }

    /// HASH(timestamp || difficulty || nonce || transactions). The index and
    /// previous hash are outside the sealed content.
    pub fn compute_hash(&self) -> Vec<u8> {
        let mut data = vec![];
        data.extend(self.timestamp.to_be_bytes());
        data.extend(self.difficulty.to_be_bytes());
        put_length_prefixed(&mut data, &self.nonce);
        data.extend((self.transactions.len() as u32).to_be_bytes());
        for tx in &self.transactions {
            tx.write_to(&mut data);
        }
        sha256_digest(&data)
    }

    /// Recomputes the hash from the current fields and checks it against the
    /// stored hash and the difficulty.
    pub fn hash_is_valid(&self) -> bool {
        let expected = self.compute_hash();
        expected == self.hash && leading_zero_bytes(&expected) == self.difficulty
    }

    pub fn get_index(&self) -> u64 {
        self.index
    }

    pub fn get_hash(&self) -> &[u8] {
        self.hash.as_slice()
    }

    pub fn get_hash_hex(&self) -> String {
        HEXLOWER.encode(&self.hash)
    }

    pub fn get_prev_hash(&self) -> &[u8] {
        self.prev_hash.as_slice()
    }

    pub fn get_timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn get_difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn get_nonce(&self) -> &[u8] {
        self.nonce.as_slice()
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    pub(crate) fn set_seal(&mut self, nonce: Vec<u8>, hash: Vec<u8>) {
        self.nonce = nonce;
        self.hash = hash;
    }

    pub(crate) fn set_nonce(&mut self, nonce: &[u8]) {
        self.nonce.clear();
        self.nonce.extend_from_slice(nonce);
    }

    pub(crate) fn link(&mut self, index: u64, prev_hash: Vec<u8>) {
        self.index = index;
        self.prev_hash = prev_hash;
    }

    /// Drops the transactions at `indices`. Indices may repeat.
    pub(crate) fn prune_transactions(&mut self, indices: &[usize]) {
        let mut position = 0;
        self.transactions.retain(|_| {
            let keep = !indices.contains(&position);
            position += 1;
            keep
        });
    }

    #[cfg(test)]
    pub(crate) fn transactions_mut(&mut self) -> &mut Vec<Transaction> {
        &mut self.transactions
    }

    #[cfg(test)]
    pub(crate) fn set_timestamp(&mut self, timestamp: u64) {
        self.timestamp = timestamp;
    }
}

/// Number of zero bytes at the front of `hash`.
pub fn leading_zero_bytes(hash: &[u8]) -> u32 {
    hash.iter().take_while(|b| **b == 0).count() as u32
}
