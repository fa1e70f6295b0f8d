use crate::core::block::{leading_zero_bytes, HASH_LEN};
use crate::core::Block;
use crate::error::{BlockchainError, Result};
use crate::utils::fork_rng;
use data_encoding::HEXLOWER;
use log::info;
use rand::rngs::SmallRng;
use rand::RngCore;

/// Default length of a mined nonce in bytes
pub const DEFAULT_NONCE_LEN: usize = 32;

/// Nonce search for blocks.
///
/// Mining takes the block by `&mut`, so a single block can never be mined
/// from two places at once.
pub struct Miner {
    rng: SmallRng,
    nonce_len: usize,
}

impl Default for Miner {
    fn default() -> Self {
        Self::new()
    }
}

impl Miner {
    pub fn new() -> Miner {
        Miner::with_nonce_len(DEFAULT_NONCE_LEN)
    }

    pub fn with_nonce_len(nonce_len: usize) -> Miner {
        Miner {
            rng: fork_rng(),
            nonce_len,
        }
    }

    /// Draws random nonces until the block hash has exactly
    /// `block.difficulty` leading zero bytes, leaving the winning nonce and
    /// hash on the block. Blocks the calling thread for the whole search.
    pub fn mine_block(&mut self, block: &mut Block) -> Result<Vec<u8>> {
        let difficulty = block.get_difficulty();
        if difficulty > HASH_LEN {
            return Err(BlockchainError::Mining(format!(
                "Difficulty {difficulty} exceeds the {HASH_LEN}-byte hash"
            )));
        }

        let mut nonce = vec![0u8; self.nonce_len];
        let mut attempts: u64 = 0;
        loop {
            attempts += 1;
            self.rng.fill_bytes(&mut nonce);
            block.set_nonce(&nonce);
            let hash = block.compute_hash();

            if leading_zero_bytes(&hash) == difficulty {
                info!(
                    "Mined block {} after {attempts} attempts (difficulty {difficulty}): {}",
                    block.get_index(),
                    HEXLOWER.encode(&hash)
                );
                block.set_seal(nonce.clone(), hash);
                return Ok(nonce);
            }
        }
    }
}
