// This is the ledger - the ordered, append-only list of sealed blocks
// Blocks only get in through add_block, which checks the seal and strips
// transactions that are unsigned or that the sender cannot pay for

use crate::core::{Amount, Block, Miner, PublicKey, Transaction};
use crate::error::{BlockchainError, Result};
use log::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct Ledger {
    blocks: Vec<Block>,
}

impl Ledger {
    // When I start a new ledger from a mined genesis block
    // The genesis transactions are the initial allocation, so only their
    // signatures are checked, never the sender's balance
    pub fn new(mut genesis: Block) -> Result<Ledger> {
        if !genesis.hash_is_valid() {
            return Err(BlockchainError::InvalidBlock(
                "Genesis block hash does not satisfy its difficulty".to_string(),
            ));
        }
        if let Some(i) = genesis
            .get_transactions()
            .iter()
            .position(|tx| !tx.verify_signature())
        {
            return Err(BlockchainError::InvalidBlock(format!(
                "Genesis transaction {i} has an invalid signature"
            )));
        }

        genesis.link(0, Vec::new());
        info!("Created ledger with genesis block {}", genesis.get_hash_hex());
        Ok(Ledger {
            blocks: vec![genesis],
        })
    }

    /// Wraps blocks received from elsewhere without checking them. Run
    /// [`Ledger::chain_is_valid`] before trusting the result.
    pub fn from_blocks(blocks: Vec<Block>) -> Ledger {
        Ledger { blocks }
    }

    pub fn get_blocks(&self) -> &[Block] {
        self.blocks.as_slice()
    }

    pub fn tip(&self) -> Option<&Block> {
        self.blocks.last()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Sum of `key`'s credits minus its debits over the first `upto` blocks
    /// (the whole ledger when `None`) plus everything in `pending`.
    ///
    /// History is assumed valid; nothing is re-verified here.
    pub fn account_balance(
        &self,
        key: &PublicKey,
        upto: Option<usize>,
        pending: &[Transaction],
    ) -> Amount {
        let count = upto.unwrap_or(self.blocks.len()).min(self.blocks.len());
        let on_chain: Amount = self.blocks[..count]
            .iter()
            .flat_map(|block| block.get_transactions())
            .map(|tx| tx.balance_delta(key))
            .sum();
        let in_pool: Amount = pending.iter().map(|tx| tx.balance_delta(key)).sum();
        on_chain + in_pool
    }

    /// A transfer is affordable when its (non-negative) amount does not
    /// exceed the sender's balance. This is the only double-spend guard.
    pub fn cost_is_valid(
        &self,
        tx: &Transaction,
        pending: &[Transaction],
        upto: Option<usize>,
    ) -> bool {
        let amount = tx.get_amount();
        if amount.is_nan() || amount < 0.0 {
            return false;
        }
        amount <= self.account_balance(tx.get_sender(), upto, pending)
    }

    /// Checks the seal, then strips every transaction with a bad signature or
    /// an unaffordable amount. Costs are evaluated against the ledger plus
    /// `pending` as if none of this block's transactions had landed yet.
    ///
    /// Returns false only when the hash check fails.
    pub fn block_is_valid(&self, block: &mut Block, pending: &[Transaction]) -> bool {
        if !block.hash_is_valid() {
            return false;
        }

        let mut invalid = Vec::new();
        for (i, tx) in block.get_transactions().iter().enumerate() {
            if !tx.verify_signature() {
                invalid.push(i);
            }
        }
        for (i, tx) in block.get_transactions().iter().enumerate() {
            if !self.cost_is_valid(tx, pending, None) {
                invalid.push(i);
            }
        }
        invalid.sort_unstable();
        invalid.dedup();

        if !invalid.is_empty() {
            warn!(
                "Pruning {} invalid transaction(s) from block {}: {:?}",
                invalid.len(),
                block.get_hash_hex(),
                invalid
            );
            block.prune_transactions(&invalid);
        }
        true
    }

    /// The single way onto the ledger. On acceptance the block is linked to
    /// the current tail and appended.
    pub fn add_block(&mut self, mut block: Block) -> bool {
        if !block.hash_is_valid() {
            warn!("Rejected block {}: bad hash", block.get_hash_hex());
            return false;
        }

        let before = block.get_transactions().len();
        if !self.block_is_valid(&mut block, &[]) {
            return false;
        }

        // Pruning changed the sealed content, so I have to seal it again
        if block.get_transactions().len() != before {
            if let Err(e) = Miner::new().mine_block(&mut block) {
                warn!("Rejected block: could not re-seal after pruning: {e}");
                return false;
            }
        }

        let prev_hash = self
            .tip()
            .map(|tip| tip.get_hash().to_vec())
            .unwrap_or_default();
        block.link(self.blocks.len() as u64, prev_hash);
        info!(
            "Appended block {} at index {} with {} transaction(s)",
            block.get_hash_hex(),
            block.get_index(),
            block.get_transactions().len()
        );
        self.blocks.push(block);
        true
    }

    // When I want to turn a set of transactions into the next block
    pub fn mine_block(
        &mut self,
        transactions: Vec<Transaction>,
        difficulty: u32,
        miner: &mut Miner,
    ) -> Result<Block> {
        let mut block = Block::new_block(self.blocks.len() as u64, transactions, difficulty)?;
        miner.mine_block(&mut block)?;

        if !self.add_block(block) {
            return Err(BlockchainError::InvalidBlock(
                "Mined block was rejected by the ledger".to_string(),
            ));
        }
        self.tip()
            .cloned()
            .ok_or_else(|| BlockchainError::InvalidBlock("Ledger is empty".to_string()))
    }

    /// Forward scan over the whole ledger. Every block needs a valid seal, its
    /// own index, signed transactions that were affordable given only the
    /// blocks before it, and a previous-hash link to its predecessor. The
    /// scan stops at the first block that fails.
    pub fn chain_is_valid(&self) -> bool {
        for (i, block) in self.blocks.iter().enumerate() {
            if !block.hash_is_valid() {
                warn!("Block {i} has an invalid hash");
                return false;
            }
            if block.get_index() != i as u64 {
                warn!("Block {i} records index {}", block.get_index());
                return false;
            }

            for tx in block.get_transactions() {
                if !tx.verify_signature() {
                    warn!("Block {i} contains a transaction with a bad signature");
                    return false;
                }
                // genesis transactions are the initial allocation
                if i > 0 && !self.cost_is_valid(tx, &[], Some(i)) {
                    warn!("Block {i} contains an unaffordable transaction");
                    return false;
                }
            }

            if i > 0 && block.get_prev_hash() != self.blocks[i - 1].get_hash() {
                warn!("Block {i} does not link to block {}", i - 1);
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testnet::{funded_ledger, signed_tx};
    use crate::wallet::{Signer, Wallet};

    struct Fixture {
        issuer: Wallet,
        alice: Wallet,
        bob: Wallet,
        ledger: Ledger,
    }

    // issuer -> alice 100 at genesis
    fn fixture() -> Fixture {
        let issuer = Wallet::new().unwrap();
        let alice = Wallet::new().unwrap();
        let bob = Wallet::new().unwrap();
        let ledger = funded_ledger(&issuer, &[(alice.public_key(), 100.0)]);
        Fixture {
            issuer,
            alice,
            bob,
            ledger,
        }
    }

    fn sealed(transactions: Vec<Transaction>) -> Block {
        let mut block = Block::new_block(0, transactions, 1).unwrap();
        Miner::new().mine_block(&mut block).unwrap();
        block
    }

    #[test]
    fn test_balance_after_spend() {
        let mut f = fixture();
        let spend = signed_tx(&f.alice, f.bob.public_key(), 40.0);
        assert!(f.ledger.add_block(sealed(vec![spend])));

        assert_eq!(f.ledger.account_balance(f.alice.public_key(), None, &[]), 60.0);
        assert_eq!(f.ledger.account_balance(f.bob.public_key(), None, &[]), 40.0);

        let overspend = signed_tx(&f.alice, f.bob.public_key(), 70.0);
        assert!(!f.ledger.cost_is_valid(&overspend, &[], None));

        let exact = signed_tx(&f.alice, f.bob.public_key(), 60.0);
        assert!(f.ledger.cost_is_valid(&exact, &[], None));
    }

    #[test]
    fn test_balance_truncated_at_index() {
        let mut f = fixture();
        let spend = signed_tx(&f.alice, f.bob.public_key(), 40.0);
        assert!(f.ledger.add_block(sealed(vec![spend])));

        assert_eq!(f.ledger.account_balance(f.alice.public_key(), Some(1), &[]), 100.0);
        assert_eq!(f.ledger.account_balance(f.alice.public_key(), Some(0), &[]), 0.0);
        assert_eq!(f.ledger.account_balance(f.alice.public_key(), Some(99), &[]), 60.0);
    }

    #[test]
    fn test_pending_pool_counts_toward_balance() {
        let f = fixture();
        let pending = vec![signed_tx(&f.alice, f.bob.public_key(), 30.0)];

        assert_eq!(
            f.ledger.account_balance(f.alice.public_key(), None, &pending),
            70.0
        );
        let spend = signed_tx(&f.alice, f.bob.public_key(), 80.0);
        assert!(!f.ledger.cost_is_valid(&spend, &pending, None));
    }

    #[test]
    fn test_negative_amount_is_not_affordable() {
        let f = fixture();
        let reverse = signed_tx(&f.bob, f.alice.public_key(), -10.0);
        assert!(!f.ledger.cost_is_valid(&reverse, &[], None));
    }

    #[test]
    fn test_add_block_links_to_tail() {
        let mut f = fixture();
        let genesis_hash = f.ledger.tip().unwrap().get_hash().to_vec();

        assert!(f.ledger.add_block(sealed(vec![])));
        let tip = f.ledger.tip().unwrap();
        assert_eq!(tip.get_index(), 1);
        assert_eq!(tip.get_prev_hash(), genesis_hash.as_slice());
        assert!(f.ledger.chain_is_valid());
    }

    #[test]
    fn test_add_block_rejects_bad_seal() {
        let mut f = fixture();
        let mut block = sealed(vec![]);
        block.set_timestamp(block.get_timestamp() + 1);

        assert!(!f.ledger.add_block(block));
        assert_eq!(f.ledger.len(), 1);
    }

    #[test]
    fn test_block_is_valid_prunes_bad_transactions() {
        let f = fixture();
        let good = signed_tx(&f.alice, f.bob.public_key(), 10.0);
        let broke = signed_tx(&f.bob, f.alice.public_key(), 5.0);
        let mut forged = signed_tx(&f.alice, f.bob.public_key(), 1.0);
        forged.set_amount(2.0);
        // unsigned and unaffordable, listed under both checks
        let mut both = signed_tx(&f.bob, f.alice.public_key(), 50.0);
        both.set_payload(b"tampered");

        let mut block = sealed(vec![good.clone(), broke, forged, both]);
        assert!(f.ledger.block_is_valid(&mut block, &[]));
        assert_eq!(block.get_transactions(), &[good]);
    }

    #[test]
    fn test_block_is_valid_uses_pending_pool() {
        let f = fixture();
        let pending = vec![signed_tx(&f.alice, f.bob.public_key(), 95.0)];
        let spend = signed_tx(&f.alice, f.bob.public_key(), 10.0);

        let mut block = sealed(vec![spend]);
        assert!(f.ledger.block_is_valid(&mut block, &pending));
        assert!(block.get_transactions().is_empty());
    }

    #[test]
    fn test_pruned_block_is_resealed() {
        let mut f = fixture();
        let good = signed_tx(&f.alice, f.bob.public_key(), 10.0);
        let broke = signed_tx(&f.bob, f.issuer.public_key(), 500.0);

        assert!(f.ledger.add_block(sealed(vec![good.clone(), broke])));
        let tip = f.ledger.tip().unwrap();
        assert_eq!(tip.get_transactions(), &[good]);
        assert!(tip.hash_is_valid());
        assert!(f.ledger.chain_is_valid());
    }

    #[test]
    fn test_block_transactions_checked_against_prior_state_only() {
        let mut f = fixture();
        // bob cannot spend what he receives in the same block
        let pay_bob = signed_tx(&f.alice, f.bob.public_key(), 50.0);
        let bob_spends = signed_tx(&f.bob, f.issuer.public_key(), 20.0);

        assert!(f.ledger.add_block(sealed(vec![pay_bob.clone(), bob_spends])));
        assert_eq!(f.ledger.tip().unwrap().get_transactions(), &[pay_bob]);
    }

    #[test]
    fn test_two_spends_in_one_block_each_see_only_prior_balance() {
        let mut f = fixture();
        // 60 + 60 against 100: each fits on its own, so both stay
        let first = signed_tx(&f.alice, f.bob.public_key(), 60.0);
        let second = signed_tx(&f.alice, f.bob.public_key(), 60.0);

        assert!(f.ledger.add_block(sealed(vec![first, second])));
        assert_eq!(f.ledger.tip().unwrap().get_transactions().len(), 2);
        assert_eq!(
            f.ledger.account_balance(f.alice.public_key(), None, &[]),
            -20.0
        );
        assert!(f.ledger.chain_is_valid());
    }

    #[test]
    fn test_pool_refuses_the_same_pair_of_spends() {
        let f = fixture();
        let pool = crate::storage::TransactionPool::new();
        pool.admit(signed_tx(&f.alice, f.bob.public_key(), 60.0), &f.ledger)
            .unwrap();
        assert!(pool
            .admit(signed_tx(&f.alice, f.bob.public_key(), 60.0), &f.ledger)
            .is_err());
    }

    #[test]
    fn test_chain_built_through_add_block_is_valid() {
        let mut f = fixture();
        let mut miner = Miner::new();
        for amount in [10.0, 20.0, 30.0] {
            let tx = signed_tx(&f.alice, f.bob.public_key(), amount);
            f.ledger.mine_block(vec![tx], 1, &mut miner).unwrap();
        }
        assert_eq!(f.ledger.len(), 4);
        assert!(f.ledger.chain_is_valid());
        assert_eq!(f.ledger.account_balance(f.alice.public_key(), None, &[]), 40.0);
    }

    #[test]
    fn test_corrupted_later_block_is_detected() {
        let mut f = fixture();
        let mut miner = Miner::new();
        for amount in [10.0, 20.0] {
            let tx = signed_tx(&f.alice, f.bob.public_key(), amount);
            f.ledger.mine_block(vec![tx], 1, &mut miner).unwrap();
        }
        assert!(f.ledger.chain_is_valid());

        let mut blocks = f.ledger.get_blocks().to_vec();
        blocks[2].transactions_mut()[0].set_payload(b"x");
        assert!(!Ledger::from_blocks(blocks).chain_is_valid());
    }

    #[test]
    fn test_broken_link_is_detected() {
        let mut f = fixture();
        let mut miner = Miner::new();
        f.ledger.mine_block(vec![], 1, &mut miner).unwrap();
        f.ledger.mine_block(vec![], 1, &mut miner).unwrap();

        let mut blocks = f.ledger.get_blocks().to_vec();
        blocks[2].link(2, vec![0xAB; 32]);
        assert!(!Ledger::from_blocks(blocks).chain_is_valid());
    }

    #[test]
    fn test_unaffordable_history_is_detected() {
        let f = fixture();
        let mut blocks = f.ledger.get_blocks().to_vec();
        let mut overspend = sealed(vec![signed_tx(&f.alice, f.bob.public_key(), 150.0)]);
        overspend.link(1, blocks[0].get_hash().to_vec());
        blocks.push(overspend);

        assert!(!Ledger::from_blocks(blocks).chain_is_valid());
    }

    #[test]
    fn test_unsealed_genesis_is_rejected() {
        let genesis = Block::new_genesis(vec![], 1).unwrap();
        assert!(Ledger::new(genesis).is_err());
    }
}
