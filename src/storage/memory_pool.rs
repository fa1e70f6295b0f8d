use crate::core::{Ledger, Transaction};
use crate::error::{BlockchainError, Result};
use log::{debug, error};
use std::sync::Mutex;

/// Pending transactions waiting to be mined.
///
/// Admission verifies and inserts inside one critical section, so two
/// transfers from the same sender can never both be admitted against the
/// same balance.
pub struct TransactionPool {
    inner: Mutex<Vec<Transaction>>,
}

impl Default for TransactionPool {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionPool {
    pub fn new() -> TransactionPool {
        TransactionPool {
            inner: Mutex::new(Vec::new()),
        }
    }

    /// Checks the signature and that the sender can pay given `ledger` plus
    /// everything already pending, then adds the transaction.
    pub fn admit(&self, tx: Transaction, ledger: &Ledger) -> Result<()> {
        if !tx.verify_signature() {
            return Err(BlockchainError::Transaction(
                "Transaction signature is invalid".to_string(),
            ));
        }

        let mut pool = self
            .inner
            .lock()
            .map_err(|e| BlockchainError::Lock(format!("Failed to acquire pool lock: {e}")))?;

        if !ledger.cost_is_valid(&tx, &pool, None) {
            return Err(BlockchainError::InsufficientFunds {
                required: tx.get_amount(),
                available: ledger.account_balance(tx.get_sender(), None, &pool),
            });
        }

        debug!("Admitted transaction of {} to the pool", tx.get_amount());
        pool.push(tx);
        Ok(())
    }

    pub fn snapshot(&self) -> Vec<Transaction> {
        match self.inner.lock() {
            Ok(pool) => pool.clone(),
            Err(_) => {
                error!("Failed to acquire lock on transaction pool");
                Vec::new()
            }
        }
    }

    /// Empties the pool and hands its transactions to the caller.
    pub fn take_all(&self) -> Vec<Transaction> {
        match self.inner.lock() {
            Ok(mut pool) => std::mem::take(&mut *pool),
            Err(_) => {
                error!("Failed to acquire lock on transaction pool");
                Vec::new()
            }
        }
    }

    pub fn len(&self) -> usize {
        match self.inner.lock() {
            Ok(pool) => pool.len(),
            Err(_) => {
                error!("Failed to acquire lock on transaction pool");
                0
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testnet::{funded_ledger, signed_tx};
    use crate::wallet::{Signer, Wallet};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_admit_and_take() {
        let issuer = Wallet::new().unwrap();
        let alice = Wallet::new().unwrap();
        let bob = Wallet::new().unwrap();
        let ledger = funded_ledger(&issuer, &[(alice.public_key(), 100.0)]);
        let pool = TransactionPool::new();

        pool.admit(signed_tx(&alice, bob.public_key(), 60.0), &ledger)
            .unwrap();
        assert_eq!(pool.len(), 1);

        let err = pool
            .admit(signed_tx(&alice, bob.public_key(), 60.0), &ledger)
            .unwrap_err();
        assert!(matches!(
            err,
            BlockchainError::InsufficientFunds { available, .. } if available == 40.0
        ));

        let taken = pool.take_all();
        assert_eq!(taken.len(), 1);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_forged_transaction_is_refused() {
        let issuer = Wallet::new().unwrap();
        let alice = Wallet::new().unwrap();
        let ledger = funded_ledger(&issuer, &[(alice.public_key(), 100.0)]);
        let pool = TransactionPool::new();

        let mut tx = signed_tx(&alice, issuer.public_key(), 10.0);
        tx.set_amount(1.0);
        assert!(matches!(
            pool.admit(tx, &ledger),
            Err(BlockchainError::Transaction(_))
        ));
        assert!(pool.is_empty());
    }

    #[test]
    fn test_concurrent_admission_cannot_double_spend() {
        let issuer = Wallet::new().unwrap();
        let alice = Wallet::new().unwrap();
        let bob = Wallet::new().unwrap();
        let ledger = Arc::new(funded_ledger(&issuer, &[(alice.public_key(), 100.0)]));
        let pool = Arc::new(TransactionPool::new());

        let handles: Vec<_> = (0..4)
            .map(|_| signed_tx(&alice, bob.public_key(), 60.0))
            .map(|tx| {
                let ledger = Arc::clone(&ledger);
                let pool = Arc::clone(&pool);
                thread::spawn(move || pool.admit(tx, &ledger).is_ok())
            })
            .collect();
        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(admitted, 1);
        assert_eq!(pool.len(), 1);
    }
}
