use crate::core::{PublicKey, Signature};
use crate::error::{BlockchainError, Result};
use crate::utils::{ecdsa_p384_sha384_sign_digest, new_key_pair};
use ring::rand::SystemRandom;
use ring::signature::{EcdsaKeyPair, KeyPair, ECDSA_P384_SHA384_FIXED_SIGNING};
use zeroize::Zeroizing;

/// Something that holds a private key and can sign transaction content
/// hashes with it. The ledger never signs; it only verifies.
pub trait Signer {
    fn public_key(&self) -> &PublicKey;

    fn sign(&self, content_hash: &[u8]) -> Result<Signature>;
}

/// A P-384 key pair. The PKCS#8 document is wiped from memory on drop.
pub struct Wallet {
    pkcs8: Zeroizing<Vec<u8>>,
    public_key: PublicKey,
}

impl Wallet {
    pub fn new() -> Result<Wallet> {
        let pkcs8 = Zeroizing::new(new_key_pair()?);
        Wallet::from_pkcs8(pkcs8)
    }

    pub fn from_pkcs8(pkcs8: Zeroizing<Vec<u8>>) -> Result<Wallet> {
        let rng = SystemRandom::new();
        let key_pair =
            EcdsaKeyPair::from_pkcs8(&ECDSA_P384_SHA384_FIXED_SIGNING, pkcs8.as_ref(), &rng)
                .map_err(|e| {
                    BlockchainError::Crypto(format!("Failed to create key pair from PKCS8: {e}"))
                })?;
        let public_key = PublicKey::from_sec1(key_pair.public_key().as_ref())?;
        Ok(Wallet { pkcs8, public_key })
    }
}

impl Signer for Wallet {
    fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    fn sign(&self, content_hash: &[u8]) -> Result<Signature> {
        let fixed = ecdsa_p384_sha384_sign_digest(self.pkcs8.as_ref(), content_hash)?;
        Signature::from_fixed(&fixed)
    }
}
