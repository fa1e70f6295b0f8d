// Signed value transfers. A transaction names its sender and receiver by
// their P-384 public key coordinates, and the sender's signature covers every
// field except the signature itself.

use crate::error::{BlockchainError, Result};
use crate::utils::{
    current_timestamp, ecdsa_p384_sha384_sign_verify, put_length_prefixed, sha256_digest,
    P384_SCALAR_LEN,
};
use crate::wallet::Signer;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

/// Protocol version stamped on new transactions
pub const TRANSACTION_VERSION: u32 = 0;

/// Transfer amounts. Well-formed transfers are non-negative.
pub type Amount = f64;

/// A point on the fixed curve (P-384), by its affine coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey {
    x: BigUint,
    y: BigUint,
}

impl PublicKey {
    pub fn new(x: BigUint, y: BigUint) -> PublicKey {
        PublicKey { x, y }
    }

    /// Parses an uncompressed SEC1 point (`0x04 || X || Y`).
    pub fn from_sec1(bytes: &[u8]) -> Result<PublicKey> {
        if bytes.len() != 1 + 2 * P384_SCALAR_LEN || bytes[0] != 0x04 {
            return Err(BlockchainError::Crypto(format!(
                "Expected a {}-byte uncompressed point, got {} bytes",
                1 + 2 * P384_SCALAR_LEN,
                bytes.len()
            )));
        }
        let (x, y) = bytes[1..].split_at(P384_SCALAR_LEN);
        Ok(PublicKey {
            x: BigUint::from_bytes_be(x),
            y: BigUint::from_bytes_be(y),
        })
    }

    /// Uncompressed SEC1 encoding, or `None` if a coordinate does not fit
    /// the curve's field width.
    pub fn to_sec1(&self) -> Option<Vec<u8>> {
        let mut out = Vec::with_capacity(1 + 2 * P384_SCALAR_LEN);
        out.push(0x04);
        out.extend(fixed_width(&self.x)?);
        out.extend(fixed_width(&self.y)?);
        Some(out)
    }

    pub fn get_x(&self) -> &BigUint {
        &self.x
    }

    pub fn get_y(&self) -> &BigUint {
        &self.y
    }

    fn write_to(&self, buf: &mut Vec<u8>) {
        put_length_prefixed(buf, &self.x.to_bytes_be());
        put_length_prefixed(buf, &self.y.to_bytes_be());
    }
}

/// ECDSA signature as the pair of integers (r, s).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    r: BigUint,
    s: BigUint,
}

impl Signature {
    pub fn new(r: BigUint, s: BigUint) -> Signature {
        Signature { r, s }
    }

    /// Parses the fixed-width `r || s` encoding.
    pub fn from_fixed(bytes: &[u8]) -> Result<Signature> {
        if bytes.len() != 2 * P384_SCALAR_LEN {
            return Err(BlockchainError::Crypto(format!(
                "Expected a {}-byte signature, got {} bytes",
                2 * P384_SCALAR_LEN,
                bytes.len()
            )));
        }
        let (r, s) = bytes.split_at(P384_SCALAR_LEN);
        Ok(Signature {
            r: BigUint::from_bytes_be(r),
            s: BigUint::from_bytes_be(s),
        })
    }

    pub fn to_fixed(&self) -> Option<Vec<u8>> {
        let mut out = fixed_width(&self.r)?;
        out.extend(fixed_width(&self.s)?);
        Some(out)
    }

    pub fn get_r(&self) -> &BigUint {
        &self.r
    }

    pub fn get_s(&self) -> &BigUint {
        &self.s
    }
}

fn fixed_width(value: &BigUint) -> Option<Vec<u8>> {
    let bytes = value.to_bytes_be();
    if bytes.len() > P384_SCALAR_LEN {
        return None;
    }
    let mut out = vec![0u8; P384_SCALAR_LEN - bytes.len()];
    out.extend(bytes);
    Some(out)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    version: u32,
    sender: PublicKey,
    receiver: PublicKey,
    amount: Amount,
    timestamp: u64,
    payload: Vec<u8>,
    signature: Signature,
}

impl Transaction {
    /// Creates an unsigned transfer stamped with the current time.
    pub fn new(
        sender: PublicKey,
        receiver: PublicKey,
        amount: Amount,
        payload: &[u8],
    ) -> Result<Transaction> {
        Ok(Transaction {
            version: TRANSACTION_VERSION,
            sender,
            receiver,
            amount,
            timestamp: current_timestamp()?,
            payload: payload.to_vec(),
            signature: Signature::default(),
        })
    }

    /// Bytes covered by the signature: every field except (r, s).
    fn content_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend(self.version.to_be_bytes());
        self.sender.write_to(&mut buf);
        self.receiver.write_to(&mut buf);
        buf.extend(self.amount.to_bits().to_be_bytes());
        buf.extend(self.timestamp.to_be_bytes());
        put_length_prefixed(&mut buf, &self.payload);
        buf
    }

    /// The hash the sender signs.
    pub fn content_hash(&self) -> Vec<u8> {
        sha256_digest(&self.content_bytes())
    }

    /// Full encoding including the signature, as folded into a block hash.
    pub fn write_to(&self, buf: &mut Vec<u8>) {
        buf.extend(self.content_bytes());
        put_length_prefixed(buf, &self.signature.r.to_bytes_be());
        put_length_prefixed(buf, &self.signature.s.to_bytes_be());
    }

    /// Signs the content hash with `signer` and stores (r, s).
    pub fn sign_with(&mut self, signer: &dyn Signer) -> Result<()> {
        if signer.public_key() != &self.sender {
            return Err(BlockchainError::Transaction(
                "Signer key does not match the transaction sender".to_string(),
            ));
        }
        self.signature = signer.sign(&self.content_hash())?;
        Ok(())
    }

    /// Checks (r, s) against the content hash under the sender's key.
    pub fn verify_signature(&self) -> bool {
        let (Some(public_key), Some(signature)) = (self.sender.to_sec1(), self.signature.to_fixed())
        else {
            return false;
        };
        ecdsa_p384_sha384_sign_verify(&public_key, &signature, &self.content_hash())
    }

    pub fn get_version(&self) -> u32 {
        self.version
    }

    pub fn get_sender(&self) -> &PublicKey {
        &self.sender
    }

    pub fn get_receiver(&self) -> &PublicKey {
        &self.receiver
    }

    pub fn get_amount(&self) -> Amount {
        self.amount
    }

    pub fn get_timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn get_payload(&self) -> &[u8] {
        self.payload.as_slice()
    }

    pub fn get_signature(&self) -> &Signature {
        &self.signature
    }

    /// Net effect of this transaction on `key`'s balance.
    pub fn balance_delta(&self, key: &PublicKey) -> Amount {
        let mut delta = 0.0;
        if &self.sender == key {
            delta -= self.amount;
        }
        if &self.receiver == key {
            delta += self.amount;
        }
        delta
    }

    #[cfg(test)]
    pub(crate) fn set_amount(&mut self, amount: Amount) {
        self.amount = amount;
    }

    #[cfg(test)]
    pub(crate) fn set_timestamp(&mut self, timestamp: u64) {
        self.timestamp = timestamp;
    }

    #[cfg(test)]
    pub(crate) fn set_payload(&mut self, payload: &[u8]) {
        self.payload = payload.to_vec();
    }
}
