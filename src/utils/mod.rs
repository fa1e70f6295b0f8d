//! Utility functions and helpers
//!
//! Hashing, ECDSA helpers, byte encodings and the seeded random source.

pub mod crypto;
pub mod encoding;
pub mod random;

pub use crypto::{
    current_timestamp, ecdsa_p384_sha384_sign_digest, ecdsa_p384_sha384_sign_verify,
    new_key_pair, sha256_digest, P384_SCALAR_LEN,
};
pub use encoding::{base64url_decode, base64url_encode, put_length_prefixed};
pub use random::{fork_rng, gen_rand_bytes};
