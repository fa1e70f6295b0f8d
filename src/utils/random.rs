//! Process-wide random byte source.
//!
//! The generator is seeded once from operating-system entropy and is a fast
//! non-cryptographic PRNG afterwards. Nonces and node IDs only need to be
//! spread over a large space, not be unpredictable per draw.

use once_cell::sync::Lazy;
use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};
use std::sync::Mutex;

static SEEDED_RNG: Lazy<Mutex<SmallRng>> = Lazy::new(|| Mutex::new(SmallRng::from_entropy()));

/// Returns `n` random bytes from the process-wide generator.
pub fn gen_rand_bytes(n: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; n];
    let mut rng = SEEDED_RNG.lock().unwrap_or_else(|e| e.into_inner());
    rng.fill_bytes(&mut bytes);
    bytes
}

/// Derives an independent generator for a hot loop so it does not contend
/// on the shared lock.
pub fn fork_rng() -> SmallRng {
    let mut rng = SEEDED_RNG.lock().unwrap_or_else(|e| e.into_inner());
    SmallRng::seed_from_u64(rng.next_u64())
}
