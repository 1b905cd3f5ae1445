//! Deterministic, job-seeded pseudorandomness.
//!
//! The planner and segment builder share a single PRNG instance per job,
//! seeded from the first 32 bits of SHA-256(job_id). The algorithm is
//! ChaCha8 — a documented, versioned generator — never a platform-default or
//! thread-local RNG, so that two runs with the same job id and inputs are
//! bit-reproducible (see property 7 in the spec).

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};

/// First 32 bits of SHA-256(job_id), interpreted as a big-endian u32.
pub fn seed_from_job_id(job_id: &str) -> u32 {
    let digest = Sha256::digest(job_id.as_bytes());
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}

pub fn rng_for_job(job_id: &str) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed_from_job_id(job_id) as u64)
}
