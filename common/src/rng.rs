//! Deterministic randomness for Starhold
//!
//! Every stochastic decision in combat draws from a stream seeded from the
//! encounter's base seed and the round number, so a round's outcome is
//! reproducible from persisted state on any platform. Encounter ids are
//! likewise derived, never sampled.

use serde::Serialize;
use sha3::{Digest, Sha3_256};

use crate::types::{EncounterId, SectorId};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// FNV-1a over a byte slice
pub fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Mix a base seed, round number, and domain tag into one stream seed
pub fn round_seed(base_seed: u64, round: u32, domain: &[u8]) -> u64 {
    let mut bytes = Vec::with_capacity(12 + domain.len());
    bytes.extend_from_slice(&base_seed.to_le_bytes());
    bytes.extend_from_slice(&round.to_le_bytes());
    bytes.extend_from_slice(domain);
    fnv1a(&bytes)
}

/// Counter-based PRNG for one round of combat.
///
/// `next()` advances a counter and runs a multiply-xor-shift mix over it; the
/// top 32 bits map to `[0, 1)`. The same `(base_seed, round, domain)` always
/// yields the same stream.
#[derive(Debug, Clone)]
pub struct RoundRng {
    seed: u64,
    counter: u64,
}

impl RoundRng {
    /// Stream used by the round resolver
    pub fn new(base_seed: u64, round: u32) -> Self {
        Self::with_domain(base_seed, round, b"round")
    }

    /// Stream for an auxiliary decision class, e.g. flee destinations
    pub fn with_domain(base_seed: u64, round: u32, domain: &[u8]) -> Self {
        Self {
            seed: round_seed(base_seed, round, domain),
            counter: 0,
        }
    }

    fn next_bits(&mut self) -> u64 {
        self.counter = self.counter.wrapping_add(1);
        let mut z = self
            .seed
            .wrapping_add(self.counter.wrapping_mul(0x9e37_79b9_7f4a_7c15));
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    }

    /// Next value in `[0, 1)`
    pub fn next(&mut self) -> f64 {
        ((self.next_bits() >> 32) as u32) as f64 / 4_294_967_296.0
    }

    /// Uniform pick from `0..n`; `n` must be non-zero
    pub fn pick(&mut self, n: usize) -> usize {
        ((self.next() * n as f64) as usize).min(n - 1)
    }
}

#[derive(Serialize)]
struct EncounterIdInput {
    universe_seed: u64,
    sector: SectorId,
    sequence: u64,
    created_micros: u64,
}

/// Derive a 128-bit encounter id from shard state at creation time
pub fn encounter_id(
    universe_seed: u64,
    sector: SectorId,
    sequence: u64,
    created_micros: u64,
) -> EncounterId {
    let input = EncounterIdInput {
        universe_seed,
        sector,
        sequence,
        created_micros,
    };
    let bytes = bcs::to_bytes(&input).unwrap_or_default();

    let mut hasher = Sha3_256::new();
    hasher.update(b"STARHOLD_ENCOUNTER_V1");
    hasher.update(&bytes);
    let digest = hasher.finalize();

    hex::encode(&digest[..16])
}

/// The encounter's base seed: the first 48 bits of its id
pub fn encounter_base_seed(id: &str) -> u64 {
    u64::from_str_radix(id.get(..12).unwrap_or("0"), 16).unwrap_or(0)
}
