//! Procedural warp topology
//!
//! The map service contract: adjacency, federation space, and port presence,
//! all derived deterministically from the universe seed. Sectors are numbered
//! `1..=sector_count` and sit on a ring with seeded chord links layered on
//! top; chords are symmetric, so `adjacent_sectors` always agrees with
//! itself from both ends.

use starhold_common::constants::{FEDERATION_SECTOR_MAX, WARP_CHORDS_PER_SECTOR};
use starhold_common::rng::fnv1a;
use starhold_common::types::SectorId;

fn chord_hash(seed: u64, sector: SectorId, k: u32) -> u64 {
    let mut bytes = Vec::with_capacity(24);
    bytes.extend_from_slice(&seed.to_le_bytes());
    bytes.extend_from_slice(&sector.to_le_bytes());
    bytes.extend_from_slice(&k.to_le_bytes());
    bytes.extend_from_slice(b"warp_chord");
    fnv1a(&bytes)
}

/// The seeded chord endpoint for `(sector, k)`
fn chord_partner(seed: u64, sector: SectorId, sector_count: u32, k: u32) -> SectorId {
    1 + (chord_hash(seed, sector, k) % sector_count as u64) as u32
}

/// Garrison deployment is prohibited here by rule
pub fn is_federation_space(sector: SectorId) -> bool {
    (1..=FEDERATION_SECTOR_MAX).contains(&sector)
}

pub fn in_bounds(sector: SectorId, sector_count: u32) -> bool {
    (1..=sector_count).contains(&sector)
}

/// All sectors reachable in one warp, sorted and deduplicated
pub fn adjacent_sectors(seed: u64, sector: SectorId, sector_count: u32) -> Vec<SectorId> {
    if !in_bounds(sector, sector_count) || sector_count < 2 {
        return Vec::new();
    }

    let mut adjacent = Vec::new();

    // Ring neighbors with wraparound
    let prev = if sector == 1 { sector_count } else { sector - 1 };
    let next = if sector == sector_count { 1 } else { sector + 1 };
    adjacent.push(prev);
    adjacent.push(next);

    // Outgoing chords
    for k in 0..WARP_CHORDS_PER_SECTOR {
        adjacent.push(chord_partner(seed, sector, sector_count, k));
    }

    // Incoming chords keep the graph symmetric
    for other in 1..=sector_count {
        if other == sector {
            continue;
        }
        for k in 0..WARP_CHORDS_PER_SECTOR {
            if chord_partner(seed, other, sector_count, k) == sector {
                adjacent.push(other);
            }
        }
    }

    adjacent.sort_unstable();
    adjacent.dedup();
    adjacent.retain(|s| *s != sector);
    adjacent
}

/// Port class in `1..=9`, or `None` for portless sectors. Roughly four in
/// ten sectors carry a port; federation sectors always do.
pub fn port_class(seed: u64, sector: SectorId) -> Option<u8> {
    let mut bytes = Vec::with_capacity(16);
    bytes.extend_from_slice(&seed.to_le_bytes());
    bytes.extend_from_slice(&sector.to_le_bytes());
    bytes.extend_from_slice(b"port");
    let hash = chord_hash(seed, sector, u32::MAX) ^ fnv1a(&bytes);

    if is_federation_space(sector) || hash % 10 < 4 {
        Some(1 + (hash / 10 % 9) as u8)
    } else {
        None
    }
}

/// Human-facing region tag used in sector payloads
pub fn region_tag(sector: SectorId) -> &'static str {
    if is_federation_space(sector) {
        "federation"
    } else {
        "frontier"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED: u64 = 0xfeed_beef;
    const COUNT: u32 = 64;

    #[test]
    fn adjacency_is_symmetric() {
        for sector in 1..=COUNT {
            for neighbor in adjacent_sectors(SEED, sector, COUNT) {
                let back = adjacent_sectors(SEED, neighbor, COUNT);
                assert!(
                    back.contains(&sector),
                    "sector {} lists {} but not vice versa",
                    sector,
                    neighbor
                );
            }
        }
    }

    #[test]
    fn adjacency_is_deterministic_and_bounded() {
        for sector in [1, 2, 33, COUNT] {
            let a = adjacent_sectors(SEED, sector, COUNT);
            let b = adjacent_sectors(SEED, sector, COUNT);
            assert_eq!(a, b);
            assert!(!a.is_empty());
            assert!(a.iter().all(|s| in_bounds(*s, COUNT) && *s != sector));
        }
    }

    #[test]
    fn ring_keeps_the_shard_connected() {
        let first = adjacent_sectors(SEED, 1, COUNT);
        assert!(first.contains(&2));
        assert!(first.contains(&COUNT));
    }

    #[test]
    fn out_of_bounds_sectors_have_no_neighbors() {
        assert!(adjacent_sectors(SEED, 0, COUNT).is_empty());
        assert!(adjacent_sectors(SEED, COUNT + 1, COUNT).is_empty());
    }

    #[test]
    fn federation_space_is_the_low_band() {
        assert!(is_federation_space(1));
        assert!(is_federation_space(10));
        assert!(!is_federation_space(11));
        assert_eq!(region_tag(3), "federation");
        assert_eq!(region_tag(500), "frontier");
    }

    #[test]
    fn ports_are_stable_and_classed() {
        for sector in 1..=COUNT {
            assert_eq!(port_class(SEED, sector), port_class(SEED, sector));
            if let Some(class) = port_class(SEED, sector) {
                assert!((1..=9).contains(&class));
            }
        }
        assert!(port_class(SEED, 1).is_some(), "federation sectors have ports");
    }
}
