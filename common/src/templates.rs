//! Ship template catalog for Starhold
//!
//! Ship rows store their class as a catalog key string; the catalog resolves
//! the key to the template that supplies maxima, warp speed, and price. A row
//! whose key no longer parses is a data-integrity failure, not a default.

use serde::{Deserialize, Serialize};

/// Ship class defining base stats
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ShipClass {
    /// Starter hull; cheap, slow, lightly armed
    Shuttle,
    /// Entry trading hull
    LightFreighter,
    /// Bulk trading hull
    HeavyFreighter,
    /// Fast escort
    Corvette,
    /// Dedicated combat hull
    Gunship,
    /// Fast courier with decent holds
    Clipper,
    /// The degraded hull a player ship becomes after destruction
    EscapePod,
}

/// Template resolved from the catalog
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShipTemplate {
    pub display_name: &'static str,
    pub cargo_holds: u32,
    pub max_shields: u32,
    pub max_fighters: u32,
    pub turns_per_warp: u32,
    pub purchase_price: u64,
}

impl ShipClass {
    pub fn all() -> &'static [ShipClass] {
        &[
            ShipClass::Shuttle,
            ShipClass::LightFreighter,
            ShipClass::HeavyFreighter,
            ShipClass::Corvette,
            ShipClass::Gunship,
            ShipClass::Clipper,
            ShipClass::EscapePod,
        ]
    }

    /// Catalog key, the value stored in ship rows and payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            ShipClass::Shuttle => "shuttle",
            ShipClass::LightFreighter => "light_freighter",
            ShipClass::HeavyFreighter => "heavy_freighter",
            ShipClass::Corvette => "corvette",
            ShipClass::Gunship => "gunship",
            ShipClass::Clipper => "clipper",
            ShipClass::EscapePod => "escape_pod",
        }
    }

    pub fn parse(key: &str) -> Option<ShipClass> {
        ShipClass::all().iter().copied().find(|c| c.as_str() == key)
    }

    pub fn template(&self) -> ShipTemplate {
        match self {
            ShipClass::Shuttle => ShipTemplate {
                display_name: "Shuttle",
                cargo_holds: 20,
                max_shields: 100,
                max_fighters: 30,
                turns_per_warp: 3,
                purchase_price: 15_000,
            },
            ShipClass::LightFreighter => ShipTemplate {
                display_name: "Light Freighter",
                cargo_holds: 40,
                max_shields: 150,
                max_fighters: 80,
                turns_per_warp: 3,
                purchase_price: 32_000,
            },
            ShipClass::HeavyFreighter => ShipTemplate {
                display_name: "Heavy Freighter",
                cargo_holds: 85,
                max_shields: 300,
                max_fighters: 150,
                turns_per_warp: 4,
                purchase_price: 120_000,
            },
            ShipClass::Corvette => ShipTemplate {
                display_name: "Corvette",
                cargo_holds: 25,
                max_shields: 250,
                max_fighters: 300,
                turns_per_warp: 2,
                purchase_price: 95_000,
            },
            ShipClass::Gunship => ShipTemplate {
                display_name: "Gunship",
                cargo_holds: 15,
                max_shields: 400,
                max_fighters: 600,
                turns_per_warp: 2,
                purchase_price: 230_000,
            },
            ShipClass::Clipper => ShipTemplate {
                display_name: "Clipper",
                cargo_holds: 60,
                max_shields: 200,
                max_fighters: 120,
                turns_per_warp: 1,
                purchase_price: 180_000,
            },
            ShipClass::EscapePod => ShipTemplate {
                display_name: "Escape Pod",
                cargo_holds: 2,
                max_shields: 0,
                max_fighters: 0,
                turns_per_warp: 5,
                purchase_price: 0,
            },
        }
    }

    /// Scrap units yielded when a hull of this class is destroyed
    pub fn scrap_yield(&self) -> u32 {
        let from_price =
            (self.template().purchase_price / crate::constants::SCRAP_PRICE_DIVISOR) as u32;
        from_price.max(crate::constants::SCRAP_MINIMUM)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_keys_round_trip() {
        for class in ShipClass::all() {
            assert_eq!(ShipClass::parse(class.as_str()), Some(*class));
        }
        assert_eq!(ShipClass::parse("battlecruiser"), None);
    }

    #[test]
    fn scrap_yield_has_a_floor() {
        assert_eq!(ShipClass::EscapePod.scrap_yield(), 5);
        assert_eq!(ShipClass::Gunship.scrap_yield(), 230);
        assert_eq!(ShipClass::Shuttle.scrap_yield(), 15);
    }

    #[test]
    fn escape_pod_cannot_fight() {
        let pod = ShipClass::EscapePod.template();
        assert_eq!(pod.max_fighters, 0);
        assert_eq!(pod.max_shields, 0);
    }
}
