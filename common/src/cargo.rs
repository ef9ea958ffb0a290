//! Commodity and cargo definitions for Starhold
//!
//! Cargo manifests are fixed-field maps over the closed commodity set; all
//! arithmetic saturates so a manifest can never go negative.

use async_graphql::{Enum, SimpleObject};
use serde::{Deserialize, Serialize};

/// The tradeable commodities
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Enum, PartialEq, Eq, Hash)]
pub enum Commodity {
    /// Refined metal ore
    Ore,
    /// Foodstuffs and biologicals
    Organics,
    /// Manufactured machinery
    Equipment,
}

impl Commodity {
    pub fn all() -> &'static [Commodity] {
        &[Commodity::Ore, Commodity::Organics, Commodity::Equipment]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Commodity::Ore => "ore",
            Commodity::Organics => "organics",
            Commodity::Equipment => "equipment",
        }
    }
}

/// Units of each commodity held in a ship or wreck
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, SimpleObject,
)]
pub struct CargoManifest {
    pub ore: u32,
    pub organics: u32,
    pub equipment: u32,
}

impl CargoManifest {
    pub fn new(ore: u32, organics: u32, equipment: u32) -> Self {
        Self {
            ore,
            organics,
            equipment,
        }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.total_units() == 0
    }

    pub fn total_units(&self) -> u32 {
        self.ore
            .saturating_add(self.organics)
            .saturating_add(self.equipment)
    }

    pub fn get(&self, commodity: Commodity) -> u32 {
        match commodity {
            Commodity::Ore => self.ore,
            Commodity::Organics => self.organics,
            Commodity::Equipment => self.equipment,
        }
    }

    pub fn saturating_add(&self, other: &CargoManifest) -> CargoManifest {
        CargoManifest {
            ore: self.ore.saturating_add(other.ore),
            organics: self.organics.saturating_add(other.organics),
            equipment: self.equipment.saturating_add(other.equipment),
        }
    }

    pub fn saturating_sub(&self, other: &CargoManifest) -> CargoManifest {
        CargoManifest {
            ore: self.ore.saturating_sub(other.ore),
            organics: self.organics.saturating_sub(other.organics),
            equipment: self.equipment.saturating_sub(other.equipment),
        }
    }

    /// Truncate the manifest to fit within `free_units` holds, filling in the
    /// fixed commodity order (ore, organics, equipment).
    pub fn capped(&self, free_units: u32) -> CargoManifest {
        let mut remaining = free_units;
        let mut take = |units: u32| {
            let taken = units.min(remaining);
            remaining -= taken;
            taken
        };
        CargoManifest {
            ore: take(self.ore),
            organics: take(self.organics),
            equipment: take(self.equipment),
        }
    }
}

impl std::ops::Add for CargoManifest {
    type Output = CargoManifest;

    fn add(self, rhs: Self) -> Self::Output {
        self.saturating_add(&rhs)
    }
}

impl std::ops::Sub for CargoManifest {
    type Output = CargoManifest;

    fn sub(self, rhs: Self) -> Self::Output {
        self.saturating_sub(&rhs)
    }
}

impl std::ops::AddAssign for CargoManifest {
    fn add_assign(&mut self, rhs: Self) {
        *self = self.saturating_add(&rhs);
    }
}

impl std::ops::SubAssign for CargoManifest {
    fn sub_assign(&mut self, rhs: Self) {
        *self = self.saturating_sub(&rhs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capped_fills_in_fixed_order() {
        let full = CargoManifest::new(10, 10, 10);
        assert_eq!(full.capped(12), CargoManifest::new(10, 2, 0));
        assert_eq!(full.capped(0), CargoManifest::zero());
        assert_eq!(full.capped(100), full);
    }

    #[test]
    fn arithmetic_saturates() {
        let a = CargoManifest::new(1, 2, 3);
        let b = CargoManifest::new(5, 1, 3);
        assert_eq!(a - b, CargoManifest::new(0, 1, 0));
        assert_eq!((a + b).total_units(), 15);
    }
}
