//! Participant loader
//!
//! Materializes the combatant roster for a sector: every piloted,
//! non-destroyed, non-pod ship whose pilot actually sits in it, plus every
//! garrison with fighters left. Current fighters and shields fall back to
//! the ship's template when the row carries nulls.

use starhold_common::errors::GameError;
use starhold_common::templates::{ShipClass, ShipTemplate};
use starhold_common::types::{Combatant, CombatantKind, SectorId};

use crate::map;
use crate::state::{CharacterData, GarrisonData, ShardState, ShipData};

/// Resolve a ship row's catalog key; a dangling key is an orphan reference
pub fn resolve_template(ship: &ShipData) -> Result<ShipTemplate, GameError> {
    ShipClass::parse(&ship.ship_type)
        .map(|class| class.template())
        .ok_or_else(|| {
            GameError::DataIntegrity(format!(
                "ship {} has unknown template {}",
                ship.id, ship.ship_type
            ))
        })
}

/// Build the combatant for a piloted ship
pub fn combatant_from_ship(
    ship: &ShipData,
    pilot: &CharacterData,
    template: &ShipTemplate,
) -> Combatant {
    let corporation = if ship.owner_corporation.is_some() {
        ship.owner_corporation
    } else {
        pilot.corporation
    };
    Combatant {
        id: pilot.id.clone(),
        name: pilot.name.clone(),
        kind: CombatantKind::Character {
            ship_id: ship.id,
            corporation,
            player_type: pilot.player_type,
        },
        fighters: ship.fighters.unwrap_or(template.max_fighters),
        shields: ship.shields.unwrap_or(template.max_shields),
        max_fighters: template.max_fighters,
        max_shields: template.max_shields,
        turns_per_warp: template.turns_per_warp,
        is_escape_pod: ship.is_escape_pod,
        owner: Some(pilot.id.clone()),
    }
}

/// Build the combatant for a stationed garrison. Garrisons fight without
/// shields and never warp.
pub fn combatant_from_garrison(garrison: &GarrisonData, owner_name: &str) -> Combatant {
    Combatant {
        id: garrison.combatant_id(),
        name: format!("{} garrison", owner_name),
        kind: CombatantKind::Garrison {
            mode: garrison.mode,
            toll_amount: garrison.toll_amount,
            owner_corporation: garrison.owner_corporation,
        },
        fighters: garrison.fighters,
        shields: 0,
        max_fighters: garrison.fighters,
        max_shields: 0,
        turns_per_warp: 0,
        is_escape_pod: false,
        owner: Some(garrison.owner.clone()),
    }
}

/// Load the full combatant roster for a sector, ordered by combatant id
pub async fn load_combatants(
    state: &ShardState,
    sector: SectorId,
) -> Result<Vec<Combatant>, GameError> {
    let config = state.config.get();
    if !map::in_bounds(sector, config.sector_count) {
        return Err(GameError::Caller(format!("sector {} is not available", sector)));
    }

    let mut combatants = Vec::new();

    for ship in state.ships_in_sector(sector).await? {
        if ship.in_hyperspace || ship.destroyed || ship.is_escape_pod {
            continue;
        }
        if ship.owner_character.is_none() && ship.owner_corporation.is_none() {
            continue;
        }
        let Some(owner) = &ship.owner_character else {
            continue;
        };
        let Some(pilot) = state.get_character(owner).await? else {
            continue;
        };
        // A stale pilot reference means the character moved on to another hull
        if pilot.current_ship != Some(ship.id) {
            continue;
        }
        let template = resolve_template(&ship)?;
        combatants.push(combatant_from_ship(&ship, &pilot, &template));
    }

    for garrison in state.garrisons_in(sector).await? {
        if garrison.fighters == 0 {
            continue;
        }
        let owner_name = state
            .get_character(&garrison.owner)
            .await?
            .map(|c| c.name)
            .unwrap_or_else(|| garrison.owner.clone());
        combatants.push(combatant_from_garrison(&garrison, &owner_name));
    }

    combatants.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(combatants)
}

#[cfg(test)]
mod tests {
    use super::*;
    use starhold_common::cargo::CargoManifest;
    use starhold_common::types::{GarrisonMode, PlayerKind};

    fn pilot(id: &str, ship: u64) -> CharacterData {
        CharacterData {
            id: id.to_string(),
            name: id.to_string(),
            corporation: Some(3),
            current_ship: Some(ship),
            player_type: PlayerKind::Human,
            registered_micros: 0,
        }
    }

    fn ship(id: u64, owner: &str) -> ShipData {
        ShipData {
            id,
            name: format!("SS {}", owner),
            ship_type: "corvette".into(),
            sector: 44,
            owner_character: Some(owner.to_string()),
            owner_corporation: None,
            fighters: None,
            shields: Some(40),
            cargo: CargoManifest::zero(),
            credits: 100,
            scrap: 0,
            in_hyperspace: false,
            destroyed: false,
            is_escape_pod: false,
        }
    }

    #[test]
    fn template_nulls_fall_back_to_catalog() {
        let row = ship(1, "kara");
        let template = resolve_template(&row).unwrap();
        let combatant = combatant_from_ship(&row, &pilot("kara", 1), &template);
        assert_eq!(combatant.fighters, 300, "null fighters use the template");
        assert_eq!(combatant.shields, 40, "explicit shields win");
        assert_eq!(combatant.max_shields, 250);
        assert_eq!(combatant.turns_per_warp, 2);
        assert_eq!(combatant.corporation(), Some(3));
    }

    #[test]
    fn corporation_ships_use_the_ship_side_corp() {
        let mut row = ship(1, "pilot-7");
        row.owner_corporation = Some(9);
        let template = resolve_template(&row).unwrap();
        let combatant = combatant_from_ship(&row, &pilot("pilot-7", 1), &template);
        assert_eq!(combatant.corporation(), Some(9));
    }

    #[test]
    fn unknown_templates_are_integrity_failures() {
        let mut row = ship(1, "kara");
        row.ship_type = "battlecruiser".into();
        assert!(matches!(
            resolve_template(&row),
            Err(GameError::DataIntegrity(_))
        ));
    }

    #[test]
    fn garrison_combatants_have_no_shields() {
        let garrison = GarrisonData {
            sector: 44,
            owner: "xan".into(),
            owner_corporation: Some(2),
            fighters: 25,
            mode: GarrisonMode::Toll,
            toll_amount: 50,
            toll_balance: 0,
            deployed_micros: 0,
        };
        let combatant = combatant_from_garrison(&garrison, "Xan");
        assert_eq!(combatant.id, "garrison:44:xan");
        assert_eq!(combatant.shields, 0);
        assert_eq!(combatant.max_shields, 0);
        assert_eq!(combatant.turns_per_warp, 0);
        assert_eq!(combatant.corporation(), Some(2));
        assert!(combatant.is_garrison());
    }
}
