//! Sector snapshot builder
//!
//! Assembles the canonical per-sector public payload used by every
//! `sector.update` event and by the read service. Only public fields appear:
//! holds, credits and cargo stay private to the pilot's own status snapshot.

use serde_json::{json, Value};

use starhold_common::errors::GameError;
use starhold_common::templates::ShipClass;
use starhold_common::types::{SalvageData, SectorId};

use crate::map;
use crate::payloads::salvage_view;
use crate::state::{CharacterData, GarrisonData, ShardState, ShipData};

fn public_ship_view(ship: &ShipData, pilot: Option<&CharacterData>) -> Value {
    let template = ShipClass::parse(&ship.ship_type).map(|c| c.template());
    let fighters = ship
        .fighters
        .or(template.map(|t| t.max_fighters))
        .unwrap_or(0);
    let shields = ship
        .shields
        .or(template.map(|t| t.max_shields))
        .unwrap_or(0);
    json!({
        "id": ship.id,
        "name": ship.name,
        "ship_type": ship.ship_type,
        "fighters": fighters,
        "shields": shields,
        "is_escape_pod": ship.is_escape_pod,
        "owner": pilot.map(|p| json!({
            "character": p.id,
            "name": p.name,
            "player_type": p.player_type.as_str(),
            "corporation": p.corporation,
        })),
    })
}

fn garrison_view(garrison: &GarrisonData) -> Value {
    json!({
        "owner": garrison.owner,
        "corporation": garrison.owner_corporation,
        "mode": garrison.mode.as_str(),
        "fighters": garrison.fighters,
        "toll_amount": garrison.toll_amount,
        "deployed_at": garrison.deployed_micros,
    })
}

/// Pure assembly over already-collected rows
pub fn build_snapshot(
    sector: SectorId,
    universe_seed: u64,
    ships: &[(ShipData, Option<CharacterData>)],
    garrisons: &[GarrisonData],
    salvage: &[SalvageData],
    now_micros: u64,
) -> Value {
    let mut owned = Vec::new();
    let mut unowned = Vec::new();
    let mut players = Vec::new();

    for (ship, pilot) in ships {
        match pilot {
            Some(pilot) => {
                owned.push(public_ship_view(ship, Some(pilot)));
                players.push(json!({
                    "character": pilot.id,
                    "name": pilot.name,
                    "player_type": pilot.player_type.as_str(),
                    "corporation": pilot.corporation,
                }));
            }
            None => unowned.push(public_ship_view(ship, None)),
        }
    }

    let live_salvage: Vec<Value> = salvage
        .iter()
        .filter(|s| !s.expired(now_micros) && !s.claimed)
        .map(salvage_view)
        .collect();

    json!({
        "sector": {
            "id": sector,
            "region": map::region_tag(sector),
        },
        "port": map::port_class(universe_seed, sector).map(|class| json!({ "class": class })),
        "ships": owned,
        "unowned_ships": unowned,
        "players": players,
        "garrisons": garrisons.iter().map(garrison_view).collect::<Vec<_>>(),
        "salvage": live_salvage,
        "timestamp": now_micros,
    })
}

/// Collect a sector's rows and build its snapshot
pub async fn sector_snapshot(
    state: &ShardState,
    sector: SectorId,
    now_micros: u64,
) -> Result<Value, GameError> {
    let universe_seed = state.config.get().universe_seed;

    let mut ships = Vec::new();
    for ship in state.ships_in_sector(sector).await? {
        if ship.in_hyperspace {
            continue;
        }
        let pilot = match &ship.owner_character {
            Some(owner) => state
                .get_character(owner)
                .await?
                .filter(|c| c.current_ship == Some(ship.id)),
            None => None,
        };
        ships.push((ship, pilot));
    }

    let garrisons = state.garrisons_in(sector).await?;
    let salvage = state.salvage_in(sector).await?;

    Ok(build_snapshot(
        sector,
        universe_seed,
        &ships,
        &garrisons,
        &salvage,
        now_micros,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use starhold_common::types::{GarrisonMode, PlayerKind};
    use std::collections::BTreeMap;

    fn pilot(id: &str) -> CharacterData {
        CharacterData {
            id: id.to_string(),
            name: id.to_string(),
            corporation: None,
            current_ship: Some(0),
            player_type: PlayerKind::Human,
            registered_micros: 0,
        }
    }

    fn ship(id: u64, owner: Option<&str>) -> ShipData {
        ShipData {
            id,
            name: format!("hull-{}", id),
            ship_type: "shuttle".into(),
            sector: 15,
            owner_character: owner.map(str::to_string),
            credits: 500,
            ..ShipData::default()
        }
    }

    #[test]
    fn snapshot_separates_owned_and_unowned() {
        let rows = vec![
            (ship(0, Some("kara")), Some(pilot("kara"))),
            (ship(1, None), None),
        ];
        let snapshot = build_snapshot(15, 7, &rows, &[], &[], 50);
        assert_eq!(snapshot["sector"]["id"], 15);
        assert_eq!(snapshot["sector"]["region"], "frontier");
        assert_eq!(snapshot["ships"].as_array().unwrap().len(), 1);
        assert_eq!(snapshot["unowned_ships"].as_array().unwrap().len(), 1);
        assert_eq!(snapshot["players"][0]["character"], "kara");
        // Private fields never leak into the public view
        assert!(snapshot["ships"][0].get("credits").is_none());
        assert!(snapshot["ships"][0].get("cargo").is_none());
    }

    #[test]
    fn expired_and_claimed_salvage_is_hidden() {
        let entry = |id: &str, expires: u64, claimed: bool| SalvageData {
            id: id.to_string(),
            created_micros: 0,
            expires_micros: expires,
            cargo: Default::default(),
            scrap: 5,
            credits: 0,
            claimed,
            from_ship_name: "x".into(),
            from_ship_type: "shuttle".into(),
            metadata: BTreeMap::new(),
        };
        let salvage = vec![
            entry("live", 100, false),
            entry("expired", 10, false),
            entry("claimed", 100, true),
        ];
        let snapshot = build_snapshot(15, 7, &[], &[], &salvage, 50);
        let listed = snapshot["salvage"].as_array().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0]["id"], "live");
    }

    #[test]
    fn garrisons_expose_their_toll() {
        let garrison = GarrisonData {
            sector: 15,
            owner: "xan".into(),
            owner_corporation: Some(3),
            fighters: 40,
            mode: GarrisonMode::Toll,
            toll_amount: 75,
            toll_balance: 9_999,
            deployed_micros: 4,
        };
        let snapshot = build_snapshot(15, 7, &[], &[garrison], &[], 50);
        let view = &snapshot["garrisons"][0];
        assert_eq!(view["mode"], "toll");
        assert_eq!(view["toll_amount"], 75);
        assert!(view.get("toll_balance").is_none(), "balances stay private");
    }
}
