//! Status builder
//!
//! Builds the per-character `status.snapshot` payload from a character, its
//! ship row, and the resolved template. The same ship view doubles as the
//! viewer-specific `ship` field inside personalized `combat.ended` events.

use serde_json::{json, Value};

use starhold_common::templates::ShipTemplate;

use crate::state::{CharacterData, ShipData};

/// Public view of one ship row with template-resolved current values
pub fn ship_view(ship: &ShipData, template: &ShipTemplate) -> Value {
    json!({
        "id": ship.id,
        "name": ship.name,
        "ship_type": ship.ship_type,
        "sector": { "id": ship.sector },
        "fighters": ship.fighters.unwrap_or(template.max_fighters),
        "shields": ship.shields.unwrap_or(template.max_shields),
        "max_fighters": template.max_fighters,
        "max_shields": template.max_shields,
        "turns_per_warp": template.turns_per_warp,
        "holds": {
            "capacity": template.cargo_holds,
            "used": ship.cargo.total_units(),
        },
        "cargo": {
            "ore": ship.cargo.ore,
            "organics": ship.cargo.organics,
            "equipment": ship.cargo.equipment,
        },
        "credits": ship.credits,
        "scrap": ship.scrap,
        "is_escape_pod": ship.is_escape_pod,
        "destroyed": ship.destroyed,
    })
}

/// The `status.snapshot` payload
pub fn status_snapshot(
    character: &CharacterData,
    ship: &ShipData,
    template: &ShipTemplate,
    now_micros: u64,
) -> Value {
    json!({
        "character": {
            "id": character.id,
            "name": character.name,
            "player_type": character.player_type.as_str(),
            "corporation": character.corporation,
        },
        "ship": ship_view(ship, template),
        "timestamp": now_micros,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use starhold_common::cargo::CargoManifest;
    use starhold_common::templates::ShipClass;
    use starhold_common::types::PlayerKind;

    #[test]
    fn snapshot_resolves_template_defaults() {
        let character = CharacterData {
            id: "kara".into(),
            name: "Kara Vex".into(),
            corporation: Some(4),
            current_ship: Some(2),
            player_type: PlayerKind::Human,
            registered_micros: 0,
        };
        let ship = ShipData {
            id: 2,
            name: "Night Runner".into(),
            ship_type: "clipper".into(),
            sector: 12,
            owner_character: Some("kara".into()),
            cargo: CargoManifest::new(5, 0, 2),
            credits: 900,
            ..ShipData::default()
        };
        let template = ShipClass::Clipper.template();

        let snapshot = status_snapshot(&character, &ship, &template, 77);
        assert_eq!(snapshot["character"]["player_type"], "human");
        assert_eq!(snapshot["ship"]["fighters"], 120);
        assert_eq!(snapshot["ship"]["shields"], 200);
        assert_eq!(snapshot["ship"]["holds"]["capacity"], 60);
        assert_eq!(snapshot["ship"]["holds"]["used"], 7);
        assert_eq!(snapshot["ship"]["sector"]["id"], 12);
        assert_eq!(snapshot["timestamp"], 77);
    }
}
