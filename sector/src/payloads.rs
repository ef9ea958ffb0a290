//! Event payload builders
//!
//! Clients consume these shapes bit-exactly. Internal maps are keyed by
//! combatant id; the combat payloads re-key them by display name at this
//! boundary (a legacy contract), and `end`, `result`, and `round_result`
//! all carry the same value until clients are confirmed to read only one.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};

use starhold_common::errors::GameError;
use starhold_common::types::{
    Combatant, CombatantId, EncounterData, RoundAction, RoundOutcome, SalvageData,
};

/// Display names per combatant id, the payload key space
pub fn display_names(encounter: &EncounterData) -> BTreeMap<CombatantId, String> {
    encounter
        .participants
        .iter()
        .map(|(id, c)| (id.clone(), c.name.clone()))
        .collect()
}

fn name_of<'a>(names: &'a BTreeMap<CombatantId, String>, id: &'a str) -> &'a str {
    names.get(id).map(String::as_str).unwrap_or(id)
}

fn named_u32_map(
    source: &BTreeMap<CombatantId, u32>,
    names: &BTreeMap<CombatantId, String>,
) -> Value {
    let mut map = Map::new();
    for (id, value) in source {
        map.insert(name_of(names, id).to_string(), json!(value));
    }
    Value::Object(map)
}

fn named_bool_map(
    source: &BTreeMap<CombatantId, bool>,
    names: &BTreeMap<CombatantId, String>,
) -> Value {
    let mut map = Map::new();
    for (id, value) in source {
        map.insert(name_of(names, id).to_string(), json!(value));
    }
    Value::Object(map)
}

fn action_view(action: &RoundAction, names: &BTreeMap<CombatantId, String>) -> Value {
    json!({
        "action": action.kind.as_str(),
        "commit": action.commit,
        "target": action.target.as_deref().map(|t| name_of(names, t)),
        "destination": action.destination,
        "timed_out": action.timed_out,
    })
}

pub fn combatant_view(combatant: &Combatant) -> Value {
    json!({
        "id": combatant.id,
        "name": combatant.name,
        "type": if combatant.is_garrison() { "garrison" } else { "character" },
        "player_type": combatant.player_type().map(|p| p.as_str()),
        "fighters": combatant.fighters,
        "shields": combatant.shields,
        "max_fighters": combatant.max_fighters,
        "max_shields": combatant.max_shields,
        "is_escape_pod": combatant.is_escape_pod,
    })
}

pub fn salvage_view(salvage: &SalvageData) -> Value {
    json!({
        "id": salvage.id,
        "created_at": salvage.created_micros,
        "expires_at": salvage.expires_micros,
        "cargo": {
            "ore": salvage.cargo.ore,
            "organics": salvage.cargo.organics,
            "equipment": salvage.cargo.equipment,
        },
        "scrap": salvage.scrap,
        "credits": salvage.credits,
        "claimed": salvage.claimed,
        "from_ship_name": salvage.from_ship_name,
        "from_ship_type": salvage.from_ship_type,
    })
}

/// `combat.round_waiting`
pub fn round_waiting_payload(encounter: &EncounterData, method: &str, now_micros: u64) -> Value {
    let participants: Vec<Value> = encounter.participants.values().map(combatant_view).collect();
    let garrison = encounter
        .participants
        .values()
        .find(|c| c.is_garrison())
        .map(combatant_view)
        .unwrap_or(Value::Null);

    let mut payload = json!({
        "source": method,
        "combat_id": encounter.id,
        "sector": { "id": encounter.sector },
        "round": encounter.round,
        "deadline": encounter.deadline_micros,
        "current_time": now_micros,
        "participants": participants,
        "garrison": garrison,
    });
    if let Some(initiator) = &encounter.context.initiator {
        payload["initiator"] = json!(initiator);
    }
    payload
}

fn outcome_fields(outcome: &RoundOutcome, names: &BTreeMap<CombatantId, String>) -> Value {
    let mut actions = Map::new();
    for (id, action) in &outcome.effective_actions {
        actions.insert(name_of(names, id).to_string(), action_view(action, names));
    }
    json!({
        "hits": named_u32_map(&outcome.hits, names),
        "offensive_losses": named_u32_map(&outcome.offensive_losses, names),
        "defensive_losses": named_u32_map(&outcome.defensive_losses, names),
        "shield_loss": named_u32_map(&outcome.shield_loss, names),
        "fighters_remaining": named_u32_map(&outcome.fighters_remaining, names),
        "shields_remaining": named_u32_map(&outcome.shields_remaining, names),
        "flee_results": named_bool_map(&outcome.flee_success, names),
        "actions": Value::Object(actions),
        "end": outcome.end_state,
        "result": outcome.end_state,
        "round_result": outcome.end_state,
    })
}

fn merge(base: Value, extra: Value) -> Value {
    let (Value::Object(mut base), Value::Object(extra)) = (base, extra) else {
        return Value::Null;
    };
    base.extend(extra);
    Value::Object(base)
}

/// `combat.round_resolved`
pub fn round_resolved_payload(
    encounter: &EncounterData,
    outcome: &RoundOutcome,
    method: &str,
    now_micros: u64,
) -> Value {
    let names = display_names(encounter);
    merge(
        round_waiting_payload(encounter, method, now_micros),
        outcome_fields(outcome, &names),
    )
}

/// Per-round summary carried in the `logs` list of `combat.ended`
fn log_entry(outcome: &RoundOutcome, names: &BTreeMap<CombatantId, String>) -> Value {
    json!({
        "round": outcome.round,
        "hits": named_u32_map(&outcome.hits, names),
        "offensive_losses": named_u32_map(&outcome.offensive_losses, names),
        "defensive_losses": named_u32_map(&outcome.defensive_losses, names),
        "shield_loss": named_u32_map(&outcome.shield_loss, names),
        "flee_results": named_bool_map(&outcome.flee_success, names),
        "end": outcome.end_state,
    })
}

/// Personalized `combat.ended`: the shared resolution fields plus this
/// viewer's post-combat ship snapshot.
pub fn ended_payload(
    encounter: &EncounterData,
    outcome: &RoundOutcome,
    salvage: &[SalvageData],
    viewer_ship: Value,
    method: &str,
    now_micros: u64,
) -> Value {
    let names = display_names(encounter);
    let logs: Vec<Value> = encounter.log.iter().map(|o| log_entry(o, &names)).collect();
    let extra = json!({
        "salvage": salvage.iter().map(salvage_view).collect::<Vec<_>>(),
        "logs": logs,
        "ship": viewer_ship,
    });
    merge(
        round_resolved_payload(encounter, outcome, method, now_micros),
        extra,
    )
}

/// `ship.destroyed`
#[allow(clippy::too_many_arguments)]
pub fn ship_destroyed_payload(
    method: &str,
    now_micros: u64,
    ship_id: u64,
    ship_type: &str,
    ship_name: &str,
    player_type: &str,
    player_name: &str,
    sector: u32,
    combat_id: &str,
    salvage_created: bool,
) -> Value {
    json!({
        "source": method,
        "timestamp": now_micros,
        "ship_id": ship_id,
        "ship_type": ship_type,
        "ship_name": ship_name,
        "player_type": player_type,
        "player_name": player_name,
        "sector": { "id": sector },
        "combat_id": combat_id,
        "salvage_created": salvage_created,
    })
}

/// `salvage.created`
pub fn salvage_created_payload(
    method: &str,
    now_micros: u64,
    salvage: &SalvageData,
    sector: u32,
) -> Value {
    json!({
        "source": method,
        "timestamp": now_micros,
        "salvage_id": salvage.id,
        "sector": { "id": sector },
        "cargo": {
            "ore": salvage.cargo.ore,
            "organics": salvage.cargo.organics,
            "equipment": salvage.cargo.equipment,
        },
        "scrap": salvage.scrap,
        "credits": salvage.credits,
        "from_ship_type": salvage.from_ship_type,
        "from_ship_name": salvage.from_ship_name,
    })
}

/// Direct `error` event payload
pub fn error_payload(endpoint: &str, error: &GameError) -> Value {
    json!({
        "endpoint": endpoint,
        "error": error.to_string(),
        "status": error.status(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use starhold_common::types::{
        ActionKind, CombatantKind, EncounterContext, GarrisonMode, PlayerKind,
    };

    fn character(id: &str, name: &str) -> Combatant {
        Combatant {
            id: id.to_string(),
            name: name.to_string(),
            kind: CombatantKind::Character {
                ship_id: 1,
                corporation: None,
                player_type: PlayerKind::Human,
            },
            fighters: 10,
            shields: 50,
            max_fighters: 10,
            max_shields: 50,
            turns_per_warp: 2,
            is_escape_pod: false,
            owner: Some(id.to_string()),
        }
    }

    fn encounter() -> EncounterData {
        let garrison = Combatant {
            id: "garrison:9:xan".into(),
            name: "Xan garrison".into(),
            kind: CombatantKind::Garrison {
                mode: GarrisonMode::Toll,
                toll_amount: 25,
                owner_corporation: None,
            },
            fighters: 5,
            shields: 0,
            max_fighters: 5,
            max_shields: 0,
            turns_per_warp: 0,
            is_escape_pod: false,
            owner: Some("xan".into()),
        };
        EncounterData {
            id: "abc123".into(),
            sector: 9,
            round: 2,
            deadline_micros: Some(30_000_000),
            participants: [
                ("kara".to_string(), character("kara", "Kara Vex")),
                (garrison.id.clone(), garrison),
            ]
            .into_iter()
            .collect(),
            pending: BTreeMap::new(),
            log: Vec::new(),
            base_seed: 7,
            context: EncounterContext {
                initiator: Some("kara".into()),
                ..EncounterContext::default()
            },
            awaiting_resolution: false,
            ended: false,
            end_state: None,
        }
    }

    #[test]
    fn waiting_payload_carries_round_and_garrison() {
        let payload = round_waiting_payload(&encounter(), "combat.sweep", 99);
        assert_eq!(payload["combat_id"], "abc123");
        assert_eq!(payload["round"], 2);
        assert_eq!(payload["sector"]["id"], 9);
        assert_eq!(payload["deadline"], 30_000_000u64);
        assert_eq!(payload["current_time"], 99);
        assert_eq!(payload["garrison"]["name"], "Xan garrison");
        assert_eq!(payload["initiator"], "kara");
        assert_eq!(payload["participants"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn resolved_maps_are_keyed_by_display_name() {
        let enc = encounter();
        let mut outcome = RoundOutcome {
            round: 2,
            ..RoundOutcome::default()
        };
        outcome.hits.insert("kara".into(), 4);
        outcome.fighters_remaining.insert("kara".into(), 8);
        outcome.flee_success.insert("kara".into(), false);
        outcome.effective_actions.insert(
            "kara".into(),
            RoundAction::attack(4, "garrison:9:xan".into(), 1),
        );
        outcome.end_state = Some("stalemate".into());

        let payload = round_resolved_payload(&enc, &outcome, "combat.action", 5);
        assert_eq!(payload["hits"]["Kara Vex"], 4);
        assert!(payload["hits"].get("kara").is_none());
        assert_eq!(payload["fighters_remaining"]["Kara Vex"], 8);
        assert_eq!(payload["flee_results"]["Kara Vex"], false);
        assert_eq!(payload["actions"]["Kara Vex"]["action"], "attack");
        assert_eq!(
            payload["actions"]["Kara Vex"]["target"], "Xan garrison",
            "targets are re-keyed to display names too"
        );
        // The legacy triplet stays populated identically
        assert_eq!(payload["end"], "stalemate");
        assert_eq!(payload["result"], "stalemate");
        assert_eq!(payload["round_result"], "stalemate");
    }

    #[test]
    fn ended_payload_adds_viewer_ship_and_salvage() {
        let enc = encounter();
        let outcome = RoundOutcome {
            round: 2,
            end_state: Some("kara_vex_defeated".into()),
            ..RoundOutcome::default()
        };
        let salvage = vec![SalvageData {
            id: "w-1".into(),
            created_micros: 1,
            expires_micros: 2,
            cargo: Default::default(),
            scrap: 15,
            credits: 300,
            claimed: false,
            from_ship_name: "Night Runner".into(),
            from_ship_type: "clipper".into(),
            metadata: BTreeMap::new(),
        }];
        let ship = json!({"id": 3, "is_escape_pod": true});

        let payload = ended_payload(&enc, &outcome, &salvage, ship, "combat.sweep", 5);
        assert_eq!(payload["ship"]["is_escape_pod"], true);
        assert_eq!(payload["salvage"][0]["scrap"], 15);
        assert_eq!(payload["end"], "kara_vex_defeated");
        assert!(payload["logs"].as_array().unwrap().is_empty());
    }

    #[test]
    fn error_payload_shape() {
        let err = GameError::Caller("missing field".into());
        let payload = error_payload("combat.action", &err);
        assert_eq!(payload["endpoint"], "combat.action");
        assert_eq!(payload["status"], 400);
        assert_eq!(payload["error"], "invalid request: missing field");
    }
}
