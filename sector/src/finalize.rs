//! Post-combat finalization
//!
//! Converts the outcome of a terminal round into persistent state: salvage
//! for every defeated ship, escape-pod conversion for player hulls,
//! zero-and-defer teardown for corporation hulls, and garrison row updates.
//! Events describing these changes are emitted by the lifecycle afterwards,
//! so viewers observe pre-deletion state; deferred deletions run once those
//! events are recorded, and they always run.

use starhold_common::errors::GameError;
use starhold_common::rng::fnv1a;
use starhold_common::templates::ShipClass;
use starhold_common::types::{
    CharacterId, CombatantKind, EncounterData, RoundOutcome, SalvageData, SectorId, ShipId,
};

use crate::state::{ShardState, ShipData};

/// Teardown of a corporation ship, executed after `combat.ended` emission
#[derive(Debug, Clone)]
pub struct DeferredDeletion {
    pub ship: ShipId,
    pub pilot: CharacterId,
}

/// Facts about one destroyed ship, for `ship.destroyed` emission
#[derive(Debug, Clone)]
pub struct DestroyedShip {
    pub ship_id: ShipId,
    pub ship_type: String,
    pub ship_name: String,
    pub player_type: String,
    pub player_name: String,
    pub corporation: Option<u64>,
    pub salvage_created: bool,
}

/// Everything the lifecycle needs to emit the post-combat event sequence
#[derive(Debug, Clone, Default)]
pub struct FinalizeReport {
    pub salvage: Vec<SalvageData>,
    pub destroyed: Vec<DestroyedShip>,
    pub deferred: Vec<DeferredDeletion>,
}

/// Deterministic wreck id derived from the encounter and hull
fn salvage_id(encounter_id: &str, ship: ShipId, round: u32) -> String {
    let mut bytes = Vec::with_capacity(encounter_id.len() + 12);
    bytes.extend_from_slice(encounter_id.as_bytes());
    bytes.extend_from_slice(&ship.to_le_bytes());
    bytes.extend_from_slice(&round.to_le_bytes());
    format!("salvage-{:016x}", fnv1a(&bytes))
}

/// Build the wreck left behind by a defeated ship
pub fn salvage_from_ship(
    ship: &ShipData,
    encounter_id: &str,
    round: u32,
    now_micros: u64,
    ttl_micros: u64,
) -> SalvageData {
    let scrap = ShipClass::parse(&ship.ship_type)
        .map(|class| class.scrap_yield())
        .unwrap_or(starhold_common::constants::SCRAP_MINIMUM);
    SalvageData {
        id: salvage_id(encounter_id, ship.id, round),
        created_micros: now_micros,
        expires_micros: now_micros + ttl_micros,
        cargo: ship.cargo,
        scrap,
        credits: ship.credits,
        claimed: false,
        from_ship_name: ship.name.clone(),
        from_ship_type: ship.ship_type.clone(),
        metadata: Default::default(),
    }
}

/// In-place conversion of a player hull into an escape pod; the pilot keeps
/// the same ship id
pub fn convert_to_escape_pod(ship: &mut ShipData) {
    ship.ship_type = ShipClass::EscapePod.as_str().to_string();
    ship.fighters = Some(0);
    ship.shields = Some(0);
    ship.cargo = Default::default();
    ship.credits = 0;
    ship.is_escape_pod = true;
    ship.destroyed = false;
}

/// Drop expired entries; runs on every salvage-list write
pub fn prune_expired(entries: &mut Vec<SalvageData>, now_micros: u64) {
    entries.retain(|s| !s.expired(now_micros));
}

/// Apply the terminal outcome to persistent rows.
///
/// Row-level failures are logged and skipped rather than propagated so the
/// deferred-deletion list always reaches the caller intact.
pub async fn finalize_encounter(
    state: &mut ShardState,
    encounter: &EncounterData,
    outcome: &RoundOutcome,
    now_micros: u64,
) -> FinalizeReport {
    let mut report = FinalizeReport::default();
    let ttl_micros = state.config.get().salvage_ttl_micros();
    let sector = encounter.sector;

    for combatant in encounter.participants.values() {
        let CombatantKind::Character { ship_id, .. } = &combatant.kind else {
            continue;
        };
        if outcome.fighters_of(&combatant.id) > 0 || outcome.fled(&combatant.id) {
            continue;
        }

        let mut ship = match state.get_ship(*ship_id).await {
            Ok(Some(ship)) => ship,
            Ok(None) => {
                log::warn!("defeated combatant {} has no ship row {}", combatant.id, ship_id);
                continue;
            }
            Err(err) => {
                log::warn!("skipping teardown of ship {}: {}", ship_id, err);
                continue;
            }
        };

        let wreck =
            salvage_from_ship(&ship, &encounter.id, encounter.round, now_micros, ttl_micros);
        if let Err(err) = append_salvage(state, sector, wreck.clone(), now_micros).await {
            log::warn!("could not record salvage for ship {}: {}", ship.id, err);
        } else {
            report.salvage.push(wreck);
        }

        // Captured before teardown so destruction events describe the hull
        // as it fought, not as a pod.
        let lost_type = ship.ship_type.clone();
        let lost_name = ship.name.clone();

        let corporation = ship.owner_corporation;
        if corporation.is_some() {
            // Corporation hulls stay visible as destroyed until the ended
            // events are out, then the pseudo-pilot and row are deleted.
            ship.fighters = Some(0);
            ship.shields = Some(0);
            ship.destroyed = true;
            if let Some(pilot) = ship.owner_character.clone() {
                report.deferred.push(DeferredDeletion {
                    ship: ship.id,
                    pilot,
                });
            }
        } else {
            convert_to_escape_pod(&mut ship);
        }

        report.destroyed.push(DestroyedShip {
            ship_id: ship.id,
            ship_type: lost_type,
            ship_name: lost_name,
            player_type: combatant
                .player_type()
                .map(|p| p.as_str())
                .unwrap_or("human")
                .to_string(),
            player_name: combatant.name.clone(),
            corporation,
            salvage_created: true,
        });

        if let Err(err) = state.put_ship(ship).await {
            log::warn!("could not persist teardown of ship {}: {}", ship_id, err);
        }
    }

    if let Err(err) = settle_garrisons(state, encounter, outcome).await {
        log::warn!("garrison settlement failed in sector {}: {}", sector, err);
    }

    report
}

async fn append_salvage(
    state: &mut ShardState,
    sector: SectorId,
    wreck: SalvageData,
    now_micros: u64,
) -> Result<(), GameError> {
    let mut entries = state.salvage_in(sector).await?;
    prune_expired(&mut entries, now_micros);
    entries.push(wreck);
    state.set_salvage(sector, entries).await
}

/// Update or delete garrison rows from the terminal fighter counts
async fn settle_garrisons(
    state: &mut ShardState,
    encounter: &EncounterData,
    outcome: &RoundOutcome,
) -> Result<(), GameError> {
    let mut rows = state.garrisons_in(encounter.sector).await?;
    let mut changed = false;
    rows.retain_mut(|garrison| {
        let id = garrison.combatant_id();
        if !encounter.participants.contains_key(&id) {
            return true;
        }
        changed = true;
        let remaining = outcome.fighters_of(&id);
        if remaining == 0 {
            log::info!("garrison {} wiped out", id);
            false
        } else {
            garrison.fighters = remaining;
            true
        }
    });
    if changed {
        state.set_garrisons(encounter.sector, rows).await?;
    }
    Ok(())
}

/// Delete corporation hulls and their pseudo-pilots. Runs unconditionally
/// after the ended events are emitted; failures are logged per row.
pub async fn run_deferred_deletions(state: &mut ShardState, deferred: &[DeferredDeletion]) {
    for deletion in deferred {
        // Null the pilot link first so a partial failure never leaves a
        // character pointing at a missing ship.
        match state.get_character(&deletion.pilot).await {
            Ok(Some(mut pilot)) => {
                pilot.current_ship = None;
                if let Err(err) = state.put_character(pilot).await {
                    log::warn!("could not unlink pilot {}: {}", deletion.pilot, err);
                }
            }
            Ok(None) => {}
            Err(err) => log::warn!("could not load pilot {}: {}", deletion.pilot, err),
        }

        if state.characters.remove(&deletion.pilot).is_err() {
            log::warn!("could not delete pseudo-character {}", deletion.pilot);
        }
        let mut roster = state.character_roster.get().clone();
        roster.retain(|id| id != &deletion.pilot);
        state.character_roster.set(roster);

        if state.ships.remove(&deletion.ship).is_err() {
            log::warn!("could not delete ship row {}", deletion.ship);
        }
        log::info!(
            "deferred teardown complete for ship {} (pilot {})",
            deletion.ship,
            deletion.pilot
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use starhold_common::cargo::CargoManifest;

    fn ship(id: u64, ship_type: &str) -> ShipData {
        ShipData {
            id,
            name: "Night Runner".into(),
            ship_type: ship_type.into(),
            sector: 8,
            owner_character: Some("kara".into()),
            cargo: CargoManifest::new(3, 1, 0),
            credits: 750,
            ..ShipData::default()
        }
    }

    #[test]
    fn wrecks_inherit_cargo_credits_and_scrap() {
        let wreck = salvage_from_ship(&ship(4, "gunship"), "enc-1", 3, 100, 900);
        assert_eq!(wreck.cargo, CargoManifest::new(3, 1, 0));
        assert_eq!(wreck.credits, 750);
        assert_eq!(wreck.scrap, 230, "gunship price / 1000");
        assert_eq!(wreck.expires_micros, 1_000);
        assert!(!wreck.claimed);
        assert_eq!(wreck.from_ship_type, "gunship");
    }

    #[test]
    fn wreck_ids_are_deterministic_per_hull() {
        let a = salvage_from_ship(&ship(4, "shuttle"), "enc-1", 3, 100, 900);
        let b = salvage_from_ship(&ship(4, "shuttle"), "enc-1", 3, 100, 900);
        let c = salvage_from_ship(&ship(5, "shuttle"), "enc-1", 3, 100, 900);
        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);
    }

    #[test]
    fn pod_conversion_keeps_the_hull_id() {
        let mut row = ship(4, "shuttle");
        convert_to_escape_pod(&mut row);
        assert_eq!(row.id, 4);
        assert_eq!(row.ship_type, "escape_pod");
        assert!(row.is_escape_pod);
        assert!(!row.destroyed);
        assert_eq!(row.fighters, Some(0));
        assert_eq!(row.shields, Some(0));
        assert_eq!(row.credits, 0);
        assert!(row.cargo.is_empty());
    }

    #[test]
    fn pruning_drops_only_expired_wrecks() {
        let mut entries = vec![
            salvage_from_ship(&ship(1, "shuttle"), "enc-1", 1, 0, 100),
            salvage_from_ship(&ship(2, "shuttle"), "enc-1", 1, 50, 100),
        ];
        prune_expired(&mut entries, 120);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].expires_micros, 150);
    }
}
