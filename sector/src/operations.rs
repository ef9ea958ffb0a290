//! Operation handlers outside the combat lifecycle
//!
//! Registration, session join, movement, garrison deployment, salvage
//! claims, and the corporation registry. Each handler validates and
//! authorizes before touching state, then hands arrival side effects to the
//! lifecycle.

use starhold_common::constants::{STARTER_SECTOR, STARTING_CREDITS};
use starhold_common::errors::GameError;
use starhold_common::events::{EventKind, EventScope};
use starhold_common::templates::ShipClass;
use starhold_common::types::{EncounterReason, GarrisonMode, PlayerKind, SectorId};

use crate::emitter::{emit_or_log, EventDraft};
use crate::finalize::prune_expired;
use crate::guard;
use crate::lifecycle;
use crate::loader;
use crate::map;
use crate::snapshot;
use crate::state::{
    CharacterData, CorpMemberData, CorporationData, GarrisonData, ShardState, ShipData,
};
use crate::status;
use crate::visibility::{recipients_for, RecipientSpec};

fn valid_character_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 32
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Load the actor's character and piloted ship, authorization included
async fn actor_ship(
    state: &ShardState,
    character_id: &str,
) -> Result<(CharacterData, ShipData), GameError> {
    let character = state.require_character(character_id).await?;
    let ship_id = character
        .current_ship
        .ok_or_else(|| GameError::Caller(format!("character {} has no ship", character_id)))?;
    let ship = state.require_ship(ship_id).await?;
    guard::authorize(&character, &ship, false)?;
    Ok((character, ship))
}

async fn emit_status(
    state: &mut ShardState,
    character: &CharacterData,
    ship: &ShipData,
    method: &str,
    now_micros: u64,
) {
    let Ok(template) = loader::resolve_template(ship) else {
        log::warn!("status for {} skipped: unknown template", character.id);
        return;
    };
    let payload = status::status_snapshot(character, ship, &template, now_micros);
    let recipients = recipients_for(state, &RecipientSpec::direct_to(&character.id))
        .await
        .unwrap_or_default();
    emit_or_log(
        state,
        EventDraft::new(EventKind::StatusSnapshot, EventScope::Direct, payload)
            .by_actor(&character.id)
            .to(recipients),
        method,
        now_micros,
    )
    .await;
}

async fn emit_sector_update(
    state: &mut ShardState,
    sector: SectorId,
    method: &str,
    now_micros: u64,
) {
    match snapshot::sector_snapshot(state, sector, now_micros).await {
        Ok(payload) => {
            let recipients = recipients_for(state, &RecipientSpec::sector_wide(sector))
                .await
                .unwrap_or_default();
            emit_or_log(
                state,
                EventDraft::new(EventKind::SectorUpdate, EventScope::Sector, payload)
                    .in_sector(sector)
                    .to(recipients),
                method,
                now_micros,
            )
            .await;
        }
        Err(err) => log::warn!("could not build snapshot for sector {}: {}", sector, err),
    }
}

/// Create a character with a starter shuttle in the federation home sector
pub async fn register(
    state: &mut ShardState,
    character_id: &str,
    name: &str,
    now_micros: u64,
    method: &str,
) -> Result<(), GameError> {
    if !valid_character_id(character_id) {
        return Err(GameError::Caller(format!(
            "invalid character id {:?}",
            character_id
        )));
    }
    if name.trim().is_empty() {
        return Err(GameError::Caller("display name must not be empty".into()));
    }
    if state.get_character(character_id).await?.is_some() {
        return Err(GameError::Caller(format!(
            "character {} is already registered",
            character_id
        )));
    }

    let ship_id = *state.ship_count.get();
    state.ship_count.set(ship_id + 1);
    let ship = ShipData {
        id: ship_id,
        name: format!("{}'s Shuttle", name.trim()),
        ship_type: ShipClass::Shuttle.as_str().to_string(),
        sector: STARTER_SECTOR,
        owner_character: Some(character_id.to_string()),
        owner_corporation: None,
        fighters: None,
        shields: None,
        credits: STARTING_CREDITS,
        ..ShipData::default()
    };
    let character = CharacterData {
        id: character_id.to_string(),
        name: name.trim().to_string(),
        corporation: None,
        current_ship: Some(ship_id),
        player_type: PlayerKind::Human,
        registered_micros: now_micros,
    };

    state.put_ship(ship.clone()).await?;
    state.put_character(character.clone()).await?;
    let mut roster = state.character_roster.get().clone();
    roster.push(character_id.to_string());
    state.character_roster.set(roster);

    log::info!("registered character {} in sector {}", character_id, STARTER_SECTOR);
    emit_status(state, &character, &ship, method, now_micros).await;
    Ok(())
}

/// Session join: hand the caller its current status snapshot
pub async fn join(
    state: &mut ShardState,
    character_id: &str,
    now_micros: u64,
    method: &str,
) -> Result<(), GameError> {
    let (character, ship) = actor_ship(state, character_id).await?;
    emit_status(state, &character, &ship, method, now_micros).await;
    Ok(())
}

/// Warp to an adjacent sector; arrival may auto-join or auto-engage combat
pub async fn move_ship(
    state: &mut ShardState,
    character_id: &str,
    to_sector: SectorId,
    now_micros: u64,
    method: &str,
) -> Result<(), GameError> {
    let (character, mut ship) = actor_ship(state, character_id).await?;
    let config = state.config.get().clone();

    if !map::in_bounds(to_sector, config.sector_count) {
        return Err(GameError::Caller(format!("sector {} does not exist", to_sector)));
    }
    let from_sector = ship.sector;
    if from_sector == to_sector {
        return Err(GameError::Caller("already in that sector".into()));
    }
    let adjacent = map::adjacent_sectors(config.universe_seed, from_sector, config.sector_count);
    if !adjacent.contains(&to_sector) {
        return Err(GameError::Caller(format!(
            "sector {} has no warp link to {}",
            from_sector, to_sector
        )));
    }
    if let Some(encounter) = state.active_encounter(from_sector).await? {
        if encounter.is_participant(character_id) {
            return Err(GameError::StateConflict(
                "cannot warp out of combat; flee instead".into(),
            ));
        }
    }

    ship.sector = to_sector;
    state.put_ship(ship.clone()).await?;
    log::info!("{} warped {} -> {}", character_id, from_sector, to_sector);

    emit_sector_update(state, from_sector, method, now_micros).await;
    emit_sector_update(state, to_sector, method, now_micros).await;
    lifecycle::handle_arrival(state, &character, &ship, now_micros, method).await
}

/// Station fighters from the actor's ship as a garrison
pub async fn deploy_garrison(
    state: &mut ShardState,
    character_id: &str,
    fighters: u32,
    mode: GarrisonMode,
    toll_amount: Option<u64>,
    now_micros: u64,
    method: &str,
) -> Result<(), GameError> {
    let (character, mut ship) = actor_ship(state, character_id).await?;
    let sector = ship.sector;

    if map::is_federation_space(sector) {
        return Err(GameError::Caller(
            "garrison deployment is prohibited in federation space".into(),
        ));
    }
    if fighters == 0 {
        return Err(GameError::Caller("a garrison needs at least one fighter".into()));
    }
    let toll_amount = match (mode, toll_amount) {
        (GarrisonMode::Toll, Some(amount)) if amount > 0 => amount,
        (GarrisonMode::Toll, _) => {
            return Err(GameError::Caller("toll garrisons need a toll amount".into()))
        }
        (_, Some(_)) => {
            return Err(GameError::Caller(
                "toll amount is only valid for toll garrisons".into(),
            ))
        }
        (_, None) => 0,
    };

    let template = loader::resolve_template(&ship)?;
    let aboard = ship.fighters.unwrap_or(template.max_fighters);
    if aboard < fighters {
        return Err(GameError::Caller(format!(
            "ship carries {} fighters, cannot deploy {}",
            aboard, fighters
        )));
    }
    ship.fighters = Some(aboard - fighters);

    let mut rows = state.garrisons_in(sector).await?;
    match rows.iter_mut().find(|g| g.owner == character_id) {
        Some(existing) => {
            existing.fighters += fighters;
            existing.mode = mode;
            existing.toll_amount = toll_amount;
            existing.owner_corporation = character.corporation;
        }
        None => rows.push(GarrisonData {
            sector,
            owner: character_id.to_string(),
            owner_corporation: character.corporation,
            fighters,
            mode,
            toll_amount,
            toll_balance: 0,
            deployed_micros: now_micros,
        }),
    }

    state.put_ship(ship).await?;
    state.set_garrisons(sector, rows).await?;
    log::info!(
        "{} deployed {} fighters as a {} garrison in sector {}",
        character_id,
        fighters,
        mode.as_str(),
        sector
    );
    emit_sector_update(state, sector, method, now_micros).await;

    if mode == GarrisonMode::Offensive && state.active_encounter(sector).await?.is_none() {
        let enemy_present = hostile_pilot_present(state, sector, &character).await?;
        if enemy_present {
            lifecycle::create_encounter(
                state,
                sector,
                EncounterReason::GarrisonDeploy,
                Some(character_id),
                now_micros,
                method,
            )
            .await?;
        }
    }
    Ok(())
}

async fn hostile_pilot_present(
    state: &ShardState,
    sector: SectorId,
    deployer: &CharacterData,
) -> Result<bool, GameError> {
    for pilot_id in state.pilots_in_sector(sector).await? {
        if pilot_id == deployer.id {
            continue;
        }
        let Some(pilot) = state.get_character(&pilot_id).await? else {
            continue;
        };
        let friendly = deployer.corporation.is_some() && pilot.corporation == deployer.corporation;
        if !friendly {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Pull a stationed garrison back aboard
pub async fn withdraw_garrison(
    state: &mut ShardState,
    character_id: &str,
    now_micros: u64,
    method: &str,
) -> Result<(), GameError> {
    let (_, mut ship) = actor_ship(state, character_id).await?;
    let sector = ship.sector;

    let mut rows = state.garrisons_in(sector).await?;
    let position = rows
        .iter()
        .position(|g| g.owner == character_id)
        .ok_or_else(|| {
            GameError::StateConflict(format!("no garrison of yours in sector {}", sector))
        })?;

    if let Some(encounter) = state.active_encounter(sector).await? {
        if encounter.is_participant(&rows[position].combatant_id()) {
            return Err(GameError::StateConflict(
                "garrison is engaged in combat".into(),
            ));
        }
    }

    let garrison = rows.remove(position);
    let template = loader::resolve_template(&ship)?;
    let aboard = ship.fighters.unwrap_or(template.max_fighters);
    ship.fighters = Some((aboard + garrison.fighters).min(template.max_fighters));
    ship.credits += garrison.toll_balance;

    state.put_ship(ship).await?;
    state.set_garrisons(sector, rows).await?;
    log::info!("{} withdrew their garrison from sector {}", character_id, sector);
    emit_sector_update(state, sector, method, now_micros).await;
    Ok(())
}

/// Claim an unexpired wreck: credits and scrap transfer whole, cargo up to
/// the free holds
pub async fn claim_salvage(
    state: &mut ShardState,
    character_id: &str,
    salvage_id: &str,
    now_micros: u64,
    method: &str,
) -> Result<(), GameError> {
    let (character, mut ship) = actor_ship(state, character_id).await?;
    let sector = ship.sector;

    let mut entries = state.salvage_in(sector).await?;
    prune_expired(&mut entries, now_micros);

    let Some(entry) = entries
        .iter_mut()
        .find(|s| s.id == salvage_id && !s.claimed)
    else {
        // The prune still has to land, otherwise expired wrecks linger
        state.set_salvage(sector, entries).await?;
        return Err(GameError::StateConflict(format!(
            "salvage {} is not available",
            salvage_id
        )));
    };

    let template = loader::resolve_template(&ship)?;
    let free = template.cargo_holds.saturating_sub(ship.cargo.total_units());
    let taken = entry.cargo.capped(free);
    ship.cargo += taken;
    ship.credits += entry.credits;
    ship.scrap += entry.scrap;
    entry.claimed = true;
    let wreck_id = entry.id.clone();

    state.put_ship(ship.clone()).await?;
    state.set_salvage(sector, entries).await?;
    log::info!("{} claimed salvage {} in sector {}", character_id, wreck_id, sector);

    emit_status(state, &character, &ship, method, now_micros).await;
    emit_sector_update(state, sector, method, now_micros).await;
    Ok(())
}

/// Found a corporation with the actor as first member
pub async fn form_corporation(
    state: &mut ShardState,
    character_id: &str,
    name: &str,
    now_micros: u64,
) -> Result<(), GameError> {
    let mut character = state.require_character(character_id).await?;
    if character.corporation.is_some() {
        return Err(GameError::Caller("already in a corporation".into()));
    }
    if name.trim().is_empty() {
        return Err(GameError::Caller("corporation name must not be empty".into()));
    }

    let id = *state.corporation_count.get();
    state.corporation_count.set(id + 1);
    let corporation = CorporationData {
        id,
        name: name.trim().to_string(),
        founder: character_id.to_string(),
        members: vec![CorpMemberData {
            character: character_id.to_string(),
            joined_micros: now_micros,
            left: false,
        }],
    };
    state.put_corporation(corporation).await?;

    character.corporation = Some(id);
    state.put_character(character).await?;
    log::info!("{} founded corporation {} ({})", character_id, name.trim(), id);
    Ok(())
}

pub async fn join_corporation(
    state: &mut ShardState,
    character_id: &str,
    corporation_id: u64,
    now_micros: u64,
) -> Result<(), GameError> {
    let mut character = state.require_character(character_id).await?;
    if character.corporation.is_some() {
        return Err(GameError::Caller("already in a corporation".into()));
    }
    let mut corporation = state
        .get_corporation(corporation_id)
        .await?
        .ok_or_else(|| GameError::Caller(format!("unknown corporation {}", corporation_id)))?;

    match corporation
        .members
        .iter_mut()
        .find(|m| m.character == character_id)
    {
        Some(member) => {
            member.left = false;
            member.joined_micros = now_micros;
        }
        None => corporation.members.push(CorpMemberData {
            character: character_id.to_string(),
            joined_micros: now_micros,
            left: false,
        }),
    }
    state.put_corporation(corporation).await?;

    character.corporation = Some(corporation_id);
    state.put_character(character).await?;
    log::info!("{} joined corporation {}", character_id, corporation_id);
    Ok(())
}

pub async fn leave_corporation(
    state: &mut ShardState,
    character_id: &str,
) -> Result<(), GameError> {
    let mut character = state.require_character(character_id).await?;
    let corporation_id = character
        .corporation
        .ok_or_else(|| GameError::Caller("not in a corporation".into()))?;

    if let Some(mut corporation) = state.get_corporation(corporation_id).await? {
        for member in &mut corporation.members {
            if member.character == character_id {
                member.left = true;
            }
        }
        state.put_corporation(corporation).await?;
    }

    character.corporation = None;
    state.put_character(character).await?;
    log::info!("{} left corporation {}", character_id, corporation_id);
    Ok(())
}

/// Commission a corporation-owned ship with an autonomous pseudo-pilot in
/// the officer's sector, paid from the officer's ship credits
pub async fn commission_ship(
    state: &mut ShardState,
    character_id: &str,
    ship_type: &str,
    ship_name: &str,
    now_micros: u64,
    method: &str,
) -> Result<(), GameError> {
    let (officer, mut officer_ship) = actor_ship(state, character_id).await?;
    let corporation = officer
        .corporation
        .ok_or_else(|| GameError::Caller("commissioning requires a corporation".into()))?;
    let class = ShipClass::parse(ship_type)
        .ok_or_else(|| GameError::Caller(format!("unknown ship type {}", ship_type)))?;
    if class == ShipClass::EscapePod {
        return Err(GameError::Caller("escape pods cannot be commissioned".into()));
    }
    if ship_name.trim().is_empty() {
        return Err(GameError::Caller("ship name must not be empty".into()));
    }

    let price = class.template().purchase_price;
    if officer_ship.credits < price {
        return Err(GameError::Caller(format!(
            "commissioning a {} costs {} credits",
            ship_type, price
        )));
    }
    officer_ship.credits -= price;

    let ship_id = *state.ship_count.get();
    state.ship_count.set(ship_id + 1);
    let pilot_id = format!("corpship-{}", ship_id);
    let ship = ShipData {
        id: ship_id,
        name: ship_name.trim().to_string(),
        ship_type: class.as_str().to_string(),
        sector: officer_ship.sector,
        owner_character: Some(pilot_id.clone()),
        owner_corporation: Some(corporation),
        fighters: None,
        shields: None,
        ..ShipData::default()
    };
    let pilot = CharacterData {
        id: pilot_id.clone(),
        name: ship_name.trim().to_string(),
        corporation: Some(corporation),
        current_ship: Some(ship_id),
        player_type: PlayerKind::CorporationShip,
        registered_micros: now_micros,
    };

    let sector = officer_ship.sector;
    state.put_ship(officer_ship).await?;
    state.put_ship(ship).await?;
    state.put_character(pilot).await?;
    let mut roster = state.character_roster.get().clone();
    roster.push(pilot_id.clone());
    state.character_roster.set(roster);

    log::info!(
        "corporation {} commissioned {} ({}) piloted by {}",
        corporation,
        ship_name.trim(),
        ship_type,
        pilot_id
    );
    emit_sector_update(state, sector, method, now_micros).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn character_ids_are_flat_tokens() {
        assert!(valid_character_id("kara_vex-7"));
        assert!(!valid_character_id(""));
        assert!(!valid_character_id("garrison:9:kara"));
        assert!(!valid_character_id("spaced name"));
        assert!(!valid_character_id(&"x".repeat(40)));
    }
}
