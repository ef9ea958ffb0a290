//! Encounter lifecycle
//!
//! Owns per-sector encounter state: creation, action submission with
//! replace-before-deadline semantics, deadline sweeps (idempotent by round),
//! resolution through the pure resolver, round advancement with shield
//! regeneration, and termination with finalization and the fixed event
//! sequence `combat.round_resolved` -> `combat.ended` (per participant) ->
//! `ship.destroyed` -> `salvage.created` -> `sector.update`.

use starhold_combat::{
    apply_end_overrides, auto_actions, resolve_round, survivors_all_friendly, toll_satisfied,
};
use starhold_common::errors::GameError;
use starhold_common::events::{EventKind, EventScope};
use starhold_common::rng::{encounter_base_seed, encounter_id, RoundRng};
use starhold_common::types::{
    garrison_combatant_id, ActionKind, CharacterId, CombatantKind, EncounterContext, EncounterData,
    EncounterId, EncounterReason, GarrisonMode, RoundAction, RoundOutcome, SectorId,
};

use crate::emitter::{emit_or_log, EventDraft};
use crate::finalize;
use crate::guard;
use crate::loader;
use crate::map;
use crate::payloads;
use crate::snapshot;
use crate::state::{CharacterData, ShardState, ShipData};
use crate::status;
use crate::visibility::{recipients_for, RecipientSpec};
use crate::ActionInput;

/// Character combatants of an encounter, the direct audience of its events
fn character_participants(encounter: &EncounterData) -> Vec<CharacterId> {
    encounter
        .participants
        .values()
        .filter(|c| c.is_character())
        .map(|c| c.id.clone())
        .collect()
}

/// Recipient spec shared by the round events: everyone watching the sector
/// plus the combatants themselves
fn combat_audience(encounter: &EncounterData) -> RecipientSpec {
    RecipientSpec {
        sector: Some(encounter.sector),
        direct: character_participants(encounter),
        ..RecipientSpec::default()
    }
}

/// Create the encounter for a sector and announce round 1.
///
/// At most one non-ended encounter exists per sector; a second creation
/// attempt is a state conflict.
pub async fn create_encounter(
    state: &mut ShardState,
    sector: SectorId,
    reason: EncounterReason,
    initiator: Option<&str>,
    now_micros: u64,
    method: &str,
) -> Result<EncounterId, GameError> {
    if state.active_encounter(sector).await?.is_some() {
        return Err(GameError::StateConflict(format!(
            "combat already active in sector {}",
            sector
        )));
    }

    let combatants = loader::load_combatants(state, sector).await?;
    if combatants.len() < 2 {
        return Err(GameError::StateConflict(format!(
            "no opposition in sector {}",
            sector
        )));
    }

    let sequence = *state.encounter_count.get();
    state.encounter_count.set(sequence + 1);
    let config = state.config.get().clone();
    let id = encounter_id(config.universe_seed, sector, sequence, now_micros);

    let encounter = EncounterData {
        id: id.clone(),
        sector,
        round: 1,
        deadline_micros: Some(now_micros + config.round_timeout_micros()),
        participants: combatants.into_iter().map(|c| (c.id.clone(), c)).collect(),
        pending: Default::default(),
        log: Vec::new(),
        base_seed: encounter_base_seed(&id),
        context: EncounterContext {
            initiator: initiator.map(str::to_string),
            created_micros: now_micros,
            toll_registry: Default::default(),
            reason: Some(reason),
        },
        awaiting_resolution: false,
        ended: false,
        end_state: None,
    };

    log::info!(
        "encounter {} created in sector {} ({})",
        id,
        sector,
        reason.as_str()
    );

    let payload = payloads::round_waiting_payload(&encounter, method, now_micros);
    let recipients = recipients_for(state, &combat_audience(&encounter)).await?;
    state.put_encounter(encounter).await?;
    emit_or_log(
        state,
        EventDraft::new(EventKind::CombatRoundWaiting, EventScope::Sector, payload)
            .in_sector(sector)
            .to(recipients),
        method,
        now_micros,
    )
    .await;

    Ok(id)
}

/// Submit (or replace) a participant's action for the current round;
/// resolves immediately once every live character has submitted.
pub async fn submit_action(
    state: &mut ShardState,
    character_id: &str,
    input: &ActionInput,
    now_micros: u64,
    method: &str,
) -> Result<(), GameError> {
    let character = state.require_character(character_id).await?;
    let ship_id = character
        .current_ship
        .ok_or_else(|| GameError::Caller(format!("character {} has no ship", character_id)))?;
    let ship = state.require_ship(ship_id).await?;
    guard::authorize(&character, &ship, false)?;
    let sector = ship.sector;

    validate_input(state, input, sector)?;

    if state.active_encounter(sector).await?.is_none() {
        if input.kind == ActionKind::Attack {
            create_encounter(
                state,
                sector,
                EncounterReason::AttackAction,
                Some(character_id),
                now_micros,
                method,
            )
            .await?;
        } else {
            return Err(GameError::StateConflict(format!(
                "no active combat in sector {}",
                sector
            )));
        }
    }

    let mut encounter = state
        .active_encounter(sector)
        .await?
        .ok_or_else(|| GameError::StateConflict(format!("no active combat in sector {}", sector)))?;
    if !encounter.is_participant(character_id) {
        return Err(GameError::StateConflict(format!(
            "{} is not a combat participant",
            character_id
        )));
    }

    let action = match input.kind {
        ActionKind::Attack => RoundAction::attack(
            input.commit,
            input
                .target
                .clone()
                .ok_or_else(|| GameError::Caller("attack requires a target".into()))?,
            now_micros,
        ),
        ActionKind::Brace => RoundAction::brace(now_micros),
        ActionKind::Flee => RoundAction::flee(input.destination, now_micros),
        ActionKind::Pay => {
            let garrison_id =
                pay_toll(state, &mut encounter, &character, input.target.as_deref()).await?;
            RoundAction::pay(garrison_id, now_micros)
        }
    };

    encounter.pending.insert(character_id.to_string(), action);
    let ready = encounter.all_live_characters_submitted();
    state.put_encounter(encounter).await?;

    if ready {
        resolve_and_advance(state, sector, now_micros, method).await?;
    }
    Ok(())
}

fn validate_input(
    state: &ShardState,
    input: &ActionInput,
    sector: SectorId,
) -> Result<(), GameError> {
    if input.kind != ActionKind::Attack && input.commit != 0 {
        return Err(GameError::Caller(format!(
            "fighter commit must be 0 for {}",
            input.kind.as_str()
        )));
    }
    if input.destination.is_some() && input.kind != ActionKind::Flee {
        return Err(GameError::Caller("destination is only valid when fleeing".into()));
    }
    if let (ActionKind::Flee, Some(destination)) = (input.kind, input.destination) {
        let config = state.config.get();
        let adjacent = map::adjacent_sectors(config.universe_seed, sector, config.sector_count);
        if !adjacent.contains(&destination) {
            return Err(GameError::Caller(format!(
                "sector {} has no warp link to {}",
                sector, destination
            )));
        }
    }
    Ok(())
}

/// Live toll-mode garrison participants as `(combatant id, toll amount)`
fn toll_garrisons(encounter: &EncounterData) -> Vec<(String, u64)> {
    encounter
        .participants
        .values()
        .filter_map(|c| match &c.kind {
            CombatantKind::Garrison {
                mode: GarrisonMode::Toll,
                toll_amount,
                ..
            } if c.fighters > 0 => Some((c.id.clone(), *toll_amount)),
            _ => None,
        })
        .collect()
}

/// Toll payment: transfer credits to the garrison and mark the payer in the
/// per-round registry. Returns the paid garrison's combatant id.
///
/// `garrison_owner` names which garrison to pay; without it the payment
/// falls through to the encounter's sole toll garrison.
async fn pay_toll(
    state: &mut ShardState,
    encounter: &mut EncounterData,
    character: &CharacterData,
    garrison_owner: Option<&str>,
) -> Result<String, GameError> {
    let candidates = toll_garrisons(encounter);
    let (garrison_id, toll_amount) = match garrison_owner {
        Some(owner) => {
            let wanted = garrison_combatant_id(encounter.sector, owner);
            candidates
                .into_iter()
                .find(|(id, _)| *id == wanted)
                .ok_or_else(|| {
                    GameError::Caller(format!(
                        "{} has no toll garrison in this encounter",
                        owner
                    ))
                })?
        }
        None => match candidates.as_slice() {
            [] => {
                return Err(GameError::StateConflict(
                    "no toll garrison in this encounter".into(),
                ))
            }
            [only] => only.clone(),
            _ => {
                return Err(GameError::Caller(
                    "multiple toll garrisons present; name the garrison owner to pay".into(),
                ))
            }
        },
    };

    let ship_id = character
        .current_ship
        .ok_or_else(|| GameError::Caller("payer has no ship".into()))?;
    let mut ship = state.require_ship(ship_id).await?;
    if ship.credits < toll_amount {
        return Err(GameError::Caller(format!(
            "toll is {} credits, ship carries {}",
            toll_amount, ship.credits
        )));
    }
    ship.credits -= toll_amount;
    state.put_ship(ship).await?;

    let mut rows = state.garrisons_in(encounter.sector).await?;
    for row in &mut rows {
        if row.combatant_id() == garrison_id {
            row.toll_balance += toll_amount;
        }
    }
    state.set_garrisons(encounter.sector, rows).await?;

    encounter
        .context
        .toll_registry
        .entry(garrison_id.clone())
        .or_default()
        .insert(character.id.clone());

    log::info!(
        "{} paid {} credits of toll to {}",
        character.id,
        toll_amount,
        garrison_id
    );
    Ok(garrison_id)
}

/// The deadline sweeper entry point. A sweep for a round that has already
/// advanced (or an encounter that is gone) is a successful no-op.
pub async fn sweep_deadline(
    state: &mut ShardState,
    sector: SectorId,
    round: u32,
    now_micros: u64,
    method: &str,
) -> Result<(), GameError> {
    let Some(encounter) = state.active_encounter(sector).await? else {
        return Ok(());
    };
    if encounter.round > round {
        return Ok(());
    }
    if encounter.round < round {
        return Err(GameError::StateConflict(format!(
            "sector {} is on round {}, not {}",
            sector, encounter.round, round
        )));
    }
    match encounter.deadline_micros {
        Some(deadline) if now_micros >= deadline => {}
        _ => {
            return Err(GameError::StateConflict(format!(
                "round {} deadline has not elapsed",
                round
            )))
        }
    }
    resolve_and_advance(state, sector, now_micros, method).await
}

/// A character arrived in a sector: join the running encounter, or trigger
/// auto-engagement against a hostile offensive/toll garrison.
pub async fn handle_arrival(
    state: &mut ShardState,
    character: &CharacterData,
    ship: &ShipData,
    now_micros: u64,
    method: &str,
) -> Result<(), GameError> {
    let sector = ship.sector;

    if let Some(mut encounter) = state.active_encounter(sector).await? {
        if encounter.is_participant(&character.id) {
            return Ok(());
        }
        let template = loader::resolve_template(ship)?;
        let combatant = loader::combatant_from_ship(ship, character, &template);
        if combatant.is_escape_pod {
            return Ok(());
        }
        encounter
            .participants
            .insert(combatant.id.clone(), combatant);
        log::info!("{} joined encounter {} on arrival", character.id, encounter.id);

        // Round and deadline stay untouched; only the newcomer is told.
        let payload = payloads::round_waiting_payload(&encounter, method, now_micros);
        state.put_encounter(encounter).await?;
        let recipients = recipients_for(state, &RecipientSpec::direct_to(&character.id)).await?;
        emit_or_log(
            state,
            EventDraft::new(EventKind::CombatRoundWaiting, EventScope::Direct, payload)
                .in_sector(sector)
                .by_actor(&character.id)
                .to(recipients),
            method,
            now_micros,
        )
        .await;
        return Ok(());
    }

    // Friendly means same owner, or both sides carrying the same corporation
    let hostile_garrison = state.garrisons_in(sector).await?.into_iter().any(|g| {
        g.fighters > 0
            && matches!(g.mode, GarrisonMode::Offensive | GarrisonMode::Toll)
            && g.owner != character.id
            && (g.owner_corporation.is_none() || g.owner_corporation != character.corporation)
    });
    if hostile_garrison && !ship.is_escape_pod {
        create_encounter(
            state,
            sector,
            EncounterReason::AutoEngage,
            Some(&character.id),
            now_micros,
            method,
        )
        .await?;
    }
    Ok(())
}

/// Resolve the current round and either advance to the next one or
/// terminate the encounter.
pub async fn resolve_and_advance(
    state: &mut ShardState,
    sector: SectorId,
    now_micros: u64,
    method: &str,
) -> Result<(), GameError> {
    let Some(mut encounter) = state.active_encounter(sector).await? else {
        return Ok(());
    };
    encounter.awaiting_resolution = true;

    // Effective actions: submissions, then timeout braces for silent live
    // characters, then garrison auto-actions.
    let mut effective = encounter.pending.clone();
    let silent: Vec<CharacterId> = encounter
        .live_characters()
        .filter(|c| !effective.contains_key(&c.id))
        .map(|c| c.id.clone())
        .collect();
    for id in silent {
        effective.insert(id, RoundAction::timeout_brace(now_micros));
    }
    let submitted = effective.clone();
    effective.extend(auto_actions(
        &encounter.participants,
        &submitted,
        &encounter.context.toll_registry,
        now_micros,
    ));

    let mut outcome = resolve_round(&encounter, &effective);
    let toll_satisfied = toll_satisfied(&encounter.participants, &encounter.context.toll_registry);
    let survivors_all_friendly = survivors_all_friendly(&encounter.participants, &outcome);
    apply_end_overrides(&mut outcome, toll_satisfied, survivors_all_friendly);

    persist_round_deltas(state, &mut encounter, &outcome).await;
    encounter.log.push(outcome.clone());
    encounter.pending.clear();

    let resolved_payload =
        payloads::round_resolved_payload(&encounter, &outcome, method, now_micros);
    let audience = recipients_for(state, &combat_audience(&encounter)).await?;
    emit_or_log(
        state,
        EventDraft::new(
            EventKind::CombatRoundResolved,
            EventScope::Sector,
            resolved_payload,
        )
        .in_sector(sector)
        .to(audience),
        method,
        now_micros,
    )
    .await;

    if outcome.end_state.is_some() {
        terminate(state, encounter, outcome, now_micros, method).await
    } else {
        advance_round(state, encounter, &outcome, now_micros, method).await
    }
}

/// Write post-round fighter and shield values back to the encounter's
/// combatants and their ship rows
async fn persist_round_deltas(
    state: &mut ShardState,
    encounter: &mut EncounterData,
    outcome: &RoundOutcome,
) {
    for combatant in encounter.participants.values_mut() {
        let fighters = outcome.fighters_of(&combatant.id);
        let shields = outcome
            .shields_remaining
            .get(&combatant.id)
            .copied()
            .unwrap_or(combatant.shields);
        combatant.fighters = fighters;
        combatant.shields = shields;

        let CombatantKind::Character { ship_id, .. } = &combatant.kind else {
            continue;
        };
        match state.get_ship(*ship_id).await {
            Ok(Some(mut ship)) => {
                ship.fighters = Some(fighters);
                ship.shields = Some(shields);
                if let Err(err) = state.put_ship(ship).await {
                    log::warn!("could not persist round deltas for ship {}: {}", ship_id, err);
                }
            }
            Ok(None) => {
                log::warn!("combatant {} lost its ship row {}", combatant.id, ship_id)
            }
            Err(err) => log::warn!("could not load ship {}: {}", ship_id, err),
        }
    }
}

/// Open the next round: drop fleers from the roster, regenerate shields,
/// reset the deadline, announce.
async fn advance_round(
    state: &mut ShardState,
    mut encounter: EncounterData,
    outcome: &RoundOutcome,
    now_micros: u64,
    method: &str,
) -> Result<(), GameError> {
    let config = state.config.get().clone();

    // Successful fleers leave immediately when the fight goes on without
    // them; they must not gate the next round's submissions.
    relocate_fleers(state, &encounter, outcome).await;
    let fled: Vec<CharacterId> = encounter
        .participants
        .keys()
        .filter(|id| outcome.fled(id))
        .cloned()
        .collect();
    for id in fled {
        encounter.participants.remove(&id);
    }

    encounter.context.toll_registry.clear();
    encounter.round += 1;
    encounter.deadline_micros = Some(now_micros + config.round_timeout_micros());
    encounter.awaiting_resolution = false;

    for combatant in encounter.participants.values_mut() {
        if combatant.fighters == 0 || combatant.is_escape_pod {
            continue;
        }
        let regenerated =
            (combatant.shields + config.shield_regen_per_round).min(combatant.max_shields);
        if regenerated == combatant.shields {
            continue;
        }
        combatant.shields = regenerated;
        if let CombatantKind::Character { ship_id, .. } = combatant.kind {
            match state.get_ship(ship_id).await {
                Ok(Some(mut ship)) => {
                    ship.shields = Some(regenerated);
                    if let Err(err) = state.put_ship(ship).await {
                        log::warn!("could not persist shield regen for ship {}: {}", ship_id, err);
                    }
                }
                _ => log::warn!("combatant {} lost its ship row {}", combatant.id, ship_id),
            }
        }
    }

    let payload = payloads::round_waiting_payload(&encounter, method, now_micros);
    let audience = recipients_for(state, &combat_audience(&encounter)).await?;
    let sector = encounter.sector;
    log::info!(
        "encounter {} advances to round {}",
        encounter.id,
        encounter.round
    );
    state.put_encounter(encounter).await?;
    emit_or_log(
        state,
        EventDraft::new(EventKind::CombatRoundWaiting, EventScope::Sector, payload)
            .in_sector(sector)
            .to(audience),
        method,
        now_micros,
    )
    .await;
    Ok(())
}

/// Terminal transition: finalize rows, relocate fleers, emit the ended
/// sequence, run deferred deletions, and close with a sector snapshot.
async fn terminate(
    state: &mut ShardState,
    mut encounter: EncounterData,
    outcome: RoundOutcome,
    now_micros: u64,
    method: &str,
) -> Result<(), GameError> {
    let sector = encounter.sector;
    encounter.ended = true;
    encounter.end_state = outcome.end_state.clone();
    encounter.deadline_micros = None;
    encounter.awaiting_resolution = false;
    log::info!(
        "encounter {} ended: {}",
        encounter.id,
        encounter.end_state.as_deref().unwrap_or("unknown")
    );

    let report = finalize::finalize_encounter(state, &encounter, &outcome, now_micros).await;

    relocate_fleers(state, &encounter, &outcome).await;

    if let Err(err) = state.archive_encounter(encounter.clone()).await {
        log::warn!("could not archive encounter {}: {}", encounter.id, err);
    }

    // Personalized combat.ended: one event per character participant, each
    // carrying that viewer's own post-combat hull.
    for combatant in encounter.participants.values() {
        let CombatantKind::Character { ship_id, .. } = &combatant.kind else {
            continue;
        };
        let viewer_ship = match state.get_ship(*ship_id).await {
            Ok(Some(ship)) => match loader::resolve_template(&ship) {
                Ok(template) => status::ship_view(&ship, &template),
                Err(_) => serde_json::Value::Null,
            },
            _ => serde_json::Value::Null,
        };
        let payload = payloads::ended_payload(
            &encounter,
            &outcome,
            &report.salvage,
            viewer_ship,
            method,
            now_micros,
        );
        let recipients = recipients_for(state, &RecipientSpec::direct_to(&combatant.id))
            .await
            .unwrap_or_default();
        emit_or_log(
            state,
            EventDraft::new(EventKind::CombatEnded, EventScope::Direct, payload)
                .in_sector(sector)
                .by_actor(&combatant.id)
                .to(recipients),
            method,
            now_micros,
        )
        .await;
    }

    for lost in &report.destroyed {
        let spec = RecipientSpec {
            sector: Some(sector),
            corporations: lost.corporation.into_iter().collect(),
            ..RecipientSpec::default()
        };
        let payload = payloads::ship_destroyed_payload(
            method,
            now_micros,
            lost.ship_id,
            &lost.ship_type,
            &lost.ship_name,
            &lost.player_type,
            &lost.player_name,
            sector,
            &encounter.id,
            lost.salvage_created,
        );
        let mut draft = EventDraft::new(EventKind::ShipDestroyed, EventScope::Sector, payload)
            .in_sector(sector)
            .about_ship(lost.ship_id)
            .to(recipients_for(state, &spec).await.unwrap_or_default());
        if let Some(corp) = lost.corporation {
            draft = draft.for_corporation(corp);
        }
        emit_or_log(state, draft, method, now_micros).await;
    }

    for wreck in &report.salvage {
        let payload = payloads::salvage_created_payload(method, now_micros, wreck, sector);
        let recipients = recipients_for(state, &RecipientSpec::sector_wide(sector))
            .await
            .unwrap_or_default();
        emit_or_log(
            state,
            EventDraft::new(EventKind::SalvageCreated, EventScope::Sector, payload)
                .in_sector(sector)
                .to(recipients),
            method,
            now_micros,
        )
        .await;
    }

    // Deferred teardown runs after the ended events so every viewer saw the
    // destroyed state; it must run regardless of what failed above.
    finalize::run_deferred_deletions(state, &report.deferred).await;

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
        Err(err) => log::warn!("could not build closing snapshot for {}: {}", sector, err),
    }

    Ok(())
}

/// Move every successful fleer to its chosen destination, or to a seeded
/// random adjacent sector when none was given
async fn relocate_fleers(
    state: &mut ShardState,
    encounter: &EncounterData,
    outcome: &RoundOutcome,
) {
    let config = state.config.get().clone();
    let adjacent =
        map::adjacent_sectors(config.universe_seed, encounter.sector, config.sector_count);
    let mut rng = RoundRng::with_domain(encounter.base_seed, encounter.round, b"destination");

    for combatant in encounter.participants.values() {
        if !outcome.fled(&combatant.id) {
            continue;
        }
        let CombatantKind::Character { ship_id, .. } = &combatant.kind else {
            continue;
        };
        let chosen = outcome
            .effective_actions
            .get(&combatant.id)
            .and_then(|a| a.destination);
        let destination = match chosen {
            Some(sector) => sector,
            None if !adjacent.is_empty() => adjacent[rng.pick(adjacent.len())],
            None => encounter.sector,
        };
        match state.get_ship(*ship_id).await {
            Ok(Some(mut ship)) => {
                ship.sector = destination;
                if let Err(err) = state.put_ship(ship).await {
                    log::warn!("could not move fleeing ship {}: {}", ship_id, err);
                } else {
                    log::info!(
                        "{} fled encounter {} to sector {}",
                        combatant.id,
                        encounter.id,
                        destination
                    );
                }
            }
            _ => log::warn!("fleeing combatant {} lost its ship row", combatant.id),
        }
    }
}
