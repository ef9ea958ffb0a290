//! The round resolver
//!
//! Resolves one round of an encounter in six phases: action normalization,
//! flee resolution, early termination, serialized attack exchanges, shield
//! ablation, and end-state derivation. The resolver is pure; callers pass
//! the full action map and the encounter is read-only.

use std::collections::{BTreeMap, BTreeSet};

use starhold_common::constants::*;
use starhold_common::rng::RoundRng;
use starhold_common::types::{
    named_end_state, ActionKind, Combatant, CombatantId, EncounterData, RoundAction, RoundOutcome,
};

/// Shield-derived reduction of incoming hit probability, in `[0, 0.5]`
pub fn shield_mitigation(shields: u32, bracing: bool) -> f64 {
    let base = (shields as f64 * SHIELD_MITIGATION_PER_POINT).clamp(0.0, MITIGATION_CAP);
    if bracing {
        (base * BRACE_MITIGATION_BONUS).clamp(0.0, MITIGATION_CAP)
    } else {
        base
    }
}

/// Pay is damage-equivalent to brace: same mitigation bonus, same ablation
fn is_bracing(kind: ActionKind) -> bool {
    matches!(kind, ActionKind::Brace | ActionKind::Pay)
}

/// Phase A: coerce one submitted action into its effective form
fn normalize_action(
    id: &str,
    combatant: &Combatant,
    action: &RoundAction,
    participants: &BTreeMap<CombatantId, Combatant>,
) -> RoundAction {
    let mut effective = action.clone();
    match effective.kind {
        ActionKind::Attack => {
            effective.commit = effective.commit.min(combatant.fighters);
            effective.destination = None;
            let valid_target = match &effective.target {
                Some(target) => target != id && participants.contains_key(target),
                None => false,
            };
            if effective.commit == 0 || !valid_target {
                effective.kind = ActionKind::Brace;
                effective.commit = 0;
                effective.target = None;
            }
        }
        ActionKind::Brace | ActionKind::Pay => {
            effective.commit = 0;
            effective.target = None;
            effective.destination = None;
        }
        ActionKind::Flee => {
            effective.commit = 0;
            effective.target = None;
        }
    }
    effective
}

fn zero_map(participants: &BTreeMap<CombatantId, Combatant>) -> BTreeMap<CombatantId, u32> {
    participants.keys().map(|id| (id.clone(), 0)).collect()
}

/// Resolve one round. Reconstructing the same `(base_seed, round, actions)`
/// yields a byte-identical outcome.
pub fn resolve_round(
    encounter: &EncounterData,
    actions: &BTreeMap<CombatantId, RoundAction>,
) -> RoundOutcome {
    let participants = &encounter.participants;
    let mut rng = RoundRng::new(encounter.base_seed, encounter.round);

    // Phase A: normalize actions and compute mitigation
    let mut effective: BTreeMap<CombatantId, RoundAction> = BTreeMap::new();
    for (id, combatant) in participants {
        let submitted = actions
            .get(id)
            .cloned()
            .unwrap_or_else(|| RoundAction::timeout_brace(0));
        effective.insert(id.clone(), normalize_action(id, combatant, &submitted, participants));
    }

    let mitigation: BTreeMap<CombatantId, f64> = participants
        .iter()
        .map(|(id, c)| {
            let bracing = is_bracing(effective[id].kind);
            (id.clone(), shield_mitigation(c.shields, bracing))
        })
        .collect();

    let start_fighters: BTreeMap<CombatantId, u32> =
        participants.iter().map(|(id, c)| (id.clone(), c.fighters)).collect();
    let start_shields: BTreeMap<CombatantId, u32> =
        participants.iter().map(|(id, c)| (id.clone(), c.shields)).collect();

    let mut live_fighters = start_fighters.clone();
    let mut active: BTreeSet<CombatantId> = participants.keys().cloned().collect();
    let mut flee_success: BTreeMap<CombatantId, bool> =
        participants.keys().map(|id| (id.clone(), false)).collect();

    // Phase B: resolve flee attempts in stable id order
    for id in participants.keys() {
        if effective[id].kind != ActionKind::Flee {
            continue;
        }
        let opponent = active
            .iter()
            .filter(|other| *other != id)
            .max_by(|a, b| {
                live_fighters[*a]
                    .cmp(&live_fighters[*b])
                    .then_with(|| b.cmp(a)) // tie-break: smaller id wins the max
            })
            .cloned();
        let success = match opponent {
            None => true,
            Some(opp) => {
                let fleer = &participants[id];
                let against = &participants[&opp];
                let chance = (FLEE_BASE_CHANCE
                    + FLEE_WARP_FACTOR
                        * (fleer.turns_per_warp as f64 - against.turns_per_warp as f64))
                    .clamp(FLEE_MIN_CHANCE, FLEE_MAX_CHANCE);
                rng.next() < chance
            }
        };
        if success {
            active.remove(id);
            flee_success.insert(id.clone(), true);
        }
    }

    let any_fled = flee_success.values().any(|v| *v);
    let attackers_remain = active
        .iter()
        .any(|id| effective[id].kind == ActionKind::Attack);

    // Phase C: early termination when nobody is left attacking
    if !attackers_remain {
        let all_bracing = active.iter().all(|id| is_bracing(effective[id].kind));
        let end_state = if any_fled {
            participants
                .keys()
                .find(|id| flee_success[*id])
                .map(|id| named_end_state(&participants[id].name, "fled"))
        } else if all_bracing {
            Some("stalemate".to_string())
        } else {
            None
        };
        if let Some(end) = end_state {
            log::debug!(
                "encounter {} round {} ends without exchange: {}",
                encounter.id,
                encounter.round,
                end
            );
            return RoundOutcome {
                round: encounter.round,
                hits: zero_map(participants),
                offensive_losses: zero_map(participants),
                defensive_losses: zero_map(participants),
                shield_loss: zero_map(participants),
                fighters_remaining: start_fighters,
                shields_remaining: start_shields,
                flee_success,
                end_state: Some(end),
                effective_actions: effective,
            };
        }
    }

    // Phase D: serialized attack exchanges. The attacker order is fixed up
    // front (fewest fighters first, then fastest warp, then id) and each pass
    // spends one commit per attacker, giving parallel attackers symmetric
    // opportunity.
    let mut attackers: Vec<CombatantId> = active
        .iter()
        .filter(|id| effective[*id].kind == ActionKind::Attack)
        .cloned()
        .collect();
    attackers.sort_by(|a, b| {
        live_fighters[a]
            .cmp(&live_fighters[b])
            .then_with(|| participants[a].turns_per_warp.cmp(&participants[b].turns_per_warp))
            .then_with(|| a.cmp(b))
    });
    let mut remaining_commit: Vec<u32> =
        attackers.iter().map(|id| effective[id].commit).collect();

    let mut hits = zero_map(participants);
    let mut offensive_losses = zero_map(participants);
    let mut defensive_losses = zero_map(participants);

    loop {
        let mut progress = false;
        for (slot, attacker) in attackers.iter().enumerate() {
            if remaining_commit[slot] == 0 {
                continue;
            }
            let Some(target) = effective[attacker].target.clone() else {
                remaining_commit[slot] = 0;
                continue;
            };
            if live_fighters[attacker] == 0
                || live_fighters[&target] == 0
                || !active.contains(&target)
            {
                remaining_commit[slot] = 0;
                continue;
            }
            remaining_commit[slot] -= 1;
            progress = true;

            let chance = (HIT_BASE_CHANCE - HIT_TARGET_MITIGATION_FACTOR * mitigation[&target]
                + HIT_ATTACKER_MITIGATION_FACTOR * mitigation[attacker])
                .clamp(HIT_MIN_CHANCE, HIT_MAX_CHANCE);
            if rng.next() < chance {
                *hits.entry(attacker.clone()).or_insert(0) += 1;
                *defensive_losses.entry(target.clone()).or_insert(0) += 1;
                *live_fighters.entry(target.clone()).or_insert(0) -= 1;
            } else {
                *offensive_losses.entry(attacker.clone()).or_insert(0) += 1;
                *live_fighters.entry(attacker.clone()).or_insert(0) -= 1;
            }
        }
        if !progress {
            break;
        }
    }

    // Phase E: shield ablation
    let mut shield_loss: BTreeMap<CombatantId, u32> = BTreeMap::new();
    let mut shields_remaining: BTreeMap<CombatantId, u32> = BTreeMap::new();
    for id in participants.keys() {
        let mut loss = ((defensive_losses[id] as f64) * SHIELD_ABLATION_PER_LOSS).ceil() as u32;
        if is_bracing(effective[id].kind) {
            loss = ((loss as f64) * BRACE_SHIELD_ABLATION_FACTOR).ceil() as u32;
        }
        shield_loss.insert(id.clone(), loss);
        shields_remaining.insert(id.clone(), start_shields[id].saturating_sub(loss));
    }

    // Phase F: end-state derivation
    let survivors: Vec<&CombatantId> = participants
        .keys()
        .filter(|id| live_fighters[*id] > 0 && !flee_success[*id])
        .collect();
    let losers: Vec<&CombatantId> = participants
        .keys()
        .filter(|id| live_fighters[*id] == 0 && !flee_success[*id])
        .collect();
    let fled: Vec<&CombatantId> = participants.keys().filter(|id| flee_success[*id]).collect();

    let end_state = match survivors.len() {
        0 => {
            let fighters_elsewhere = fled.iter().any(|id| live_fighters[*id] > 0);
            if any_fled && fighters_elsewhere {
                Some("stalemate".to_string())
            } else {
                Some("mutual_defeat".to_string())
            }
        }
        1 => {
            if losers.len() == 1 {
                Some(named_end_state(&participants[losers[0]].name, "defeated"))
            } else if losers.len() > 1 {
                Some("victory".to_string())
            } else if !fled.is_empty() && fled.len() + 1 == participants.len() {
                Some("stalemate".to_string())
            } else {
                None
            }
        }
        _ => None,
    };

    if let Some(end) = &end_state {
        log::debug!(
            "encounter {} round {} resolved with end state {}",
            encounter.id,
            encounter.round,
            end
        );
    }

    RoundOutcome {
        round: encounter.round,
        hits,
        offensive_losses,
        defensive_losses,
        shield_loss,
        fighters_remaining: live_fighters,
        shields_remaining,
        flee_success,
        end_state,
        effective_actions: effective,
    }
}

/// True when every post-round survivor is friendly with every other
pub fn survivors_all_friendly(
    participants: &BTreeMap<CombatantId, Combatant>,
    outcome: &RoundOutcome,
) -> bool {
    let survivors: Vec<&Combatant> = participants
        .values()
        .filter(|c| outcome.survived(&c.id))
        .collect();
    if survivors.len() < 2 {
        return false;
    }
    survivors.iter().all(|a| {
        survivors
            .iter()
            .all(|b| a.id == b.id || !a.is_hostile_to(b))
    })
}

/// Lifecycle-supplied checks that may override a continuing round into a
/// terminal state: a satisfied toll registry, or no hostile pair left.
pub fn apply_end_overrides(outcome: &mut RoundOutcome, toll_satisfied: bool, all_friendly: bool) {
    if outcome.end_state.is_some() {
        return;
    }
    if toll_satisfied {
        outcome.end_state = Some("toll_satisfied".to_string());
    } else if all_friendly {
        outcome.end_state = Some("no_hostiles".to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use starhold_common::types::{CombatantKind, EncounterContext, PlayerKind};

    fn character(id: &str, fighters: u32, shields: u32, turns_per_warp: u32) -> Combatant {
        Combatant {
            id: id.to_string(),
            name: id.to_string(),
            kind: CombatantKind::Character {
                ship_id: 1,
                corporation: None,
                player_type: PlayerKind::Human,
            },
            fighters,
            shields,
            max_fighters: fighters,
            max_shields: shields,
            turns_per_warp,
            is_escape_pod: false,
            owner: Some(id.to_string()),
        }
    }

    fn encounter(base_seed: u64, combatants: Vec<Combatant>) -> EncounterData {
        EncounterData {
            id: format!("{:032x}", base_seed),
            sector: 100,
            round: 1,
            deadline_micros: Some(1_000_000),
            participants: combatants.into_iter().map(|c| (c.id.clone(), c)).collect(),
            pending: BTreeMap::new(),
            log: Vec::new(),
            base_seed,
            context: EncounterContext::default(),
            awaiting_resolution: false,
            ended: false,
            end_state: None,
        }
    }

    fn duel(base_seed: u64) -> (EncounterData, BTreeMap<CombatantId, RoundAction>) {
        let enc = encounter(
            base_seed,
            vec![character("alice", 10, 100, 1), character("bob", 10, 100, 1)],
        );
        let mut actions = BTreeMap::new();
        actions.insert("alice".to_string(), RoundAction::attack(10, "bob".into(), 1));
        actions.insert("bob".to_string(), RoundAction::attack(10, "alice".into(), 1));
        (enc, actions)
    }

    /// Find a base seed whose first draw lands on the wanted side of 0.5
    fn seed_with_first_draw(below: bool) -> u64 {
        (0u64..10_000)
            .find(|seed| (RoundRng::new(*seed, 1).next() < 0.5) == below)
            .expect("some seed satisfies the draw predicate")
    }

    #[test]
    fn symmetric_duel_obeys_conservation() {
        let (enc, actions) = duel(1);
        let outcome = resolve_round(&enc, &actions);

        for id in ["alice", "bob"] {
            let spent = outcome.hits[id] + outcome.offensive_losses[id];
            assert!(spent <= 10, "commit bound violated for {id}");
            assert_eq!(
                outcome.fighters_remaining[id],
                10 - outcome.offensive_losses[id] - outcome.defensive_losses[id],
                "conservation violated for {id}"
            );
            let expected_ablation =
                ((outcome.defensive_losses[id] as f64) * 0.5).ceil() as u32;
            assert_eq!(outcome.shield_loss[id], expected_ablation);
            assert_eq!(outcome.shields_remaining[id], 100 - expected_ablation);
        }
        let total_draw_results: u32 = ["alice", "bob"]
            .iter()
            .map(|id| outcome.hits[*id] + outcome.offensive_losses[*id])
            .sum();
        assert!(total_draw_results <= 20);
    }

    #[test]
    fn resolution_is_deterministic() {
        let (enc, actions) = duel(77);
        let first = resolve_round(&enc, &actions);
        let second = resolve_round(&enc, &actions);
        assert_eq!(first, second);
    }

    #[test]
    fn flee_against_brace_ends_combat() {
        let seed = seed_with_first_draw(true);
        let enc = encounter(
            seed,
            vec![character("alice", 10, 100, 1), character("bob", 10, 100, 1)],
        );
        let mut actions = BTreeMap::new();
        actions.insert("alice".to_string(), RoundAction::flee(Some(7), 1));
        actions.insert("bob".to_string(), RoundAction::brace(1));

        let outcome = resolve_round(&enc, &actions);
        assert!(outcome.fled("alice"));
        assert_eq!(outcome.end_state.as_deref(), Some("alice_fled"));
        assert_eq!(outcome.hits.values().sum::<u32>(), 0);
        assert_eq!(outcome.fighters_remaining["alice"], 10);
        assert_eq!(outcome.shields_remaining["bob"], 100);
        assert_eq!(
            outcome.effective_actions["alice"].destination,
            Some(7),
            "flee destination survives normalization"
        );
    }

    #[test]
    fn failed_flee_keeps_combat_open() {
        let seed = seed_with_first_draw(false);
        let enc = encounter(
            seed,
            vec![character("alice", 10, 100, 1), character("bob", 10, 100, 1)],
        );
        let mut actions = BTreeMap::new();
        actions.insert("alice".to_string(), RoundAction::flee(Some(7), 1));
        actions.insert("bob".to_string(), RoundAction::brace(1));

        let outcome = resolve_round(&enc, &actions);
        assert!(!outcome.fled("alice"));
        assert_eq!(outcome.end_state, None);
    }

    #[test]
    fn lone_fleer_escapes_automatically() {
        let enc = encounter(5, vec![character("solo", 4, 0, 2)]);
        let mut actions = BTreeMap::new();
        actions.insert("solo".to_string(), RoundAction::flee(None, 1));

        let outcome = resolve_round(&enc, &actions);
        assert!(outcome.fled("solo"));
        assert_eq!(outcome.end_state.as_deref(), Some("solo_fled"));
    }

    #[test]
    fn mutual_timeout_is_a_stalemate() {
        let enc = encounter(
            9,
            vec![character("alice", 10, 100, 1), character("bob", 10, 100, 1)],
        );
        let mut actions = BTreeMap::new();
        actions.insert("alice".to_string(), RoundAction::timeout_brace(1));
        actions.insert("bob".to_string(), RoundAction::timeout_brace(1));

        let outcome = resolve_round(&enc, &actions);
        assert_eq!(outcome.end_state.as_deref(), Some("stalemate"));
        assert_eq!(outcome.hits.values().sum::<u32>(), 0);
        assert!(outcome.effective_actions["alice"].timed_out);
    }

    #[test]
    fn zero_fighter_attack_coerces_to_brace() {
        let enc = encounter(
            11,
            vec![character("empty", 0, 50, 1), character("bob", 10, 100, 1)],
        );
        let mut actions = BTreeMap::new();
        actions.insert("empty".to_string(), RoundAction::attack(5, "bob".into(), 1));
        actions.insert("bob".to_string(), RoundAction::brace(1));

        let outcome = resolve_round(&enc, &actions);
        let coerced = &outcome.effective_actions["empty"];
        assert_eq!(coerced.kind, ActionKind::Brace);
        assert_eq!(coerced.commit, 0);
        assert_eq!(coerced.target, None);
    }

    #[test]
    fn self_and_absent_targets_coerce_to_brace() {
        let enc = encounter(
            12,
            vec![character("alice", 10, 100, 1), character("bob", 10, 100, 1)],
        );
        let mut actions = BTreeMap::new();
        actions.insert("alice".to_string(), RoundAction::attack(5, "alice".into(), 1));
        actions.insert("bob".to_string(), RoundAction::attack(5, "ghost".into(), 1));

        let outcome = resolve_round(&enc, &actions);
        assert_eq!(outcome.effective_actions["alice"].kind, ActionKind::Brace);
        assert_eq!(outcome.effective_actions["bob"].kind, ActionKind::Brace);
        assert_eq!(outcome.end_state.as_deref(), Some("stalemate"));
    }

    #[test]
    fn overwhelming_attack_defeats_the_loser() {
        // A lone fighter with no shields cannot survive 200 committed
        // fighters: every exchange either kills it or costs the attacker one
        // of 200 fighters at >= 15% hit chance.
        let enc = encounter(
            21,
            vec![
                character("goliath", 200, 0, 1),
                character("mite", 1, 0, 1),
            ],
        );
        let mut actions = BTreeMap::new();
        actions.insert(
            "goliath".to_string(),
            RoundAction::attack(200, "mite".into(), 1),
        );
        actions.insert("mite".to_string(), RoundAction::brace(1));

        let outcome = resolve_round(&enc, &actions);
        assert_eq!(outcome.fighters_remaining["mite"], 0);
        assert_eq!(outcome.end_state.as_deref(), Some("mite_defeated"));
    }

    #[test]
    fn all_fleeing_ends_with_first_fleer_name() {
        // First fleer needs a sub-0.5 draw; once gone, the second fleer has
        // no opponents and escapes automatically.
        let seed = seed_with_first_draw(true);
        let enc = encounter(
            seed,
            vec![character("alice", 10, 100, 1), character("bob", 10, 100, 1)],
        );
        let mut actions = BTreeMap::new();
        actions.insert("alice".to_string(), RoundAction::flee(Some(3), 1));
        actions.insert("bob".to_string(), RoundAction::flee(None, 1));

        let outcome = resolve_round(&enc, &actions);
        assert!(outcome.fled("alice"));
        assert!(outcome.fled("bob"), "with alice gone, bob has no opponent");
        assert_eq!(outcome.end_state.as_deref(), Some("alice_fled"));
    }

    #[test]
    fn brace_reduces_shield_ablation() {
        // Force defensive losses onto a bracing target and check the 0.8
        // re-ceil against the raw ablation.
        let enc = encounter(
            31,
            vec![
                character("hammer", 120, 0, 1),
                character("anvil", 120, 1000, 1),
            ],
        );
        let mut actions = BTreeMap::new();
        actions.insert(
            "hammer".to_string(),
            RoundAction::attack(120, "anvil".into(), 1),
        );
        actions.insert("anvil".to_string(), RoundAction::brace(1));

        let outcome = resolve_round(&enc, &actions);
        let raw = ((outcome.defensive_losses["anvil"] as f64) * 0.5).ceil();
        let expected = (raw * 0.8).ceil() as u32;
        assert_eq!(outcome.shield_loss["anvil"], expected);
    }

    #[test]
    fn overrides_only_replace_open_end_states() {
        let mut settled = RoundOutcome {
            end_state: Some("stalemate".into()),
            ..RoundOutcome::default()
        };
        apply_end_overrides(&mut settled, true, true);
        assert_eq!(settled.end_state.as_deref(), Some("stalemate"));

        let mut open = RoundOutcome::default();
        apply_end_overrides(&mut open, true, false);
        assert_eq!(open.end_state.as_deref(), Some("toll_satisfied"));

        let mut open = RoundOutcome::default();
        apply_end_overrides(&mut open, false, true);
        assert_eq!(open.end_state.as_deref(), Some("no_hostiles"));
    }

    #[test]
    fn garrison_auto_action_feeds_the_resolver() {
        use crate::garrison::auto_actions;
        use starhold_common::types::GarrisonMode;

        let garrison = Combatant {
            id: "garrison:100:xan".to_string(),
            name: "Xan garrison".to_string(),
            kind: CombatantKind::Garrison {
                mode: GarrisonMode::Offensive,
                toll_amount: 0,
                owner_corporation: None,
            },
            fighters: 5,
            shields: 0,
            max_fighters: 5,
            max_shields: 0,
            turns_per_warp: 0,
            is_escape_pod: false,
            owner: Some("xan".to_string()),
        };
        let gid = garrison.id.clone();
        let enc = encounter(3, vec![garrison, character("intruder", 10, 200, 1)]);

        // The intruder never submits: a timeout brace stands in, then the
        // garrison's auto-action joins the map.
        let mut actions = BTreeMap::new();
        actions.insert("intruder".to_string(), RoundAction::timeout_brace(1));
        let auto = auto_actions(&enc.participants, &actions, &BTreeMap::new(), 1);
        actions.extend(auto);

        let outcome = resolve_round(&enc, &actions);
        let garrison_action = &outcome.effective_actions[&gid];
        assert_eq!(garrison_action.kind, ActionKind::Attack);
        assert_eq!(garrison_action.commit, 5);
        assert_eq!(garrison_action.target.as_deref(), Some("intruder"));

        // Garrison mitigation is zero, so every draw is spent from its commit
        let spent = outcome.hits[&gid] + outcome.offensive_losses[&gid];
        assert!(spent <= 5);
        assert_eq!(outcome.defensive_losses["intruder"], outcome.hits[&gid]);
        let raw = ((outcome.defensive_losses["intruder"] as f64) * 0.5).ceil();
        let expected = (raw * 0.8).ceil() as u32;
        assert_eq!(outcome.shield_loss["intruder"], expected);
        assert_eq!(
            outcome.fighters_remaining["intruder"],
            10 - outcome.defensive_losses["intruder"]
        );
    }

    #[test]
    fn friendly_survivors_are_detected() {
        let mut a = character("alice", 10, 0, 1);
        let mut b = character("bob", 10, 0, 1);
        a.kind = CombatantKind::Character {
            ship_id: 1,
            corporation: Some(4),
            player_type: PlayerKind::Human,
        };
        b.kind = CombatantKind::Character {
            ship_id: 2,
            corporation: Some(4),
            player_type: PlayerKind::Human,
        };
        let enc = encounter(3, vec![a, b]);
        let mut outcome = RoundOutcome::default();
        outcome
            .fighters_remaining
            .extend([("alice".to_string(), 10), ("bob".to_string(), 10)]);
        assert!(survivors_all_friendly(&enc.participants, &outcome));

        outcome.fighters_remaining.insert("bob".to_string(), 0);
        assert!(!survivors_all_friendly(&enc.participants, &outcome));
    }
}
