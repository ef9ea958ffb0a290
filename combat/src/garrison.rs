//! Garrison auto-actions
//!
//! Garrisons never submit actions; the lifecycle synthesizes one per garrison
//! between collecting player submissions and invoking the resolver, driven by
//! the garrison's posture and the per-round toll registry.

use std::collections::{BTreeMap, BTreeSet};

use starhold_common::types::{
    ActionKind, CharacterId, Combatant, CombatantId, CombatantKind, GarrisonMode, RoundAction,
};

/// Hostile character combatants with fighters left, the targets a garrison
/// may consider
fn live_enemies<'a>(
    garrison: &'a Combatant,
    participants: &'a BTreeMap<CombatantId, Combatant>,
) -> impl Iterator<Item = &'a Combatant> {
    participants
        .values()
        .filter(move |c| c.is_character() && c.fighters > 0 && garrison.is_hostile_to(c))
}

/// Target with the greatest live fighter count; ties break toward the
/// smaller combatant id
fn pick_target<'a, I>(candidates: I) -> Option<&'a Combatant>
where
    I: Iterator<Item = &'a Combatant>,
{
    candidates.max_by(|a, b| a.fighters.cmp(&b.fighters).then_with(|| b.id.cmp(&a.id)))
}

/// Synthesize actions for every garrison participant.
///
/// `submitted` is the player action map for the round (submissions plus
/// timeout braces); defensive garrisons read it to find who targeted them.
pub fn auto_actions(
    participants: &BTreeMap<CombatantId, Combatant>,
    submitted: &BTreeMap<CombatantId, RoundAction>,
    toll_registry: &BTreeMap<CombatantId, BTreeSet<CharacterId>>,
    now_micros: u64,
) -> BTreeMap<CombatantId, RoundAction> {
    let mut actions = BTreeMap::new();

    for garrison in participants.values() {
        let CombatantKind::Garrison { mode, .. } = &garrison.kind else {
            continue;
        };
        if garrison.fighters == 0 {
            continue;
        }

        let target = match mode {
            GarrisonMode::Offensive => pick_target(live_enemies(garrison, participants)),
            GarrisonMode::Defensive => {
                // Retaliation ignores affiliation: whoever targeted the
                // garrison or its owner is fair game.
                let threats = participants
                    .values()
                    .filter(|c| c.is_character() && c.fighters > 0 && c.id != garrison.id)
                    .filter(|c| {
                        submitted.get(&c.id).is_some_and(|action| {
                            action.kind == ActionKind::Attack
                                && action.target.as_deref().is_some_and(|t| {
                                    t == garrison.id
                                        || participants
                                            .get(t)
                                            .is_some_and(|hit| hit.owner == garrison.owner)
                                })
                        })
                    });
                pick_target(threats)
            }
            GarrisonMode::Toll => {
                let paid = toll_registry.get(&garrison.id);
                let unpaid = live_enemies(garrison, participants)
                    .filter(|c| !paid.is_some_and(|set| set.contains(&c.id)));
                pick_target(unpaid)
            }
        };

        let action = match target {
            Some(enemy) => {
                log::debug!(
                    "garrison {} ({}) engages {}",
                    garrison.id,
                    mode.as_str(),
                    enemy.id
                );
                RoundAction::attack(garrison.fighters, enemy.id.clone(), now_micros)
            }
            None => RoundAction::brace(now_micros),
        };
        actions.insert(garrison.id.clone(), action);
    }

    actions
}

/// True when every hostile live character present has paid every live toll
/// garrison this round. False when the encounter has no toll garrison.
pub fn toll_satisfied(
    participants: &BTreeMap<CombatantId, Combatant>,
    toll_registry: &BTreeMap<CombatantId, BTreeSet<CharacterId>>,
) -> bool {
    let mut any_toll = false;
    for garrison in participants.values() {
        let CombatantKind::Garrison {
            mode: GarrisonMode::Toll,
            ..
        } = &garrison.kind
        else {
            continue;
        };
        if garrison.fighters == 0 {
            continue;
        }
        any_toll = true;
        let paid = toll_registry.get(&garrison.id);
        let all_paid = live_enemies(garrison, participants)
            .all(|c| paid.is_some_and(|set| set.contains(&c.id)));
        if !all_paid {
            return false;
        }
    }
    any_toll
}

#[cfg(test)]
mod tests {
    use super::*;
    use starhold_common::types::{garrison_combatant_id, PlayerKind};

    fn character(id: &str, fighters: u32, corp: Option<u64>) -> Combatant {
        Combatant {
            id: id.to_string(),
            name: id.to_string(),
            kind: CombatantKind::Character {
                ship_id: 1,
                corporation: corp,
                player_type: PlayerKind::Human,
            },
            fighters,
            shields: 50,
            max_fighters: fighters,
            max_shields: 50,
            turns_per_warp: 3,
            is_escape_pod: false,
            owner: Some(id.to_string()),
        }
    }

    fn garrison(sector: u32, owner: &str, fighters: u32, mode: GarrisonMode) -> Combatant {
        let id = garrison_combatant_id(sector, owner);
        Combatant {
            id: id.clone(),
            name: format!("{} garrison", owner),
            kind: CombatantKind::Garrison {
                mode,
                toll_amount: 100,
                owner_corporation: None,
            },
            fighters,
            shields: 0,
            max_fighters: fighters,
            max_shields: 0,
            turns_per_warp: 0,
            is_escape_pod: false,
            owner: Some(owner.to_string()),
        }
    }

    fn roster(combatants: Vec<Combatant>) -> BTreeMap<CombatantId, Combatant> {
        combatants.into_iter().map(|c| (c.id.clone(), c)).collect()
    }

    #[test]
    fn offensive_garrison_attacks_strongest_intruder() {
        let g = garrison(44, "xan", 5, GarrisonMode::Offensive);
        let gid = g.id.clone();
        let participants = roster(vec![
            g,
            character("weak", 3, None),
            character("strong", 9, None),
            character("xan", 20, None), // the owner is never a target
        ]);

        let actions = auto_actions(&participants, &BTreeMap::new(), &BTreeMap::new(), 1);
        let action = &actions[&gid];
        assert_eq!(action.kind, ActionKind::Attack);
        assert_eq!(action.commit, 5);
        assert_eq!(action.target.as_deref(), Some("strong"));
    }

    #[test]
    fn offensive_garrison_spares_corp_mates() {
        let mut g = garrison(44, "xan", 5, GarrisonMode::Offensive);
        g.kind = CombatantKind::Garrison {
            mode: GarrisonMode::Offensive,
            toll_amount: 0,
            owner_corporation: Some(8),
        };
        let gid = g.id.clone();
        let participants = roster(vec![g, character("mate", 9, Some(8))]);

        let actions = auto_actions(&participants, &BTreeMap::new(), &BTreeMap::new(), 1);
        assert_eq!(actions[&gid].kind, ActionKind::Brace);
    }

    #[test]
    fn defensive_garrison_only_retaliates() {
        let g = garrison(44, "xan", 6, GarrisonMode::Defensive);
        let gid = g.id.clone();
        let participants = roster(vec![
            g,
            character("aggressor", 4, None),
            character("bystander", 12, None),
            character("xan", 7, None),
        ]);

        // Nobody attacks the garrison or its owner: brace
        let mut submitted: BTreeMap<CombatantId, RoundAction> = BTreeMap::new();
        submitted.insert(
            "aggressor".into(),
            RoundAction::attack(4, "bystander".into(), 1),
        );
        let actions = auto_actions(&participants, &submitted, &BTreeMap::new(), 1);
        assert_eq!(actions[&gid].kind, ActionKind::Brace);

        // Attacking the owner draws retaliation
        submitted.insert("aggressor".into(), RoundAction::attack(4, "xan".into(), 1));
        let actions = auto_actions(&participants, &submitted, &BTreeMap::new(), 1);
        assert_eq!(actions[&gid].kind, ActionKind::Attack);
        assert_eq!(actions[&gid].target.as_deref(), Some("aggressor"));

        // Attacking the garrison itself draws retaliation too
        submitted.insert("aggressor".into(), RoundAction::attack(4, gid.clone(), 1));
        let actions = auto_actions(&participants, &submitted, &BTreeMap::new(), 1);
        assert_eq!(actions[&gid].target.as_deref(), Some("aggressor"));
    }

    #[test]
    fn toll_garrison_chases_nonpayers() {
        let g = garrison(44, "xan", 8, GarrisonMode::Toll);
        let gid = g.id.clone();
        let participants = roster(vec![
            g,
            character("payer", 10, None),
            character("freeloader", 6, None),
        ]);

        let mut registry: BTreeMap<CombatantId, BTreeSet<CharacterId>> = BTreeMap::new();
        registry.insert(gid.clone(), BTreeSet::from(["payer".to_string()]));

        let actions = auto_actions(&participants, &BTreeMap::new(), &registry, 1);
        assert_eq!(actions[&gid].kind, ActionKind::Attack);
        assert_eq!(actions[&gid].target.as_deref(), Some("freeloader"));
        assert!(!toll_satisfied(&participants, &registry));

        registry
            .get_mut(&gid)
            .unwrap()
            .insert("freeloader".to_string());
        let actions = auto_actions(&participants, &BTreeMap::new(), &registry, 1);
        assert_eq!(actions[&gid].kind, ActionKind::Brace);
        assert!(toll_satisfied(&participants, &registry));
    }

    #[test]
    fn toll_satisfaction_requires_a_toll_garrison() {
        let participants = roster(vec![
            garrison(44, "xan", 8, GarrisonMode::Offensive),
            character("visitor", 10, None),
        ]);
        assert!(!toll_satisfied(&participants, &BTreeMap::new()));
    }

    #[test]
    fn dead_garrisons_act_no_more() {
        let g = garrison(44, "xan", 0, GarrisonMode::Offensive);
        let gid = g.id.clone();
        let participants = roster(vec![g, character("intruder", 5, None)]);
        let actions = auto_actions(&participants, &BTreeMap::new(), &BTreeMap::new(), 1);
        assert!(!actions.contains_key(&gid));
    }
}
