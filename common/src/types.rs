//! Core type definitions for Starhold
//!
//! These types are shared across the combat resolver and the sector
//! application and define the fundamental game objects: combatants, round
//! actions, encounters, outcomes, and salvage.

use async_graphql::Enum;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Unique identifier for a character (human or corporation-ship pilot)
pub type CharacterId = String;

/// Unique identifier for a ship row
pub type ShipId = u64;

/// Unique identifier for a sector
pub type SectorId = u32;

/// Unique identifier for a corporation
pub type CorporationId = u64;

/// Identifier of a combatant inside an encounter.
///
/// Characters use their character id; garrisons use
/// `garrison:<sector>:<owner>`.
pub type CombatantId = String;

/// Opaque 128-bit encounter id, rendered as 32 lowercase hex characters
pub type EncounterId = String;

/// Kind of player behind a character
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Enum, PartialEq, Eq)]
pub enum PlayerKind {
    /// A human player
    Human,
    /// The autonomous pilot of a corporation-owned ship
    CorporationShip,
}

impl PlayerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerKind::Human => "human",
            PlayerKind::CorporationShip => "corporation_ship",
        }
    }
}

/// Posture of a deployed garrison
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Enum, PartialEq, Eq)]
pub enum GarrisonMode {
    /// Attacks any hostile character in the sector
    Offensive,
    /// Retaliates only against combatants that target it or its owner
    Defensive,
    /// Demands a toll; attacks characters that have not paid this round
    Toll,
}

impl GarrisonMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GarrisonMode::Offensive => "offensive",
            GarrisonMode::Defensive => "defensive",
            GarrisonMode::Toll => "toll",
        }
    }
}

/// A combatant's chosen intent for one round
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Enum, PartialEq, Eq)]
pub enum ActionKind {
    /// Commit fighters against a target
    Attack,
    /// Hold position behind shields
    Brace,
    /// Attempt to leave the sector
    Flee,
    /// Pay a toll garrison (damage-equivalent to brace)
    Pay,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Attack => "attack",
            ActionKind::Brace => "brace",
            ActionKind::Flee => "flee",
            ActionKind::Pay => "pay",
        }
    }
}

/// A submitted (or synthesized) action for one round
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoundAction {
    pub kind: ActionKind,
    /// Fighters committed; zero for anything but attack
    pub commit: u32,
    /// Attack target; required and distinct from self when attacking
    pub target: Option<CombatantId>,
    /// Preferred destination sector; only meaningful when fleeing
    pub destination: Option<SectorId>,
    /// Set when the action was synthesized because the deadline elapsed
    pub timed_out: bool,
    pub submitted_micros: u64,
}

impl RoundAction {
    pub fn attack(commit: u32, target: CombatantId, now_micros: u64) -> Self {
        Self {
            kind: ActionKind::Attack,
            commit,
            target: Some(target),
            destination: None,
            timed_out: false,
            submitted_micros: now_micros,
        }
    }

    pub fn brace(now_micros: u64) -> Self {
        Self {
            kind: ActionKind::Brace,
            commit: 0,
            target: None,
            destination: None,
            timed_out: false,
            submitted_micros: now_micros,
        }
    }

    /// The brace synthesized for a live character that never submitted
    pub fn timeout_brace(now_micros: u64) -> Self {
        Self {
            timed_out: true,
            ..Self::brace(now_micros)
        }
    }

    pub fn flee(destination: Option<SectorId>, now_micros: u64) -> Self {
        Self {
            kind: ActionKind::Flee,
            commit: 0,
            target: None,
            destination,
            timed_out: false,
            submitted_micros: now_micros,
        }
    }

    pub fn pay(garrison: CombatantId, now_micros: u64) -> Self {
        Self {
            kind: ActionKind::Pay,
            commit: 0,
            target: Some(garrison),
            destination: None,
            timed_out: false,
            submitted_micros: now_micros,
        }
    }
}

/// Character- or garrison-specific combatant fields
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum CombatantKind {
    Character {
        ship_id: ShipId,
        corporation: Option<CorporationId>,
        player_type: PlayerKind,
    },
    Garrison {
        mode: GarrisonMode,
        toll_amount: u64,
        owner_corporation: Option<CorporationId>,
    },
}

/// A character-piloted ship or a garrison, as seen by the resolver.
///
/// Combatants are denormalized into the encounter when a round starts;
/// fighter and shield deltas are written back to the persistent rows after
/// each resolution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Combatant {
    pub id: CombatantId,
    pub name: String,
    pub kind: CombatantKind,
    pub fighters: u32,
    pub shields: u32,
    pub max_fighters: u32,
    pub max_shields: u32,
    pub turns_per_warp: u32,
    pub is_escape_pod: bool,
    /// Owning character: the character itself, or a garrison's deployer
    pub owner: Option<CharacterId>,
}

impl Combatant {
    pub fn is_character(&self) -> bool {
        matches!(self.kind, CombatantKind::Character { .. })
    }

    pub fn is_garrison(&self) -> bool {
        matches!(self.kind, CombatantKind::Garrison { .. })
    }

    pub fn corporation(&self) -> Option<CorporationId> {
        match &self.kind {
            CombatantKind::Character { corporation, .. } => *corporation,
            CombatantKind::Garrison {
                owner_corporation, ..
            } => *owner_corporation,
        }
    }

    pub fn ship_id(&self) -> Option<ShipId> {
        match &self.kind {
            CombatantKind::Character { ship_id, .. } => Some(*ship_id),
            CombatantKind::Garrison { .. } => None,
        }
    }

    pub fn player_type(&self) -> Option<PlayerKind> {
        match &self.kind {
            CombatantKind::Character { player_type, .. } => Some(*player_type),
            CombatantKind::Garrison { .. } => None,
        }
    }

    /// Hostility test: same owner or shared corporation means friendly
    pub fn is_hostile_to(&self, other: &Combatant) -> bool {
        if self.id == other.id {
            return false;
        }
        if let (Some(a), Some(b)) = (&self.owner, &other.owner) {
            if a == b {
                return false;
            }
        }
        if let (Some(a), Some(b)) = (self.corporation(), other.corporation()) {
            if a == b {
                return false;
            }
        }
        true
    }
}

/// How an encounter came to exist
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Enum, PartialEq, Eq)]
pub enum EncounterReason {
    /// A character attacked in a quiet sector
    AttackAction,
    /// An offensive garrison was deployed with an enemy present
    GarrisonDeploy,
    /// A character arrived in a sector held by an offensive or toll garrison
    AutoEngage,
}

impl EncounterReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EncounterReason::AttackAction => "attack_action",
            EncounterReason::GarrisonDeploy => "garrison_deploy",
            EncounterReason::AutoEngage => "auto_engage",
        }
    }
}

/// Immutable context captured when an encounter is created, plus the
/// per-round toll registry (garrison combatant id -> characters that have
/// paid this round; cleared on round advancement).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EncounterContext {
    pub initiator: Option<CharacterId>,
    pub created_micros: u64,
    pub toll_registry: BTreeMap<CombatantId, BTreeSet<CharacterId>>,
    pub reason: Option<EncounterReason>,
}

/// The deterministic product of resolving one round. Never mutated after the
/// resolver returns it; all maps are keyed by combatant id.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RoundOutcome {
    pub round: u32,
    pub hits: BTreeMap<CombatantId, u32>,
    pub offensive_losses: BTreeMap<CombatantId, u32>,
    pub defensive_losses: BTreeMap<CombatantId, u32>,
    pub shield_loss: BTreeMap<CombatantId, u32>,
    pub fighters_remaining: BTreeMap<CombatantId, u32>,
    pub shields_remaining: BTreeMap<CombatantId, u32>,
    pub flee_success: BTreeMap<CombatantId, bool>,
    pub end_state: Option<String>,
    pub effective_actions: BTreeMap<CombatantId, RoundAction>,
}

impl RoundOutcome {
    pub fn fled(&self, id: &str) -> bool {
        self.flee_success.get(id).copied().unwrap_or(false)
    }

    pub fn fighters_of(&self, id: &str) -> u32 {
        self.fighters_remaining.get(id).copied().unwrap_or(0)
    }

    /// A combatant survived the round if it kept fighters and did not flee
    pub fn survived(&self, id: &str) -> bool {
        self.fighters_of(id) > 0 && !self.fled(id)
    }
}

/// One combat instance in one sector, spanning one or more rounds.
///
/// At most one non-ended encounter exists per sector; once `ended` is set
/// the encounter is immutable and a new encounter gets a new id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EncounterData {
    pub id: EncounterId,
    pub sector: SectorId,
    /// 1-indexed, monotonically increasing
    pub round: u32,
    pub deadline_micros: Option<u64>,
    pub participants: BTreeMap<CombatantId, Combatant>,
    pub pending: BTreeMap<CombatantId, RoundAction>,
    pub log: Vec<RoundOutcome>,
    /// Fixed at creation; the first 48 bits of the encounter id
    pub base_seed: u64,
    pub context: EncounterContext,
    pub awaiting_resolution: bool,
    pub ended: bool,
    pub end_state: Option<String>,
}

impl EncounterData {
    /// Live character combatants, the set whose submissions gate a round
    pub fn live_characters(&self) -> impl Iterator<Item = &Combatant> {
        self.participants
            .values()
            .filter(|c| c.is_character() && c.fighters > 0)
    }

    pub fn all_live_characters_submitted(&self) -> bool {
        self.live_characters()
            .all(|c| self.pending.contains_key(&c.id))
    }

    pub fn is_participant(&self, id: &str) -> bool {
        self.participants.contains_key(id)
    }
}

/// A wreck left behind by a destroyed ship, claimable until it expires
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SalvageData {
    pub id: String,
    pub created_micros: u64,
    pub expires_micros: u64,
    pub cargo: crate::cargo::CargoManifest,
    pub scrap: u32,
    pub credits: u64,
    pub claimed: bool,
    pub from_ship_name: String,
    pub from_ship_type: String,
    pub metadata: BTreeMap<String, String>,
}

impl SalvageData {
    pub fn expired(&self, now_micros: u64) -> bool {
        now_micros >= self.expires_micros
    }
}

/// Build the combatant id of a garrison
pub fn garrison_combatant_id(sector: SectorId, owner: &str) -> CombatantId {
    format!("garrison:{}:{}", sector, owner)
}

/// End-state token for a named participant, e.g. `kara_vex_defeated`
pub fn named_end_state(display_name: &str, suffix: &str) -> String {
    let slug = display_name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect::<String>();
    format!("{}_{}", slug, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn character(id: &str, corp: Option<CorporationId>) -> Combatant {
        Combatant {
            id: id.to_string(),
            name: id.to_string(),
            kind: CombatantKind::Character {
                ship_id: 1,
                corporation: corp,
                player_type: PlayerKind::Human,
            },
            fighters: 10,
            shields: 100,
            max_fighters: 10,
            max_shields: 100,
            turns_per_warp: 3,
            is_escape_pod: false,
            owner: Some(id.to_string()),
        }
    }

    #[test]
    fn hostility_respects_corporation() {
        let a = character("a", Some(7));
        let b = character("b", Some(7));
        let c = character("c", Some(9));
        assert!(!a.is_hostile_to(&b));
        assert!(a.is_hostile_to(&c));
        assert!(!a.is_hostile_to(&a));
    }

    #[test]
    fn named_end_state_slugs_display_names() {
        assert_eq!(named_end_state("Kara Vex", "defeated"), "kara_vex_defeated");
        assert_eq!(named_end_state("solo", "fled"), "solo_fled");
    }

    #[test]
    fn garrison_id_format() {
        assert_eq!(garrison_combatant_id(42, "kara"), "garrison:42:kara");
    }
}
