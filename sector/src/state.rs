//! State management for the Starhold shard
//!
//! All coordination happens through these views: ships, characters and
//! corporations keyed by id with count registers for iteration, per-sector
//! garrison and salvage lists, the per-sector active encounter (which makes
//! "at most one non-ended encounter per sector" structural), the event log,
//! and rate-limit windows.

use async_graphql::SimpleObject;
use linera_sdk::views::{linera_views, MapView, RegisterView, RootView, ViewStorageContext};
use serde::{Deserialize, Serialize};

use starhold_common::cargo::CargoManifest;
use starhold_common::constants::*;
use starhold_common::errors::GameError;
use starhold_common::events::EventRecordData;
use starhold_common::types::{
    garrison_combatant_id, CharacterId, CombatantId, CorporationId, EncounterData, GarrisonMode,
    PlayerKind, SalvageData, SectorId, ShipId,
};

// ==================== DATA TYPES ====================

/// Deploy-time configuration copied from the application parameters
#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
pub struct ShardConfig {
    pub universe_seed: u64,
    pub sector_count: u32,
    pub round_timeout_secs: u64,
    pub shield_regen_per_round: u32,
    pub salvage_ttl_secs: u64,
}

impl Default for ShardConfig {
    fn default() -> Self {
        Self {
            universe_seed: DEFAULT_UNIVERSE_SEED,
            sector_count: DEFAULT_SECTOR_COUNT,
            round_timeout_secs: ROUND_TIMEOUT_SECS,
            shield_regen_per_round: SHIELD_REGEN_PER_ROUND,
            salvage_ttl_secs: SALVAGE_TTL_SECS,
        }
    }
}

impl ShardConfig {
    pub fn round_timeout_micros(&self) -> u64 {
        self.round_timeout_secs * MICROS_PER_SEC
    }

    pub fn salvage_ttl_micros(&self) -> u64 {
        self.salvage_ttl_secs * MICROS_PER_SEC
    }
}

/// One ship row. `fighters`/`shields` of `None` fall back to the template.
#[derive(Debug, Clone, Default, Serialize, Deserialize, SimpleObject)]
pub struct ShipData {
    pub id: ShipId,
    pub name: String,
    /// Catalog key resolved through the ship template catalog
    pub ship_type: String,
    pub sector: SectorId,
    pub owner_character: Option<CharacterId>,
    pub owner_corporation: Option<CorporationId>,
    pub fighters: Option<u32>,
    pub shields: Option<u32>,
    pub cargo: CargoManifest,
    pub credits: u64,
    pub scrap: u32,
    pub in_hyperspace: bool,
    pub destroyed: bool,
    pub is_escape_pod: bool,
}

/// A player character or the autonomous pilot of a corporation ship
#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
pub struct CharacterData {
    pub id: CharacterId,
    pub name: String,
    pub corporation: Option<CorporationId>,
    pub current_ship: Option<ShipId>,
    pub player_type: PlayerKind,
    pub registered_micros: u64,
}

/// Corporation membership entry; departures leave a tombstone
#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
pub struct CorpMemberData {
    pub character: CharacterId,
    pub joined_micros: u64,
    pub left: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, SimpleObject)]
pub struct CorporationData {
    pub id: CorporationId,
    pub name: String,
    pub founder: CharacterId,
    pub members: Vec<CorpMemberData>,
}

impl CorporationData {
    pub fn active_members(&self) -> Vec<CharacterId> {
        self.members
            .iter()
            .filter(|m| !m.left)
            .map(|m| m.character.clone())
            .collect()
    }

    pub fn is_active_member(&self, character: &str) -> bool {
        self.members
            .iter()
            .any(|m| !m.left && m.character == character)
    }
}

/// A stationed block of fighters. Rows exist only with fighters > 0; a
/// garrison beaten down to zero is deleted during finalization.
#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
pub struct GarrisonData {
    pub sector: SectorId,
    pub owner: CharacterId,
    pub owner_corporation: Option<CorporationId>,
    pub fighters: u32,
    pub mode: GarrisonMode,
    pub toll_amount: u64,
    pub toll_balance: u64,
    pub deployed_micros: u64,
}

impl GarrisonData {
    pub fn combatant_id(&self) -> CombatantId {
        garrison_combatant_id(self.sector, &self.owner)
    }
}

/// Rate-limit window for one `(character, method)` pair
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RateWindowData {
    pub window_start_micros: u64,
    pub calls: u32,
}

// ==================== STATE VIEW ====================

/// Root state for a Starhold shard chain
#[derive(RootView)]
#[view(context = ViewStorageContext)]
pub struct ShardState {
    pub config: RegisterView<ShardConfig>,

    /// Ships: key = ship id, ids are dense 0..ship_count
    pub ships: MapView<ShipId, ShipData>,
    pub ship_count: RegisterView<u64>,

    /// Characters: key = character id; the roster register backs iteration
    pub characters: MapView<CharacterId, CharacterData>,
    pub character_roster: RegisterView<Vec<CharacterId>>,

    /// Corporations: key = corporation id, ids are dense 0..corporation_count
    pub corporations: MapView<CorporationId, CorporationData>,
    pub corporation_count: RegisterView<u64>,

    /// Garrisons stationed per sector
    pub garrisons: MapView<SectorId, Vec<GarrisonData>>,

    /// Unclaimed wrecks per sector; expired entries pruned on next write
    pub salvage: MapView<SectorId, Vec<SalvageData>>,

    /// The active (non-ended) encounter per sector
    pub encounters: MapView<SectorId, EncounterData>,
    /// Ended encounters, immutable, keyed by encounter id
    pub encounter_archive: MapView<String, EncounterData>,
    pub encounter_count: RegisterView<u64>,

    /// Event log: key = monotonically increasing event id
    pub events: MapView<u64, EventRecordData>,
    pub event_count: RegisterView<u64>,

    /// Rate-limit windows keyed by `character:method`
    pub rate_windows: MapView<String, RateWindowData>,
}

// ==================== STATE IMPLEMENTATION ====================

impl ShardState {
    pub fn initialize(&mut self, config: ShardConfig) {
        self.config.set(config);
        self.ship_count.set(0);
        self.character_roster.set(Vec::new());
        self.corporation_count.set(0);
        self.encounter_count.set(0);
        self.event_count.set(0);
    }

    pub async fn get_ship(&self, id: ShipId) -> Result<Option<ShipData>, GameError> {
        self.ships
            .get(&id)
            .await
            .map_err(|_| GameError::TransientStorage(format!("ship {}", id)))
    }

    /// Ship row that must exist; absence is an orphan reference
    pub async fn require_ship(&self, id: ShipId) -> Result<ShipData, GameError> {
        self.get_ship(id)
            .await?
            .ok_or_else(|| GameError::DataIntegrity(format!("ship {} does not exist", id)))
    }

    pub async fn put_ship(&mut self, ship: ShipData) -> Result<(), GameError> {
        let id = ship.id;
        self.ships
            .insert(&id, ship)
            .map_err(|_| GameError::TransientStorage(format!("ship {}", id)))
    }

    pub async fn get_character(&self, id: &str) -> Result<Option<CharacterData>, GameError> {
        self.characters
            .get(&id.to_string())
            .await
            .map_err(|_| GameError::TransientStorage(format!("character {}", id)))
    }

    /// Character addressed by a caller; absence is a caller error
    pub async fn require_character(&self, id: &str) -> Result<CharacterData, GameError> {
        self.get_character(id)
            .await?
            .ok_or_else(|| GameError::Caller(format!("unknown character {}", id)))
    }

    pub async fn put_character(&mut self, character: CharacterData) -> Result<(), GameError> {
        let id = character.id.clone();
        self.characters
            .insert(&id, character)
            .map_err(|_| GameError::TransientStorage(format!("character {}", id)))
    }

    pub async fn get_corporation(
        &self,
        id: CorporationId,
    ) -> Result<Option<CorporationData>, GameError> {
        self.corporations
            .get(&id)
            .await
            .map_err(|_| GameError::TransientStorage(format!("corporation {}", id)))
    }

    pub async fn put_corporation(&mut self, corp: CorporationData) -> Result<(), GameError> {
        let id = corp.id;
        self.corporations
            .insert(&id, corp)
            .map_err(|_| GameError::TransientStorage(format!("corporation {}", id)))
    }

    /// Active members of a corporation, empty when the corporation is unknown
    pub async fn corp_roster(&self, id: CorporationId) -> Result<Vec<CharacterId>, GameError> {
        Ok(self
            .get_corporation(id)
            .await?
            .map(|c| c.active_members())
            .unwrap_or_default())
    }

    /// All ship rows in a sector, in id order
    pub async fn ships_in_sector(&self, sector: SectorId) -> Result<Vec<ShipData>, GameError> {
        let count = *self.ship_count.get();
        let mut found = Vec::new();
        for id in 0..count {
            if let Some(ship) = self.get_ship(id).await? {
                if ship.sector == sector && !ship.destroyed {
                    found.push(ship);
                }
            }
        }
        Ok(found)
    }

    /// Characters whose current ship sits in the sector and is not in
    /// hyperspace; the `sector_snapshot` visibility source
    pub async fn pilots_in_sector(&self, sector: SectorId) -> Result<Vec<CharacterId>, GameError> {
        let mut pilots = Vec::new();
        for ship in self.ships_in_sector(sector).await? {
            if ship.in_hyperspace {
                continue;
            }
            let Some(owner) = &ship.owner_character else {
                continue;
            };
            if let Some(character) = self.get_character(owner).await? {
                if character.current_ship == Some(ship.id) {
                    pilots.push(character.id);
                }
            }
        }
        Ok(pilots)
    }

    pub async fn garrisons_in(&self, sector: SectorId) -> Result<Vec<GarrisonData>, GameError> {
        self.garrisons
            .get(&sector)
            .await
            .map(Option::unwrap_or_default)
            .map_err(|_| GameError::TransientStorage(format!("garrisons in {}", sector)))
    }

    /// Replace a sector's garrison list, dropping the row when empty
    pub async fn set_garrisons(
        &mut self,
        sector: SectorId,
        garrisons: Vec<GarrisonData>,
    ) -> Result<(), GameError> {
        let result = if garrisons.is_empty() {
            self.garrisons.remove(&sector)
        } else {
            self.garrisons.insert(&sector, garrisons)
        };
        result.map_err(|_| GameError::TransientStorage(format!("garrisons in {}", sector)))
    }

    pub async fn salvage_in(&self, sector: SectorId) -> Result<Vec<SalvageData>, GameError> {
        self.salvage
            .get(&sector)
            .await
            .map(Option::unwrap_or_default)
            .map_err(|_| GameError::TransientStorage(format!("salvage in {}", sector)))
    }

    /// Replace a sector's salvage list, dropping the row when empty
    pub async fn set_salvage(
        &mut self,
        sector: SectorId,
        entries: Vec<SalvageData>,
    ) -> Result<(), GameError> {
        let result = if entries.is_empty() {
            self.salvage.remove(&sector)
        } else {
            self.salvage.insert(&sector, entries)
        };
        result.map_err(|_| GameError::TransientStorage(format!("salvage in {}", sector)))
    }

    pub async fn active_encounter(
        &self,
        sector: SectorId,
    ) -> Result<Option<EncounterData>, GameError> {
        self.encounters
            .get(&sector)
            .await
            .map_err(|_| GameError::TransientStorage(format!("encounter in {}", sector)))
    }

    pub async fn put_encounter(&mut self, encounter: EncounterData) -> Result<(), GameError> {
        let sector = encounter.sector;
        self.encounters
            .insert(&sector, encounter)
            .map_err(|_| GameError::TransientStorage(format!("encounter in {}", sector)))
    }

    /// Move an ended encounter out of the active slot into the archive
    pub async fn archive_encounter(&mut self, encounter: EncounterData) -> Result<(), GameError> {
        let sector = encounter.sector;
        let id = encounter.id.clone();
        self.encounters
            .remove(&sector)
            .map_err(|_| GameError::TransientStorage(format!("encounter in {}", sector)))?;
        self.encounter_archive
            .insert(&id, encounter)
            .map_err(|_| GameError::TransientStorage(format!("encounter archive {}", id)))
    }
}
