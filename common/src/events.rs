//! Event model for Starhold
//!
//! A state change is recorded once as an event row carrying its recipient
//! list; clients read their inbox by character id instead of receiving
//! per-recipient messages. Event ids are monotonic per shard, which gives
//! every character a total order over what it sees.

use async_graphql::{Enum, SimpleObject};
use serde::{Deserialize, Serialize};

use crate::types::{CharacterId, CorporationId, SectorId, ShipId};

/// Every event type the shard records
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Enum, PartialEq, Eq)]
pub enum EventKind {
    CombatRoundWaiting,
    CombatRoundResolved,
    CombatEnded,
    ShipDestroyed,
    SalvageCreated,
    SectorUpdate,
    StatusSnapshot,
    Error,
}

impl EventKind {
    /// Wire name, the value clients dispatch on
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::CombatRoundWaiting => "combat.round_waiting",
            EventKind::CombatRoundResolved => "combat.round_resolved",
            EventKind::CombatEnded => "combat.ended",
            EventKind::ShipDestroyed => "ship.destroyed",
            EventKind::SalvageCreated => "salvage.created",
            EventKind::SectorUpdate => "sector.update",
            EventKind::StatusSnapshot => "status.snapshot",
            EventKind::Error => "error",
        }
    }
}

/// Audience class of an event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Enum, PartialEq, Eq)]
pub enum EventScope {
    Direct,
    Sector,
    Corp,
    Broadcast,
    System,
}

impl EventScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventScope::Direct => "direct",
            EventScope::Sector => "sector",
            EventScope::Corp => "corp",
            EventScope::Broadcast => "broadcast",
            EventScope::System => "system",
        }
    }
}

/// Why a character is in a recipient set; the first reason seen wins
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Enum, PartialEq, Eq)]
pub enum VisibilityReason {
    Direct,
    SectorSnapshot,
    CorpMember,
    GarrisonOwner,
    GarrisonCorpMember,
    Error,
}

impl VisibilityReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisibilityReason::Direct => "direct",
            VisibilityReason::SectorSnapshot => "sector_snapshot",
            VisibilityReason::CorpMember => "corp_member",
            VisibilityReason::GarrisonOwner => "garrison_owner",
            VisibilityReason::GarrisonCorpMember => "garrison_corp_member",
            VisibilityReason::Error => "error",
        }
    }
}

/// One entry of an event's recipient list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, SimpleObject)]
pub struct EventRecipient {
    pub character_id: CharacterId,
    pub reason: VisibilityReason,
}

/// Provenance stamp recorded with every event
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, SimpleObject)]
pub struct SourceStamp {
    pub method: String,
    pub request_id: String,
    pub timestamp_micros: u64,
}

/// One persisted event row. The payload is canonical JSON, serialized once
/// at emission so clients observe byte-identical shapes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, SimpleObject)]
pub struct EventRecordData {
    pub id: u64,
    pub kind: EventKind,
    pub scope: EventScope,
    pub sector: Option<SectorId>,
    pub actor: Option<CharacterId>,
    pub corporation: Option<CorporationId>,
    pub ship: Option<ShipId>,
    pub payload: String,
    pub source: SourceStamp,
    pub recipients: Vec<EventRecipient>,
}

impl EventRecordData {
    pub fn is_recipient(&self, character: &str) -> bool {
        self.recipients.iter().any(|r| r.character_id == character)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_are_dotted() {
        assert_eq!(EventKind::CombatRoundWaiting.as_str(), "combat.round_waiting");
        assert_eq!(EventKind::ShipDestroyed.as_str(), "ship.destroyed");
        assert_eq!(EventScope::Broadcast.as_str(), "broadcast");
        assert_eq!(
            VisibilityReason::GarrisonCorpMember.as_str(),
            "garrison_corp_member"
        );
    }
}
