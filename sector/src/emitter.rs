//! Event emitter
//!
//! Records one event row together with its recipient list in a single
//! insert. An event with no recipients is skipped unless it is a broadcast;
//! subsidiary emissions that fail are logged and swallowed so the primary
//! state transition is never rolled back.

use serde_json::Value;

use starhold_common::errors::GameError;
use starhold_common::events::{
    EventKind, EventRecipient, EventRecordData, EventScope, SourceStamp,
};
use starhold_common::rng::fnv1a;
use starhold_common::types::{CharacterId, CorporationId, SectorId, ShipId};

use crate::state::ShardState;

/// Everything an event needs before it gets an id and a source stamp
#[derive(Debug, Clone)]
pub struct EventDraft {
    pub kind: EventKind,
    pub scope: EventScope,
    pub sector: Option<SectorId>,
    pub actor: Option<CharacterId>,
    pub corporation: Option<CorporationId>,
    pub ship: Option<ShipId>,
    pub payload: Value,
    pub recipients: Vec<EventRecipient>,
}

impl EventDraft {
    pub fn new(kind: EventKind, scope: EventScope, payload: Value) -> Self {
        Self {
            kind,
            scope,
            sector: None,
            actor: None,
            corporation: None,
            ship: None,
            payload,
            recipients: Vec::new(),
        }
    }

    pub fn in_sector(mut self, sector: SectorId) -> Self {
        self.sector = Some(sector);
        self
    }

    pub fn by_actor(mut self, actor: &str) -> Self {
        self.actor = Some(actor.to_string());
        self
    }

    pub fn about_ship(mut self, ship: ShipId) -> Self {
        self.ship = Some(ship);
        self
    }

    pub fn for_corporation(mut self, corporation: CorporationId) -> Self {
        self.corporation = Some(corporation);
        self
    }

    pub fn to(mut self, recipients: Vec<EventRecipient>) -> Self {
        self.recipients = recipients;
        self
    }
}

fn request_id(method: &str, now_micros: u64, event_id: u64) -> String {
    let mut bytes = Vec::with_capacity(method.len() + 16);
    bytes.extend_from_slice(method.as_bytes());
    bytes.extend_from_slice(&now_micros.to_le_bytes());
    bytes.extend_from_slice(&event_id.to_le_bytes());
    format!("req-{:016x}", fnv1a(&bytes))
}

/// Persist one event. Returns the new event id, or `None` when emission was
/// skipped because the recipient set was empty and the event is not a
/// broadcast.
pub async fn emit(
    state: &mut ShardState,
    draft: EventDraft,
    method: &str,
    now_micros: u64,
) -> Result<Option<u64>, GameError> {
    if draft.recipients.is_empty() && draft.scope != EventScope::Broadcast {
        return Ok(None);
    }

    let id = *state.event_count.get();
    let record = EventRecordData {
        id,
        kind: draft.kind,
        scope: draft.scope,
        sector: draft.sector,
        actor: draft.actor,
        corporation: draft.corporation,
        ship: draft.ship,
        payload: draft.payload.to_string(),
        source: SourceStamp {
            method: method.to_string(),
            request_id: request_id(method, now_micros, id),
            timestamp_micros: now_micros,
        },
        recipients: draft.recipients,
    };

    state
        .events
        .insert(&id, record)
        .map_err(|_| GameError::Emission(format!("event {} ({})", id, draft.kind.as_str())))?;
    state.event_count.set(id + 1);
    Ok(Some(id))
}

/// Best-effort emission for subordinate events: failures are logged, never
/// propagated.
pub async fn emit_or_log(
    state: &mut ShardState,
    draft: EventDraft,
    method: &str,
    now_micros: u64,
) -> Option<u64> {
    let kind = draft.kind;
    match emit(state, draft, method, now_micros).await {
        Ok(id) => id,
        Err(err) => {
            log::warn!("swallowed emission failure for {}: {}", kind.as_str(), err);
            None
        }
    }
}
