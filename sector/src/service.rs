//! Shard Service - GraphQL query service for the Starhold shard

#![cfg_attr(target_arch = "wasm32", no_main)]

use std::sync::Arc;

use async_graphql::{EmptyMutation, EmptySubscription, Object, Request, Response, Schema, SimpleObject};
use linera_sdk::{linera_base_types::WithServiceAbi, views::View, Service, ServiceRuntime};
use starhold_common::events::EventRecordData;
use starhold_sector::snapshot;
use starhold_sector::{
    CharacterData, CorporationData, GarrisonData, ShardAbi, ShardConfig, ShardState, ShipData,
};

pub struct ShardService {
    state: Arc<ShardState>,
    runtime: ServiceRuntime<Self>,
}

linera_sdk::service!(ShardService);

impl WithServiceAbi for ShardService {
    type Abi = ShardAbi;
}

impl Service for ShardService {
    type Parameters = ();

    async fn new(runtime: ServiceRuntime<Self>) -> Self {
        let state = ShardState::load(runtime.root_view_storage_context())
            .await
            .expect("Failed to load state");
        Self {
            state: Arc::new(state),
            runtime,
        }
    }

    async fn handle_query(&self, request: Request) -> Response {
        let schema = Schema::build(
            QueryRoot {
                state: self.state.clone(),
            },
            EmptyMutation,
            EmptySubscription,
        )
        .finish();
        schema.execute(request).await
    }
}

/// Flattened view of the active encounter in a sector
#[derive(SimpleObject)]
struct EncounterSummary {
    id: String,
    sector: u32,
    round: u32,
    deadline_micros: Option<u64>,
    awaiting_resolution: bool,
    ended: bool,
    end_state: Option<String>,
    participants: Vec<String>,
}

struct QueryRoot {
    state: Arc<ShardState>,
}

#[Object]
impl QueryRoot {
    async fn config(&self) -> ShardConfig {
        self.state.config.get().clone()
    }

    async fn character(&self, id: String) -> Option<CharacterData> {
        self.state.characters.get(&id).await.unwrap_or_default()
    }

    async fn ship(&self, id: u64) -> Option<ShipData> {
        self.state.ships.get(&id).await.unwrap_or_default()
    }

    async fn corporation(&self, id: u64) -> Option<CorporationData> {
        self.state.corporations.get(&id).await.unwrap_or_default()
    }

    async fn garrisons(&self, sector: u32) -> Vec<GarrisonData> {
        self.state
            .garrisons
            .get(&sector)
            .await
            .ok()
            .flatten()
            .unwrap_or_default()
    }

    /// The canonical sector payload as JSON; wreck expiry is evaluated at
    /// the supplied time
    async fn sector_snapshot(&self, sector: u32, now_micros: u64) -> String {
        snapshot::sector_snapshot(&self.state, sector, now_micros)
            .await
            .map(|value| value.to_string())
            .unwrap_or_else(|_| "{}".to_string())
    }

    async fn encounter(&self, sector: u32) -> Option<EncounterSummary> {
        let encounter = self.state.encounters.get(&sector).await.ok().flatten()?;
        Some(EncounterSummary {
            id: encounter.id.clone(),
            sector: encounter.sector,
            round: encounter.round,
            deadline_micros: encounter.deadline_micros,
            awaiting_resolution: encounter.awaiting_resolution,
            ended: encounter.ended,
            end_state: encounter.end_state.clone(),
            participants: encounter
                .participants
                .values()
                .map(|c| c.name.clone())
                .collect(),
        })
    }

    async fn event_count(&self) -> u64 {
        *self.state.event_count.get()
    }

    /// A character's inbox: events whose recipient list includes them,
    /// starting from `since` (exclusive), capped at 200 rows
    async fn events_for(&self, character: String, since: Option<u64>) -> Vec<EventRecordData> {
        let count = *self.state.event_count.get();
        let start = since.map(|s| s + 1).unwrap_or(0);
        let mut inbox = Vec::new();
        for id in start..count {
            if inbox.len() >= 200 {
                break;
            }
            if let Ok(Some(event)) = self.state.events.get(&id).await {
                if event.is_recipient(&character) {
                    inbox.push(event);
                }
            }
        }
        inbox
    }
}
