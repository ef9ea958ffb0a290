//! Shard Contract - operation execution for the Starhold shard

#![cfg_attr(target_arch = "wasm32", no_main)]

use linera_sdk::{
    linera_base_types::WithContractAbi,
    views::{RootView, View},
    Contract, ContractRuntime,
};
use starhold_common::errors::GameError;
use starhold_common::events::{EventKind, EventRecipient, EventScope, VisibilityReason};
use starhold_common::types::ActionKind;
use starhold_sector::emitter::{emit_or_log, EventDraft};
use starhold_sector::{
    guard, lifecycle, operations, payloads, ActionInput, Operation, ShardAbi, ShardParameters,
    ShardState,
};

pub struct ShardContract {
    state: ShardState,
    runtime: ContractRuntime<Self>,
}

linera_sdk::contract!(ShardContract);

impl WithContractAbi for ShardContract {
    type Abi = ShardAbi;
}

impl Contract for ShardContract {
    type Message = ();
    type Parameters = ShardParameters;
    type InstantiationArgument = ();
    type EventValue = ();

    async fn load(runtime: ContractRuntime<Self>) -> Self {
        let state = ShardState::load(runtime.root_view_storage_context())
            .await
            .expect("Failed to load state");
        Self { state, runtime }
    }

    async fn instantiate(&mut self, _argument: Self::InstantiationArgument) {
        let params = self.runtime.application_parameters();
        self.state.initialize(params.as_config());
    }

    async fn execute_operation(&mut self, operation: Self::Operation) -> Result<(), GameError> {
        let now = self.runtime.system_time().micros();
        let method = operation.method();
        let actor = operation.actor().map(str::to_string);

        // Guards run before any mutation; the sweeper is exempt because it
        // acts on behalf of the shard, not a character.
        let result = match &actor {
            Some(actor_id) => {
                match guard::check_rate(&mut self.state, actor_id, method, now).await {
                    Ok(()) => self.dispatch(operation, now).await,
                    Err(err) => Err(err),
                }
            }
            None => self.dispatch(operation, now).await,
        };

        if let Err(err) = &result {
            log::warn!("{} failed with {}: {}", method, err.status(), err);
            if err.emits_error_event() {
                if let Some(actor_id) = &actor {
                    let payload = payloads::error_payload(method, err);
                    emit_or_log(
                        &mut self.state,
                        EventDraft::new(EventKind::Error, EventScope::Direct, payload)
                            .by_actor(actor_id)
                            .to(vec![EventRecipient {
                                character_id: actor_id.clone(),
                                reason: VisibilityReason::Error,
                            }]),
                        method,
                        now,
                    )
                    .await;
                }
            }
        }
        result
    }

    async fn execute_message(&mut self, _message: Self::Message) {}

    async fn store(mut self) {
        self.state.save().await.expect("Failed to save state");
    }
}

impl ShardContract {
    async fn dispatch(&mut self, operation: Operation, now: u64) -> Result<(), GameError> {
        let method = operation.method();
        let state = &mut self.state;
        match operation {
            Operation::Register { character_id, name } => {
                operations::register(state, &character_id, &name, now, method).await
            }
            Operation::Join { character_id } => {
                operations::join(state, &character_id, now, method).await
            }
            Operation::Move {
                character_id,
                to_sector,
            } => operations::move_ship(state, &character_id, to_sector, now, method).await,
            Operation::SubmitAction {
                character_id,
                action,
            } => lifecycle::submit_action(state, &character_id, &action, now, method).await,
            Operation::SweepDeadline { sector, round } => {
                lifecycle::sweep_deadline(state, sector, round, now, method).await
            }
            Operation::DeployGarrison {
                character_id,
                fighters,
                mode,
                toll_amount,
            } => {
                operations::deploy_garrison(
                    state,
                    &character_id,
                    fighters,
                    mode,
                    toll_amount,
                    now,
                    method,
                )
                .await
            }
            Operation::WithdrawGarrison { character_id } => {
                operations::withdraw_garrison(state, &character_id, now, method).await
            }
            Operation::PayToll {
                character_id,
                garrison_owner,
            } => {
                let pay = ActionInput {
                    kind: ActionKind::Pay,
                    commit: 0,
                    target: Some(garrison_owner),
                    destination: None,
                };
                lifecycle::submit_action(state, &character_id, &pay, now, method).await
            }
            Operation::ClaimSalvage {
                character_id,
                salvage_id,
            } => operations::claim_salvage(state, &character_id, &salvage_id, now, method).await,
            Operation::FormCorporation { character_id, name } => {
                operations::form_corporation(state, &character_id, &name, now).await
            }
            Operation::JoinCorporation {
                character_id,
                corporation,
            } => operations::join_corporation(state, &character_id, corporation, now).await,
            Operation::LeaveCorporation { character_id } => {
                operations::leave_corporation(state, &character_id).await
            }
            Operation::CommissionShip {
                character_id,
                ship_type,
                name,
            } => {
                operations::commission_ship(state, &character_id, &ship_type, &name, now, method)
                    .await
            }
        }
    }
}
