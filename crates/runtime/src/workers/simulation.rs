//! Simulation worker that owns the [`AbilityScheduler`].
//!
//! Receives commands from [`SchedulerHandle`](crate::api::SchedulerHandle),
//! applies them to the scheduler, and republishes the drained event outbox on
//! the bus after every command so subscribers observe effects in order.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use ability_core::{
    AbilityEnv, AbilityEvent, AbilityId, AbilityScheduler, AbilitySpec, AuthorityOracle,
    EndReason, EntityId, EntitySnapshot, FrameworkError, GameplayEvent, SpecHandle, Tick,
};
use gameplay_tags::TagId;

use crate::api::{Result, RuntimeError};
use crate::events::EventBus;

/// Commands the simulation worker accepts.
pub enum Command {
    RegisterSpec {
        spec: AbilitySpec,
        reply: oneshot::Sender<Result<SpecHandle>>,
    },
    AddEntity {
        entity: EntityId,
        reply: oneshot::Sender<bool>,
    },
    RemoveEntity {
        entity: EntityId,
        reply: oneshot::Sender<bool>,
    },
    Grant {
        entity: EntityId,
        handle: SpecHandle,
        reply: oneshot::Sender<Result<bool>>,
    },
    Revoke {
        entity: EntityId,
        handle: SpecHandle,
        reply: oneshot::Sender<Result<bool>>,
    },
    GrantTag {
        entity: EntityId,
        tag: TagId,
        reply: oneshot::Sender<Result<bool>>,
    },
    RevokeTag {
        entity: EntityId,
        tag: TagId,
        reply: oneshot::Sender<Result<bool>>,
    },
    TryActivate {
        entity: EntityId,
        handle: SpecHandle,
        reply: oneshot::Sender<Result<AbilityId>>,
    },
    EndAbility {
        ability: AbilityId,
        reason: EndReason,
        reply: oneshot::Sender<()>,
    },
    CancelAll {
        entity: EntityId,
        reply: oneshot::Sender<Result<()>>,
    },
    DeliverEvent {
        entity: EntityId,
        event: GameplayEvent,
        reply: oneshot::Sender<Result<()>>,
    },
    Confirm {
        ability: AbilityId,
        accepted: bool,
        reply: oneshot::Sender<bool>,
    },
    ConfirmBatch {
        results: Vec<(AbilityId, bool)>,
        reply: oneshot::Sender<()>,
    },
    Tick {
        dt: f32,
        reply: oneshot::Sender<Tick>,
    },
    Snapshot {
        entity: EntityId,
        reply: oneshot::Sender<Option<EntitySnapshot>>,
    },
}

/// Background task that processes scheduler commands.
pub struct SimulationWorker {
    scheduler: AbilityScheduler,
    authority: Option<Arc<dyn AuthorityOracle + Send + Sync>>,
    command_rx: mpsc::Receiver<Command>,
    bus: EventBus,
}

impl SimulationWorker {
    pub fn new(
        scheduler: AbilityScheduler,
        authority: Option<Arc<dyn AuthorityOracle + Send + Sync>>,
        command_rx: mpsc::Receiver<Command>,
        bus: EventBus,
    ) -> Self {
        Self {
            scheduler,
            authority,
            command_rx,
            bus,
        }
    }

    /// Main worker loop. Exits when every command sender has dropped.
    pub async fn run(mut self) {
        info!(target: "runtime::worker", "simulation worker started");
        loop {
            tokio::select! {
                Some(cmd) = self.command_rx.recv() => {
                    self.handle_command(cmd);
                }
                else => break,
            }
        }
        info!(target: "runtime::worker", "simulation worker stopped");
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::RegisterSpec { spec, reply } => {
                let result = self
                    .scheduler
                    .register_spec(spec)
                    .map_err(RuntimeError::from);
                let _ = reply.send(result);
            }
            Command::AddEntity { entity, reply } => {
                let _ = reply.send(self.scheduler.add_entity(entity));
            }
            Command::RemoveEntity { entity, reply } => {
                let _ = reply.send(self.scheduler.remove_entity(entity));
            }
            Command::Grant { entity, handle, reply } => {
                let result = self
                    .scheduler
                    .grant(entity, handle)
                    .map_err(RuntimeError::from);
                let _ = reply.send(result);
            }
            Command::Revoke { entity, handle, reply } => {
                let result = self
                    .scheduler
                    .revoke(entity, handle)
                    .map_err(RuntimeError::from);
                let _ = reply.send(result);
            }
            Command::GrantTag { entity, tag, reply } => {
                let result = self
                    .scheduler
                    .grant_tag(entity, tag)
                    .map_err(RuntimeError::from);
                let _ = reply.send(result);
            }
            Command::RevokeTag { entity, tag, reply } => {
                let result = self
                    .scheduler
                    .revoke_tag(entity, tag)
                    .map_err(RuntimeError::from);
                let _ = reply.send(result);
            }
            Command::TryActivate { entity, handle, reply } => {
                let result = self.try_activate(entity, handle);
                if reply.send(result).is_err() {
                    debug!(target: "runtime::worker", "reply channel closed (caller dropped)");
                }
            }
            Command::EndAbility { ability, reason, reply } => {
                self.scheduler.end_ability(ability, reason);
                let _ = reply.send(());
            }
            Command::CancelAll { entity, reply } => {
                let result = self
                    .scheduler
                    .cancel_all(entity)
                    .map_err(RuntimeError::from);
                let _ = reply.send(result);
            }
            Command::DeliverEvent { entity, event, reply } => {
                let result = self
                    .scheduler
                    .deliver_event(entity, event)
                    .map_err(RuntimeError::from);
                let _ = reply.send(result);
            }
            Command::Confirm { ability, accepted, reply } => {
                let _ = reply.send(self.scheduler.confirm_authority(ability, accepted));
            }
            Command::ConfirmBatch { results, reply } => {
                self.scheduler.confirm_batch(&results);
                let _ = reply.send(());
            }
            Command::Tick { dt, reply } => {
                self.scheduler.tick(dt);
                let _ = reply.send(self.scheduler.clock());
            }
            Command::Snapshot { entity, reply } => {
                let _ = reply.send(self.scheduler.snapshot(entity));
            }
        }
        self.publish_outbox();
    }

    fn try_activate(&mut self, entity: EntityId, handle: SpecHandle) -> Result<AbilityId> {
        let env = match &self.authority {
            Some(oracle) => AbilityEnv::new().with_authority(oracle.as_ref()),
            None => AbilityEnv::new(),
        };
        match self.scheduler.try_activate(&env, entity, handle) {
            Ok(ability) => Ok(ability),
            Err(error) => {
                // Gate rejections are normal gameplay; misuse is worth a warn.
                if error.severity().is_recoverable() {
                    debug!(
                        target: "runtime::worker",
                        entity = %entity,
                        handle = %handle,
                        error = %error,
                        "activation rejected"
                    );
                } else {
                    warn!(
                        target: "runtime::worker",
                        entity = %entity,
                        handle = %handle,
                        error = %error,
                        code = error.error_code(),
                        "activation refused"
                    );
                }
                Err(RuntimeError::from(error))
            }
        }
    }

    /// Drains the scheduler outbox onto the bus, logging the outcomes the
    /// host likely wants in its own logs.
    fn publish_outbox(&mut self) {
        for event in self.scheduler.drain_events() {
            match &event {
                AbilityEvent::TaskEnded {
                    entity,
                    ability,
                    task,
                    fault: Some(reason),
                    ..
                } => {
                    warn!(
                        target: "runtime::worker",
                        entity = %entity,
                        ability = %ability,
                        task = %task,
                        reason = %reason,
                        "task faulted"
                    );
                }
                AbilityEvent::Ended {
                    entity,
                    ability,
                    reason: EndReason::PredictionRejected,
                    ..
                } => {
                    debug!(
                        target: "runtime::worker",
                        entity = %entity,
                        ability = %ability,
                        "predicted activation rolled back"
                    );
                }
                _ => {}
            }
            self.bus.publish(event);
        }
    }
}
