//! Cloneable facade for issuing commands to the runtime.
//!
//! [`SchedulerHandle`] hides the channel plumbing: every mutation is an async
//! round trip to the simulation worker, while tag lookup and event
//! subscription are synchronous against shared immutable state.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};

use ability_core::{
    AbilityEvent, AbilityId, AbilitySpec, EndReason, EntityId, EntitySnapshot, GameplayEvent,
    SpecHandle, Tick,
};
use gameplay_tags::{TagId, TagRegistry};

use super::errors::{Result, RuntimeError};
use crate::events::{EventBus, Topic};
use crate::workers::Command;

/// Client-facing handle to interact with the runtime.
#[derive(Clone)]
pub struct SchedulerHandle {
    command_tx: mpsc::Sender<Command>,
    event_bus: EventBus,
    registry: Arc<TagRegistry>,
}

impl SchedulerHandle {
    pub(crate) fn new(
        command_tx: mpsc::Sender<Command>,
        event_bus: EventBus,
        registry: Arc<TagRegistry>,
    ) -> Self {
        Self {
            command_tx,
            event_bus,
            registry,
        }
    }

    /// Interned id for a registered tag path.
    ///
    /// The registry is immutable once the runtime is built, so this needs no
    /// round trip to the worker.
    pub fn tag(&self, path: &str) -> Option<TagId> {
        self.registry.find(path)
    }

    /// Shared tag registry, for path resolution and hierarchy queries.
    pub fn registry(&self) -> &TagRegistry {
        &self.registry
    }

    /// Registers an ability spec and returns the handle used in grants.
    pub async fn register_spec(&self, spec: AbilitySpec) -> Result<SpecHandle> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(Command::RegisterSpec {
                spec,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RuntimeError::CommandChannelClosed)?;
        reply_rx.await.map_err(RuntimeError::ReplyChannelClosed)?
    }

    /// Starts tracking an entity. Returns false if it was already known.
    pub async fn add_entity(&self, entity: EntityId) -> Result<bool> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(Command::AddEntity {
                entity,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RuntimeError::CommandChannelClosed)?;
        reply_rx.await.map_err(RuntimeError::ReplyChannelClosed)
    }

    /// Cancels everything the entity is running and forgets it.
    pub async fn remove_entity(&self, entity: EntityId) -> Result<bool> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(Command::RemoveEntity {
                entity,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RuntimeError::CommandChannelClosed)?;
        reply_rx.await.map_err(RuntimeError::ReplyChannelClosed)
    }

    /// Grants a spec to an entity. Returns true on a fresh grant.
    pub async fn grant(&self, entity: EntityId, handle: SpecHandle) -> Result<bool> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(Command::Grant {
                entity,
                handle,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RuntimeError::CommandChannelClosed)?;
        reply_rx.await.map_err(RuntimeError::ReplyChannelClosed)?
    }

    /// Removes a grant, cancelling live instances of the spec first.
    pub async fn revoke(&self, entity: EntityId, handle: SpecHandle) -> Result<bool> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(Command::Revoke {
                entity,
                handle,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RuntimeError::CommandChannelClosed)?;
        reply_rx.await.map_err(RuntimeError::ReplyChannelClosed)?
    }

    /// Grants one stack of a loose tag. Interrupts it triggers have run by
    /// the time the reply arrives.
    pub async fn grant_tag(&self, entity: EntityId, tag: TagId) -> Result<bool> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(Command::GrantTag {
                entity,
                tag,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RuntimeError::CommandChannelClosed)?;
        reply_rx.await.map_err(RuntimeError::ReplyChannelClosed)?
    }

    /// Releases one stack of a loose tag.
    pub async fn revoke_tag(&self, entity: EntityId, tag: TagId) -> Result<bool> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(Command::RevokeTag {
                entity,
                tag,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RuntimeError::CommandChannelClosed)?;
        reply_rx.await.map_err(RuntimeError::ReplyChannelClosed)?
    }

    /// Requests an activation. On success the returned id names the live
    /// instance; gate rejections come back as
    /// [`RuntimeError::Activation`].
    pub async fn try_activate(&self, entity: EntityId, handle: SpecHandle) -> Result<AbilityId> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(Command::TryActivate {
                entity,
                handle,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RuntimeError::CommandChannelClosed)?;
        reply_rx.await.map_err(RuntimeError::ReplyChannelClosed)?
    }

    /// Ends a live instance. Stale ids are no-ops.
    pub async fn end_ability(&self, ability: AbilityId, reason: EndReason) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(Command::EndAbility {
                ability,
                reason,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RuntimeError::CommandChannelClosed)?;
        reply_rx.await.map_err(RuntimeError::ReplyChannelClosed)
    }

    /// Cancels every live instance on the entity, newest first.
    pub async fn cancel_all(&self, entity: EntityId) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(Command::CancelAll {
                entity,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RuntimeError::CommandChannelClosed)?;
        reply_rx.await.map_err(RuntimeError::ReplyChannelClosed)?
    }

    /// Routes a gameplay event to tasks waiting on its exact tag.
    pub async fn deliver_event(&self, entity: EntityId, event: GameplayEvent) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(Command::DeliverEvent {
                entity,
                event,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RuntimeError::CommandChannelClosed)?;
        reply_rx.await.map_err(RuntimeError::ReplyChannelClosed)?
    }

    /// Resolves one predicted activation. True if the verdict was consumed.
    pub async fn confirm(&self, ability: AbilityId, accepted: bool) -> Result<bool> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(Command::Confirm {
                ability,
                accepted,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RuntimeError::CommandChannelClosed)?;
        reply_rx.await.map_err(RuntimeError::ReplyChannelClosed)
    }

    /// Applies a batch of authority verdicts (acceptances first, rejections
    /// newest-activation-first).
    pub async fn confirm_batch(&self, results: Vec<(AbilityId, bool)>) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(Command::ConfirmBatch {
                results,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RuntimeError::CommandChannelClosed)?;
        reply_rx.await.map_err(RuntimeError::ReplyChannelClosed)
    }

    /// Advances the simulation one tick. Returns the clock after the step.
    pub async fn tick(&self, dt: f32) -> Result<Tick> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(Command::Tick { dt, reply: reply_tx })
            .await
            .map_err(|_| RuntimeError::CommandChannelClosed)?;
        reply_rx.await.map_err(RuntimeError::ReplyChannelClosed)
    }

    /// Read-only view of an entity: visible tags plus live abilities and
    /// their task states.
    pub async fn snapshot(&self, entity: EntityId) -> Result<Option<EntitySnapshot>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(Command::Snapshot {
                entity,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RuntimeError::CommandChannelClosed)?;
        reply_rx.await.map_err(RuntimeError::ReplyChannelClosed)
    }

    /// Subscribes to events from a specific topic.
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<AbilityEvent> {
        self.event_bus.subscribe(topic)
    }

    /// Subscribes to multiple topics at once.
    pub fn subscribe_multiple(
        &self,
        topics: &[Topic],
    ) -> HashMap<Topic, broadcast::Receiver<AbilityEvent>> {
        self.event_bus.subscribe_multiple(topics)
    }

    /// The underlying event bus, for advanced usage.
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }
}
