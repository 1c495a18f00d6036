//! Broadcast channels keyed by topic.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use ability_core::AbilityEvent;

/// Topics for event routing.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Topic {
    /// Ability lifecycle: activated, ended, authority confirmed.
    Ability,
    /// Task lifecycle: started, ended (including faults).
    Task,
    /// Owner tag visibility edges.
    Tag,
}

impl Topic {
    /// The topic an event is routed to.
    pub fn of(event: &AbilityEvent) -> Topic {
        match event {
            AbilityEvent::Activated { .. }
            | AbilityEvent::Ended { .. }
            | AbilityEvent::AuthorityConfirmed { .. } => Topic::Ability,
            AbilityEvent::TaskStarted { .. } | AbilityEvent::TaskEnded { .. } => Topic::Task,
            AbilityEvent::TagAdded { .. } | AbilityEvent::TagRemoved { .. } => Topic::Tag,
        }
    }
}

/// Topic-based event bus.
///
/// The topic set is closed, so every channel is created up front and
/// publishing never takes a lock.
pub struct EventBus {
    channels: Arc<Channels>,
}

struct Channels {
    ability: broadcast::Sender<AbilityEvent>,
    task: broadcast::Sender<AbilityEvent>,
    tag: broadcast::Sender<AbilityEvent>,
}

impl EventBus {
    /// Creates a new event bus with default capacity for each topic.
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Creates a new event bus with the given capacity per topic.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(Channels {
                ability: broadcast::channel(capacity).0,
                task: broadcast::channel(capacity).0,
                tag: broadcast::channel(capacity).0,
            }),
        }
    }

    fn sender(&self, topic: Topic) -> &broadcast::Sender<AbilityEvent> {
        match topic {
            Topic::Ability => &self.channels.ability,
            Topic::Task => &self.channels.task,
            Topic::Tag => &self.channels.tag,
        }
    }

    /// Publishes an event to its topic. Best-effort: an event with no
    /// subscribers is simply dropped.
    pub fn publish(&self, event: AbilityEvent) {
        let topic = Topic::of(&event);
        if self.sender(topic).send(event).is_err() {
            tracing::trace!(target: "runtime::bus", ?topic, "no subscribers for topic");
        }
    }

    /// Subscribes to a single topic.
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<AbilityEvent> {
        self.sender(topic).subscribe()
    }

    /// Subscribes to several topics at once; returns one receiver per topic.
    pub fn subscribe_multiple(
        &self,
        topics: &[Topic],
    ) -> HashMap<Topic, broadcast::Receiver<AbilityEvent>> {
        topics
            .iter()
            .map(|&topic| (topic, self.subscribe(topic)))
            .collect()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            channels: Arc::clone(&self.channels),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
