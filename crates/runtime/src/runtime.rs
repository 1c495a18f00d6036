//! Runtime assembly: configuration, builder, and lifecycle.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use ability_core::{AbilityConfig, AbilityEvent, AbilityScheduler, AuthorityOracle};
use gameplay_tags::TagRegistry;

use crate::api::{Result, RuntimeError, SchedulerHandle};
use crate::events::{EventBus, Topic};
use crate::workers::SimulationWorker;

/// Tunables for the runtime shell.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Scheduler limits (notice-pass cap and friends).
    pub ability_config: AbilityConfig,
    /// Broadcast capacity per topic before slow subscribers start lagging.
    pub event_buffer_size: usize,
    /// Command queue depth before handle calls back-pressure.
    pub command_buffer_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            ability_config: AbilityConfig::new(),
            event_buffer_size: 256,
            command_buffer_size: 64,
        }
    }
}

/// Owns the simulation worker and hands out [`SchedulerHandle`]s.
pub struct Runtime {
    handle: SchedulerHandle,
    sim_worker_handle: JoinHandle<()>,
}

impl Runtime {
    /// Starts building a runtime around a finished tag registry.
    ///
    /// The registry is frozen from here on: every spec and entity in the
    /// runtime resolves tags against this one set.
    pub fn builder(registry: TagRegistry) -> RuntimeBuilder {
        RuntimeBuilder::new(registry)
    }

    /// A cloneable handle for issuing commands.
    pub fn handle(&self) -> SchedulerHandle {
        self.handle.clone()
    }

    /// Subscribes to a topic without going through a handle.
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<AbilityEvent> {
        self.handle.subscribe(topic)
    }

    /// Stops the worker and waits for it to drain.
    ///
    /// Handles cloned from this runtime keep the command channel open;
    /// the worker exits once the last one is dropped.
    pub async fn shutdown(self) -> Result<()> {
        drop(self.handle);
        self.sim_worker_handle
            .await
            .map_err(RuntimeError::WorkerJoin)
    }
}

/// Builder wiring the scheduler, worker, and event bus together.
pub struct RuntimeBuilder {
    registry: TagRegistry,
    config: RuntimeConfig,
    authority: Option<Arc<dyn AuthorityOracle + Send + Sync>>,
}

impl RuntimeBuilder {
    fn new(registry: TagRegistry) -> Self {
        Self {
            registry,
            config: RuntimeConfig::default(),
            authority: None,
        }
    }

    /// Overrides the default configuration.
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Installs an authority oracle; activations consult it to decide
    /// between authoritative and predicted execution.
    pub fn authority(mut self, oracle: Arc<dyn AuthorityOracle + Send + Sync>) -> Self {
        self.authority = Some(oracle);
        self
    }

    /// Spawns the simulation worker and returns the running runtime.
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(self) -> Runtime {
        let registry = Arc::new(self.registry);

        let (command_tx, command_rx) = mpsc::channel(self.config.command_buffer_size);
        let event_bus = EventBus::with_capacity(self.config.event_buffer_size);

        let handle = SchedulerHandle::new(command_tx, event_bus.clone(), Arc::clone(&registry));

        let scheduler = AbilityScheduler::new(registry, self.config.ability_config);
        let worker = SimulationWorker::new(scheduler, self.authority, command_rx, event_bus);
        let sim_worker_handle = tokio::spawn(worker.run());

        Runtime {
            handle,
            sim_worker_handle,
        }
    }
}
