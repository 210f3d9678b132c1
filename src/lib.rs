/*!
 # Server Keeper

 A Rust library for supervising local server processes: lifecycle
 management, resource telemetry, and console bridging.

 ## Overview

 Server Keeper provides functionality to:
 - Launch, monitor, and stop managed server processes
 - Sample CPU, memory, and disk usage of a live process in the background
 - Track download/import progress gating an entity's readiness
 - Bridge an operator's console input and the process's output log
 - Notify any number of observers of field changes without blocking

 ## Basic Usage

 ```no_run
 use server_keeper::{Keeper, Result};
 use server_keeper::entity::JsonEntityStore;
 use std::sync::Arc;

 #[tokio::main]
 async fn main() -> Result<()> {
     // Create a keeper from a config file and a persistence store
     let store = Arc::new(JsonEntityStore::new("entities.json"));
     let mut keeper = Keeper::from_config_file("keeper.json", store)?;

     // Launch an entity (spawns the process, status becomes Starting)
     keeper.launch("survival").await?;

     // Once the server signals readiness, telemetry starts
     keeper.mark_ready("survival").await?;

     // Observe it
     let state = keeper.state("survival")?;
     println!("cpu: {}", state.cpu_display());

     // Talk to it
     keeper.submit("survival", "say hello").await?;

     // Stop it
     keeper.terminate("survival").await?;

     Ok(())
 }
 ```

 ## Features

 - **Lifecycle**: a strict Stopped → Starting → Running state machine
 - **Telemetry**: per-process CPU/memory/disk samplers with clean restart
 - **Console**: ordered, observable output log and input passthrough
 - **Configuration**: JSON config files describing entity launch commands
 - **Error Handling**: loud failures for caller bugs, silent recovery for
   expected transients
 - **Async Support**: full async/await support on tokio

 ## License

 This project is licensed under the MIT license.
*/

pub mod config;
pub mod console;
pub mod entity;
pub mod error;
pub mod metrics;
pub mod notify;
pub mod progress;
pub mod server;

pub use config::Config;
pub use entity::{EntityRegistry, EntityStore, ManagedEntity};
pub use error::{Error, Result};
pub use notify::{Field, FieldNotifier};
pub use server::{EntityLifecycle, EntityState, ServerProcess, SessionId, Status};

use metrics::TrackerConfig;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Configure and supervise managed server entities.
///
/// This struct is the main entry point: it owns one [`EntityLifecycle`]
/// per configured entity plus the shared [`EntityRegistry`], and routes
/// operator commands to the right lifecycle. The persistence store is
/// injected, never a global.
/// All public methods are instrumented with `tracing` spans.
pub struct Keeper {
    /// Configuration
    config: Config,
    /// Shared entity registry
    registry: Arc<EntityRegistry>,
    /// Per-entity lifecycles
    lifecycles: HashMap<String, EntityLifecycle>,
}

impl Keeper {
    /// Create a new keeper from a configuration file path.
    ///
    /// This method is instrumented with `tracing`.
    #[tracing::instrument(skip(path, store), fields(config_path = ?path.as_ref()))]
    pub fn from_config_file(path: impl AsRef<Path>, store: Arc<dyn EntityStore>) -> Result<Self> {
        tracing::info!("Loading configuration from file");
        let config = Config::from_file(path)?;
        Self::new(config, store)
    }

    /// Create a new keeper from a configuration string.
    ///
    /// This method is instrumented with `tracing`.
    #[tracing::instrument(skip(config, store))]
    pub fn from_config_str(config: &str, store: Arc<dyn EntityStore>) -> Result<Self> {
        tracing::info!("Loading configuration from string");
        let config = Config::parse_from_str(config)?;
        Self::new(config, store)
    }

    /// Create a new keeper from a configuration.
    ///
    /// Validates the configuration and builds one lifecycle per entity.
    ///
    /// This method is instrumented with `tracing`.
    #[tracing::instrument(skip(config, store), fields(num_entities = config.entities.len()))]
    pub fn new(config: Config, store: Arc<dyn EntityStore>) -> Result<Self> {
        tracing::info!("Creating new Keeper");
        config::validate_config(&config.entities)?;

        let registry = Arc::new(EntityRegistry::new());
        let mut lifecycles = HashMap::new();

        for (name, entity_config) in &config.entities {
            let entity = ManagedEntity::new(
                name.clone(),
                entity_config.max_memory_bytes(),
                entity_config.flavor,
            );
            let shared = registry.insert(entity);
            let lifecycle = EntityLifecycle::new(
                shared,
                Arc::clone(&store),
                Arc::clone(&registry),
                TrackerConfig::default(),
            );
            lifecycles.insert(name.clone(), lifecycle);
        }

        Ok(Self {
            config,
            registry,
            lifecycles,
        })
    }

    /// The shared entity registry.
    pub fn registry(&self) -> Arc<EntityRegistry> {
        Arc::clone(&self.registry)
    }

    /// Borrow the lifecycle for an entity, e.g. to feed download or
    /// import callbacks into it.
    pub fn lifecycle_mut(&mut self, name: &str) -> Result<&mut EntityLifecycle> {
        self.lifecycles
            .get_mut(name)
            .ok_or_else(|| Error::EntityNotFound(name.to_string()))
    }

    /// Borrow the lifecycle for an entity read-only.
    pub fn lifecycle(&self, name: &str) -> Result<&EntityLifecycle> {
        self.lifecycles
            .get(name)
            .ok_or_else(|| Error::EntityNotFound(name.to_string()))
    }

    /// Spawn an entity's server process and hand it to the lifecycle.
    ///
    /// Readiness gates launching: an entity whose artifact download or
    /// data import is unfinished is rejected with [`Error::NotReady`].
    ///
    /// This method is instrumented with `tracing`.
    #[tracing::instrument(skip(self), fields(entity = %name))]
    pub async fn launch(&mut self, name: &str) -> Result<()> {
        tracing::info!("Attempting to launch entity");
        let entity_config = self
            .config
            .entities
            .get(name)
            .ok_or_else(|| {
                tracing::error!("Configuration not found for entity");
                Error::EntityNotFound(name.to_string())
            })?
            .clone();

        let lifecycle = self
            .lifecycles
            .get_mut(name)
            .ok_or_else(|| Error::EntityNotFound(name.to_string()))?;

        if !lifecycle.state().ready_to_use() {
            tracing::warn!("Entity is not ready to launch");
            return Err(Error::NotReady(name.to_string()));
        }

        let mut process = ServerProcess::new(name.to_string(), entity_config);
        process.start()?;

        lifecycle.launch(process).map_err(|e| {
            tracing::error!(error = %e, "Failed to attach process to lifecycle");
            e
        })?;

        tracing::info!("Entity launched");
        Ok(())
    }

    /// Forward the process readiness signal for an entity.
    ///
    /// This method is instrumented with `tracing`.
    #[tracing::instrument(skip(self), fields(entity = %name))]
    pub async fn mark_ready(&mut self, name: &str) -> Result<()> {
        self.lifecycle_mut(name)?.on_process_ready().await
    }

    /// Stop an entity's supervision session.
    ///
    /// This method is instrumented with `tracing`.
    #[tracing::instrument(skip(self), fields(entity = %name))]
    pub async fn terminate(&mut self, name: &str) -> Result<()> {
        tracing::info!("Attempting to terminate entity");
        self.lifecycle_mut(name)?.terminate().await
    }

    /// Forward the external process-exited signal for an entity.
    ///
    /// This method is instrumented with `tracing`.
    #[tracing::instrument(skip(self), fields(entity = %name))]
    pub async fn handle_exit(&mut self, name: &str) -> Result<()> {
        self.lifecycle_mut(name)?.on_process_exited().await
    }

    /// Submit one console line to an entity; a no-op unless it is
    /// running.
    ///
    /// This method is instrumented with `tracing`.
    #[tracing::instrument(skip(self, line), fields(entity = %name))]
    pub async fn submit(&mut self, name: &str, line: &str) -> Result<()> {
        self.lifecycle_mut(name)?.submit(line).await
    }

    /// Get an entity's lifecycle status.
    ///
    /// This method is instrumented with `tracing`.
    #[tracing::instrument(skip(self), fields(entity = %name))]
    pub fn status(&self, name: &str) -> Result<Status> {
        tracing::debug!("Getting entity status");
        self.lifecycle(name).map(|l| l.state().status())
    }

    /// Get the observable state of an entity.
    pub fn state(&self, name: &str) -> Result<Arc<EntityState>> {
        self.lifecycle(name).map(|l| l.state())
    }

    /// Subscribe to an entity's field-change notifications.
    pub fn subscribe(&self, name: &str) -> Result<broadcast::Receiver<Field>> {
        self.lifecycle(name).map(|l| l.subscribe())
    }

    /// Get status for all configured entities.
    ///
    /// This method is instrumented with `tracing`.
    #[tracing::instrument(skip(self))]
    pub fn statuses(&self) -> HashMap<String, Status> {
        tracing::debug!("Getting status for all entities");
        let mut statuses = HashMap::new();

        for (name, lifecycle) in &self.lifecycles {
            let status = lifecycle.state().status();
            statuses.insert(name.clone(), status);
            tracing::trace!(entity = %name, status = ?status);
        }

        statuses
    }

    /// Terminate every entity that is not already stopped.
    ///
    /// Errors are collected; the first one is returned after all
    /// entities have been attempted.
    ///
    /// This method is instrumented with `tracing`.
    #[tracing::instrument(skip(self))]
    pub async fn terminate_all(&mut self) -> Result<()> {
        tracing::info!("Terminating all running entities");
        let names: Vec<String> = self.lifecycles.keys().cloned().collect();

        let mut errors = Vec::new();
        for name in names {
            let running = self
                .lifecycles
                .get(&name)
                .map(|l| l.state().status() != Status::Stopped)
                .unwrap_or(false);
            if !running {
                continue;
            }
            if let Err(e) = self.terminate(&name).await {
                tracing::error!(entity = %name, error = %e, "Failed to terminate entity");
                errors.push((name, e));
            }
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0).1),
            _ => {
                let error_msg = errors
                    .iter()
                    .map(|(name, e)| format!("{}: {}", name, e))
                    .collect::<Vec<_>>()
                    .join("; ");
                Err(Error::Other(format!(
                    "Multiple entities failed to terminate: {}",
                    error_msg
                )))
            }
        }
    }
}
