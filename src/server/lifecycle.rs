use crate::console::ConsoleBridge;
use crate::entity::{EntityRegistry, EntityStore, SharedEntity};
use crate::error::{Error, Result};
use crate::metrics::{ResourceTrackerSet, TrackerConfig};
use crate::notify::{Field, FieldNotifier};
use crate::server::process::ServerProcess;
use crate::server::state::{EntityState, Status};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Lifecycle state machine for one supervised entity.
///
/// Owns the status, the derived readiness predicate, the resource
/// tracker set, and the console bridge; orchestrates transitions
/// triggered by download, import, and process events. Collaborators —
/// the persistence store and the entity registry — are injected at
/// construction, never reached through ambient global state.
///
/// Write-through persistence: the entity set is saved at the begin and
/// completion of both bulk operations, so a crash mid-download leaves
/// `initialized = false` on restart rather than a stale ready flag.
pub struct EntityLifecycle {
    state: Arc<EntityState>,
    notifier: FieldNotifier,
    trackers: ResourceTrackerSet,
    bridge: ConsoleBridge,
    process: Option<ServerProcess>,
    store: Arc<dyn EntityStore>,
    registry: Arc<EntityRegistry>,
}

impl EntityLifecycle {
    /// Create a stopped lifecycle for `entity`.
    pub fn new(
        entity: SharedEntity,
        store: Arc<dyn EntityStore>,
        registry: Arc<EntityRegistry>,
        tracker_config: TrackerConfig,
    ) -> Self {
        Self {
            state: Arc::new(EntityState::new(entity)),
            notifier: FieldNotifier::default(),
            trackers: ResourceTrackerSet::new(tracker_config),
            bridge: ConsoleBridge::new(),
            process: None,
            store,
            registry,
        }
    }

    /// Observable state of this entity.
    pub fn state(&self) -> Arc<EntityState> {
        Arc::clone(&self.state)
    }

    /// Subscribe to field-change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<Field> {
        self.notifier.subscribe()
    }

    fn entity_name(&self) -> String {
        self.state
            .entity()
            .read()
            .map(|e| e.name.clone())
            .unwrap_or_default()
    }

    fn persist(&self) -> Result<()> {
        self.store.save(&self.registry.snapshot())
    }

    // --- download triad ---

    /// Begin a fresh artifact download.
    ///
    /// Illegal when the entity is already initialized and ready: a live
    /// artifact must not be clobbered silently. Clears the initialized
    /// and download-completed flags and persists immediately.
    pub fn begin_download(&mut self) -> Result<()> {
        if self.state.ready_to_use() {
            return Err(Error::AlreadyInitialized(self.entity_name()));
        }

        if let Ok(mut entity) = self.state.entity().write() {
            entity.initialized = false;
        }
        self.state.with_download(|p| p.begin());
        self.persist()?;

        tracing::info!(entity = %self.entity_name(), "Starting artifact download");
        self.notifier.send(Field::DownloadProgress);
        self.notifier.send(Field::ReadyToUse);
        Ok(())
    }

    /// Raw download progress callback. A zero total retains the previous
    /// percentage rather than corrupting the displayed value.
    pub fn on_download_progress(&mut self, bytes_received: u64, bytes_total: u64) {
        self.state
            .with_download(|p| p.update(bytes_received, bytes_total));
        self.notifier.send(Field::DownloadProgress);
    }

    /// Final download callback: the entity is now initialized.
    pub fn on_download_completed(&mut self) -> Result<()> {
        self.state.with_download(|p| p.complete());
        if let Ok(mut entity) = self.state.entity().write() {
            entity.initialized = true;
        }
        self.persist()?;

        tracing::info!(entity = %self.entity_name(), "Finished artifact download");
        self.notifier.send(Field::DownloadProgress);
        self.notifier.send(Field::ReadyToUse);
        Ok(())
    }

    // --- import triad ---

    /// Begin a data import.
    pub fn begin_import(&mut self) -> Result<()> {
        self.state.with_import(|p| p.begin());
        self.persist()?;

        tracing::info!(entity = %self.entity_name(), "Starting data import");
        self.notifier.send(Field::CopyProgress);
        self.notifier.send(Field::ReadyToUse);
        Ok(())
    }

    /// Raw import progress callback, zero-total guarded like download.
    pub fn on_import_progress(&mut self, files_copied: u64, files_total: u64) {
        self.state
            .with_import(|p| p.update(files_copied, files_total));
        self.notifier.send(Field::CopyProgress);
    }

    /// Final import callback.
    pub fn on_import_completed(&mut self) -> Result<()> {
        self.state.with_import(|p| p.complete());
        self.persist()?;

        tracing::info!(entity = %self.entity_name(), "Finished data import");
        self.notifier.send(Field::CopyProgress);
        self.notifier.send(Field::ReadyToUse);
        Ok(())
    }

    // --- process session ---

    /// Attach a spawned process handle and enter `Starting`.
    ///
    /// Legal only from `Stopped`. Begins a new supervision session: the
    /// console log is replaced, metric values are zeroed, and the console
    /// bridge is wired to the fresh pipes.
    pub fn launch(&mut self, mut process: ServerProcess) -> Result<()> {
        let status = self.state.status();
        if status != Status::Stopped {
            return Err(Error::IllegalTransition {
                from: status,
                action: "launch",
            });
        }

        let stdin = process.take_stdin()?;
        let stdout = process.take_stdout()?;

        self.state.reset_session();
        self.notifier.send(Field::ConsoleLog);

        self.bridge
            .attach(stdin, stdout, Arc::clone(&self.state), self.notifier.clone());
        self.process = Some(process);

        self.state.set_status(Status::Starting);
        self.notifier.send(Field::Status);
        tracing::info!(entity = %self.entity_name(), "Entity starting");
        Ok(())
    }

    /// External readiness signal: the process reported it is up.
    ///
    /// Legal only from `Starting`. Enters `Running` and attaches the
    /// resource trackers exactly once for this session.
    pub async fn on_process_ready(&mut self) -> Result<()> {
        let status = self.state.status();
        if status != Status::Starting {
            return Err(Error::IllegalTransition {
                from: status,
                action: "mark ready",
            });
        }

        let pid = self
            .process
            .as_ref()
            .and_then(|p| p.pid())
            .ok_or_else(|| Error::Process("No live process handle".to_string()))?;

        self.state.set_status(Status::Running);
        self.notifier.send(Field::Status);
        tracing::info!(entity = %self.entity_name(), pid, "Entity running");

        self.trackers
            .attach(pid, Arc::clone(&self.state), &self.notifier)
            .await?;
        Ok(())
    }

    /// Stop the supervision session.
    ///
    /// Legal from `Starting` or `Running`. All samplers are stopped with
    /// a blocking stop *before* the status becomes `Stopped`, so no
    /// sampler outlives its process session.
    pub async fn terminate(&mut self) -> Result<()> {
        let status = self.state.status();
        if status == Status::Stopped {
            return Err(Error::IllegalTransition {
                from: status,
                action: "terminate",
            });
        }

        self.trackers.detach().await?;
        self.bridge.close().await;

        if let Some(mut process) = self.process.take() {
            process.stop().await?;
        }

        self.state.set_status(Status::Stopped);
        self.notifier.send(Field::Status);
        tracing::info!(entity = %self.entity_name(), "Entity stopped");
        Ok(())
    }

    /// External exit callback: the process died on its own.
    ///
    /// Tears down the session like [`terminate`](Self::terminate) but
    /// without killing; a late signal for an already-stopped entity is
    /// ignored.
    pub async fn on_process_exited(&mut self) -> Result<()> {
        if self.state.status() == Status::Stopped {
            return Ok(());
        }

        self.trackers.detach().await?;
        self.bridge.close().await;
        self.process = None;

        self.state.set_status(Status::Stopped);
        self.notifier.send(Field::Status);
        tracing::info!(entity = %self.entity_name(), "Server process exited");
        Ok(())
    }

    /// Forward one operator line to the process console; a no-op unless
    /// the entity is running.
    pub async fn submit(&mut self, line: &str) -> Result<()> {
        self.bridge.submit(line).await
    }
}
