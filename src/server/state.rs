use crate::entity::SharedEntity;
use crate::progress::ProgressState;
use std::sync::Mutex;

/// Lifecycle status of a supervised entity.
///
/// Exactly one value holds at any time. `Starting` is the only state
/// from which `Running` or `Stopped` may be entered; `Running` requires
/// a live process handle; `Stopped` is both the initial state and the
/// terminal state of each supervision session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// No supervision session is active.
    Stopped,
    /// A process handle is attached and awaiting the readiness signal.
    Starting,
    /// The server process is live and tracked.
    Running,
}

/// Observable state of one supervised entity.
///
/// Every field has exactly one writer task (a sampler, the console
/// reader, or the lifecycle itself); observers only read. Derived values
/// — the running flag, readiness, the memory percentage, the display
/// strings — are never stored: they are recomputed from their inputs on
/// every read, so they cannot drift.
pub struct EntityState {
    entity: SharedEntity,
    status: Mutex<Status>,
    cpu_raw: Mutex<f64>,
    mem_raw: Mutex<f64>,
    disk_raw: Mutex<f64>,
    download: Mutex<ProgressState>,
    import: Mutex<ProgressState>,
    console_log: Mutex<Vec<String>>,
}

impl EntityState {
    /// Create the state for `entity`, stopped, with a vacuously complete
    /// import (an entity with nothing to import is importable-ready).
    pub fn new(entity: SharedEntity) -> Self {
        Self {
            entity,
            status: Mutex::new(Status::Stopped),
            cpu_raw: Mutex::new(0.0),
            mem_raw: Mutex::new(0.0),
            disk_raw: Mutex::new(0.0),
            download: Mutex::new(ProgressState::new()),
            import: Mutex::new(ProgressState::idle_complete()),
            console_log: Mutex::new(Vec::new()),
        }
    }

    /// Shared handle to the underlying entity.
    pub fn entity(&self) -> SharedEntity {
        SharedEntity::clone(&self.entity)
    }

    /// Current lifecycle status.
    pub fn status(&self) -> Status {
        self.status.lock().map(|s| *s).unwrap_or(Status::Stopped)
    }

    pub(crate) fn set_status(&self, status: Status) {
        if let Ok(mut guard) = self.status.lock() {
            *guard = status;
        }
    }

    /// Derived: whether the server process is live (`status == Running`).
    pub fn server_running(&self) -> bool {
        self.status() == Status::Running
    }

    /// Raw CPU percentage, per-core aggregated. May transiently exceed
    /// 100 on multi-core hosts; delivered unclamped.
    pub fn cpu_raw(&self) -> f64 {
        lock_f64(&self.cpu_raw)
    }

    pub(crate) fn set_cpu_raw(&self, value: f64) {
        store_f64(&self.cpu_raw, value);
    }

    /// Raw memory consumption in bytes.
    pub fn mem_raw_bytes(&self) -> f64 {
        lock_f64(&self.mem_raw)
    }

    pub(crate) fn set_mem_raw(&self, value: f64) {
        store_f64(&self.mem_raw, value);
    }

    /// Raw disk usage percentage.
    pub fn disk_raw(&self) -> f64 {
        lock_f64(&self.disk_raw)
    }

    pub(crate) fn set_disk_raw(&self, value: f64) {
        store_f64(&self.disk_raw, value);
    }

    /// Derived: memory as a percentage of the entity's limit, recomputed
    /// on every read so a changed limit takes effect on the next read
    /// without restarting the sampler.
    pub fn mem_percent(&self) -> f64 {
        let max_memory = self
            .entity
            .read()
            .map(|e| e.max_memory)
            .unwrap_or(0);
        if max_memory == 0 {
            return 0.0;
        }
        self.mem_raw_bytes() / max_memory as f64 * 100.0
    }

    /// CPU percentage formatted for display.
    pub fn cpu_display(&self) -> String {
        format!("{}%", self.cpu_raw().round())
    }

    /// Memory percentage formatted for display.
    pub fn mem_display(&self) -> String {
        format!("{}%", self.mem_percent().round())
    }

    /// Disk percentage formatted for display.
    pub fn disk_display(&self) -> String {
        format!("{}%", self.disk_raw().round())
    }

    /// Snapshot of the download progress state.
    pub fn download(&self) -> ProgressState {
        self.download
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    /// Download progress percentage, unrounded.
    pub fn download_progress(&self) -> f64 {
        self.download().percent
    }

    pub(crate) fn with_download<R>(&self, f: impl FnOnce(&mut ProgressState) -> R) -> Option<R> {
        self.download.lock().ok().map(|mut guard| f(&mut guard))
    }

    /// Snapshot of the import progress state.
    pub fn import(&self) -> ProgressState {
        self.import.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// Import (copy) progress percentage, unrounded.
    pub fn copy_progress(&self) -> f64 {
        self.import().percent
    }

    pub(crate) fn with_import<R>(&self, f: impl FnOnce(&mut ProgressState) -> R) -> Option<R> {
        self.import.lock().ok().map(|mut guard| f(&mut guard))
    }

    /// Derived readiness predicate: the artifact has been downloaded and
    /// the data import has finished. Never stored independently of its
    /// inputs.
    pub fn ready_to_use(&self) -> bool {
        let initialized = self
            .entity
            .read()
            .map(|e| e.initialized)
            .unwrap_or(false);
        initialized && self.import().completed
    }

    /// Ordered snapshot of the console output log for the current
    /// session.
    pub fn console_log(&self) -> Vec<String> {
        self.console_log
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    pub(crate) fn push_console_line(&self, line: String) {
        if let Ok(mut log) = self.console_log.lock() {
            log.push(line);
        }
    }

    /// Reset the per-session fields for a new supervision session: the
    /// console log is replaced and the metric values zeroed. Progress
    /// state is reset by its own `begin_*` operations, not here.
    pub(crate) fn reset_session(&self) {
        if let Ok(mut log) = self.console_log.lock() {
            log.clear();
        }
        store_f64(&self.cpu_raw, 0.0);
        store_f64(&self.mem_raw, 0.0);
        store_f64(&self.disk_raw, 0.0);
    }
}

fn lock_f64(cell: &Mutex<f64>) -> f64 {
    cell.lock().map(|v| *v).unwrap_or(0.0)
}

fn store_f64(cell: &Mutex<f64>, value: f64) {
    if let Ok(mut guard) = cell.lock() {
        *guard = value;
    }
}
