//! Named-field change notification.
//!
//! Observers do not poll the supervised state; they subscribe to a
//! channel of field identifiers and re-read the field that changed.
//! Exactly one notification is sent per logical change — in particular
//! one per appended console line, never one per byte, so high-throughput
//! server logging cannot starve a consumer's update queue.

use tokio::sync::broadcast;

/// Identifier of an observable field on the supervised state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// Lifecycle status (and the derived server-running flag).
    Status,
    /// Raw CPU percentage, per-core aggregated.
    CpuPercent,
    /// Raw memory consumption in bytes.
    MemBytes,
    /// Memory as a percentage of the entity's limit (derived on read).
    MemPercent,
    /// Disk usage percentage.
    DiskPercent,
    /// Artifact download progress percentage.
    DownloadProgress,
    /// Data import progress percentage.
    CopyProgress,
    /// Derived readiness flag (initialized && import completed).
    ReadyToUse,
    /// The console output log gained a line (or was reset).
    ConsoleLog,
}

/// Broadcast sender for field-change notifications.
///
/// Cloning is cheap; every writer task holds a clone. Sending with no
/// live subscribers is not an error — observers are optional.
#[derive(Clone)]
pub struct FieldNotifier {
    tx: broadcast::Sender<Field>,
}

impl FieldNotifier {
    /// Create a notifier with the given channel capacity.
    ///
    /// A lagging subscriber loses the oldest notifications, which is safe
    /// here: the message only names the field, so re-reading it after a
    /// lag yields the current value anyway.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to field changes.
    pub fn subscribe(&self) -> broadcast::Receiver<Field> {
        self.tx.subscribe()
    }

    /// Announce that `field` changed.
    pub fn send(&self, field: Field) {
        let _ = self.tx.send(field);
    }
}

impl Default for FieldNotifier {
    fn default() -> Self {
        Self::new(256)
    }
}
