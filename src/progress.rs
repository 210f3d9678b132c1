//! Progress aggregation for long-running bulk operations.
//!
//! Downloads and imports report raw `(completed, total)` counters; this
//! module normalizes them into percentages and owns the completion flags
//! that gate entity readiness. No rounding happens here — the percentages
//! are raw fractional values and formatting for display is a
//! presentation concern.

/// Convert raw counters into a percentage, guarded against a zero total.
///
/// A degenerate report with `total == 0` retains `previous` instead of
/// corrupting the displayed value with a division by zero.
pub fn percent(completed: u64, total: u64, previous: f64) -> f64 {
    if total == 0 {
        previous
    } else {
        completed as f64 / total as f64 * 100.0
    }
}

/// State of one asynchronous bulk operation (download or import).
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressState {
    /// Units reported completed so far. Monotonically non-decreasing
    /// within one operation instance; regressing reports are dropped.
    pub units_completed: u64,
    /// Total units last reported by the operation.
    pub units_total: u64,
    /// Normalized progress percentage, unrounded.
    pub percent: f64,
    /// True only after the operation's final callback.
    pub completed: bool,
}

impl ProgressState {
    /// A fresh, not-yet-started operation.
    pub fn new() -> Self {
        Self {
            units_completed: 0,
            units_total: 0,
            percent: 0.0,
            completed: false,
        }
    }

    /// An operation that is vacuously complete (nothing to do). Used as
    /// the initial import state: an entity with no pending import is
    /// importable-ready.
    pub fn idle_complete() -> Self {
        Self {
            completed: true,
            ..Self::new()
        }
    }

    /// Reset for a new operation instance.
    pub fn begin(&mut self) {
        *self = Self::new();
    }

    /// Apply a raw progress report.
    pub fn update(&mut self, completed: u64, total: u64) {
        if completed < self.units_completed {
            return;
        }
        self.percent = percent(completed, total, self.percent);
        if total > 0 {
            self.units_completed = completed;
            self.units_total = total;
        }
    }

    /// Mark the operation finished.
    pub fn complete(&mut self) {
        self.completed = true;
    }
}

impl Default for ProgressState {
    fn default() -> Self {
        Self::new()
    }
}
