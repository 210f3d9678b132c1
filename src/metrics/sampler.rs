use crate::error::{Error, Result};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

/// Which resource signal a sampler reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// CPU usage percentage, per-core aggregated.
    Cpu,
    /// Resident memory in bytes.
    Memory,
    /// Disk usage percentage.
    Disk,
}

/// Generic periodic-sampling primitive.
///
/// [`start`](MetricSampler::start) spawns a background task that calls the
/// probe once per interval and delivers each successful sample to the
/// callback. A probe returning `None` is a transient failure — the
/// process may legitimately be mid-exit — so that tick's callback is
/// suppressed and the loop keeps going.
///
/// [`stop`](MetricSampler::stop) is the one synchronizing operation:
/// it requests cooperative cancellation and then awaits the task's join
/// handle, so no callback can fire after `stop` returns. Cancellation is
/// checked every loop iteration; the worst-case latency is one interval.
///
/// Starting a live sampler or stopping a stopped one is a caller bug and
/// is rejected loudly.
pub struct MetricSampler {
    kind: MetricKind,
    shutdown: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl MetricSampler {
    /// Create an idle sampler for `kind`.
    pub fn new(kind: MetricKind) -> Self {
        Self {
            kind,
            shutdown: None,
            task: None,
        }
    }

    /// The signal this sampler reads.
    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    /// Whether a sampling task is currently live.
    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Begin periodic sampling.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyRunning`] if the sampler is already live
    /// (double-start).
    pub fn start<P, F>(&mut self, mut probe: P, interval: Duration, mut on_sample: F) -> Result<()>
    where
        P: FnMut() -> Option<f64> + Send + 'static,
        F: FnMut(f64) + Send + 'static,
    {
        if self.task.is_some() {
            return Err(Error::AlreadyRunning);
        }

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let kind = self.kind;

        let task = tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::debug!(metric = ?kind, ?interval, "Sampler loop started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match probe() {
                            Some(value) => on_sample(value),
                            // Process exiting or already gone; try again
                            // next tick.
                            None => tracing::trace!(metric = ?kind, "Sample unavailable, skipping tick"),
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        break;
                    }
                }
            }

            tracing::debug!(metric = ?kind, "Sampler loop exited");
        });

        self.shutdown = Some(shutdown_tx);
        self.task = Some(task);
        Ok(())
    }

    /// Request cancellation and wait until the sampling loop has fully
    /// exited. No sample callback fires after this returns.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotRunning`] if the sampler is not live
    /// (double-stop), or [`Error::Process`] if the task panicked.
    pub async fn stop(&mut self) -> Result<()> {
        let shutdown = self.shutdown.take().ok_or(Error::NotRunning)?;
        let task = self.task.take().ok_or(Error::NotRunning)?;

        let _ = shutdown.send(true);
        task.await
            .map_err(|e| Error::Process(format!("{:?} sampler task failed: {}", self.kind, e)))?;

        Ok(())
    }
}
