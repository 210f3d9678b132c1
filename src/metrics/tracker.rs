use crate::error::Result;
use crate::metrics::probe;
use crate::metrics::sampler::{MetricKind, MetricSampler};
use crate::notify::{Field, FieldNotifier};
use crate::server::EntityState;
use std::sync::Arc;
use std::time::Duration;

/// Sampling intervals for the three resource trackers.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// CPU sampling interval.
    pub cpu_interval: Duration,
    /// Memory sampling interval.
    pub mem_interval: Duration,
    /// Disk sampling interval. Disk usage moves slowly, so this defaults
    /// to a coarser cadence than the per-process signals.
    pub disk_interval: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            cpu_interval: Duration::from_secs(1),
            mem_interval: Duration::from_secs(1),
            disk_interval: Duration::from_secs(10),
        }
    }
}

/// The set of three metric samplers attached to one supervised process.
///
/// [`attach`](ResourceTrackerSet::attach) replaces whichever samplers are
/// currently live with three fresh ones bound to the new pid. The
/// replacement sequence is always stop-all-then-start-all, awaiting each
/// stop: a stale sampler delivering a reading from a dead process after a
/// restart would silently attribute it to the new process, so at most one
/// generation of samplers is ever live.
///
/// Each sampler's callback writes exactly one state field and announces
/// that field (memory additionally announces its derived percentage,
/// which is recomputed on read against the entity's current limit).
pub struct ResourceTrackerSet {
    cpu: MetricSampler,
    mem: MetricSampler,
    disk: MetricSampler,
    config: TrackerConfig,
}

impl ResourceTrackerSet {
    /// Create an idle tracker set.
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            cpu: MetricSampler::new(MetricKind::Cpu),
            mem: MetricSampler::new(MetricKind::Memory),
            disk: MetricSampler::new(MetricKind::Disk),
            config,
        }
    }

    /// Whether any sampler is currently live.
    pub fn is_attached(&self) -> bool {
        self.cpu.is_running() || self.mem.is_running() || self.disk.is_running()
    }

    /// Attach three fresh samplers to `pid`, first stopping any live
    /// previous generation completely.
    pub async fn attach(
        &mut self,
        pid: u32,
        state: Arc<EntityState>,
        notifier: &FieldNotifier,
    ) -> Result<()> {
        self.detach().await?;

        tracing::debug!(pid, "Attaching resource trackers");

        {
            let state = Arc::clone(&state);
            let notifier = notifier.clone();
            self.cpu
                .start(probe::cpu(pid), self.config.cpu_interval, move |value| {
                    state.set_cpu_raw(value);
                    notifier.send(Field::CpuPercent);
                })?;
        }

        {
            let state = Arc::clone(&state);
            let notifier = notifier.clone();
            self.mem
                .start(probe::memory(pid), self.config.mem_interval, move |value| {
                    state.set_mem_raw(value);
                    notifier.send(Field::MemBytes);
                    notifier.send(Field::MemPercent);
                })?;
        }

        {
            let notifier = notifier.clone();
            self.disk
                .start(probe::disk(), self.config.disk_interval, move |value| {
                    state.set_disk_raw(value);
                    notifier.send(Field::DiskPercent);
                })?;
        }

        Ok(())
    }

    /// Stop all live samplers, awaiting each loop's exit.
    ///
    /// Idle samplers are skipped: detaching is part of the idempotent
    /// replacement sequence, unlike an explicit double-stop on a single
    /// sampler which is rejected at the [`MetricSampler`] level.
    pub async fn detach(&mut self) -> Result<()> {
        for sampler in [&mut self.cpu, &mut self.mem, &mut self.disk] {
            if sampler.is_running() {
                sampler.stop().await?;
            }
        }
        Ok(())
    }
}
