//! OS sampling functions backing the three metric samplers.
//!
//! Each constructor returns an `FnMut() -> Option<f64>` closure keeping
//! its own `sysinfo` handle alive across ticks — CPU percentages are
//! deltas between successive refreshes, so the `System` must persist.
//! `None` means the sample is unavailable this tick (process exited or
//! not yet visible), never a fatal condition.

use sysinfo::{Disks, Pid, ProcessesToUpdate, System};

/// CPU usage probe for one process.
///
/// The value is the raw per-core-aggregated percentage reported by the
/// OS and may transiently exceed 100 on multi-core hosts. It is
/// delivered unclamped to preserve signal fidelity.
pub fn cpu(pid: u32) -> impl FnMut() -> Option<f64> + Send + 'static {
    let mut system = System::new();
    let pid = Pid::from_u32(pid);
    move || {
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        system.process(pid).map(|p| p.cpu_usage() as f64)
    }
}

/// Resident memory probe for one process, in raw bytes.
///
/// Normalization against the entity's memory limit happens at the
/// presentation boundary, not here, so a changed limit takes effect on
/// the very next read without restarting the sampler.
pub fn memory(pid: u32) -> impl FnMut() -> Option<f64> + Send + 'static {
    let mut system = System::new();
    let pid = Pid::from_u32(pid);
    move || {
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        system.process(pid).map(|p| p.memory() as f64)
    }
}

/// Disk usage probe, as the used percentage across all mounted disks.
pub fn disk() -> impl FnMut() -> Option<f64> + Send + 'static {
    move || {
        let disks = Disks::new_with_refreshed_list();
        let (total, available) = disks
            .iter()
            .fold((0u64, 0u64), |(total, available), disk| {
                (total + disk.total_space(), available + disk.available_space())
            });
        if total == 0 {
            None
        } else {
            Some((total - available) as f64 / total as f64 * 100.0)
        }
    }
}
