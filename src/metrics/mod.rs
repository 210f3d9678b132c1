//! Resource telemetry for a supervised process.
//!
//! A [`MetricSampler`] is the generic periodic-sampling primitive: it
//! runs one background task that reads a single numeric signal at a
//! fixed interval and hands it to a callback. The three instantiations
//! (CPU, memory, disk) differ only in the probe function they are given;
//! the probes live in [`probe`] and the per-process set of three
//! samplers is owned by [`ResourceTrackerSet`].

pub mod probe;
pub mod sampler;
pub mod tracker;

pub use sampler::{MetricKind, MetricSampler};
pub use tracker::{ResourceTrackerSet, TrackerConfig};
