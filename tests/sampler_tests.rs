use server_keeper::entity::{EntityRegistry, ManagedEntity, ServerFlavor};
use server_keeper::error::{Error, Result};
use server_keeper::metrics::{MetricKind, MetricSampler, ResourceTrackerSet, TrackerConfig};
use server_keeper::notify::FieldNotifier;
use server_keeper::server::EntityState;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::time::sleep;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn counting_probe(counter: Arc<AtomicUsize>) -> impl FnMut() -> Option<f64> + Send + 'static {
    move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Some(1.0)
    }
}

#[tokio::test]
async fn test_sampler_delivers_samples() -> Result<()> {
    init_tracing();
    let mut sampler = MetricSampler::new(MetricKind::Cpu);
    let probes = Arc::new(AtomicUsize::new(0));
    let samples = Arc::new(AtomicUsize::new(0));

    let samples_in_cb = Arc::clone(&samples);
    sampler.start(
        counting_probe(Arc::clone(&probes)),
        Duration::from_millis(20),
        move |value| {
            assert_eq!(value, 1.0);
            samples_in_cb.fetch_add(1, Ordering::SeqCst);
        },
    )?;
    assert!(sampler.is_running());

    sleep(Duration::from_millis(120)).await;
    sampler.stop().await?;
    assert!(!sampler.is_running());

    assert!(samples.load(Ordering::SeqCst) >= 2);
    assert_eq!(samples.load(Ordering::SeqCst), probes.load(Ordering::SeqCst));
    Ok(())
}

#[tokio::test]
async fn test_no_callback_after_stop_returns() -> Result<()> {
    init_tracing();
    let mut sampler = MetricSampler::new(MetricKind::Memory);
    let samples = Arc::new(AtomicUsize::new(0));

    let samples_in_cb = Arc::clone(&samples);
    sampler.start(
        || Some(42.0),
        Duration::from_millis(10),
        move |_| {
            samples_in_cb.fetch_add(1, Ordering::SeqCst);
        },
    )?;

    sleep(Duration::from_millis(50)).await;
    sampler.stop().await?;

    let frozen = samples.load(Ordering::SeqCst);
    sleep(Duration::from_millis(80)).await;
    assert_eq!(samples.load(Ordering::SeqCst), frozen);
    Ok(())
}

#[tokio::test]
async fn test_double_start_is_rejected() -> Result<()> {
    let mut sampler = MetricSampler::new(MetricKind::Disk);
    sampler.start(|| Some(0.0), Duration::from_millis(50), |_| {})?;

    let result = sampler.start(|| Some(0.0), Duration::from_millis(50), |_| {});
    assert!(matches!(result, Err(Error::AlreadyRunning)));

    sampler.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_double_stop_is_rejected() -> Result<()> {
    let mut sampler = MetricSampler::new(MetricKind::Cpu);

    // Stop before any start is just as illegal.
    assert!(matches!(sampler.stop().await, Err(Error::NotRunning)));

    sampler.start(|| Some(0.0), Duration::from_millis(10), |_| {})?;
    sampler.stop().await?;
    assert!(matches!(sampler.stop().await, Err(Error::NotRunning)));
    Ok(())
}

#[tokio::test]
async fn test_probe_failure_suppresses_tick_but_keeps_sampling() -> Result<()> {
    init_tracing();
    let mut sampler = MetricSampler::new(MetricKind::Cpu);
    let probes = Arc::new(AtomicUsize::new(0));
    let samples = Arc::new(AtomicUsize::new(0));

    // Fails every other tick, like a process mid-exit flapping in and
    // out of visibility.
    let probes_in_probe = Arc::clone(&probes);
    let samples_in_cb = Arc::clone(&samples);
    sampler.start(
        move || {
            let n = probes_in_probe.fetch_add(1, Ordering::SeqCst);
            if n % 2 == 0 { None } else { Some(7.0) }
        },
        Duration::from_millis(10),
        move |_| {
            samples_in_cb.fetch_add(1, Ordering::SeqCst);
        },
    )?;

    sleep(Duration::from_millis(100)).await;
    assert!(sampler.is_running());
    sampler.stop().await?;

    let probed = probes.load(Ordering::SeqCst);
    let sampled = samples.load(Ordering::SeqCst);
    assert!(probed >= 4);
    assert!(sampled < probed);
    assert!(sampled >= 1);
    Ok(())
}

fn test_state() -> Arc<EntityState> {
    let registry = EntityRegistry::new();
    let shared = registry.insert(ManagedEntity::new(
        "sampled",
        64 * 1024 * 1024,
        ServerFlavor::Vanilla,
    ));
    Arc::new(EntityState::new(shared))
}

fn fast_config() -> TrackerConfig {
    TrackerConfig {
        cpu_interval: Duration::from_millis(20),
        mem_interval: Duration::from_millis(20),
        disk_interval: Duration::from_millis(20),
    }
}

#[tokio::test]
async fn test_tracker_set_attach_and_detach() -> Result<()> {
    init_tracing();
    let mut trackers = ResourceTrackerSet::new(fast_config());
    let state = test_state();
    let notifier = FieldNotifier::default();

    assert!(!trackers.is_attached());

    // Sample our own test process; it is certainly alive.
    let pid = std::process::id();
    trackers.attach(pid, Arc::clone(&state), &notifier).await?;
    assert!(trackers.is_attached());

    sleep(Duration::from_millis(100)).await;
    // Memory of a live process is never zero once sampled.
    assert!(state.mem_raw_bytes() > 0.0);

    trackers.detach().await?;
    assert!(!trackers.is_attached());
    Ok(())
}

#[tokio::test]
async fn test_tracker_replacement_never_overlaps_generations() -> Result<()> {
    init_tracing();
    let mut trackers = ResourceTrackerSet::new(fast_config());
    let state = test_state();
    let notifier = FieldNotifier::default();
    let pid = std::process::id();

    // Repeated attach calls are an idempotent stop-then-start
    // replacement; each must fully retire the previous generation.
    trackers.attach(pid, Arc::clone(&state), &notifier).await?;
    trackers.attach(pid, Arc::clone(&state), &notifier).await?;
    trackers.attach(pid, Arc::clone(&state), &notifier).await?;
    assert!(trackers.is_attached());

    trackers.detach().await?;

    // After detach returns, no sampler may deliver again: drain the
    // notification channel, wait several intervals, and expect silence.
    let mut rx = notifier.subscribe();
    while rx.try_recv().is_ok() {}
    sleep(Duration::from_millis(120)).await;
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    Ok(())
}
