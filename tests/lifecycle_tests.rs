use server_keeper::config::EntityConfig;
use server_keeper::entity::{
    EntityRegistry, EntityStore, ManagedEntity, ServerFlavor, SharedEntity,
};
use server_keeper::error::{Error, Result};
use server_keeper::metrics::TrackerConfig;
use server_keeper::server::{EntityLifecycle, ServerProcess, Status};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Test double recording every write-through save.
struct RecordingStore {
    saves: Mutex<Vec<Vec<ManagedEntity>>>,
}

impl RecordingStore {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            saves: Mutex::new(Vec::new()),
        })
    }

    fn save_count(&self) -> usize {
        self.saves.lock().unwrap().len()
    }

    fn last_save(&self) -> Option<Vec<ManagedEntity>> {
        self.saves.lock().unwrap().last().cloned()
    }
}

impl EntityStore for RecordingStore {
    fn save(&self, entities: &[ManagedEntity]) -> Result<()> {
        self.saves.lock().unwrap().push(entities.to_vec());
        Ok(())
    }
}

fn make_lifecycle(store: Arc<dyn EntityStore>) -> (EntityLifecycle, SharedEntity) {
    let registry = Arc::new(EntityRegistry::new());
    let shared = registry.insert(ManagedEntity::new(
        "test",
        64 * 1024 * 1024,
        ServerFlavor::Vanilla,
    ));
    let lifecycle = EntityLifecycle::new(
        Arc::clone(&shared),
        store,
        registry,
        TrackerConfig {
            cpu_interval: Duration::from_millis(50),
            mem_interval: Duration::from_millis(50),
            disk_interval: Duration::from_millis(50),
        },
    );
    (lifecycle, shared)
}

/// `cat` echoes console input back and runs until its stdin closes,
/// which makes it a convenient stand-in for a server process.
fn cat_config() -> EntityConfig {
    EntityConfig {
        command: "cat".to_string(),
        args: Vec::new(),
        env: HashMap::new(),
        max_memory_mb: 64,
        flavor: ServerFlavor::Vanilla,
    }
}

fn spawn_cat() -> Result<ServerProcess> {
    let mut process = ServerProcess::new("test".to_string(), cat_config());
    process.start()?;
    Ok(process)
}

#[tokio::test]
async fn test_download_triad_with_write_through_persistence() -> Result<()> {
    init_tracing();
    let store = RecordingStore::new();
    let (mut lifecycle, entity) = make_lifecycle(store.clone());
    let state = lifecycle.state();

    lifecycle.begin_download()?;
    assert_eq!(store.save_count(), 1);
    // Write-through: a crash now must find initialized = false on disk.
    let saved = store.last_save().unwrap();
    assert!(!saved[0].initialized);
    assert!(!state.ready_to_use());

    lifecycle.on_download_progress(50, 100);
    assert_eq!(state.download_progress(), 50.0);

    // Degenerate total: previous percentage is retained.
    lifecycle.on_download_progress(5, 0);
    assert_eq!(state.download_progress(), 50.0);

    lifecycle.on_download_completed()?;
    assert_eq!(store.save_count(), 2);
    let saved = store.last_save().unwrap();
    assert!(saved[0].initialized);
    assert!(entity.read().unwrap().initialized);
    // Import is vacuously complete, so the entity is now ready.
    assert!(state.ready_to_use());
    Ok(())
}

#[tokio::test]
async fn test_begin_download_rejected_when_already_ready() -> Result<()> {
    let store = RecordingStore::new();
    let (mut lifecycle, _entity) = make_lifecycle(store);

    lifecycle.begin_download()?;
    lifecycle.on_download_completed()?;

    let result = lifecycle.begin_download();
    assert!(matches!(result, Err(Error::AlreadyInitialized(_))));
    Ok(())
}

#[tokio::test]
async fn test_import_triad_gates_readiness() -> Result<()> {
    let store = RecordingStore::new();
    let (mut lifecycle, _entity) = make_lifecycle(store.clone());
    let state = lifecycle.state();

    lifecycle.begin_download()?;
    lifecycle.on_download_completed()?;
    assert!(state.ready_to_use());

    lifecycle.begin_import()?;
    assert!(!state.ready_to_use());
    assert_eq!(store.save_count(), 3);

    lifecycle.on_import_progress(3, 10);
    assert_eq!(state.copy_progress(), 30.0);
    lifecycle.on_import_progress(7, 0);
    assert_eq!(state.copy_progress(), 30.0);

    lifecycle.on_import_completed()?;
    assert_eq!(store.save_count(), 4);
    assert!(state.ready_to_use());
    Ok(())
}

#[tokio::test]
async fn test_ready_to_use_equals_conjunction_across_interleavings() -> Result<()> {
    let store = RecordingStore::new();
    let (mut lifecycle, entity) = make_lifecycle(store);
    let state = lifecycle.state();

    let check = |state: &server_keeper::EntityState, entity: &SharedEntity| {
        let initialized = entity.read().unwrap().initialized;
        let import_completed = state.import().completed;
        assert_eq!(state.ready_to_use(), initialized && import_completed);
    };

    check(&state, &entity);
    lifecycle.begin_import()?;
    check(&state, &entity);
    lifecycle.begin_download()?;
    check(&state, &entity);
    lifecycle.on_download_completed()?;
    check(&state, &entity);
    lifecycle.on_import_completed()?;
    check(&state, &entity);
    assert!(state.ready_to_use());
    Ok(())
}

#[tokio::test]
async fn test_state_machine_visits_exactly_the_expected_states() -> Result<()> {
    init_tracing();
    let store = RecordingStore::new();
    let (mut lifecycle, _entity) = make_lifecycle(store);
    let state = lifecycle.state();

    lifecycle.begin_download()?;
    lifecycle.on_download_completed()?;

    assert_eq!(state.status(), Status::Stopped);
    assert!(!state.server_running());

    lifecycle.launch(spawn_cat()?)?;
    assert_eq!(state.status(), Status::Starting);
    assert!(!state.server_running());

    // Launch while Starting is an illegal transition.
    let result = lifecycle.launch(spawn_cat()?);
    assert!(matches!(
        result,
        Err(Error::IllegalTransition {
            from: Status::Starting,
            ..
        })
    ));

    lifecycle.on_process_ready().await?;
    assert_eq!(state.status(), Status::Running);
    assert!(state.server_running());

    // Launch while Running is illegal too, as is a second ready signal.
    let result = lifecycle.launch(spawn_cat()?);
    assert!(matches!(
        result,
        Err(Error::IllegalTransition {
            from: Status::Running,
            ..
        })
    ));
    assert!(matches!(
        lifecycle.on_process_ready().await,
        Err(Error::IllegalTransition { .. })
    ));

    lifecycle.terminate().await?;
    assert_eq!(state.status(), Status::Stopped);

    // Terminate on a stopped entity fails loudly.
    assert!(matches!(
        lifecycle.terminate().await,
        Err(Error::IllegalTransition {
            from: Status::Stopped,
            ..
        })
    ));
    Ok(())
}

#[tokio::test]
async fn test_running_session_samples_real_process() -> Result<()> {
    init_tracing();
    let store = RecordingStore::new();
    let (mut lifecycle, _entity) = make_lifecycle(store);
    let state = lifecycle.state();

    lifecycle.begin_download()?;
    lifecycle.on_download_completed()?;

    lifecycle.launch(spawn_cat()?)?;
    lifecycle.on_process_ready().await?;

    sleep(Duration::from_millis(200)).await;
    assert!(state.mem_raw_bytes() > 0.0);
    assert!(state.mem_percent() > 0.0);

    lifecycle.terminate().await?;
    Ok(())
}

#[tokio::test]
async fn test_process_exit_tears_down_session() -> Result<()> {
    init_tracing();
    let store = RecordingStore::new();
    let (mut lifecycle, _entity) = make_lifecycle(store);
    let state = lifecycle.state();

    lifecycle.begin_download()?;
    lifecycle.on_download_completed()?;

    lifecycle.launch(spawn_cat()?)?;
    lifecycle.on_process_ready().await?;

    lifecycle.on_process_exited().await?;
    assert_eq!(state.status(), Status::Stopped);

    // A late exit signal for an already-stopped entity is ignored.
    lifecycle.on_process_exited().await?;
    assert_eq!(state.status(), Status::Stopped);
    Ok(())
}

#[tokio::test]
async fn test_new_session_resets_console_log() -> Result<()> {
    init_tracing();
    let store = RecordingStore::new();
    let (mut lifecycle, _entity) = make_lifecycle(store);
    let state = lifecycle.state();

    lifecycle.begin_download()?;
    lifecycle.on_download_completed()?;

    lifecycle.launch(spawn_cat()?)?;
    lifecycle.on_process_ready().await?;
    lifecycle.submit("first session").await?;
    sleep(Duration::from_millis(200)).await;
    assert_eq!(state.console_log(), vec!["first session".to_string()]);
    lifecycle.terminate().await?;

    // The next session starts with a fresh log.
    lifecycle.launch(spawn_cat()?)?;
    assert!(state.console_log().is_empty());
    lifecycle.terminate().await?;
    Ok(())
}
