//! Managed entity model and persistence seam.
//!
//! A [`ManagedEntity`] is the long-lived identity of a supervised server:
//! it outlives individual supervision sessions and is the unit that gets
//! persisted. Persistence itself is a collaborator behind the
//! [`EntityStore`] trait so that the lifecycle never reaches for ambient
//! global state; the storage format is an implementation detail of the
//! store.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Server flavor backing a managed entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ServerFlavor {
    #[default]
    Vanilla,
    Paper,
    Spigot,
    Waterfall,
}

impl fmt::Display for ServerFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServerFlavor::Vanilla => "vanilla",
            ServerFlavor::Paper => "paper",
            ServerFlavor::Spigot => "spigot",
            ServerFlavor::Waterfall => "waterfall",
        };
        write!(f, "{}", name)
    }
}

/// Long-lived identity of a supervised server.
///
/// `initialized` is true once the backing artifact has been successfully
/// downloaded at least once; together with the import-completed flag it
/// gates whether the entity may be launched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedEntity {
    /// Unique entity name.
    pub name: String,
    /// Maximum memory the server may use, in bytes. Used to normalize the
    /// raw memory sample into a percentage at the presentation boundary.
    pub max_memory: u64,
    /// Flavor/version tag of the backing server artifact.
    pub flavor: ServerFlavor,
    /// Whether the backing artifact has ever finished downloading.
    pub initialized: bool,
}

impl ManagedEntity {
    /// Create a new, not-yet-initialized entity.
    pub fn new(name: impl Into<String>, max_memory: u64, flavor: ServerFlavor) -> Self {
        Self {
            name: name.into(),
            max_memory,
            flavor,
            initialized: false,
        }
    }
}

impl fmt::Display for ManagedEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.flavor)
    }
}

/// Shared handle to a managed entity.
///
/// The lifecycle and its observers hold clones of this; the memory limit
/// may be edited through it between two reads of the same raw sample and
/// the derived percentage must follow without a sampler restart.
pub type SharedEntity = Arc<RwLock<ManagedEntity>>;

/// Persistence collaborator for the entity set.
///
/// The lifecycle calls [`EntityStore::save`] write-through at the four
/// download/import persistence points so a crash mid-operation leaves a
/// conservative `initialized = false` on disk rather than a stale ready
/// flag.
pub trait EntityStore: Send + Sync {
    /// Persist the full entity set.
    fn save(&self, entities: &[ManagedEntity]) -> Result<()>;
}

/// File-backed [`EntityStore`] writing the entity set as JSON.
pub struct JsonEntityStore {
    path: PathBuf,
}

impl JsonEntityStore {
    /// Create a store that saves to `path`, overwriting on each save.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Load a previously saved entity set. A missing file is an empty set.
    pub fn load(&self) -> Result<Vec<ManagedEntity>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| Error::Persistence(format!("Failed to read entity store: {}", e)))?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Persistence(format!("Failed to parse entity store: {}", e)))
    }
}

impl EntityStore for JsonEntityStore {
    fn save(&self, entities: &[ManagedEntity]) -> Result<()> {
        let content = serde_json::to_string_pretty(entities)
            .map_err(|e| Error::Persistence(format!("Failed to serialize entities: {}", e)))?;
        std::fs::write(&self.path, content)
            .map_err(|e| Error::Persistence(format!("Failed to write entity store: {}", e)))?;
        tracing::debug!(path = ?self.path, count = entities.len(), "Persisted entity set");
        Ok(())
    }
}

/// Registry of all managed entities known to the keeper.
///
/// Owns the shared handles so that a write-through save always snapshots
/// the current flags, including changes made by a lifecycle mid-download.
#[derive(Default)]
pub struct EntityRegistry {
    entities: RwLock<Vec<SharedEntity>>,
}

impl EntityRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity and return its shared handle.
    pub fn insert(&self, entity: ManagedEntity) -> SharedEntity {
        let shared: SharedEntity = Arc::new(RwLock::new(entity));
        if let Ok(mut entities) = self.entities.write() {
            entities.push(Arc::clone(&shared));
        }
        shared
    }

    /// Look up an entity handle by name.
    pub fn get(&self, name: &str) -> Option<SharedEntity> {
        let entities = self.entities.read().ok()?;
        entities
            .iter()
            .find(|e| e.read().map(|g| g.name == name).unwrap_or(false))
            .cloned()
    }

    /// Snapshot the current entity set for persistence.
    pub fn snapshot(&self) -> Vec<ManagedEntity> {
        match self.entities.read() {
            Ok(entities) => entities
                .iter()
                .filter_map(|e| e.read().ok().map(|g| g.clone()))
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}
