use crate::entity::ServerFlavor;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

fn default_max_memory_mb() -> u64 {
    1024
}

/// Launch configuration for a single supervised entity.
///
/// Defines how to start the server process and the memory limit used to
/// normalize the raw memory sample into a percentage.
///
/// # Examples
///
/// ```
/// use server_keeper::config::EntityConfig;
/// use server_keeper::entity::ServerFlavor;
/// use std::collections::HashMap;
///
/// let entity_config = EntityConfig {
///     command: "java".to_string(),
///     args: vec!["-jar".to_string(), "server.jar".to_string(), "nogui".to_string()],
///     env: HashMap::new(),
///     max_memory_mb: 2048,
///     flavor: ServerFlavor::Vanilla,
/// };
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityConfig {
    /// Command to execute when launching the server.
    /// This can be an absolute path or a command available in the PATH.
    pub command: String,

    /// Command-line arguments to pass to the server.
    #[serde(default)]
    pub args: Vec<String>,

    /// Environment variables to set when launching the server.
    /// These will be combined with the current environment.
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Maximum memory the server may use, in mebibytes.
    #[serde(default = "default_max_memory_mb")]
    pub max_memory_mb: u64,

    /// Flavor/version tag of the backing server artifact.
    #[serde(default)]
    pub flavor: ServerFlavor,
}

impl EntityConfig {
    /// Memory limit in bytes, the unit the telemetry layer works in.
    pub fn max_memory_bytes(&self) -> u64 {
        self.max_memory_mb * 1024 * 1024
    }
}

/// Main configuration for the keeper.
///
/// Holds launch configurations for the entities the keeper may
/// supervise, each under a unique name.
///
/// # JSON Schema
///
/// ```json
/// {
///   "entities": {
///     "survival": {
///       "command": "java",
///       "args": ["-jar", "server.jar", "nogui"],
///       "env": { "JAVA_OPTS": "-XX:+UseG1GC" },
///       "maxMemoryMb": 2048,
///       "flavor": "paper"
///     }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Map of entity names to their launch configurations.
    pub entities: HashMap<String, EntityConfig>,
}

impl Config {
    /// Loads a configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// * The file cannot be read
    /// * The file contents are not valid JSON
    /// * The JSON does not conform to the expected schema
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigParse(format!("Failed to read config file: {}", e)))?;

        Self::parse_from_str(&content)
    }

    /// Parses a configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not valid JSON or does not
    /// conform to the expected schema.
    pub fn parse_from_str(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| Error::ConfigParse(format!("Failed to parse JSON config: {}", e)))
    }
}
