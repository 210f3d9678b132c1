use crate::config::EntityConfig;
use crate::error::{Error, Result};
use std::collections::HashMap;

/// Validates a single entity configuration.
pub fn validate_entity_config(name: &str, config: &EntityConfig) -> Result<()> {
    if config.command.is_empty() {
        return Err(Error::ConfigInvalid(format!(
            "Entity '{}' has empty command",
            name
        )));
    }

    // A zero memory limit would make every derived memory percentage a
    // division by zero.
    if config.max_memory_mb == 0 {
        return Err(Error::ConfigInvalid(format!(
            "Entity '{}' has zero memory limit",
            name
        )));
    }

    Ok(())
}

/// Validates a map of entity configurations.
pub fn validate_entity_configs(configs: &HashMap<String, EntityConfig>) -> Result<()> {
    if configs.is_empty() {
        return Err(Error::ConfigInvalid("No entities configured".to_string()));
    }

    for (name, config) in configs {
        validate_entity_config(name, config)?;
    }

    Ok(())
}

/// Full configuration validation.
pub fn validate_config(configs: &HashMap<String, EntityConfig>) -> Result<()> {
    validate_entity_configs(configs)?;

    Ok(())
}
