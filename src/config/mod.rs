//! Configuration module for server-keeper.
//!
//! This module handles parsing, validation, and access to launch
//! configuration for supervised entities. Configurations load from files
//! or strings in JSON format.
//!
//! # Examples
//!
//! Loading a configuration from a file:
//!
//! ```no_run
//! use server_keeper::config::Config;
//!
//! let config = Config::from_file("keeper.json").unwrap();
//! println!("Loaded configuration with {} entities", config.entities.len());
//! ```
//!
//! Creating a configuration programmatically:
//! ```
//! use server_keeper::config::{Config, EntityConfig};
//! use server_keeper::entity::ServerFlavor;
//! use std::collections::HashMap;
//!
//! let mut entities = HashMap::new();
//! entities.insert(
//!     "survival".to_string(),
//!     EntityConfig {
//!         command: "java".to_string(),
//!         args: vec!["-jar".to_string(), "server.jar".to_string()],
//!         env: HashMap::new(),
//!         max_memory_mb: 2048,
//!         flavor: ServerFlavor::Paper,
//!     },
//! );
//! let config = Config { entities };
//! ```
mod parser;
pub mod validator;

pub use parser::{Config, EntityConfig};
pub use validator::validate_config;
