/// Error handling module for server-keeper.
///
/// This module defines the error types used throughout the library.
/// The taxonomy follows one rule: conditions a well-behaved caller can
/// hit during normal operation (a metric sample failing while the
/// process exits, a progress report with a zero total, console input to
/// a stopped server) are absorbed locally and never surface here, while
/// caller programming errors (double-starting a sampler, launching a
/// server that is not stopped) fail loudly.
///
/// # Example
///
/// ```
/// use server_keeper::error::{Error, Result};
///
/// fn handle_error(result: Result<()>) {
///     match result {
///         Ok(_) => println!("Operation succeeded"),
///         Err(Error::EntityNotFound(name)) => println!("Entity '{}' is not configured", name),
///         Err(Error::IllegalTransition { from, action }) => {
///             println!("Cannot {} while {:?}", action, from)
///         }
///         Err(e) => println!("Other error: {}", e),
///     }
/// }
/// ```
use crate::server::Status;
use thiserror::Error;

/// Errors that can occur in the server-keeper library.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to parse configuration from a file or string.
    ///
    /// This error occurs when:
    /// - The configuration JSON is malformed
    /// - Required fields are missing
    /// - Field types are incorrect
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// Configuration is valid JSON but contains invalid values.
    ///
    /// This error occurs when:
    /// - An entity has an empty launch command
    /// - A memory limit of zero is configured
    /// - No entities are configured at all
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    /// Error when starting, stopping, or wiring up a server process.
    ///
    /// This error occurs when:
    /// - The process fails to spawn
    /// - A stdio pipe cannot be taken from the child
    /// - The process cannot be killed
    #[error("Server process error: {0}")]
    Process(String),

    /// A lifecycle operation was requested from a state that does not
    /// permit it.
    ///
    /// This error occurs when:
    /// - `launch` is called while the entity is not stopped
    /// - `terminate` is called on a stopped entity
    /// - a process-ready signal arrives outside of the starting state
    ///
    /// These are caller programming errors; silently ignoring them could
    /// mask a leaked supervision session.
    #[error("Illegal transition: cannot {action} while {from:?}")]
    IllegalTransition {
        /// Status the entity was in when the operation was attempted.
        from: Status,
        /// The operation that was rejected.
        action: &'static str,
    },

    /// The entity is already initialized and ready, so a fresh download
    /// must not be started over it.
    #[error("Entity '{0}' is already initialized and ready")]
    AlreadyInitialized(String),

    /// A sampler or process was started while a previous generation was
    /// still live (double-start).
    #[error("Already running")]
    AlreadyRunning,

    /// A sampler or process was stopped twice, or an operation required
    /// a live process where none exists.
    #[error("Not running")]
    NotRunning,

    /// Requested entity was not found in the configuration or registry.
    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    /// The entity is not ready to launch because its artifact download
    /// or data import has not finished.
    #[error("Entity '{0}' is not ready to launch")]
    NotReady(String),

    /// The persistence collaborator failed to save the entity set.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// I/O failure on the console bridge pipes.
    #[error("Console I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other error not covered by the above categories.
    #[error("Other error: {0}")]
    Other(String),
}

/// Result type for server-keeper operations.
///
/// This is a convenience type alias for `std::result::Result` with the `Error` type
/// from this module.
pub type Result<T> = std::result::Result<T, Error>;
