// src/server/process.rs
use crate::config::EntityConfig;
use crate::error::{Error, Result};
use async_process::{Child, Command, Stdio};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a supervision session.
///
/// A fresh one is minted each time a process handle is attached, so
/// telemetry and console output can never be attributed to a superseded
/// session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A managed server child process.
pub struct ServerProcess {
    /// Launch configuration
    config: EntityConfig,
    /// Entity name
    name: String,
    /// Session ID
    session: SessionId,
    /// Child process
    child: Option<Child>,
}

impl ServerProcess {
    /// Create a new server process from configuration.
    pub fn new(name: String, config: EntityConfig) -> Self {
        Self {
            config,
            name,
            session: SessionId::new(),
            child: None,
        }
    }

    /// Get the session ID.
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Get the entity name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// OS pid of the live child, if any.
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(|child| child.id())
    }

    /// Spawn the server process with piped stdio.
    pub fn start(&mut self) -> Result<()> {
        if self.child.is_some() {
            return Err(Error::AlreadyRunning);
        }

        let mut command = Command::new(&self.config.command);
        command.args(&self.config.args);

        for (key, value) in &self.config.env {
            command.env(key, value);
        }

        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let child = command
            .spawn()
            .map_err(|e| Error::Process(format!("Failed to start process: {}", e)))?;

        tracing::info!(entity = %self.name, pid = child.id(), session = %self.session, "Spawned server process");
        self.child = Some(child);

        Ok(())
    }

    /// Kill the server process and wait for it to exit.
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                return Err(Error::Process(format!("Failed to kill process: {}", e)));
            }

            let _ = child.status().await;
            tracing::info!(entity = %self.name, session = %self.session, "Server process stopped");
            Ok(())
        } else {
            Err(Error::NotRunning)
        }
    }

    /// Take the stdin pipe from the process.
    pub fn take_stdin(&mut self) -> Result<async_process::ChildStdin> {
        if let Some(child) = &mut self.child {
            child.stdin.take().ok_or_else(|| {
                Error::Process("Failed to get stdin pipe from child process".to_string())
            })
        } else {
            Err(Error::NotRunning)
        }
    }

    /// Take the stdout pipe from the process.
    pub fn take_stdout(&mut self) -> Result<async_process::ChildStdout> {
        if let Some(child) = &mut self.child {
            child.stdout.take().ok_or_else(|| {
                Error::Process("Failed to get stdout pipe from child process".to_string())
            })
        } else {
            Err(Error::NotRunning)
        }
    }

    /// Take the stderr pipe from the process.
    pub fn take_stderr(&mut self) -> Result<async_process::ChildStderr> {
        if let Some(child) = &mut self.child {
            child.stderr.take().ok_or_else(|| {
                Error::Process("Failed to get stderr pipe from child process".to_string())
            })
        } else {
            Err(Error::NotRunning)
        }
    }
}
