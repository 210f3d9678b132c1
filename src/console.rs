//! Console bridge between an operator and the managed process's
//! standard streams.
//!
//! Output direction: one reader task consumes the child's stdout line by
//! line for the lifetime of the session, appending each line to the
//! observable console log in arrival order and announcing exactly one
//! [`Field::ConsoleLog`] change per line. EOF or a read error on the
//! closed stream terminates the task cleanly.
//!
//! Input direction: [`ConsoleBridge::submit`] forwards a line verbatim
//! (plus the newline terminator) to the child's stdin — but only while
//! the entity is running. An operator typing into a stopped server's
//! console is expected, not exceptional, so that case is a silent no-op.

use crate::error::Result;
use crate::notify::{Field, FieldNotifier};
use crate::server::EntityState;
use async_process::{ChildStdin, ChildStdout};
use futures_lite::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use futures_lite::stream::StreamExt;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Bidirectional coupling between an operator and one process session.
pub struct ConsoleBridge {
    stdin: Option<ChildStdin>,
    state: Option<Arc<EntityState>>,
    reader_task: Option<JoinHandle<()>>,
}

impl ConsoleBridge {
    /// Create a detached bridge.
    pub fn new() -> Self {
        Self {
            stdin: None,
            state: None,
            reader_task: None,
        }
    }

    /// Whether a process session is currently wired up.
    pub fn is_attached(&self) -> bool {
        self.stdin.is_some() || self.reader_task.is_some()
    }

    /// Wire the bridge to a fresh process session and spawn the output
    /// reader task.
    pub fn attach(
        &mut self,
        stdin: ChildStdin,
        stdout: ChildStdout,
        state: Arc<EntityState>,
        notifier: FieldNotifier,
    ) {
        self.stdin = Some(stdin);
        self.state = Some(Arc::clone(&state));

        let reader_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Some(next) = lines.next().await {
                match next {
                    Ok(line) => {
                        state.push_console_line(line);
                        // One notification per appended line, never per
                        // byte.
                        notifier.send(Field::ConsoleLog);
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "Console reader stream error, exiting");
                        break;
                    }
                }
            }
            tracing::debug!("Console reader task exited");
        });

        self.reader_task = Some(reader_task);
    }

    /// Forward `line` plus the line terminator to the process's stdin if
    /// and only if the entity is running; otherwise a silent no-op.
    pub async fn submit(&mut self, line: &str) -> Result<()> {
        let running = self
            .state
            .as_ref()
            .map(|state| state.server_running())
            .unwrap_or(false);
        if !running {
            tracing::trace!(line, "Console input while not running, dropped");
            return Ok(());
        }

        let Some(stdin) = self.stdin.as_mut() else {
            return Ok(());
        };

        let mut payload = line.as_bytes().to_vec();
        payload.push(b'\n');
        stdin.write_all(&payload).await?;
        stdin.flush().await?;
        Ok(())
    }

    /// Tear the bridge down: drop stdin and stop the reader task.
    pub async fn close(&mut self) {
        self.stdin = None;
        self.state = None;

        if let Some(task) = self.reader_task.take() {
            task.abort();
            // Abort errors are expected here.
            let _ = task.await;
        }
    }
}

impl Default for ConsoleBridge {
    fn default() -> Self {
        Self::new()
    }
}
