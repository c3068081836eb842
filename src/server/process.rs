// src/server/process.rs
use crate::error::{Error, Result};
use crate::server::output::{OutputCapture, StandardOutput, spawn_consumers};
use async_process::{Child, Command, Stdio};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// How long to wait for the output consumers once the process is gone.
const CONSUMER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Unique identifier for a server process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServerId(Uuid);

impl ServerId {
    // Private constructor, only usable within our crate
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether a process is still running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// The process is running
    Alive,
    /// The process exited, with its exit code when it has one
    Exited(Option<i32>),
}

/// Something whose process liveness can be checked without blocking.
///
/// The readiness monitor checks this before every poll.
pub trait ProcessProbe: Send {
    /// Returns the current liveness
    fn liveness(&mut self) -> Liveness;
}

/// A spawned server process.
///
/// The handle owns the OS child. Dropping it does **not** kill the process;
/// call [`ServerProcessHandle::stop`] or [`ServerProcessHandle::wait`] to reap it.
pub struct ServerProcessHandle {
    id: ServerId,
    child: Child,
    command_line: Vec<String>,
    install_location: PathBuf,
    env: BTreeMap<String, String>,
    output: OutputCapture,
    consumers: Vec<JoinHandle<()>>,
}

impl ServerProcessHandle {
    /// Spawns `command_line` in `install_location` with extra environment variables
    /// and output handling.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// * The command line is empty
    /// * The process cannot be spawned
    /// * The output file cannot be opened
    #[tracing::instrument(skip(command_line, env), fields(program = ?command_line.first()))]
    pub fn spawn(
        command_line: Vec<String>,
        install_location: &Path,
        env: &BTreeMap<String, String>,
        stdout: &StandardOutput,
    ) -> Result<Self> {
        let Some((program, args)) = command_line.split_first() else {
            return Err(Error::Validation("Cannot spawn an empty command line".to_string()));
        };

        let mut command = Command::new(program);
        command.args(args).current_dir(install_location);

        // Set environment variables
        for (key, value) in env {
            command.env(key, value);
        }

        let sink = stdout.open_sink()?;
        let (out, err) = stdout.stdio();
        command.stdin(Stdio::null()).stdout(out).stderr(err);

        let mut child = command.spawn().map_err(|e| {
            tracing::error!(error = %e, "Failed to spawn process");
            Error::Io(format!("Failed to start process '{}': {}", program, e))
        })?;

        let output = OutputCapture::new();
        let consumers = spawn_consumers(sink, child.stdout.take(), child.stderr.take(), &output);

        let id = ServerId::new();
        tracing::debug!(server_id = %id, pid = child.id(), "Process spawned");

        Ok(Self {
            id,
            child,
            command_line,
            install_location: install_location.to_path_buf(),
            env: env.clone(),
            output,
            consumers,
        })
    }

    /// Get the server ID
    pub fn id(&self) -> ServerId {
        self.id
    }

    /// OS process id
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// The command line the process was started with
    pub fn command_line(&self) -> &[String] {
        &self.command_line
    }

    /// The installation the process runs from
    pub fn install_location(&self) -> &Path {
        &self.install_location
    }

    /// Environment variables added to the process
    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Recently captured output lines
    pub fn output(&self) -> &OutputCapture {
        &self.output
    }

    /// Whether the OS process is still running
    pub fn is_alive(&mut self) -> bool {
        self.liveness() == Liveness::Alive
    }

    /// Waits for the process to exit and returns its exit code.
    pub async fn wait(&mut self) -> Result<Option<i32>> {
        let status = self
            .child
            .status()
            .await
            .map_err(|e| Error::Io(format!("Failed to wait for process: {}", e)))?;
        self.drain_consumers().await;
        Ok(status.code())
    }

    /// Waits at most `timeout` for the process to exit.
    ///
    /// Returns `Ok(None)` when the process is still running afterwards.
    pub async fn wait_timeout(&mut self, timeout: Duration) -> Result<Option<Option<i32>>> {
        match tokio::time::timeout(timeout, self.wait()).await {
            Ok(code) => code.map(Some),
            Err(_) => Ok(None),
        }
    }

    /// Kills the process and reaps it.
    #[tracing::instrument(skip(self), fields(server_id = %self.id))]
    pub async fn stop(&mut self) -> Result<Option<i32>> {
        if let Liveness::Exited(code) = self.liveness() {
            self.drain_consumers().await;
            return Ok(code);
        }

        tracing::info!(pid = self.child.id(), "Killing server process");
        if let Err(e) = self.child.kill() {
            return Err(Error::Io(format!("Failed to kill process: {}", e)));
        }

        self.wait().await
    }

    async fn drain_consumers(&mut self) {
        for mut task in self.consumers.drain(..) {
            // A grandchild may still hold the pipe open
            if tokio::time::timeout(CONSUMER_DRAIN_TIMEOUT, &mut task)
                .await
                .is_err()
            {
                task.abort();
            }
        }
    }
}

impl ProcessProbe for ServerProcessHandle {
    fn liveness(&mut self) -> Liveness {
        match self.child.try_status() {
            Ok(None) => Liveness::Alive,
            Ok(Some(status)) => Liveness::Exited(status.code()),
            Err(e) => {
                tracing::warn!(server_id = %self.id, error = %e, "Failed to query process status");
                Liveness::Exited(None)
            }
        }
    }
}

impl fmt::Debug for ServerProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerProcessHandle")
            .field("id", &self.id)
            .field("pid", &self.child.id())
            .field("command_line", &self.command_line)
            .field("install_location", &self.install_location)
            .finish()
    }
}
