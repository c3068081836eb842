use crate::error::{Error, Result};
use crate::management::{ManagementSession, ServerState};
use crate::server::ServerType;
use crate::server::process::{Liveness, ProcessProbe};
use std::time::Duration;
use tokio::time::{self, Instant};

/// Default delay between two readiness probes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Polls a management session until the server is ready.
///
/// A single probe reporting `running` is enough. The monitor never kills the
/// process it watches; on timeout the process is left to the caller.
#[derive(Debug, Clone, Copy)]
pub struct ReadinessMonitor {
    interval: Duration,
}

impl Default for ReadinessMonitor {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl ReadinessMonitor {
    /// Create a monitor polling every 200 ms
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a monitor with a custom poll interval
    pub fn with_interval(interval: Duration) -> Self {
        Self { interval }
    }

    /// The poll interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Waits until the server behind `session` is ready.
    ///
    /// When a process is given, each poll first checks that it is still
    /// alive. Without one (a server this library did not start) only the
    /// management endpoint is polled.
    ///
    /// # Errors
    ///
    /// * [`Error::ProcessTerminated`] as soon as the process has exited
    /// * [`Error::Timeout`] once `timeout_seconds` elapsed without a ready probe
    #[tracing::instrument(skip(self, process, session), fields(session = %session.id()))]
    pub async fn wait_for_ready(
        &self,
        mut process: Option<&mut (dyn ProcessProbe + '_)>,
        session: &ManagementSession,
        timeout_seconds: u64,
        server_type: ServerType,
    ) -> Result<()> {
        let started = Instant::now();
        // No deadline when the timeout is too large to represent
        let deadline = started.checked_add(Duration::from_secs(timeout_seconds));
        let mut polls: u32 = 0;

        loop {
            if let Some(process) = process.as_deref_mut() {
                if let Liveness::Exited(code) = process.liveness() {
                    let code = code.map_or_else(|| "none".to_string(), |c| c.to_string());
                    tracing::error!(exit_code = %code, polls, "Server process exited before it was ready");
                    return Err(Error::ProcessTerminated(format!(
                        "The {} server process exited with code {} before it was ready.",
                        server_type, code
                    )));
                }
            }

            polls += 1;
            if self.probe(session, server_type).await {
                tracing::info!(
                    polls,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Server is ready"
                );
                return Ok(());
            }

            let now = Instant::now();
            let pause = match deadline {
                Some(deadline) if now >= deadline => {
                    tracing::error!(polls, timeout_seconds, "Server did not become ready in time");
                    return Err(Error::Timeout(format!(
                        "The {} server did not become ready within {} seconds.",
                        server_type, timeout_seconds
                    )));
                }
                Some(deadline) => self.interval.min(deadline - now),
                None => self.interval,
            };
            time::sleep(pause).await;
        }
    }

    async fn probe(&self, session: &ManagementSession, server_type: ServerType) -> bool {
        let ready = match server_type {
            ServerType::Standalone => session
                .server_state()
                .await
                .map(|state| state == ServerState::Running),
            ServerType::Domain => session.domain_ready().await,
        };
        match ready {
            Ok(ready) => ready,
            Err(e) => {
                // Expected while the server boots
                tracing::trace!(error = %e, "Readiness probe failed");
                false
            }
        }
    }
}
