use crate::error::{Error, Result};
use crate::management::{Address, ManagementSession, ServerState};
use crate::server::launcher::{ServerContext, ServerLauncher, ServerType};
use crate::server::monitor::ReadinessMonitor;
use crate::server::process::{ProcessProbe, ServerId};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Number of lifecycle events kept in the history.
const EVENT_HISTORY_LIMIT: usize = 1000;

/// Recovery action taken by the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerLifecycleEvent {
    /// The server was reloaded in place
    Reloaded,
    /// The server was shut down and launched again
    Restarted,
}

/// A recovery action, as recorded by the state machine
#[derive(Debug, Clone)]
pub struct ServerEvent {
    /// Process the action applied to; for a restart, the new process
    pub id: ServerId,
    /// Event type
    pub event: ServerLifecycleEvent,
    /// State that triggered the action
    pub state: ServerState,
    /// Event timestamp
    pub timestamp: Instant,
}

/// Brings a server back to `running` after commands changed its state.
///
/// `restart-required` shuts the server down and relaunches it with the same
/// configuration; `reload-required` reloads it and waits for readiness.
/// `running` is a no-op, so calling [`ServerStateMachine::act_on_state`]
/// repeatedly is safe.
pub struct ServerStateMachine {
    launcher: Arc<ServerLauncher>,
    events: Mutex<VecDeque<ServerEvent>>,
}

impl ServerStateMachine {
    /// Create a state machine relaunching servers through `launcher`
    pub fn new(launcher: Arc<ServerLauncher>) -> Self {
        Self {
            launcher,
            events: Mutex::new(VecDeque::new()),
        }
    }

    /// Reads the server state and recovers from it.
    ///
    /// Returns the input context unless the server had to be restarted, in
    /// which case the context of the new process is returned.
    #[tracing::instrument(skip(self, session, context), fields(server_id = %context.process().id(), server_type = %context.server_type()))]
    pub async fn act_on_state(
        &self,
        session: &ManagementSession,
        mut context: ServerContext,
    ) -> Result<ServerContext> {
        let server_type = context.server_type();
        let state = read_state(session, server_type).await?;

        match state {
            ServerState::Running => {
                tracing::debug!("Server is running, nothing to do");
                Ok(context)
            }
            ServerState::RestartRequired => {
                tracing::info!("Server requires a restart");
                let config = context.config().clone();
                self.launcher.stop(context, session).await?;
                let context = self.launcher.start(server_type, config).await?;
                self.record_event(context.process().id(), ServerLifecycleEvent::Restarted, state);
                Ok(context)
            }
            ServerState::ReloadRequired => {
                tracing::info!("Server requires a reload");
                let timeout = context.config().timeout_seconds;
                reload(
                    self.launcher.monitor(),
                    session,
                    server_type,
                    timeout,
                    Some(context.process_mut() as &mut dyn ProcessProbe),
                )
                .await?;
                self.record_event(context.process().id(), ServerLifecycleEvent::Reloaded, state);
                Ok(context)
            }
            other => {
                tracing::warn!(state = %other, "Server is in an unexpected state, leaving it as is");
                Ok(context)
            }
        }
    }

    /// Get recent events, newest first
    pub fn events(&self, limit: Option<usize>) -> Vec<ServerEvent> {
        let Ok(events) = self.events.lock() else {
            return Vec::new();
        };
        let limit = limit.unwrap_or(events.len());
        events.iter().rev().take(limit).cloned().collect()
    }

    fn record_event(&self, id: ServerId, event: ServerLifecycleEvent, state: ServerState) {
        let Ok(mut events) = self.events.lock() else {
            tracing::warn!("Failed to lock server events");
            return;
        };
        events.push_back(ServerEvent {
            id,
            event,
            state,
            timestamp: Instant::now(),
        });

        // Limit event history
        if events.len() > EVENT_HISTORY_LIMIT {
            events.pop_front();
        }
    }
}

/// Reloads the server behind `session` if it reports `reload-required`.
///
/// Used after command execution against a server this library does not own:
/// readiness is polled without a process liveness check, and a server that
/// requires a restart is only reported.
#[tracing::instrument(skip(monitor, session), fields(session = %session.id()))]
pub async fn reload_if_required(
    monitor: &ReadinessMonitor,
    session: &ManagementSession,
    timeout_seconds: u64,
) -> Result<()> {
    let server_type = if session.is_domain().await? {
        ServerType::Domain
    } else {
        ServerType::Standalone
    };

    match read_state(session, server_type).await? {
        ServerState::ReloadRequired => {
            tracing::info!("Server requires a reload");
            reload(monitor, session, server_type, timeout_seconds, None).await
        }
        ServerState::RestartRequired => {
            tracing::warn!("Server requires a restart, which must be done by the process owner");
            Ok(())
        }
        _ => Ok(()),
    }
}

async fn read_state(session: &ManagementSession, server_type: ServerType) -> Result<ServerState> {
    match server_type {
        ServerType::Standalone => session.server_state().await,
        ServerType::Domain => session.host_state().await,
    }
}

async fn reload(
    monitor: &ReadinessMonitor,
    session: &ManagementSession,
    server_type: ServerType,
    timeout_seconds: u64,
    process: Option<&mut (dyn ProcessProbe + '_)>,
) -> Result<()> {
    let address = match server_type {
        ServerType::Standalone => Address::root(),
        ServerType::Domain => Address::root().append("host", session.domain_host().await?),
    };
    session.reload(address).await?;

    let kind = server_type.to_string().to_lowercase();
    monitor
        .wait_for_ready(process, session, timeout_seconds, server_type)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Server did not come back after the reload");
            match e {
                Error::Timeout(msg) => Error::Timeout(format!(
                    "Failed to wait for {} server after a reload. {}",
                    kind, msg
                )),
                Error::ProcessTerminated(msg) => Error::ProcessTerminated(format!(
                    "Failed to wait for {} server after a reload. {}",
                    kind, msg
                )),
                other => other,
            }
        })?;

    tracing::info!("Server reloaded");
    Ok(())
}
