use crate::config::LaunchConfig;
use crate::config::validator::validate_launch_config;
use crate::error::{Error, Result};
use crate::management::{Address, Connector, ManagementSession};
use crate::server::command_builder::command_builder;
use crate::server::monitor::ReadinessMonitor;
use crate::server::process::{ProcessProbe, ServerProcessHandle};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// The kind of server to launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerType {
    /// A single standalone server
    Standalone,
    /// A managed domain: process controller, host controller and servers
    Domain,
}

impl fmt::Display for ServerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerType::Standalone => write!(f, "Standalone"),
            ServerType::Domain => write!(f, "Domain"),
        }
    }
}

/// A running server started by this library.
///
/// Keeps the launch configuration so a restart relaunches the server exactly
/// as it was first started.
#[derive(Debug)]
pub struct ServerContext {
    server_type: ServerType,
    config: LaunchConfig,
    process: ServerProcessHandle,
}

impl ServerContext {
    /// Wraps a launched process
    pub fn new(server_type: ServerType, config: LaunchConfig, process: ServerProcessHandle) -> Self {
        Self {
            server_type,
            config,
            process,
        }
    }

    /// The server type
    pub fn server_type(&self) -> ServerType {
        self.server_type
    }

    /// The configuration the server was launched with
    pub fn config(&self) -> &LaunchConfig {
        &self.config
    }

    /// The server process
    pub fn process(&self) -> &ServerProcessHandle {
        &self.process
    }

    /// The server process, mutably
    pub fn process_mut(&mut self) -> &mut ServerProcessHandle {
        &mut self.process
    }

    /// The resolved command line
    pub fn command_line(&self) -> &[String] {
        self.process.command_line()
    }

    /// The resolved installation location
    pub fn install_location(&self) -> &Path {
        self.process.install_location()
    }

    /// Gives up the context, keeping the process
    pub fn into_process(self) -> ServerProcessHandle {
        self.process
    }
}

/// Launches and stops server processes.
pub struct ServerLauncher {
    connector: Arc<dyn Connector>,
    monitor: ReadinessMonitor,
}

impl ServerLauncher {
    /// Create a launcher probing servers through `connector`
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            monitor: ReadinessMonitor::default(),
        }
    }

    /// Replace the readiness monitor
    pub fn with_monitor(mut self, monitor: ReadinessMonitor) -> Self {
        self.monitor = monitor;
        self
    }

    /// The readiness monitor used for startups
    pub fn monitor(&self) -> &ReadinessMonitor {
        &self.monitor
    }

    /// Spawns the server without waiting for it to become ready.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// * The installation location or the timeouts are invalid
    /// * A server already answers on the management endpoint
    /// * The process cannot be spawned
    #[tracing::instrument(skip(self, config), fields(install_location = %config.install_location.display()))]
    pub async fn launch(
        &self,
        server_type: ServerType,
        config: &LaunchConfig,
    ) -> Result<ServerProcessHandle> {
        validate_launch_config(config)?;

        if self.is_running(server_type).await {
            tracing::error!("A server already answers on the management endpoint");
            return Err(Error::AlreadyRunning(server_type));
        }

        let command_line = command_builder(server_type, config).build();

        let java_home = config
            .java_home
            .as_ref()
            .map(|p| p.display().to_string())
            .or_else(|| std::env::var("JAVA_HOME").ok())
            .unwrap_or_default();
        tracing::info!(JAVA_HOME = %java_home);
        tracing::info!(JBOSS_HOME = %config.install_location.display());
        tracing::info!(JAVA_OPTS = %config.java_opts.join(" "));
        tracing::debug!(command_line = ?command_line, "Starting server");

        ServerProcessHandle::spawn(
            command_line,
            &config.install_location,
            &config.env,
            &config.stdout,
        )
    }

    /// Launches the server and waits until it is ready.
    ///
    /// On a readiness failure the process is **not** killed. Use
    /// [`ServerLauncher::launch`] and [`ReadinessMonitor::wait_for_ready`]
    /// directly when the caller must be able to kill it.
    #[tracing::instrument(skip(self, config), fields(install_location = %config.install_location.display()))]
    pub async fn start(&self, server_type: ServerType, config: LaunchConfig) -> Result<ServerContext> {
        let mut process = self.launch(server_type, &config).await?;
        tracing::info!(server_id = %process.id(), pid = process.pid(), "Server process started, waiting for readiness");

        let session = self.connector.connect().await?;
        let ready = self
            .monitor
            .wait_for_ready(
                Some(&mut process as &mut dyn ProcessProbe),
                &session,
                config.startup_timeout_seconds,
                server_type,
            )
            .await;
        session.close_with(ready).await?;

        if !process.is_alive() {
            tracing::error!(server_id = %process.id(), "Server process exited after startup");
            return Err(Error::ProcessTerminated(format!(
                "The {} server process exited after it reported ready.",
                server_type
            )));
        }

        tracing::info!(server_id = %process.id(), "Server started");
        Ok(ServerContext::new(server_type, config, process))
    }

    /// Shuts the server down and reaps its process.
    ///
    /// Sends the `shutdown` operation, then waits for the process to exit for
    /// at most the configured timeout. A process still alive afterwards is
    /// killed.
    #[tracing::instrument(skip(self, context, session), fields(server_id = %context.process().id()))]
    pub async fn stop(&self, mut context: ServerContext, session: &ManagementSession) -> Result<Option<i32>> {
        let address = match context.server_type {
            ServerType::Standalone => Address::root(),
            ServerType::Domain => Address::root().append("host", session.domain_host().await?),
        };
        session.shutdown(address, None).await?;

        let timeout = Duration::from_secs(context.config.timeout_seconds);
        match context.process.wait_timeout(timeout).await? {
            Some(code) => {
                tracing::info!(exit_code = ?code, "Server stopped");
                Ok(code)
            }
            None => {
                tracing::warn!(
                    timeout_seconds = context.config.timeout_seconds,
                    "Server did not exit after shutdown, killing it"
                );
                context.process.stop().await
            }
        }
    }

    async fn is_running(&self, server_type: ServerType) -> bool {
        let session = match self.connector.connect().await {
            Ok(session) => session,
            Err(e) => {
                tracing::trace!(error = %e, "No management session while probing");
                return false;
            }
        };
        let running = match server_type {
            ServerType::Standalone => session.is_standalone_running().await,
            ServerType::Domain => session.is_domain_running().await,
        };
        if let Err(e) = session.close().await {
            tracing::debug!(error = %e, "Failed to close probe session");
        }
        running
    }
}
