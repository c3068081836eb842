/*!
 # WildFly Orchestrator

 A Rust library for driving the lifecycle of a WildFly application server and
 running management commands against it from build and deploy pipelines.

 ## Overview

 WildFly Orchestrator provides functionality to:
 - Launch standalone servers and managed domains and wait until they are ready
 - Execute management commands and scripts over the HTTP management API, or
   in a separate CLI process
 - Apply commands atomically in batches, or one at a time with fail-fast or
   continue-on-error policies
 - Reload or restart a server whose configuration changes require it
 - Remove deployments selected by name or by pattern

 ## Basic Usage

 ```no_run
 use wildfly_orchestrator::server::ServerType;
 use wildfly_orchestrator::{Orchestrator, Result};

 #[tokio::main]
 async fn main() -> Result<()> {
     // Create an orchestrator from a config file
     let mut orchestrator = Orchestrator::from_config_file("orchestrator.yaml")?;

     // Start the server and wait until it is ready
     let server_id = orchestrator.start_server(ServerType::Standalone).await?;
     println!("Server started: {}", server_id);

     // Run the configured commands; reloads or restarts the server if needed
     orchestrator.execute_commands().await?;

     // Remove the configured deployments
     let removed = orchestrator.undeploy().await?;
     println!("Removed {} deployments", removed.len());

     orchestrator.stop_server().await?;
     Ok(())
 }
 ```

 ## Features

 - **Server Management**: Start, stop and recover standalone servers and domains
 - **Command Execution**: In-process over HTTP or forked through the CLI
 - **Configuration**: JSON or YAML config files
 - **Error Handling**: Typed errors with stable result codes
 - **Async Support**: Full async/await support

 ## License

 This project is licensed under the terms in the LICENSE file.
*/

pub mod cli;
pub mod config;
pub mod deployment;
pub mod error;
pub mod management;
pub mod server;

pub use config::OrchestratorConfig;
pub use error::{Error, ErrorKind, Result};
pub use server::{ServerContext, ServerId, ServerType};

use cli::CommandExecutor;
use deployment::{UndeployRequest, Undeployer};
use management::{Connector, HttpConnector};
use server::{ServerLauncher, ServerStateMachine};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

/// Start a server, run commands against it and clean up after it.
///
/// This struct is the main entry point tying the launcher, the command
/// executor, the state machine and the undeploy flow to one configuration.
/// All public methods are instrumented with `tracing` spans.
pub struct Orchestrator {
    /// Configuration
    config: OrchestratorConfig,
    /// Opens management sessions
    connector: Arc<dyn Connector>,
    /// Starts and stops the server
    launcher: Arc<ServerLauncher>,
    /// Recovers the server after commands
    state_machine: ServerStateMachine,
    /// Runs commands
    executor: CommandExecutor,
    /// Removes deployments
    undeployer: Undeployer,
    /// The server started by this orchestrator, if any
    server: Option<ServerContext>,
}

impl Orchestrator {
    /// Create a new orchestrator from a configuration file path
    ///
    /// This method is instrumented with `tracing`.
    #[tracing::instrument(skip(path), fields(config_path = ?path.as_ref()))]
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self> {
        tracing::info!("Loading configuration from file");
        let config = OrchestratorConfig::from_file(path)?;
        Ok(Self::new(config))
    }

    /// Create a new orchestrator from a JSON configuration string
    ///
    /// This method is instrumented with `tracing`.
    #[tracing::instrument(skip(config))]
    pub fn from_config_str(config: &str) -> Result<Self> {
        tracing::info!("Loading configuration from string");
        let config = OrchestratorConfig::parse_from_str(config)?;
        Ok(Self::new(config))
    }

    /// Create a new orchestrator talking HTTP to the configured endpoint
    pub fn new(config: OrchestratorConfig) -> Self {
        let connector = Arc::new(HttpConnector::new(config.effective_connection()));
        Self::with_connector(config, connector)
    }

    /// Create a new orchestrator opening sessions through `connector`
    #[tracing::instrument(skip(config, connector), fields(install_location = %config.server.install_location.display()))]
    pub fn with_connector(config: OrchestratorConfig, connector: Arc<dyn Connector>) -> Self {
        tracing::info!("Creating new Orchestrator");
        let launcher = Arc::new(ServerLauncher::new(connector.clone()));
        Self {
            config,
            state_machine: ServerStateMachine::new(launcher.clone()),
            executor: CommandExecutor::new(connector.clone()),
            undeployer: Undeployer::new(connector.clone()),
            launcher,
            connector,
            server: None,
        }
    }

    /// The configuration
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// The server started by this orchestrator
    pub fn server(&self) -> Option<&ServerContext> {
        self.server.as_ref()
    }

    /// Recovery actions taken so far
    pub fn state_machine(&self) -> &ServerStateMachine {
        &self.state_machine
    }

    /// Start the configured server and wait until it is ready
    ///
    /// Returns the id of the already started server when called twice.
    ///
    /// This method is instrumented with `tracing`.
    #[tracing::instrument(skip(self))]
    pub async fn start_server(&mut self, server_type: ServerType) -> Result<ServerId> {
        if let Some(server) = &self.server {
            let id = server.process().id();
            tracing::debug!(server_id = %id, "Server already started");
            return Ok(id);
        }

        tracing::info!("Attempting to start server");
        let context = self
            .launcher
            .start(server_type, self.config.server.clone())
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to start server");
                e
            })?;

        let id = context.process().id();
        self.server = Some(context);
        tracing::info!(server_id = %id, "Server started successfully");
        Ok(id)
    }

    /// Execute the configured commands
    ///
    /// When this orchestrator owns the server and reloads are enabled, a
    /// server left in `restart-required` is restarted afterwards.
    ///
    /// This method is instrumented with `tracing`.
    #[tracing::instrument(skip(self))]
    pub async fn execute_commands(&mut self) -> Result<()> {
        let Some(mut execution) = self.config.execution.clone() else {
            tracing::debug!("No execution configured");
            return Ok(());
        };

        let mut connection = self.config.effective_connection();
        if connection.authentication_config.is_none() {
            connection.authentication_config = execution.connection.authentication_config.take();
        }
        execution.connection = connection;

        self.executor.execute(&execution).await?;

        if !execution.auto_reload || execution.offline || execution.commands.is_empty() {
            return Ok(());
        }
        if let Some(context) = self.server.take() {
            let session = self.connector.connect().await?;
            let result = self.state_machine.act_on_state(&session, context).await;
            let context = session.close_with(result).await?;
            self.server = Some(context);
        }
        Ok(())
    }

    /// Remove the configured deployments
    ///
    /// This method is instrumented with `tracing`.
    #[tracing::instrument(skip(self))]
    pub async fn undeploy(&self) -> Result<BTreeSet<UndeployRequest>> {
        match &self.config.undeploy {
            Some(undeploy) => self.undeployer.undeploy(undeploy).await,
            None => {
                tracing::debug!("No undeploy configured");
                Ok(BTreeSet::new())
            }
        }
    }

    /// Shut down the server started by this orchestrator
    ///
    /// This method is instrumented with `tracing`.
    #[tracing::instrument(skip(self))]
    pub async fn stop_server(&mut self) -> Result<()> {
        let Some(context) = self.server.take() else {
            tracing::warn!("No server was started by this orchestrator");
            return Ok(());
        };

        tracing::info!(server_id = %context.process().id(), "Attempting to stop server");
        let session = self.connector.connect().await?;
        let result = self.launcher.stop(context, &session).await;
        let exit_code = session.close_with(result).await?;
        tracing::info!(exit_code = ?exit_code, "Server stopped successfully");
        Ok(())
    }
}
