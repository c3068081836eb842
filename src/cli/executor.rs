use crate::cli::command::{CommandSet, Unit, group_units, read_script};
use crate::cli::forked;
use crate::cli::parser::{CliCommand, parse_command};
use crate::config::{ExecutionConfig, PropertyView, validate_execution_config};
use crate::error::{Error, Result};
use crate::management::{Connector, ManagementSession, Operation, ServerState};
use crate::server::{ReadinessMonitor, reload_if_required};
use std::sync::Arc;

/// Runs command sets against a server.
///
/// Commands run in this process over a management session, or in a helper
/// CLI process when the configuration asks for `fork` or `offline`.
pub struct CommandExecutor {
    connector: Arc<dyn Connector>,
    monitor: ReadinessMonitor,
}

impl CommandExecutor {
    /// Create an executor reaching the server through `connector`
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            monitor: ReadinessMonitor::default(),
        }
    }

    /// Replace the readiness monitor used after reloads
    pub fn with_monitor(mut self, monitor: ReadinessMonitor) -> Self {
        self.monitor = monitor;
        self
    }

    /// Executes the configured commands and scripts.
    ///
    /// An empty command set is a no-op. With `fail_on_error` disabled,
    /// failing commands are logged and skipped and the call still succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// * The installation location is required but invalid
    /// * The management endpoint cannot be reached
    /// * A command fails while `fail_on_error` is set
    /// * The forked CLI process exits with a non-zero code
    /// * A required reload does not complete in time
    #[tracing::instrument(skip(self, config), fields(batch = config.batch, fork = config.fork, offline = config.offline))]
    pub async fn execute(&self, config: &ExecutionConfig) -> Result<()> {
        if config.commands.is_empty() {
            tracing::debug!("No commands to execute");
            return Ok(());
        }
        validate_execution_config(config)?;

        if config.offline || config.fork {
            forked::execute(config).await?;
        } else {
            self.execute_in_process(config).await?;
        }

        if config.offline {
            return Ok(());
        }
        self.after_execution(config).await
    }

    async fn execute_in_process(&self, config: &ExecutionConfig) -> Result<()> {
        let properties = PropertyView::builder()
            .install_location(config.install_location.as_deref())
            .properties_files(&config.properties_files)
            .await?
            .overrides(&config.system_properties)
            .build();
        tracing::debug!(properties = properties.len(), "Resolved command properties");

        let session = self.connector.connect().await?;
        let mut context = CommandContext::new(&session, &properties, config);
        let result = context.run(&config.commands).await;
        session.close_with(result).await
    }

    async fn after_execution(&self, config: &ExecutionConfig) -> Result<()> {
        let session = match self.connector.connect().await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e, "Cannot check the server state after execution");
                return Ok(());
            }
        };
        let result = self.check_state(&session, config).await;
        session.close_with(result).await
    }

    async fn check_state(&self, session: &ManagementSession, config: &ExecutionConfig) -> Result<()> {
        if config.auto_reload {
            match reload_if_required(&self.monitor, session, config.timeout_seconds).await {
                Err(Error::Connection(msg)) => {
                    tracing::warn!(error = %msg, "Server not reachable, skipping the reload check");
                    return Ok(());
                }
                other => other?,
            }
        }

        let state = match session.is_domain().await {
            Ok(true) => session.host_state().await,
            Ok(false) => session.server_state().await,
            Err(e) => Err(e),
        };
        match state {
            Ok(ServerState::Running) => {}
            Ok(state) => tracing::warn!(
                "The server may be in an unexpected state for further interaction. The current state is {}",
                state
            ),
            Err(e) => tracing::warn!(error = %e, "Failed to read the server state"),
        }
        Ok(())
    }
}

/// State of one in-process execution: the session, the property view and the
/// error policy.
pub struct CommandContext<'a> {
    session: &'a ManagementSession,
    properties: &'a PropertyView,
    batch: bool,
    fail_on_error: bool,
    strict: bool,
    failures: usize,
}

impl<'a> CommandContext<'a> {
    /// Binds a context to a session
    pub fn new(
        session: &'a ManagementSession,
        properties: &'a PropertyView,
        config: &ExecutionConfig,
    ) -> Self {
        Self {
            session,
            properties,
            batch: config.batch,
            fail_on_error: config.fail_on_error,
            strict: config.resolve_expressions,
            failures: 0,
        }
    }

    /// Number of failures skipped so far
    pub fn failures(&self) -> usize {
        self.failures
    }

    /// Runs the literal commands, then every script.
    pub async fn run(&mut self, commands: &CommandSet) -> Result<()> {
        if !commands.commands().is_empty() {
            self.run_collection("commands", commands.commands()).await?;
        }
        for script in commands.scripts() {
            tracing::info!(script = %script.display(), "Executing script");
            let lines = read_script(script).await?;
            self.run_collection(&script.display().to_string(), &lines)
                .await?;
        }

        if self.failures > 0 {
            tracing::warn!(failures = self.failures, "Commands failed, continuing as configured");
        }
        Ok(())
    }

    async fn run_collection(&mut self, name: &str, lines: &[String]) -> Result<()> {
        let units = match group_units(lines, self.batch) {
            Ok(units) => units,
            Err(e) => return self.on_failure(name, e),
        };

        for unit in units {
            let result = match &unit {
                Unit::Single(command) => self.run_single(command).await,
                Unit::Batch(commands) => self.run_batch(commands).await,
            };
            if let Err(e) = result {
                self.on_failure(name, e)?;
            }
        }
        Ok(())
    }

    fn on_failure(&mut self, collection: &str, error: Error) -> Result<()> {
        // An unreachable server makes every following command fail too
        if matches!(error, Error::Connection(_)) || self.fail_on_error {
            tracing::error!(collection = %collection, error = %error, "Command execution failed");
            return Err(error);
        }
        tracing::warn!(collection = %collection, error = %error, "Command failed, continuing");
        self.failures += 1;
        Ok(())
    }

    fn parse(&self, line: &str) -> Result<CliCommand> {
        let resolved = self.properties.resolve(line, self.strict)?;
        parse_command(&resolved)
    }

    async fn run_single(&self, line: &str) -> Result<()> {
        let command = self.parse(line)?;
        tracing::debug!(command = %line, "Executing command");

        let operations = command.operations();
        let operation = match <[Operation; 1]>::try_from(operations) {
            Ok([operation]) => operation,
            Err(operations) => Operation::composite(operations),
        };

        let result = self.session.execute(&operation).await?;
        if !result.is_success() {
            return Err(Error::CommandExecution(format!(
                "Failed to execute '{}': {}",
                line,
                result.failure_message()
            )));
        }
        Ok(())
    }

    async fn run_batch(&self, lines: &[String]) -> Result<()> {
        let mut steps = Vec::new();
        for line in lines {
            let command = self.parse(line)?;
            if !command.is_batchable() {
                return Err(Error::CommandExecution(format!(
                    "'{}' cannot be part of a batch",
                    line
                )));
            }
            steps.extend(command.operations());
        }
        tracing::debug!(steps = steps.len(), "Executing batch");

        let result = self.session.execute(&Operation::composite(steps)).await?;
        if !result.is_success() {
            return Err(Error::CommandExecution(format!(
                "The batch was rolled back: {}",
                result.failure_message()
            )));
        }
        Ok(())
    }
}
