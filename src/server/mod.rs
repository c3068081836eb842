/// Server management module for the orchestrator.
///
/// This module launches server processes, waits for them to become ready and
/// recovers them when management changes leave them in the `reload-required`
/// or `restart-required` state. All public components are instrumented with
/// `tracing` spans.
///
/// # Components
///
/// * `command_builder` - Per server type command line construction
/// * `launcher` - Starting and stopping servers
/// * `lifecycle` - Post-command recovery state machine
/// * `monitor` - Readiness polling over a management session
/// * `output` - Output redirection and capture of spawned processes
/// * `process` - Core process management for server instances
///
/// # Examples
///
/// Starting a standalone server and reacting to its state:
///
/// ```no_run
/// use wildfly_orchestrator::config::{ConnectionConfig, LaunchConfig};
/// use wildfly_orchestrator::management::{Connector, HttpConnector};
/// use wildfly_orchestrator::server::{ServerLauncher, ServerStateMachine, ServerType};
/// use std::sync::Arc;
///
/// # async fn example() -> wildfly_orchestrator::Result<()> {
/// let connector = Arc::new(HttpConnector::new(ConnectionConfig::default()));
/// let launcher = Arc::new(ServerLauncher::new(connector.clone()));
///
/// let config = LaunchConfig::new("/opt/wildfly");
/// let context = launcher.start(ServerType::Standalone, config).await?;
///
/// let machine = ServerStateMachine::new(launcher.clone());
/// let session = connector.connect().await?;
/// let context = machine.act_on_state(&session, context).await;
/// let context = session.close_with(context).await?;
/// println!("Server running with pid {}", context.process().pid());
/// # Ok(())
/// # }
/// ```
///
/// Building a command line without launching:
///
/// ```
/// use wildfly_orchestrator::config::LaunchConfig;
/// use wildfly_orchestrator::server::{ServerType, command_builder};
///
/// let config = LaunchConfig::new("/opt/wildfly");
/// let command_line = command_builder(ServerType::Standalone, &config).build();
/// assert!(command_line.contains(&"org.jboss.as.standalone".to_string()));
/// ```
pub mod command_builder;
pub mod launcher;
pub mod lifecycle;
pub mod monitor;
mod output;
mod process;

pub use command_builder::{
    CommandBuilder, DomainCommandBuilder, JvmLaunch, StandaloneCommandBuilder, command_builder,
};
pub use launcher::{ServerContext, ServerLauncher, ServerType};
pub use lifecycle::{ServerEvent, ServerLifecycleEvent, ServerStateMachine, reload_if_required};
pub use monitor::ReadinessMonitor;
pub use output::{CAPTURE_LIMIT, OutputCapture, StandardOutput};
pub use process::{Liveness, ProcessProbe, ServerId, ServerProcessHandle};
