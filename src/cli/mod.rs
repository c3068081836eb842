/// Command execution module for the orchestrator.
///
/// Commands are either operation requests (`/subsystem=logging:read-resource`)
/// or a few high level commands (`reload`, `shutdown`, `undeploy <name>`).
/// They run in this process over a management session, or in a separate CLI
/// process when forking or working offline.
///
/// # Examples
///
/// Running commands in a batch:
///
/// ```no_run
/// use wildfly_orchestrator::cli::{CommandExecutor, CommandSet};
/// use wildfly_orchestrator::config::{ConnectionConfig, ExecutionConfig};
/// use wildfly_orchestrator::management::HttpConnector;
/// use std::sync::Arc;
///
/// # async fn example() -> wildfly_orchestrator::Result<()> {
/// let executor = CommandExecutor::new(Arc::new(HttpConnector::new(ConnectionConfig::default())));
///
/// let mut config = ExecutionConfig::with_commands(
///     CommandSet::builder()
///         .command("/system-property=foo:add(value=bar)")
///         .command("/system-property=baz:add(value=${foo.value:qux})")
///         .build(),
/// );
/// config.batch = true;
///
/// executor.execute(&config).await?;
/// # Ok(())
/// # }
/// ```
pub mod command;
mod executor;
pub mod forked;
mod parser;

pub use command::{CommandSet, CommandSetBuilder, Unit, group_units, read_script};
pub use executor::{CommandContext, CommandExecutor};
pub use parser::{CliCommand, parse_command};
