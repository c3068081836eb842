/// Management module for the orchestrator.
///
/// This module talks to the management endpoint of a running server. It
/// provides the operation model sent on the wire, a transport-agnostic
/// [`ManagementClient`] trait with an HTTP implementation, and the scoped
/// [`ManagementSession`] every other component works through.
///
/// # Examples
///
/// Reading the server state:
///
/// ```no_run
/// use wildfly_orchestrator::config::ConnectionConfig;
/// use wildfly_orchestrator::management::{Connector, HttpConnector};
///
/// # async fn example() -> wildfly_orchestrator::Result<()> {
/// let connector = HttpConnector::new(ConnectionConfig::default());
/// let session = connector.connect().await?;
/// let state = session.server_state().await;
/// let state = session.close_with(state).await?;
/// println!("Server state: {}", state);
/// # Ok(())
/// # }
/// ```
pub mod client;
pub mod operation;
pub(crate) mod session;
mod state;

pub use client::{HttpManagementClient, ManagementClient};
pub use operation::{Address, Operation, OperationResult, Outcome};
pub use session::{Connector, HttpConnector, ManagementSession, with_session};
pub use state::ServerState;
