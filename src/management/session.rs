use crate::config::ConnectionConfig;
use crate::error::{Error, Result};
use crate::management::client::{HttpManagementClient, ManagementClient};
use crate::management::operation::{Address, Operation, OperationResult};
use crate::management::state::ServerState;
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use uuid::Uuid;

/// Opens management sessions.
///
/// One session is opened per logical operation (a start, a command
/// execution, a state check) and closed when that operation ends.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a new session.
    async fn connect(&self) -> Result<ManagementSession>;
}

/// Connector for the HTTP management interface.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    config: ConnectionConfig,
}

impl HttpConnector {
    /// Create a new connector
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }

    /// The connection configuration
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }
}

#[async_trait]
impl Connector for HttpConnector {
    async fn connect(&self) -> Result<ManagementSession> {
        let client = HttpManagementClient::new(&self.config)?;
        tracing::debug!(url = %client.url(), "Opened management session");
        Ok(ManagementSession::new(Arc::new(client)))
    }
}

/// A scoped connection to a management endpoint.
///
/// A session is owned by exactly one orchestration call. It is not `Clone`;
/// pass it by reference to the components taking part in that call and close
/// it with [`ManagementSession::close`] or [`ManagementSession::close_with`].
pub struct ManagementSession {
    id: Uuid,
    client: Arc<dyn ManagementClient>,
}

impl ManagementSession {
    /// Wraps a client into a session.
    pub fn new(client: Arc<dyn ManagementClient>) -> Self {
        Self {
            id: Uuid::new_v4(),
            client,
        }
    }

    /// Session identifier, useful to correlate log lines.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Executes an operation and returns the raw result.
    pub async fn execute(&self, operation: &Operation) -> Result<OperationResult> {
        self.client.execute(operation).await
    }

    /// Executes an operation, mapping a failed outcome to an error.
    pub async fn invoke(&self, operation: &Operation) -> Result<Value> {
        let result = self.execute(operation).await?;
        if let Some(state) = result.process_state() {
            tracing::debug!(operation = %operation, process_state = %state, "Operation changed the process state");
        }
        result.into_result(operation)
    }

    /// Reads a named attribute of a resource.
    pub async fn read_attribute(&self, address: &Address, name: &str) -> Result<Value> {
        self.invoke(&Operation::read_attribute(address.clone(), name))
            .await
    }

    /// Reads the names of the children of the given type.
    pub async fn read_children_names(&self, address: &Address, child_type: &str) -> Result<Vec<String>> {
        let value = self
            .invoke(&Operation::read_children_names(address.clone(), child_type))
            .await?;
        Ok(string_list(&value))
    }

    /// Reads the process state of a standalone server.
    pub async fn server_state(&self) -> Result<ServerState> {
        let value = self.read_attribute(&Address::root(), "server-state").await?;
        Ok(value
            .as_str()
            .map(ServerState::from_wire)
            .unwrap_or(ServerState::Unknown))
    }

    /// Whether a standalone server reports `running`.
    ///
    /// Connection failures count as "not running".
    pub async fn is_standalone_running(&self) -> bool {
        matches!(self.server_state().await, Ok(ServerState::Running))
    }

    /// Finds the name of the first host of a domain.
    pub async fn domain_host(&self) -> Result<String> {
        self.read_children_names(&Address::root(), "host")
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::OperationFailed {
                operation: "read-children-names".to_string(),
                reason: "The domain has no host".to_string(),
            })
    }

    /// Reads the process state of the first domain host.
    pub async fn host_state(&self) -> Result<ServerState> {
        let host = self.domain_host().await?;
        let value = self
            .read_attribute(&Address::root().append("host", host), "host-state")
            .await?;
        Ok(value
            .as_str()
            .map(ServerState::from_wire)
            .unwrap_or(ServerState::Unknown))
    }

    /// Whether the domain host and every auto-start server are running.
    ///
    /// Connection failures count as "not running".
    pub async fn is_domain_running(&self) -> bool {
        match self.domain_ready().await {
            Ok(running) => running,
            Err(e) => {
                tracing::trace!(error = %e, "Domain state not available");
                false
            }
        }
    }

    pub(crate) async fn domain_ready(&self) -> Result<bool> {
        let host = self.domain_host().await?;
        let host_address = Address::root().append("host", host.clone());
        let host_state = self.read_attribute(&host_address, "host-state").await?;
        if host_state.as_str().map(ServerState::from_wire) != Some(ServerState::Running) {
            return Ok(false);
        }

        let servers = self
            .invoke(&Operation::read_children_resources(
                host_address,
                "server-config",
            ))
            .await?;
        let Value::Object(servers) = servers else {
            return Ok(true);
        };
        for (name, server) in &servers {
            let auto_start = server
                .get("auto-start")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            let status = server.get("status").and_then(Value::as_str).unwrap_or("");
            if auto_start && status != "STARTED" {
                tracing::trace!(host = %host, server = %name, status = %status, "Domain server not started yet");
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Whether the server behind this session is a domain controller.
    pub async fn is_domain(&self) -> Result<bool> {
        let launch_type = self.read_attribute(&Address::root(), "launch-type").await?;
        Ok(launch_type
            .as_str()
            .map(|t| t.eq_ignore_ascii_case("DOMAIN"))
            .unwrap_or(false))
    }

    /// Sends the `reload` operation to a standalone server (root address) or a
    /// domain host.
    ///
    /// The server may drop the connection while reloading; that is not an error.
    pub async fn reload(&self, address: Address) -> Result<()> {
        match self.invoke(&Operation::reload(address)).await {
            Ok(_) => Ok(()),
            Err(Error::Connection(msg)) => {
                tracing::debug!(error = %msg, "Connection closed while reloading");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Sends the `shutdown` operation to a standalone server or a domain host.
    ///
    /// The server may drop the connection while shutting down; that is not an error.
    pub async fn shutdown(&self, address: Address, timeout: Option<u64>) -> Result<()> {
        match self.invoke(&Operation::shutdown(address, timeout)).await {
            Ok(_) => Ok(()),
            Err(Error::Connection(msg)) => {
                tracing::debug!(error = %msg, "Connection closed while shutting down");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Closes the session.
    pub async fn close(self) -> Result<()> {
        tracing::trace!(session = %self.id, "Closing management session");
        self.client.close().await
    }

    /// Closes the session and returns `result`.
    ///
    /// A failure to close is logged and does not replace `result`.
    pub async fn close_with<T>(self, result: Result<T>) -> Result<T> {
        let id = self.id;
        if let Err(e) = self.close().await {
            tracing::warn!(session = %id, error = %e, "Failed to close management session");
        }
        result
    }
}

/// Opens a session, runs `f` with it and closes it on every exit path.
///
/// # Examples
///
/// ```no_run
/// use wildfly_orchestrator::config::ConnectionConfig;
/// use wildfly_orchestrator::management::{HttpConnector, with_session};
///
/// # async fn example() -> wildfly_orchestrator::Result<()> {
/// let connector = HttpConnector::new(ConnectionConfig::default());
/// let state = with_session(&connector, |session| {
///     Box::pin(async move { session.server_state().await })
/// })
/// .await?;
/// println!("Server state: {}", state);
/// # Ok(())
/// # }
/// ```
pub async fn with_session<T, F>(connector: &(dyn Connector + '_), f: F) -> Result<T>
where
    F: for<'a> FnOnce(&'a ManagementSession) -> Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>,
{
    let session = connector.connect().await?;
    let result = f(&session).await;
    session.close_with(result).await
}

pub(crate) fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}
