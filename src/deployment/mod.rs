/// Deployment removal for the orchestrator.
///
/// Deployments are selected by exact name or by a regular expression matched
/// against the full deployment name. A [`MatchStrategy`] decides what happens
/// when a pattern selects more than one deployment.
///
/// # Examples
///
/// ```no_run
/// use wildfly_orchestrator::config::{ConnectionConfig, UndeployConfig};
/// use wildfly_orchestrator::deployment::{MatchStrategy, Undeployer};
/// use wildfly_orchestrator::management::HttpConnector;
/// use std::sync::Arc;
///
/// # async fn example() -> wildfly_orchestrator::Result<()> {
/// let undeployer = Undeployer::new(Arc::new(HttpConnector::new(ConnectionConfig::default())));
/// let config = UndeployConfig {
///     match_pattern: Some("app-.*\\.war".to_string()),
///     match_pattern_strategy: MatchStrategy::All,
///     ..UndeployConfig::default()
/// };
/// let removed = undeployer.undeploy(&config).await?;
/// println!("Removed {} deployments", removed.len());
/// # Ok(())
/// # }
/// ```
mod matcher;
mod undeploy;

pub use matcher::{DeploymentDescriptor, MatchStrategy, UndeployRequest, match_deployments};
pub use undeploy::Undeployer;
