use crate::config::UndeployConfig;
use crate::deployment::matcher::{DeploymentDescriptor, UndeployRequest, match_deployments};
use crate::error::{Error, Result};
use crate::management::{Address, Connector, ManagementSession, Operation};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

impl ManagementSession {
    /// Lists the deployments of the server, ordered by name.
    ///
    /// In domain mode each descriptor carries the server groups the
    /// deployment is assigned to.
    pub async fn deployments(&self) -> Result<Vec<DeploymentDescriptor>> {
        let root = Address::root();
        let mut deployments: BTreeMap<String, BTreeSet<String>> = self
            .read_children_names(&root, "deployment")
            .await?
            .into_iter()
            .map(|name| (name, BTreeSet::new()))
            .collect();

        if self.is_domain().await? {
            for group in self.read_children_names(&root, "server-group").await? {
                let address = root.clone().append("server-group", group.clone());
                for name in self.read_children_names(&address, "deployment").await? {
                    deployments.entry(name).or_default().insert(group.clone());
                }
            }
        }

        Ok(deployments
            .into_iter()
            .map(|(name, groups)| DeploymentDescriptor::new(name).with_groups(groups))
            .collect())
    }

    /// Removes deployments in one composite operation.
    ///
    /// On a standalone server each deployment is undeployed and its content
    /// removed. In a domain it is removed from its target groups (every group
    /// when none is given), and its content is removed once no group
    /// references it anymore.
    ///
    /// # Errors
    ///
    /// * [`Error::DeploymentNotFound`] for a missing deployment whose request
    ///   has `fail_on_missing` set
    /// * [`Error::CommandExecution`] when the server rejects the removal
    #[tracing::instrument(skip(self, requests), fields(session = %self.id(), requests = requests.len()))]
    pub async fn undeploy(&self, requests: &BTreeSet<UndeployRequest>) -> Result<()> {
        if requests.is_empty() {
            return Ok(());
        }

        let domain = self.is_domain().await?;
        let existing: BTreeMap<String, DeploymentDescriptor> = self
            .deployments()
            .await?
            .into_iter()
            .map(|d| (d.name().to_string(), d))
            .collect();

        let mut steps = Vec::new();
        for request in requests {
            let Some(deployment) = existing.get(request.name()) else {
                if request.fail_on_missing() {
                    tracing::error!(deployment = %request.name(), "Deployment not found");
                    return Err(Error::DeploymentNotFound(request.name().to_string()));
                }
                tracing::warn!(deployment = %request.name(), "Deployment not found, skipping");
                continue;
            };
            steps.extend(undeploy_steps(request, deployment, domain));
        }

        if steps.is_empty() {
            return Ok(());
        }

        let names: Vec<&str> = requests.iter().map(UndeployRequest::name).collect();
        let result = self.execute(&Operation::composite(steps)).await?;
        if !result.is_success() {
            return Err(Error::CommandExecution(format!(
                "Failed to undeploy {}: {}",
                names.join(", "),
                result.failure_message()
            )));
        }
        tracing::info!(deployments = %names.join(", "), "Undeployed");
        Ok(())
    }
}

fn undeploy_steps(request: &UndeployRequest, deployment: &DeploymentDescriptor, domain: bool) -> Vec<Operation> {
    let content = Address::root().append("deployment", request.name());
    if !domain {
        return vec![
            Operation::new("undeploy", content.clone()),
            Operation::new("remove", content),
        ];
    }

    let groups = if request.target_groups().is_empty() {
        deployment.server_groups()
    } else {
        request.target_groups()
    };

    let mut steps = Vec::new();
    for group in groups.intersection(deployment.server_groups()) {
        let address = Address::root()
            .append("server-group", group.clone())
            .append("deployment", request.name());
        steps.push(Operation::new("undeploy", address.clone()));
        steps.push(Operation::new("remove", address));
    }
    if deployment.server_groups().is_subset(groups) {
        steps.push(Operation::new("remove", content));
    }
    steps
}

/// Removes deployments by name or by pattern.
pub struct Undeployer {
    connector: Arc<dyn Connector>,
}

impl Undeployer {
    /// Create an undeployer reaching the server through `connector`
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self { connector }
    }

    /// Removes the deployments selected by `config` and returns them.
    ///
    /// Nothing matching the pattern is a success unless
    /// `ignore_missing_deployment` is disabled.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// * Neither a name nor a pattern is configured
    /// * The pattern is invalid or ambiguous under the `fail` strategy
    /// * A required deployment is missing
    /// * The server rejects the removal
    #[tracing::instrument(skip(self, config), fields(name = ?config.name, pattern = ?config.match_pattern))]
    pub async fn undeploy(&self, config: &UndeployConfig) -> Result<BTreeSet<UndeployRequest>> {
        if config.name.is_none() && config.match_pattern.is_none() {
            return Err(Error::Validation(
                "Either a deployment name or a match pattern is required".to_string(),
            ));
        }

        let session = self.connector.connect().await?;
        let result = self.undeploy_with(&session, config).await;
        session.close_with(result).await
    }

    async fn undeploy_with(
        &self,
        session: &ManagementSession,
        config: &UndeployConfig,
    ) -> Result<BTreeSet<UndeployRequest>> {
        let groups: BTreeSet<String> = config.server_groups.iter().cloned().collect();
        let fail_on_missing = !config.ignore_missing_deployment;

        let requests = match (&config.match_pattern, &config.name) {
            (Some(pattern), _) => {
                let deployments = session.deployments().await?;
                let matched = match_deployments(
                    pattern,
                    &deployments,
                    &groups,
                    config.match_pattern_strategy,
                    fail_on_missing,
                )?;
                if matched.is_empty() {
                    if fail_on_missing {
                        return Err(Error::DeploymentNotFound(format!(
                            "No deployment matched the pattern '{}'",
                            pattern
                        )));
                    }
                    tracing::info!(pattern = %pattern, "No deployment matched, nothing to undeploy");
                    return Ok(matched);
                }
                matched
            }
            (None, Some(name)) => {
                BTreeSet::from([UndeployRequest::new(name.clone(), groups, fail_on_missing)])
            }
            (None, None) => BTreeSet::new(),
        };

        session.undeploy(&requests).await?;
        Ok(requests)
    }
}
