use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// A deployment known to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentDescriptor {
    name: String,
    server_groups: BTreeSet<String>,
}

impl DeploymentDescriptor {
    /// Create a descriptor not assigned to any server group
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            server_groups: BTreeSet::new(),
        }
    }

    /// Set the server groups the deployment is assigned to
    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.server_groups = groups.into_iter().map(Into::into).collect();
        self
    }

    /// Deployment name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Server groups (domain mode only)
    pub fn server_groups(&self) -> &BTreeSet<String> {
        &self.server_groups
    }
}

/// A deployment to remove.
///
/// Equality, ordering and hashing use the name only, so a set of requests
/// holds at most one request per deployment. Merge target groups before
/// inserting when they matter.
#[derive(Debug, Clone)]
pub struct UndeployRequest {
    name: String,
    target_groups: BTreeSet<String>,
    fail_on_missing: bool,
}

impl UndeployRequest {
    /// Create a request; empty `target_groups` means every group
    pub fn new(name: impl Into<String>, target_groups: BTreeSet<String>, fail_on_missing: bool) -> Self {
        Self {
            name: name.into(),
            target_groups,
            fail_on_missing,
        }
    }

    /// Deployment name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Server groups to remove the deployment from
    pub fn target_groups(&self) -> &BTreeSet<String> {
        &self.target_groups
    }

    /// Whether a missing deployment is an error
    pub fn fail_on_missing(&self) -> bool {
        self.fail_on_missing
    }
}

impl PartialEq for UndeployRequest {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for UndeployRequest {}

impl PartialOrd for UndeployRequest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for UndeployRequest {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

impl Hash for UndeployRequest {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

/// What to do when a pattern matches more than one deployment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", rename_all = "lowercase")]
pub enum MatchStrategy {
    /// Take the first match
    First,
    /// Take every match
    All,
    /// Fail on more than one match
    #[default]
    Fail,
}

impl FromStr for MatchStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" => Ok(MatchStrategy::First),
            "all" => Ok(MatchStrategy::All),
            "fail" => Ok(MatchStrategy::Fail),
            _ => Err(Error::Validation(format!(
                "Invalid match strategy '{}'. Valid strategies are: first, all, fail",
                s
            ))),
        }
    }
}

impl TryFrom<String> for MatchStrategy {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchStrategy::First => write!(f, "first"),
            MatchStrategy::All => write!(f, "all"),
            MatchStrategy::Fail => write!(f, "fail"),
        }
    }
}

/// Selects the deployments whose full name matches `pattern`.
///
/// With `requested_groups` empty every name match is selected and the
/// request targets all groups. Otherwise a deployment is selected only when
/// it is assigned to at least one requested group, and the request targets
/// exactly those groups.
///
/// # Errors
///
/// * [`Error::Validation`] for an invalid pattern
/// * [`Error::AmbiguousMatch`] for more than one match under [`MatchStrategy::Fail`]
///
/// # Examples
///
/// ```
/// use wildfly_orchestrator::deployment::{DeploymentDescriptor, MatchStrategy, match_deployments};
/// use std::collections::BTreeSet;
///
/// let deployments = vec![
///     DeploymentDescriptor::new("app-a.war"),
///     DeploymentDescriptor::new("app-b.war"),
///     DeploymentDescriptor::new("other.war"),
/// ];
/// let matched = match_deployments("app-.*", &deployments, &BTreeSet::new(), MatchStrategy::All, false)
///     .unwrap();
/// let names: Vec<&str> = matched.iter().map(|r| r.name()).collect();
/// assert_eq!(names, vec!["app-a.war", "app-b.war"]);
/// ```
#[tracing::instrument(skip(deployments, requested_groups), fields(deployments = deployments.len()))]
pub fn match_deployments(
    pattern: &str,
    deployments: &[DeploymentDescriptor],
    requested_groups: &BTreeSet<String>,
    strategy: MatchStrategy,
    fail_on_missing: bool,
) -> Result<BTreeSet<UndeployRequest>> {
    let regex = Regex::new(&format!("^(?:{})$", pattern))
        .map_err(|e| Error::Validation(format!("Invalid match pattern '{}': {}", pattern, e)))?;

    let mut matched = BTreeSet::new();
    for deployment in deployments {
        if !regex.is_match(&deployment.name) {
            continue;
        }

        let target_groups = if requested_groups.is_empty() {
            BTreeSet::new()
        } else {
            let groups: BTreeSet<String> = deployment
                .server_groups
                .intersection(requested_groups)
                .cloned()
                .collect();
            if groups.is_empty() {
                continue;
            }
            groups
        };

        matched.insert(UndeployRequest::new(
            deployment.name.clone(),
            target_groups,
            fail_on_missing,
        ));
        if strategy == MatchStrategy::First {
            break;
        }
    }

    if strategy == MatchStrategy::Fail && matched.len() > 1 {
        return Err(Error::AmbiguousMatch {
            count: matched.len(),
            pattern: pattern.to_string(),
            matches: matched.iter().map(|r| r.name.clone()).collect(),
        });
    }

    tracing::debug!(matched = matched.len(), "Matched deployments");
    Ok(matched)
}
