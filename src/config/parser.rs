use crate::cli::CommandSet;
use crate::deployment::MatchStrategy;
use crate::error::{Error, Result};
use crate::server::StandardOutput;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const DEFAULT_HOSTNAME: &str = "localhost";
const DEFAULT_PORT: u16 = 9990;
const DEFAULT_TIMEOUT_SECONDS: u64 = 60;

fn default_hostname() -> String {
    DEFAULT_HOSTNAME.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_protocol() -> String {
    "http".to_string()
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

fn default_request_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_debug_host() -> String {
    "*".to_string()
}

fn default_debug_port() -> u16 {
    8787
}

/// How to reach the management endpoint of a server.
///
/// # Examples
///
/// ```
/// use wildfly_orchestrator::config::ConnectionConfig;
///
/// let connection = ConnectionConfig::default()
///     .with_jvm_overrides(&["-Djboss.socket.binding.port-offset=100".to_string()]);
/// assert_eq!(connection.port, 10090);
/// assert_eq!(connection.management_url(), "http://localhost:10090/management");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConnectionConfig {
    /// Host name or address of the management interface.
    #[serde(default = "default_hostname")]
    pub hostname: String,

    /// Port of the HTTP management interface.
    #[serde(default = "default_port")]
    pub port: u16,

    /// `http` or `https`.
    #[serde(default = "default_protocol")]
    pub protocol: String,

    /// Optional user for HTTP basic authentication.
    #[serde(default)]
    pub username: Option<String>,

    /// Optional password for HTTP basic authentication.
    #[serde(default)]
    pub password: Option<String>,

    /// Location of an authentication configuration handed to forked CLI processes.
    #[serde(default)]
    pub authentication_config: Option<String>,

    /// Upper bound for a single management request.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            hostname: default_hostname(),
            port: default_port(),
            protocol: default_protocol(),
            username: None,
            password: None,
            authentication_config: None,
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

impl ConnectionConfig {
    /// The URL management operations are posted to.
    pub fn management_url(&self) -> String {
        format!("{}://{}:{}/management", self.protocol, self.hostname, self.port)
    }

    /// The `host:port` pair used as controller address by the CLI.
    pub fn controller(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }

    /// Applies management address overrides found in JVM options.
    ///
    /// Recognizes `-Djboss.management.http.port=`, `-Djboss.management.https.port=`,
    /// `-Djboss.socket.binding.port-offset=` and `-Djboss.bind.address.management=`.
    /// The offset is added to the explicit management port when one is given,
    /// else to the configured port, whatever the option order. Unparsable values
    /// are ignored.
    pub fn with_jvm_overrides(mut self, jvm_options: &[String]) -> Self {
        let mut explicit_port = None;
        let mut offset: u16 = 0;
        for opt in jvm_options {
            if let Some(value) = opt
                .strip_prefix("-Djboss.management.http.port=")
                .or_else(|| opt.strip_prefix("-Djboss.management.https.port="))
            {
                match value.trim().parse::<u16>() {
                    Ok(port) => explicit_port = Some(port),
                    Err(_) => tracing::warn!(option = %opt, "Ignoring invalid management port"),
                }
            } else if let Some(value) = opt.strip_prefix("-Djboss.socket.binding.port-offset=") {
                match value.trim().parse::<u16>() {
                    Ok(value) => offset = value,
                    Err(_) => tracing::warn!(option = %opt, "Ignoring invalid port offset"),
                }
            } else if let Some(value) = opt.strip_prefix("-Djboss.bind.address.management=") {
                self.hostname = value.trim().to_string();
            }
        }
        self.port = explicit_port.unwrap_or(self.port).saturating_add(offset);
        self
    }
}

/// Java debug agent settings for a launched standalone server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DebugConfig {
    /// Whether to start the server with the debug agent
    #[serde(default)]
    pub enabled: bool,
    /// Host the agent listens on, `*` for all hosts
    #[serde(default = "default_debug_host")]
    pub host: String,
    /// Port the agent listens on
    #[serde(default = "default_debug_port")]
    pub port: u16,
    /// Suspend the JVM until a debugger attaches
    #[serde(default)]
    pub suspend: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_debug_host(),
            port: default_debug_port(),
            suspend: false,
        }
    }
}

/// Everything needed to launch a server process.
///
/// The same value is kept in the [`ServerContext`](crate::server::ServerContext)
/// so a restart relaunches the server exactly as it was started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LaunchConfig {
    /// The server installation directory (`JBOSS_HOME`).
    pub install_location: PathBuf,

    /// Java installation used to run the server; `JAVA_HOME` or `PATH` when unset.
    #[serde(default)]
    pub java_home: Option<PathBuf>,

    /// Extra module directories appended to `<install>/modules`.
    #[serde(default)]
    pub module_dirs: Vec<PathBuf>,

    /// JVM options for the server (or the domain controllers).
    #[serde(default)]
    pub java_opts: Vec<String>,

    /// Options passed to JBoss Modules, e.g. Java agents.
    #[serde(default)]
    pub module_options: Vec<String>,

    /// Debug agent settings (standalone only).
    #[serde(default)]
    pub debug: DebugConfig,

    /// Standalone configuration file, e.g. `standalone-full.xml`.
    #[serde(default)]
    pub server_config: Option<String>,

    /// Domain configuration file, e.g. `domain.xml`.
    #[serde(default)]
    pub domain_config: Option<String>,

    /// Host configuration file, e.g. `host.xml`.
    #[serde(default)]
    pub host_config: Option<String>,

    /// System properties file passed to the server with `-P`.
    #[serde(default)]
    pub properties_file: Option<PathBuf>,

    /// Extra arguments passed to the server.
    #[serde(default)]
    pub server_args: Vec<String>,

    /// Environment variables added to the server process.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Where the server output goes.
    #[serde(default)]
    pub stdout: StandardOutput,

    /// Bound for the initial startup.
    #[serde(default = "default_timeout")]
    pub startup_timeout_seconds: u64,

    /// Bound for reloads and shutdowns.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl LaunchConfig {
    /// Creates a launch configuration with defaults for everything but the location.
    pub fn new(install_location: impl Into<PathBuf>) -> Self {
        Self {
            install_location: install_location.into(),
            java_home: None,
            module_dirs: Vec::new(),
            java_opts: Vec::new(),
            module_options: Vec::new(),
            debug: DebugConfig::default(),
            server_config: None,
            domain_config: None,
            host_config: None,
            properties_file: None,
            server_args: Vec::new(),
            env: BTreeMap::new(),
            stdout: StandardOutput::default(),
            startup_timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }

    /// Sets the JVM options from a space delimited string.
    pub fn set_java_opts(&mut self, value: &str) {
        self.java_opts = split_options(value);
    }

    /// Sets the JBoss Modules options from a space delimited string.
    pub fn set_module_options(&mut self, value: &str) {
        self.module_options = split_options(value);
    }
}

/// Splits a whitespace delimited option string.
pub fn split_options(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}

/// Configuration of one command execution.
///
/// Defaults match a pipeline that sends commands one at a time to a running
/// server, stops at the first failure and reloads the server afterwards when
/// the commands left it in the `reload-required` state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ExecutionConfig {
    /// Commands and scripts to run.
    #[serde(flatten)]
    pub commands: CommandSet,

    /// Run each collection as one atomic batch.
    #[serde(default)]
    pub batch: bool,

    /// Stop at the first failure and report it.
    #[serde(default = "default_true")]
    pub fail_on_error: bool,

    /// Run without a server connection; requires a valid installation.
    #[serde(default)]
    pub offline: bool,

    /// Run the commands in a helper CLI process.
    #[serde(default)]
    pub fork: bool,

    /// Reload the server afterwards if it requires it.
    #[serde(default = "default_true")]
    pub auto_reload: bool,

    /// Bound for post-execution reloads.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// System properties visible to the commands, applied last.
    #[serde(default)]
    pub system_properties: BTreeMap<String, String>,

    /// Properties files visible to the commands, in precedence order.
    #[serde(default)]
    pub properties_files: Vec<PathBuf>,

    /// Server installation; required offline and when forking.
    #[serde(default)]
    pub install_location: Option<PathBuf>,

    /// JVM options for the helper CLI process.
    #[serde(default)]
    pub jvm_options: Vec<String>,

    /// JBoss Modules options for the helper CLI process.
    #[serde(default)]
    pub module_options: Vec<String>,

    /// Output handling of the helper CLI process.
    #[serde(default = "StandardOutput::stdout")]
    pub stdout: StandardOutput,

    /// Require every `${...}` expression to resolve locally.
    #[serde(default)]
    pub resolve_expressions: bool,

    /// Overrides the CLI launcher script of the installation.
    #[serde(default)]
    pub cli_executable: Option<PathBuf>,

    /// How the helper process reaches the server.
    #[serde(default)]
    pub connection: ConnectionConfig,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            commands: CommandSet::default(),
            batch: false,
            fail_on_error: true,
            offline: false,
            fork: false,
            auto_reload: true,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            system_properties: BTreeMap::new(),
            properties_files: Vec::new(),
            install_location: None,
            jvm_options: Vec::new(),
            module_options: Vec::new(),
            stdout: StandardOutput::stdout(),
            resolve_expressions: false,
            cli_executable: None,
            connection: ConnectionConfig::default(),
        }
    }
}

impl ExecutionConfig {
    /// Creates a configuration that runs the given commands.
    pub fn with_commands(commands: CommandSet) -> Self {
        Self {
            commands,
            ..Self::default()
        }
    }
}

/// Configuration of the undeploy flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UndeployConfig {
    /// Exact deployment name, used when no pattern is given.
    #[serde(default)]
    pub name: Option<String>,

    /// Regular expression matched against the full deployment name.
    #[serde(default)]
    pub match_pattern: Option<String>,

    /// What to do when more than one deployment matches.
    #[serde(default)]
    pub match_pattern_strategy: MatchStrategy,

    /// Restrict the removal to these server groups (domain mode).
    #[serde(default)]
    pub server_groups: Vec<String>,

    /// Succeed when nothing matched.
    #[serde(default = "default_true")]
    pub ignore_missing_deployment: bool,
}

impl Default for UndeployConfig {
    fn default() -> Self {
        Self {
            name: None,
            match_pattern: None,
            match_pattern_strategy: MatchStrategy::default(),
            server_groups: Vec::new(),
            ignore_missing_deployment: true,
        }
    }
}

/// Main configuration file of the orchestrator.
///
/// # Example
///
/// ```yaml
/// server:
///   install-location: /opt/wildfly
///   java-opts: ["-Xmx512m"]
/// connection:
///   port: 9990
/// execution:
///   batch: true
///   commands:
///     - /system-property=foo:add(value=bar)
/// undeploy:
///   match-pattern: "app-.*"
///   match-pattern-strategy: all
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OrchestratorConfig {
    /// How to launch the server
    pub server: LaunchConfig,
    /// How to reach the management endpoint
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Commands to run against the server
    #[serde(default)]
    pub execution: Option<ExecutionConfig>,
    /// Deployments to remove
    #[serde(default)]
    pub undeploy: Option<UndeployConfig>,
}

impl OrchestratorConfig {
    /// Loads a configuration from a file path.
    ///
    /// Files ending in `.yaml` or `.yml` are parsed as YAML, everything else
    /// as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// * The file cannot be read
    /// * The file contents are not valid JSON or YAML
    /// * The document does not conform to the expected schema
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigParse(format!("Failed to read config file: {}", e)))?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Self::parse_yaml_str(&content),
            _ => Self::parse_from_str(&content),
        }
    }

    /// Parses a configuration from a JSON string.
    pub fn parse_from_str(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| Error::ConfigParse(format!("Failed to parse JSON config: {}", e)))
    }

    /// Parses a configuration from a YAML string.
    pub fn parse_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| Error::ConfigParse(format!("Failed to parse YAML config: {}", e)))
    }

    /// The connection to use, with overrides from the server JVM options applied.
    pub fn effective_connection(&self) -> ConnectionConfig {
        self.connection.clone().with_jvm_overrides(&self.server.java_opts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let config_str = r#"{
            "server": { "install-location": "/opt/wildfly" }
        }"#;

        let config = OrchestratorConfig::parse_from_str(config_str).unwrap();

        assert_eq!(config.server.install_location, PathBuf::from("/opt/wildfly"));
        assert_eq!(config.server.startup_timeout_seconds, 60);
        assert_eq!(config.connection.port, 9990);
        assert!(config.execution.is_none());
    }

    #[test]
    fn test_execution_defaults() {
        let config = ExecutionConfig::default();
        assert!(config.fail_on_error);
        assert!(config.auto_reload);
        assert!(!config.batch);
        assert!(!config.fork);
        assert!(!config.offline);
        assert!(config.commands.is_empty());
    }

    #[test]
    fn test_management_host_override() {
        let connection = ConnectionConfig::default().with_jvm_overrides(&[
            "-Xmx512m".to_string(),
            "-Djboss.bind.address.management=10.0.0.5".to_string(),
            "-Djboss.management.http.port=19990".to_string(),
        ]);
        assert_eq!(connection.controller(), "10.0.0.5:19990");
    }

    #[test]
    fn test_port_offset_applies_to_explicit_port_in_any_order() {
        let port = "-Djboss.management.http.port=10000".to_string();
        let offset = "-Djboss.socket.binding.port-offset=100".to_string();

        let forward = ConnectionConfig::default().with_jvm_overrides(&[port.clone(), offset.clone()]);
        let backward = ConnectionConfig::default().with_jvm_overrides(&[offset, port]);

        assert_eq!(forward.port, 10100);
        assert_eq!(backward.port, 10100);
    }
}
