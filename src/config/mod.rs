//! Configuration module for the orchestrator.
//!
//! This module handles parsing, validation, and access to the settings used to
//! launch a server, reach its management endpoint, execute commands and remove
//! deployments. Configurations can be built programmatically or loaded from
//! JSON or YAML files.
//!
//! # Examples
//!
//! Loading a configuration from a file:
//!
//! ```no_run
//! use wildfly_orchestrator::config::OrchestratorConfig;
//!
//! let config = OrchestratorConfig::from_file("orchestrator.yaml").unwrap();
//! println!("Server home: {}", config.server.install_location.display());
//! ```
//!
//! Creating an execution configuration programmatically:
//!
//! ```
//! use wildfly_orchestrator::cli::CommandSet;
//! use wildfly_orchestrator::config::ExecutionConfig;
//!
//! let commands = CommandSet::builder()
//!     .command("/system-property=foo:add(value=bar)")
//!     .build();
//! let config = ExecutionConfig {
//!     batch: true,
//!     ..ExecutionConfig::with_commands(commands)
//! };
//! assert!(config.fail_on_error);
//! ```
mod parser;
pub mod properties;
pub mod validator;

pub use parser::{
    ConnectionConfig, DebugConfig, ExecutionConfig, LaunchConfig, OrchestratorConfig,
    UndeployConfig, split_options,
};
pub use properties::PropertyView;
pub use validator::{is_valid_home_directory, validate_execution_config, validate_home};
