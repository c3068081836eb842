/// Error handling module for the WildFly orchestrator.
///
/// This module defines the error types used throughout the library. Every
/// orchestration call returns a [`Result`] whose error carries enough context
/// to tell a pipeline *why* it failed and which result code to report.
///
/// # Example
///
/// ```
/// use wildfly_orchestrator::error::{Error, ErrorKind, Result};
///
/// fn report(result: Result<()>) -> i32 {
///     match result {
///         Ok(_) => 0,
///         Err(Error::Timeout(msg)) => {
///             println!("Server did not become ready: {}", msg);
///             ErrorKind::Timeout.exit_code()
///         }
///         Err(e) => {
///             println!("Other error: {}", e);
///             e.exit_code()
///         }
///     }
/// }
/// ```
use crate::server::ServerType;
use thiserror::Error;

/// Errors that can occur while orchestrating a server.
///
/// Each variant includes context information to help diagnose and handle the
/// error appropriately.
#[derive(Error, Debug)]
pub enum Error {
    /// The configuration or the installation location is invalid.
    ///
    /// This error occurs when:
    /// - The installation directory is missing or is not a server installation
    /// - A required setting is absent for the selected topology
    /// - A match pattern or match strategy cannot be parsed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Failed to parse configuration from a file or string.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// The management endpoint could not be reached.
    ///
    /// This error occurs when:
    /// - Nothing listens on the management address
    /// - The endpoint rejected the credentials
    /// - The response could not be decoded
    #[error("Connection error: {0}")]
    Connection(String),

    /// A command, a script line or a batch failed.
    #[error("Command execution failed: {0}")]
    CommandExecution(String),

    /// The server answered a management operation with a failed outcome.
    #[error("Operation '{operation}' failed: {reason}")]
    OperationFailed {
        /// Name of the operation that was rejected
        operation: String,
        /// Failure description reported by the server
        reason: String,
    },

    /// Operation timed out.
    ///
    /// This error occurs when:
    /// - A server takes too long to start
    /// - A server takes too long to come back after a reload
    /// - A server takes too long to shut down
    #[error("Timeout: {0}")]
    Timeout(String),

    /// More than one deployment matched a pattern under the `fail` strategy.
    #[error(
        "Found {count} deployed artifacts for pattern '{pattern}' ({})",
        .matches.join(", ")
    )]
    AmbiguousMatch {
        /// Number of matching deployments
        count: usize,
        /// The pattern that was used
        pattern: String,
        /// Names of the matching deployments
        matches: Vec<String>,
    },

    /// A deployment that had to exist was not found.
    #[error("Deployment not found: {0}")]
    DeploymentNotFound(String),

    /// A spawned process exited before it reached the expected state.
    #[error("Process terminated: {0}")]
    ProcessTerminated(String),

    /// The management endpoint already reports a running server.
    #[error("{0} server is already running?")]
    AlreadyRunning(ServerType),

    /// Reading or writing local files or process pipes failed.
    #[error("I/O error: {0}")]
    Io(String),
}

/// Coarse classification of [`Error`] values.
///
/// The kind decides the result code a pipeline reports; it is independent of
/// whether the commands ran in-process or in a helper process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A command, script or batch failed
    CommandExecution,
    /// The management endpoint was unreachable
    Connection,
    /// A wait exceeded its bound
    Timeout,
    /// A match pattern was ambiguous
    AmbiguousMatch,
    /// Configuration or installation was invalid
    Validation,
    /// A process exited too early
    ProcessTerminated,
    /// A server was already running
    AlreadyRunning,
    /// Local I/O failed
    Io,
}

impl ErrorKind {
    /// The process exit code conventionally used for this kind of failure.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorKind::CommandExecution => 1,
            ErrorKind::Connection => 2,
            ErrorKind::Timeout => 3,
            ErrorKind::AmbiguousMatch => 4,
            ErrorKind::Validation => 5,
            ErrorKind::ProcessTerminated => 6,
            ErrorKind::AlreadyRunning => 7,
            ErrorKind::Io => 8,
        }
    }
}

impl Error {
    /// Returns the kind tag of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) | Error::ConfigParse(_) => ErrorKind::Validation,
            Error::Connection(_) => ErrorKind::Connection,
            Error::CommandExecution(_)
            | Error::OperationFailed { .. }
            | Error::DeploymentNotFound(_) => ErrorKind::CommandExecution,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::AmbiguousMatch { .. } => ErrorKind::AmbiguousMatch,
            Error::ProcessTerminated(_) => ErrorKind::ProcessTerminated,
            Error::AlreadyRunning(_) => ErrorKind::AlreadyRunning,
            Error::Io(_) => ErrorKind::Io,
        }
    }

    /// Shortcut for `self.kind().exit_code()`.
    pub fn exit_code(&self) -> i32 {
        self.kind().exit_code()
    }
}

/// Result type for orchestrator operations.
///
/// This is a convenience type alias for `std::result::Result` with the `Error`
/// type from this module.
pub type Result<T> = std::result::Result<T, Error>;
