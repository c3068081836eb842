use serde::{Deserialize, Serialize};
use std::fmt;

/// Process state reported by the management endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServerState {
    /// The server is running and accepts commands
    Running,
    /// Configuration changes need a reload to take effect
    ReloadRequired,
    /// Configuration changes need a full restart to take effect
    RestartRequired,
    /// The server is booting
    Starting,
    /// The server is stopping or stopped
    Stopped,
    /// Any state this library does not know about
    Unknown,
}

impl ServerState {
    /// Parses the wire value of the `server-state` / `host-state` attribute.
    pub fn from_wire(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "running" => ServerState::Running,
            "reload-required" => ServerState::ReloadRequired,
            "restart-required" => ServerState::RestartRequired,
            "starting" => ServerState::Starting,
            "stopping" | "stopped" => ServerState::Stopped,
            _ => ServerState::Unknown,
        }
    }

    /// The wire value of this state.
    pub fn as_wire(&self) -> &'static str {
        match self {
            ServerState::Running => "running",
            ServerState::ReloadRequired => "reload-required",
            ServerState::RestartRequired => "restart-required",
            ServerState::Starting => "starting",
            ServerState::Stopped => "stopped",
            ServerState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}
