#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use wildfly_orchestrator::error::{Error, Result};
use wildfly_orchestrator::management::{
    Connector, ManagementClient, ManagementSession, Operation, OperationResult,
};

pub const HOST: &str = "primary";

#[derive(Debug, Clone, Default)]
struct Model {
    domain: bool,
    states: VecDeque<String>,
    after_shutdown: VecDeque<String>,
    system_properties: BTreeMap<String, String>,
    deployments: BTreeSet<String>,
    server_groups: BTreeMap<String, BTreeSet<String>>,
    server_configs: BTreeMap<String, (bool, String)>,
    reloads: usize,
    shutdowns: usize,
}

/// In-memory management endpoint.
///
/// Models system properties, deployments and the process state, and applies
/// composite operations all-or-nothing.
#[derive(Debug, Default)]
pub struct FakeServer {
    model: Mutex<Model>,
    log: Mutex<Vec<Operation>>,
    unreachable: Mutex<bool>,
    closed: AtomicUsize,
}

impl FakeServer {
    pub fn standalone() -> Arc<Self> {
        let server = Self::default();
        server.set_states(&["running"]);
        server.set_after_shutdown(&["stopped"]);
        Arc::new(server)
    }

    pub fn domain() -> Arc<Self> {
        let server = Self::default();
        {
            let mut model = server.model.lock().unwrap();
            model.domain = true;
        }
        server.set_states(&["running"]);
        server.set_after_shutdown(&["stopped"]);
        Arc::new(server)
    }

    /// Scripted values of `server-state` / `host-state`; the last one sticks.
    pub fn set_states(&self, states: &[&str]) {
        self.model.lock().unwrap().states = states.iter().map(|s| s.to_string()).collect();
    }

    /// States reported once a shutdown operation was received.
    pub fn set_after_shutdown(&self, states: &[&str]) {
        self.model.lock().unwrap().after_shutdown = states.iter().map(|s| s.to_string()).collect();
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        *self.unreachable.lock().unwrap() = unreachable;
    }

    pub fn set_property(&self, name: &str, value: &str) {
        self.model
            .lock()
            .unwrap()
            .system_properties
            .insert(name.to_string(), value.to_string());
    }

    pub fn property(&self, name: &str) -> Option<String> {
        self.model.lock().unwrap().system_properties.get(name).cloned()
    }

    pub fn add_deployment(&self, name: &str) {
        self.model.lock().unwrap().deployments.insert(name.to_string());
    }

    pub fn add_group_deployment(&self, group: &str, name: &str) {
        let mut model = self.model.lock().unwrap();
        model.deployments.insert(name.to_string());
        model
            .server_groups
            .entry(group.to_string())
            .or_default()
            .insert(name.to_string());
    }

    pub fn add_server_config(&self, name: &str, auto_start: bool, status: &str) {
        self.model
            .lock()
            .unwrap()
            .server_configs
            .insert(name.to_string(), (auto_start, status.to_string()));
    }

    pub fn deployments(&self) -> Vec<String> {
        self.model.lock().unwrap().deployments.iter().cloned().collect()
    }

    pub fn group_deployments(&self, group: &str) -> Vec<String> {
        self.model
            .lock()
            .unwrap()
            .server_groups
            .get(group)
            .map(|d| d.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn reloads(&self) -> usize {
        self.model.lock().unwrap().reloads
    }

    pub fn shutdowns(&self) -> usize {
        self.model.lock().unwrap().shutdowns
    }

    pub fn closed_sessions(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Names of the operations received, as `address:name`.
    pub fn operations(&self) -> Vec<String> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .map(|op| format!("{}:{}", op.address(), op.name()))
            .collect()
    }

    /// Operations other than reads.
    pub fn writes(&self) -> Vec<String> {
        self.operations()
            .into_iter()
            .filter(|op| !op.contains(":read-"))
            .collect()
    }
}

fn next_state(states: &mut VecDeque<String>) -> String {
    if states.len() > 1 {
        states.pop_front().unwrap_or_default()
    } else {
        states.front().cloned().unwrap_or_else(|| "running".to_string())
    }
}

fn value_param(op: &Operation) -> String {
    match op.get_param("value") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn apply(model: &mut Model, op: &Operation) -> std::result::Result<Value, String> {
    if op.is_composite() {
        let steps = op.steps().map_err(|e| e.to_string())?;
        for (i, step) in steps.iter().enumerate() {
            apply(model, step).map_err(|e| format!("Operation step-{} failed: {}", i + 1, e))?;
        }
        return Ok(Value::Null);
    }

    let elements: Vec<(&str, &str)> = op
        .address()
        .elements()
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    let attribute = op
        .get_param("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let child_type = op
        .get_param("child-type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    match (elements.as_slice(), op.name()) {
        ([], "read-attribute") => match attribute.as_str() {
            "server-state" if !model.domain => Ok(json!(next_state(&mut model.states))),
            "launch-type" => Ok(json!(if model.domain { "DOMAIN" } else { "STANDALONE" })),
            other => Err(format!("WFLYCTL0201: Unknown attribute '{}'", other)),
        },
        ([("host", HOST)], "read-attribute") if model.domain && attribute == "host-state" => {
            Ok(json!(next_state(&mut model.states)))
        }
        ([], "read-children-names") => match child_type.as_str() {
            "deployment" => Ok(json!(model.deployments)),
            "host" if model.domain => Ok(json!([HOST])),
            "server-group" if model.domain => Ok(json!(model.server_groups.keys().collect::<Vec<_>>())),
            other => Err(format!("WFLYCTL0030: No resource definition for child type '{}'", other)),
        },
        ([("server-group", group)], "read-children-names") if child_type == "deployment" => {
            Ok(json!(model.server_groups.get(*group).cloned().unwrap_or_default()))
        }
        ([("host", HOST)], "read-children-resources") if child_type == "server-config" => {
            let mut servers = Map::new();
            for (name, (auto_start, status)) in &model.server_configs {
                servers.insert(name.clone(), json!({"auto-start": auto_start, "status": status}));
            }
            Ok(Value::Object(servers))
        }
        ([("system-property", name)], "add") => {
            if model.system_properties.contains_key(*name) {
                return Err(format!("WFLYCTL0212: Duplicate resource [(\"system-property\" => \"{}\")]", name));
            }
            model.system_properties.insert(name.to_string(), value_param(op));
            Ok(Value::Null)
        }
        ([("system-property", name)], "remove") => model
            .system_properties
            .remove(*name)
            .map(|_| Value::Null)
            .ok_or_else(|| format!("WFLYCTL0216: Management resource '{}' not found", op.address())),
        ([("system-property", name)], "write-attribute") if attribute == "value" => {
            match model.system_properties.get_mut(*name) {
                Some(value) => {
                    *value = value_param(op);
                    Ok(Value::Null)
                }
                None => Err(format!("WFLYCTL0216: Management resource '{}' not found", op.address())),
            }
        }
        ([], "reload") | ([("host", HOST)], "reload") => {
            model.reloads += 1;
            model.states = VecDeque::from(["running".to_string()]);
            Ok(Value::Null)
        }
        ([], "shutdown") | ([("host", HOST)], "shutdown") => {
            model.shutdowns += 1;
            model.states = model.after_shutdown.clone();
            Ok(Value::Null)
        }
        ([("deployment", name)], "undeploy") if model.deployments.contains(*name) => Ok(Value::Null),
        ([("deployment", name)], "remove") if model.deployments.contains(*name) => {
            model.deployments.remove(*name);
            Ok(Value::Null)
        }
        ([("server-group", group), ("deployment", name)], "undeploy")
            if model.server_groups.get(*group).is_some_and(|d| d.contains(*name)) =>
        {
            Ok(Value::Null)
        }
        ([("server-group", group), ("deployment", name)], "remove") => {
            match model.server_groups.get_mut(*group).map(|d| d.remove(*name)) {
                Some(true) => Ok(Value::Null),
                _ => Err(format!("WFLYCTL0216: Management resource '{}' not found", op.address())),
            }
        }
        (_, name) => Err(format!("WFLYCTL0031: No operation named '{}' exists at address {}", name, op.address())),
    }
}

#[async_trait]
impl ManagementClient for FakeServer {
    async fn execute(&self, operation: &Operation) -> Result<OperationResult> {
        if *self.unreachable.lock().unwrap() {
            return Err(Error::Connection("Connection refused".to_string()));
        }
        self.log.lock().unwrap().push(operation.clone());

        let mut model = self.model.lock().unwrap();
        let mut working = model.clone();
        match apply(&mut working, operation) {
            Ok(result) => {
                *model = working;
                Ok(OperationResult::success(result))
            }
            Err(description) => {
                let mut result = OperationResult::failed(description);
                result.rolled_back = operation.is_composite();
                Ok(result)
            }
        }
    }

    async fn close(&self) -> Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Opens sessions on a [`FakeServer`] and counts them.
pub struct FakeConnector {
    server: Arc<FakeServer>,
    opened: AtomicUsize,
}

impl FakeConnector {
    pub fn new(server: Arc<FakeServer>) -> Arc<Self> {
        Arc::new(Self {
            server,
            opened: AtomicUsize::new(0),
        })
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self) -> Result<ManagementSession> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(ManagementSession::new(self.server.clone()))
    }
}

/// Creates a directory that passes the installation checks.
pub fn fake_home(dir: &Path) -> std::path::PathBuf {
    let home = dir.join("wildfly");
    std::fs::create_dir_all(home.join("modules")).unwrap();
    std::fs::create_dir_all(home.join("bin")).unwrap();
    std::fs::write(home.join("jboss-modules.jar"), b"").unwrap();
    home
}

/// Writes an executable shell script.
#[cfg(unix)]
pub fn write_script(path: &Path, body: &str) {
    use std::os::unix::fs::PermissionsExt;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

/// Routes log output through the test harness; `RUST_LOG` selects the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
