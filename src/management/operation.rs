use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;

/// Address of a management resource, e.g. `/subsystem=logging/console-handler=CONSOLE`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Address(Vec<(String, String)>);

impl Address {
    /// The root resource.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Creates an address from `(type, name)` pairs.
    pub fn of<K: Into<String>, V: Into<String>>(pairs: impl IntoIterator<Item = (K, V)>) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Appends a child element.
    pub fn append(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.push((key.into(), value.into()));
        self
    }

    /// Whether this is the root address
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// The `(type, name)` pairs of this address.
    pub fn elements(&self) -> &[(String, String)] {
        &self.0
    }

    /// The address as sent on the wire: a list of single-entry objects.
    pub fn to_json(&self) -> Value {
        Value::Array(
            self.0
                .iter()
                .map(|(k, v)| {
                    let mut element = Map::new();
                    element.insert(k.clone(), Value::String(v.clone()));
                    Value::Object(element)
                })
                .collect(),
        )
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }
        for (k, v) in &self.0 {
            write!(f, "/{}={}", k, v)?;
        }
        Ok(())
    }
}

/// A management operation: a name, a target address and named parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    name: String,
    address: Address,
    params: Map<String, Value>,
}

impl Operation {
    /// Create a new operation
    pub fn new(name: impl Into<String>, address: Address) -> Self {
        Self {
            name: name.into(),
            address,
            params: Map::new(),
        }
    }

    /// Adds a parameter.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Operation name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Target address
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Named parameters
    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    /// Reads a single parameter.
    pub fn get_param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    /// Create a `read-attribute` operation
    pub fn read_attribute(address: Address, attribute: impl Into<String>) -> Self {
        Self::new("read-attribute", address).param("name", attribute.into())
    }

    /// Create a `write-attribute` operation
    pub fn write_attribute(
        address: Address,
        attribute: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Self::new("write-attribute", address)
            .param("name", attribute.into())
            .param("value", value)
    }

    /// Create a `read-children-names` operation
    pub fn read_children_names(address: Address, child_type: impl Into<String>) -> Self {
        Self::new("read-children-names", address).param("child-type", child_type.into())
    }

    /// Create a `read-children-resources` operation including runtime attributes
    pub fn read_children_resources(address: Address, child_type: impl Into<String>) -> Self {
        Self::new("read-children-resources", address)
            .param("child-type", child_type.into())
            .param("include-runtime", true)
    }

    /// Create a `reload` operation; the root for a standalone server, `host=<name>` for a domain host
    pub fn reload(address: Address) -> Self {
        Self::new("reload", address)
    }

    /// Create a `shutdown` operation, optionally suspending for `timeout` seconds first
    pub fn shutdown(address: Address, timeout: Option<u64>) -> Self {
        let op = Self::new("shutdown", address);
        match timeout {
            Some(timeout) => op.param("suspend-timeout", timeout),
            None => op,
        }
    }

    /// Create a composite operation; the server applies all steps or none.
    pub fn composite(steps: Vec<Operation>) -> Self {
        let steps: Vec<Value> = steps.iter().map(Operation::to_json).collect();
        Self::new("composite", Address::root()).param("steps", Value::Array(steps))
    }

    /// Whether this is a composite operation
    pub fn is_composite(&self) -> bool {
        self.name == "composite"
    }

    /// Decodes the steps of a composite operation.
    pub fn steps(&self) -> Result<Vec<Operation>> {
        match self.params.get("steps") {
            Some(Value::Array(steps)) => steps.iter().map(Operation::from_json).collect(),
            _ => Ok(Vec::new()),
        }
    }

    /// The operation as sent on the wire.
    pub fn to_json(&self) -> Value {
        let mut body = Map::new();
        body.insert("operation".to_string(), Value::String(self.name.clone()));
        body.insert("address".to_string(), self.address.to_json());
        for (k, v) in &self.params {
            body.insert(k.clone(), v.clone());
        }
        Value::Object(body)
    }

    /// Decodes an operation from its wire form.
    pub fn from_json(value: &Value) -> Result<Self> {
        let Value::Object(body) = value else {
            return Err(Error::Connection(format!("Invalid operation: {}", value)));
        };
        let name = body
            .get("operation")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Connection(format!("Operation without name: {}", value)))?;
        let mut address = Address::root();
        if let Some(Value::Array(elements)) = body.get("address") {
            for element in elements {
                if let Value::Object(pair) = element {
                    for (k, v) in pair {
                        address = address.append(k.clone(), v.as_str().unwrap_or_default());
                    }
                }
            }
        }
        let mut op = Self::new(name, address);
        for (k, v) in body {
            if k != "operation" && k != "address" {
                op.params.insert(k.clone(), v.clone());
            }
        }
        Ok(op)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.name)?;
        if !self.params.is_empty() {
            let params: Vec<String> = self
                .params
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            write!(f, "({})", params.join(","))?;
        }
        Ok(())
    }
}

/// Outcome reported for an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// The operation succeeded
    Success,
    /// The operation failed
    Failed,
    /// The operation was cancelled
    Cancelled,
}

/// The server's answer to an operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OperationResult {
    /// Success or failure
    pub outcome: Outcome,
    /// Result value (if successful)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure description (if failed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_description: Option<Value>,
    /// Whether the server rolled the operation back
    #[serde(default)]
    pub rolled_back: bool,
    /// Response headers such as `process-state`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_headers: Option<Value>,
}

impl OperationResult {
    /// Create a successful result
    pub fn success(result: Value) -> Self {
        Self {
            outcome: Outcome::Success,
            result: Some(result),
            failure_description: None,
            rolled_back: false,
            response_headers: None,
        }
    }

    /// Create a failed result
    pub fn failed(description: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Failed,
            result: None,
            failure_description: Some(Value::String(description.into())),
            rolled_back: true,
            response_headers: None,
        }
    }

    /// Check if the operation succeeded
    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }

    /// The failure description as text.
    pub fn failure_message(&self) -> String {
        match &self.failure_description {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => format!("outcome {:?} without failure description", self.outcome),
        }
    }

    /// The `process-state` response header, if the server sent one.
    pub fn process_state(&self) -> Option<&str> {
        self.response_headers
            .as_ref()
            .and_then(|headers| headers.get("process-state"))
            .and_then(Value::as_str)
    }

    /// Converts into the result value, mapping a failed outcome to an error.
    pub fn into_result(self, operation: &Operation) -> Result<Value> {
        if self.is_success() {
            Ok(self.result.unwrap_or(Value::Null))
        } else {
            Err(Error::OperationFailed {
                operation: operation.name().to_string(),
                reason: self.failure_message(),
            })
        }
    }
}

impl Default for OperationResult {
    fn default() -> Self {
        Self::success(json!(null))
    }
}
