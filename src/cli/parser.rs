use crate::error::{Error, Result};
use crate::management::{Address, Operation};
use serde_json::{Map, Value};

/// A parsed command line.
#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    /// An operation request, `[address]:operation[(name=value,...)]`
    Operation(Operation),
    /// `reload`
    Reload,
    /// `shutdown [--timeout=N]`
    Shutdown {
        /// Seconds to suspend before shutting down
        timeout: Option<u64>,
    },
    /// `undeploy <name>`
    Undeploy(String),
}

impl CliCommand {
    /// The management operations carrying out this command.
    pub fn operations(&self) -> Vec<Operation> {
        match self {
            CliCommand::Operation(op) => vec![op.clone()],
            CliCommand::Reload => vec![Operation::reload(Address::root())],
            CliCommand::Shutdown { timeout } => vec![Operation::shutdown(Address::root(), *timeout)],
            CliCommand::Undeploy(name) => {
                let address = Address::root().append("deployment", name.clone());
                vec![
                    Operation::new("undeploy", address.clone()),
                    Operation::new("remove", address),
                ]
            }
        }
    }

    /// Whether the command may be part of a batch
    pub fn is_batchable(&self) -> bool {
        !matches!(self, CliCommand::Reload | CliCommand::Shutdown { .. })
    }
}

/// Parses one command line.
///
/// # Examples
///
/// ```
/// use wildfly_orchestrator::cli::{CliCommand, parse_command};
///
/// let command = parse_command("/system-property=foo:add(value=bar)").unwrap();
/// let CliCommand::Operation(op) = command else { panic!() };
/// assert_eq!(op.name(), "add");
/// assert_eq!(op.address().to_string(), "/system-property=foo");
/// ```
pub fn parse_command(line: &str) -> Result<CliCommand> {
    let line = line.trim();
    if line.starts_with(':') || line.starts_with('/') || line.starts_with('.') {
        return parse_operation(line).map(CliCommand::Operation);
    }

    let mut words = line.split_whitespace();
    match (words.next(), words.next(), words.next()) {
        (Some("reload"), None, _) => Ok(CliCommand::Reload),
        (Some("shutdown"), None, _) => Ok(CliCommand::Shutdown { timeout: None }),
        (Some("shutdown"), Some(arg), None) => {
            let value = arg
                .strip_prefix("--timeout=")
                .or_else(|| arg.strip_prefix("--suspend-timeout="))
                .ok_or_else(|| unsupported(line))?;
            let timeout = value.parse::<u64>().map_err(|_| {
                Error::CommandExecution(format!("Invalid shutdown timeout '{}'", value))
            })?;
            Ok(CliCommand::Shutdown {
                timeout: Some(timeout),
            })
        }
        (Some("undeploy"), Some(name), None) => Ok(CliCommand::Undeploy(name.to_string())),
        _ => Err(unsupported(line)),
    }
}

fn unsupported(line: &str) -> Error {
    Error::CommandExecution(format!("Unsupported command: {}", line))
}

fn invalid(line: &str, reason: &str) -> Error {
    Error::CommandExecution(format!("Invalid operation request '{}': {}", line, reason))
}

fn parse_operation(line: &str) -> Result<Operation> {
    let colon = find_top_level(line, |c| c == ':').ok_or_else(|| invalid(line, "missing ':'"))?;
    let address = parse_address(line, &line[..colon])?;
    let rest = &line[colon + 1..];

    let (name, params) = match rest.find('(') {
        Some(open) => {
            let body = rest[open + 1..]
                .strip_suffix(')')
                .ok_or_else(|| invalid(line, "missing ')'"))?;
            (rest[..open].trim(), Some(body))
        }
        None => (rest.trim(), None),
    };

    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(invalid(line, "invalid operation name"));
    }

    let mut op = Operation::new(name, address);
    if let Some(body) = params {
        for param in split_top_level(body, ',') {
            let param = param.trim();
            if param.is_empty() {
                continue;
            }
            let (key, value) = split_assignment(param).ok_or_else(|| invalid(line, "expected name=value"))?;
            op = op.param(unquote(key), parse_value(value));
        }
    }
    Ok(op)
}

fn parse_address(line: &str, text: &str) -> Result<Address> {
    let text = text.trim();
    if text.is_empty() || text == "/" || text == "." {
        return Ok(Address::root());
    }

    let mut address = Address::root();
    for segment in split_top_level(text, '/') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        let (key, value) = segment
            .split_once('=')
            .ok_or_else(|| invalid(line, "address elements must be type=name"))?;
        address = address.append(key.trim(), unquote(value.trim()));
    }
    Ok(address)
}

/// Splits `name=value` or `"name" => value`.
fn split_assignment(text: &str) -> Option<(&str, &str)> {
    let index = find_top_level(text, |c| c == '=')?;
    let key = text[..index].trim();
    let value = text[index + 1..].trim_start_matches('>').trim();
    if key.is_empty() {
        return None;
    }
    Some((key, value))
}

fn parse_value(text: &str) -> Value {
    let text = text.trim();
    if let Some(inner) = text.strip_prefix('{').and_then(|t| t.strip_suffix('}')) {
        let mut map = Map::new();
        for entry in split_top_level(inner, ',') {
            if let Some((key, value)) = split_assignment(entry.trim()) {
                map.insert(unquote(key), parse_value(value));
            }
        }
        return Value::Object(map);
    }
    if let Some(inner) = text.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
        return Value::Array(
            split_top_level(inner, ',')
                .into_iter()
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(parse_value)
                .collect(),
        );
    }
    if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
        return Value::String(unquote(text));
    }
    match text {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "undefined" => return Value::Null,
        _ => {}
    }
    if let Ok(number) = text.parse::<i64>() {
        return Value::from(number);
    }
    if let Ok(number) = text.parse::<f64>() {
        if number.is_finite() {
            return Value::from(number);
        }
    }
    Value::String(text.to_string())
}

fn unquote(text: &str) -> String {
    let text = text.trim();
    match text.strip_prefix('"').and_then(|t| t.strip_suffix('"')) {
        Some(inner) => inner.replace("\\\"", "\""),
        None => text.to_string(),
    }
}

/// Index of the first char matching `pred` outside quotes and brackets.
fn find_top_level(text: &str, pred: impl Fn(char) -> bool) -> Option<usize> {
    let mut depth = 0usize;
    let mut quoted = false;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            '{' | '[' | '(' if !quoted => depth += 1,
            '}' | ']' | ')' if !quoted => depth = depth.saturating_sub(1),
            _ if !quoted && depth == 0 && pred(c) => return Some(i),
            _ => {}
        }
    }
    None
}

fn split_top_level(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut rest = text;
    while let Some(index) = find_top_level(rest, |c| c == separator) {
        parts.push(&rest[..index]);
        rest = &rest[index + separator.len_utf8()..];
    }
    parts.push(rest);
    parts
}
