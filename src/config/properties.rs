//! Properties files and the property view commands are resolved against.
//!
//! A [`PropertyView`] is an immutable, layered set of properties built once per
//! in-process execution and passed to the command context. Nothing here touches
//! process-wide state, so two executions in the same process never observe each
//! other's properties.

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Parses line-oriented `key=value` content.
///
/// Blank lines and lines starting with `#` or `!` are ignored. `:` is accepted
/// as separator as well; a line without separator defines a key with an empty
/// value. Keys and values are trimmed. Pairs are returned in file order.
pub fn parse_properties(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
        .map(|line| match line.find(['=', ':']) {
            Some(idx) => (
                line[..idx].trim().to_string(),
                line[idx + 1..].trim().to_string(),
            ),
            None => (line.to_string(), String::new()),
        })
        .collect()
}

/// Reads and parses a properties file.
pub async fn load_properties_file(path: &Path) -> Result<Vec<(String, String)>> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        Error::Io(format!(
            "Failed to read properties file {}: {}",
            path.display(),
            e
        ))
    })?;
    Ok(parse_properties(&content))
}

/// Immutable set of properties visible to commands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyView {
    properties: BTreeMap<String, String>,
}

impl PropertyView {
    /// Starts building a view.
    pub fn builder() -> PropertyViewBuilder {
        PropertyViewBuilder::default()
    }

    /// Looks up a property.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Number of properties in the view.
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Whether the view holds no property.
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Replaces `${...}` expressions in `text`.
    ///
    /// Supported forms are `${key}`, `${key:default}` and `${env.NAME}` (read
    /// from the process environment). When `strict` is false an expression that
    /// cannot be resolved is kept verbatim so the server may resolve it;
    /// otherwise it is an error.
    pub fn resolve(&self, text: &str, strict: bool) -> Result<String> {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find('}') else {
                if strict {
                    return Err(Error::CommandExecution(format!(
                        "Unterminated expression in '{}'",
                        text
                    )));
                }
                out.push_str(&rest[start..]);
                return Ok(out);
            };

            let expression = &after[..end];
            match self.lookup(expression) {
                Some(value) => out.push_str(&value),
                None if strict => {
                    return Err(Error::CommandExecution(format!(
                        "Cannot resolve expression '${{{}}}'",
                        expression
                    )));
                }
                None => {
                    out.push_str("${");
                    out.push_str(expression);
                    out.push('}');
                }
            }
            rest = &after[end + 1..];
        }

        out.push_str(rest);
        Ok(out)
    }

    fn lookup(&self, expression: &str) -> Option<String> {
        let (key, default) = match expression.split_once(':') {
            Some((key, default)) => (key, Some(default)),
            None => (expression, None),
        };
        let value = match key.strip_prefix("env.") {
            Some(name) => std::env::var(name).ok(),
            None => self.get(key).map(str::to_string),
        };
        value.or_else(|| default.map(str::to_string))
    }
}

/// Builds a [`PropertyView`] layer by layer; later layers win.
#[derive(Debug, Default)]
pub struct PropertyViewBuilder {
    properties: BTreeMap<String, String>,
}

impl PropertyViewBuilder {
    /// Adds `jboss.home` and `jboss.home.dir` for an installation.
    pub fn install_location(mut self, location: Option<&Path>) -> Self {
        if let Some(location) = location {
            let value = location.display().to_string();
            self.properties.insert("jboss.home".to_string(), value.clone());
            self.properties.insert("jboss.home.dir".to_string(), value);
        }
        self
    }

    /// Adds every properties file in order.
    pub async fn properties_files(mut self, files: &[PathBuf]) -> Result<Self> {
        for file in files {
            tracing::debug!(file = %file.display(), "Loading properties file");
            self.properties.extend(load_properties_file(file).await?);
        }
        Ok(self)
    }

    /// Adds explicit properties.
    pub fn overrides(mut self, properties: &BTreeMap<String, String>) -> Self {
        self.properties.extend(
            properties
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );
        self
    }

    /// Finishes the view.
    pub fn build(self) -> PropertyView {
        PropertyView {
            properties: self.properties,
        }
    }
}
