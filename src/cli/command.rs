use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const BATCH_START: &str = "batch";
const BATCH_END: &str = "run-batch";

/// Commands and script files to execute, in order.
///
/// Literal commands run first, then each script. A `CommandSet` cannot be
/// changed once built.
///
/// # Examples
///
/// ```
/// use wildfly_orchestrator::cli::CommandSet;
///
/// let commands = CommandSet::builder()
///     .command("/system-property=foo:add(value=bar)")
///     .script("configure.cli")
///     .build();
/// assert_eq!(commands.commands().len(), 1);
/// assert_eq!(commands.scripts().len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSet {
    #[serde(default)]
    commands: Vec<String>,
    #[serde(default)]
    scripts: Vec<PathBuf>,
}

impl CommandSet {
    /// Starts building a command set
    pub fn builder() -> CommandSetBuilder {
        CommandSetBuilder::default()
    }

    /// Literal commands
    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// Script files
    pub fn scripts(&self) -> &[PathBuf] {
        &self.scripts
    }

    /// Whether there is nothing to execute
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty() && self.scripts.is_empty()
    }
}

/// Builder for [`CommandSet`]
#[derive(Debug, Default)]
pub struct CommandSetBuilder {
    commands: Vec<String>,
    scripts: Vec<PathBuf>,
}

impl CommandSetBuilder {
    /// Appends a literal command
    pub fn command(mut self, command: impl Into<String>) -> Self {
        self.commands.push(command.into());
        self
    }

    /// Appends literal commands
    pub fn commands<I, S>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.commands.extend(commands.into_iter().map(Into::into));
        self
    }

    /// Appends a script file
    pub fn script(mut self, path: impl Into<PathBuf>) -> Self {
        self.scripts.push(path.into());
        self
    }

    /// Finishes the command set
    pub fn build(self) -> CommandSet {
        CommandSet {
            commands: self.commands,
            scripts: self.scripts,
        }
    }
}

/// Reads the command lines of a script file.
///
/// Lines are trimmed; blank lines and lines starting with `#` are skipped.
pub async fn read_script(path: &Path) -> Result<Vec<String>> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        Error::Io(format!("Failed to read script {}: {}", path.display(), e))
    })?;
    Ok(script_lines(&content))
}

pub(crate) fn script_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// A piece of work: one command, or commands applied atomically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unit {
    /// A command executed on its own
    Single(String),
    /// Commands executed as one composite operation
    Batch(Vec<String>),
}

/// Groups the lines of one collection into units.
///
/// With `batch` the whole collection is one unit and `batch` / `run-batch`
/// markers are dropped. Otherwise every line is its own unit except the
/// lines enclosed in `batch` ... `run-batch`.
pub fn group_units(lines: &[String], batch: bool) -> Result<Vec<Unit>> {
    if batch {
        let commands: Vec<String> = lines
            .iter()
            .filter(|line| !is_marker(line))
            .cloned()
            .collect();
        return Ok(if commands.is_empty() {
            Vec::new()
        } else {
            vec![Unit::Batch(commands)]
        });
    }

    let mut units = Vec::new();
    let mut open: Option<Vec<String>> = None;
    for line in lines {
        let trimmed = line.trim();
        if trimmed == BATCH_START {
            if open.is_some() {
                return Err(Error::CommandExecution(
                    "Nested batches are not supported".to_string(),
                ));
            }
            open = Some(Vec::new());
        } else if trimmed == BATCH_END {
            match open.take() {
                Some(commands) if !commands.is_empty() => units.push(Unit::Batch(commands)),
                Some(_) => {}
                None => {
                    return Err(Error::CommandExecution(
                        "'run-batch' without a preceding 'batch'".to_string(),
                    ));
                }
            }
        } else if let Some(commands) = open.as_mut() {
            commands.push(line.clone());
        } else {
            units.push(Unit::Single(line.clone()));
        }
    }

    if open.is_some() {
        return Err(Error::CommandExecution(
            "The batch was not terminated with 'run-batch'".to_string(),
        ));
    }
    Ok(units)
}

fn is_marker(line: &str) -> bool {
    matches!(line.trim(), BATCH_START | BATCH_END)
}
