use crate::error::{Error, Result};
use async_process::{ChildStderr, ChildStdout, Stdio};
use futures_lite::io::BufReader;
use futures_lite::{AsyncBufReadExt, AsyncRead, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

/// Number of output lines kept by an [`OutputCapture`].
pub const CAPTURE_LIMIT: usize = 1000;

/// Where the output of a spawned process goes.
///
/// Parsed from the same strings build configurations use: `none` discards,
/// `System.out` / `System.err` forward to this process' streams, `inherit`
/// shares this process' streams directly and anything else is a file path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StandardOutput {
    /// The child writes straight to this process' stdout and stderr
    #[default]
    Inherit,
    /// The output is dropped
    Discard,
    /// Lines are forwarded to this process' stdout
    Stdout,
    /// Lines are forwarded to this process' stderr
    Stderr,
    /// Lines are appended to a file
    File(PathBuf),
}

impl StandardOutput {
    /// Forward to stdout; the default for helper CLI processes.
    pub fn stdout() -> Self {
        StandardOutput::Stdout
    }

    /// Whether output lines are drained by background consumers.
    pub fn is_consumed(&self) -> bool {
        matches!(
            self,
            StandardOutput::Stdout | StandardOutput::Stderr | StandardOutput::File(_)
        )
    }

    /// The stdio configuration for the child's stdout and stderr.
    pub(crate) fn stdio(&self) -> (Stdio, Stdio) {
        match self {
            StandardOutput::Inherit => (Stdio::inherit(), Stdio::inherit()),
            StandardOutput::Discard => (Stdio::null(), Stdio::null()),
            _ => (Stdio::piped(), Stdio::piped()),
        }
    }

    /// Opens the sink consumers write to, `None` when nothing is consumed.
    ///
    /// Called before spawning so a failure never leaves a child behind.
    pub(crate) fn open_sink(&self) -> Result<Option<Sink>> {
        if !self.is_consumed() {
            return Ok(None);
        }
        Ok(Some(match self {
            StandardOutput::Stderr => Sink::Stderr,
            StandardOutput::File(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|e| {
                        Error::Io(format!(
                            "Failed to open output file {}: {}",
                            path.display(),
                            e
                        ))
                    })?;
                Sink::File(Arc::new(AsyncMutex::new(tokio::fs::File::from_std(file))))
            }
            _ => Sink::Stdout,
        }))
    }
}

impl From<String> for StandardOutput {
    fn from(value: String) -> Self {
        match value.trim() {
            "" | "inherit" => StandardOutput::Inherit,
            "none" => StandardOutput::Discard,
            "System.out" => StandardOutput::Stdout,
            "System.err" => StandardOutput::Stderr,
            path => StandardOutput::File(PathBuf::from(path)),
        }
    }
}

impl From<StandardOutput> for String {
    fn from(value: StandardOutput) -> Self {
        match value {
            StandardOutput::Inherit => "inherit".to_string(),
            StandardOutput::Discard => "none".to_string(),
            StandardOutput::Stdout => "System.out".to_string(),
            StandardOutput::Stderr => "System.err".to_string(),
            StandardOutput::File(path) => path.display().to_string(),
        }
    }
}

/// The most recent output lines of a process.
#[derive(Debug, Clone, Default)]
pub struct OutputCapture {
    lines: Arc<Mutex<VecDeque<String>>>,
}

impl OutputCapture {
    /// Create an empty capture
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a line, dropping the oldest one past [`CAPTURE_LIMIT`].
    pub fn push(&self, line: String) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push_back(line);
            if lines.len() > CAPTURE_LIMIT {
                lines.pop_front();
            }
        }
    }

    /// Returns up to `limit` of the most recent lines, oldest first.
    pub fn tail(&self, limit: usize) -> Vec<String> {
        match self.lines.lock() {
            Ok(lines) => {
                let skip = lines.len().saturating_sub(limit);
                lines.iter().skip(skip).cloned().collect()
            }
            Err(_) => Vec::new(),
        }
    }

    /// Number of recorded lines
    pub fn len(&self) -> usize {
        self.lines.lock().map(|lines| lines.len()).unwrap_or(0)
    }

    /// Whether nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone)]
pub(crate) enum Sink {
    Stdout,
    Stderr,
    File(Arc<AsyncMutex<tokio::fs::File>>),
}

impl Sink {
    async fn write_line(&self, line: &str) {
        match self {
            Sink::Stdout => println!("{}", line),
            Sink::Stderr => eprintln!("{}", line),
            Sink::File(file) => {
                let mut file = file.lock().await;
                let written = match file.write_all(format!("{}\n", line).as_bytes()).await {
                    Ok(()) => file.flush().await,
                    Err(e) => Err(e),
                };
                if let Err(e) = written {
                    tracing::warn!(error = %e, "Failed to write process output");
                }
            }
        }
    }
}

/// Starts background tasks draining the child's stdout and stderr into `sink`
/// and the capture.
///
/// Both streams are merged into the same sink so the child never blocks on a
/// full pipe while the caller waits on something else.
pub(crate) fn spawn_consumers(
    sink: Option<Sink>,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    capture: &OutputCapture,
) -> Vec<JoinHandle<()>> {
    let Some(sink) = sink else {
        return Vec::new();
    };
    let mut tasks = Vec::new();
    if let Some(stdout) = stdout {
        tasks.push(consume(stdout, sink.clone(), capture.clone()));
    }
    if let Some(stderr) = stderr {
        tasks.push(consume(stderr, sink, capture.clone()));
    }
    tasks
}

fn consume<R>(stream: R, sink: Sink, capture: OutputCapture) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Some(line) = lines.next().await {
            match line {
                Ok(line) => {
                    sink.write_line(&line).await;
                    capture.push(line);
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Stopped reading process output");
                    break;
                }
            }
        }
    })
}
