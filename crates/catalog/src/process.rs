//! Running the catalog tool as a subprocess.

use crate::command::{CommandLine, Location};
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use shelf_asyncutils::CancellationToken;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::instrument;

/// A single line of subprocess output, without its terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// How a subprocess invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The process exited on its own. `None` if it was terminated by a signal.
    Exited(Option<i32>),
    /// Cancellation fired; the process was killed and reaped.
    Cancelled,
}
impl Completion {
    pub fn success(&self) -> bool {
        matches!(self, Self::Exited(Some(0)))
    }
}

pub type LineSink<'a> = &'a (dyn Fn(OutputLine) + Send + Sync);

/// Executes a [`CommandLine`], reporting each output line as it arrives.
#[async_trait]
pub trait Runner: Send + Sync {
    async fn run(&self, command: &CommandLine, sink: LineSink<'_>, cancel: &CancellationToken) -> Result<Completion>;
}

/// Spawns real processes via [`tokio::process`]. No shell is involved.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

#[async_trait]
impl Runner for SystemRunner {
    async fn run(&self, command: &CommandLine, sink: LineSink<'_>, cancel: &CancellationToken) -> Result<Completion> {
        let mut child = Command::new(command.program())
            .args(command.argv())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .or_raise(|| ErrorKind::Spawn)?;

        let mut stdout = child.stdout.take().map(|s| BufReader::new(s).lines());
        let mut stderr = child.stderr.take().map(|s| BufReader::new(s).lines());

        while stdout.is_some() || stderr.is_some() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!("Cancellation requested; killing catalog process");
                    child.kill().await.or_raise(|| ErrorKind::Io)?;
                    return Ok(Completion::Cancelled);
                },
                line = next_line(&mut stdout) => match line.or_raise(|| ErrorKind::Io)? {
                    Some(line) => sink(OutputLine::Stdout(line)),
                    None => stdout = None,
                },
                line = next_line(&mut stderr) => match line.or_raise(|| ErrorKind::Io)? {
                    Some(line) => sink(OutputLine::Stderr(line)),
                    None => stderr = None,
                },
            }
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                child.kill().await.or_raise(|| ErrorKind::Io)?;
                Ok(Completion::Cancelled)
            },
            status = child.wait() => Ok(Completion::Exited(status.or_raise(|| ErrorKind::Io)?.code())),
        }
    }
}

/// Reads the next line from a still-open pipe. A closed pipe never resolves,
/// leaving the other branches of the `select!` to make progress.
async fn next_line<R>(lines: &mut Option<tokio::io::Lines<R>>) -> std::io::Result<Option<String>>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    match lines {
        Some(lines) => lines.next_line().await,
        None => std::future::pending().await,
    }
}

/// Content-server login.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials").field("username", &self.username).finish_non_exhaustive()
    }
}

/// A configured connection to one catalog via the command-line tool.
#[derive(Clone)]
pub struct ProcessChannel {
    tool: PathBuf,
    location: Location,
    credentials: Option<Credentials>,
    runner: Arc<dyn Runner>,
}

impl ProcessChannel {
    pub fn new(tool: impl Into<PathBuf>, location: Location) -> Self {
        Self {
            tool: tool.into(),
            location,
            credentials: None,
            runner: Arc::new(SystemRunner),
        }
    }

    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_runner(mut self, runner: Arc<dyn Runner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Starts a command for `subcommand`, already addressed at this catalog.
    pub fn command(&self, subcommand: &str) -> CommandLine {
        let command = CommandLine::new(&self.tool, subcommand).library(&self.location);
        match &self.credentials {
            Some(credentials) => command
                .option("username", &credentials.username)
                .option("password", &credentials.password),
            None => command,
        }
    }

    /// Runs `command` to completion.
    ///
    /// Standard output goes to `on_line` when given and is logged at debug
    /// level otherwise. Standard error is always logged as a warning. A
    /// non-zero exit status is logged but is not an error.
    #[instrument(skip_all, fields(subcommand = command.subcommand()))]
    pub async fn execute(
        &self,
        command: &CommandLine,
        on_line: Option<&(dyn Fn(String) + Send + Sync)>,
        cancel: &CancellationToken,
    ) -> Result<Completion> {
        tracing::debug!(command = %command, "Executing catalog command");
        let sink = |line: OutputLine| match line {
            OutputLine::Stdout(line) => match on_line {
                Some(callback) => callback(line),
                None => tracing::debug!(output = %line),
            },
            OutputLine::Stderr(line) => tracing::warn!(output = %line, "Catalog tool reported an error"),
        };
        let completion = self.runner.run(command, &sink, cancel).await?;
        match completion {
            Completion::Exited(Some(0)) => {},
            Completion::Exited(code) => tracing::warn!(?code, command = %command, "Catalog command exited unsuccessfully"),
            Completion::Cancelled => tracing::debug!("Catalog command cancelled"),
        }
        Ok(completion)
    }

    /// Runs `command` and returns its standard output lines.
    pub async fn output(&self, command: &CommandLine, cancel: &CancellationToken) -> Result<(Completion, Vec<String>)> {
        let lines = std::sync::Mutex::new(Vec::new());
        let collect = |line: String| lines.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(line);
        let completion = self.execute(command, Some(&collect), cancel).await?;
        Ok((completion, lines.into_inner().unwrap_or_else(std::sync::PoisonError::into_inner)))
    }
}

impl std::fmt::Debug for ProcessChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessChannel")
            .field("tool", &self.tool)
            .field("location", &self.location)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}
