//! Scripted stand-in for the catalog tool.

use crate::command::{CommandLine, Location};
use crate::error::Result;
use crate::process::{Completion, LineSink, OutputLine, ProcessChannel, Runner};
use async_trait::async_trait;
use shelf_asyncutils::CancellationToken;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

/// Library root used by [`MockRunner::channel`].
pub const MOCK_LIBRARY: &str = "/library";

/// What the scripted tool prints for one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockResponse {
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    pub code: i32,
}
impl MockResponse {
    /// Exits successfully without output.
    pub fn ok() -> Self {
        Self::default()
    }

    /// Prints `text` line by line.
    pub fn stdout(text: &str) -> Self {
        Self {
            stdout: text.lines().map(str::to_string).collect(),
            ..Self::default()
        }
    }

    /// Prints `value` as pretty JSON, spread over many lines like the real tool.
    pub fn json(value: &serde_json::Value) -> Self {
        Self::stdout(&serde_json::to_string_pretty(value).unwrap_or_default())
    }

    pub fn with_stderr(mut self, line: impl Into<String>) -> Self {
        self.stderr.push(line.into());
        self
    }

    pub fn with_code(mut self, code: i32) -> Self {
        self.code = code;
        self
    }
}

type Handler = Box<dyn Fn(&CommandLine) -> MockResponse + Send + Sync>;

/// A [`Runner`] that answers every command through a handler function and
/// remembers what it was asked to run.
///
/// # Examples
///
/// ```ignore
/// use shelf_catalog::mock::{MockResponse, MockRunner};
/// use std::sync::Arc;
///
/// let runner = Arc::new(MockRunner::new(|command| match command.subcommand() {
///     "add" => MockResponse::stdout("Added book ids: 7"),
///     _ => MockResponse::ok(),
/// }));
/// let channel = runner.channel();
/// ```
pub struct MockRunner {
    handler: Handler,
    history: Mutex<Vec<CommandLine>>,
}

impl MockRunner {
    pub fn new(handler: impl Fn(&CommandLine) -> MockResponse + Send + Sync + 'static) -> Self {
        Self {
            handler: Box::new(handler),
            history: Mutex::new(Vec::new()),
        }
    }

    /// A channel at [`MOCK_LIBRARY`] that runs everything through this mock.
    pub fn channel(self: &Arc<Self>) -> ProcessChannel {
        ProcessChannel::new("calibredb", Location::Path(PathBuf::from(MOCK_LIBRARY))).with_runner(self.clone())
    }

    /// Every command run so far, in order.
    pub fn history(&self) -> Vec<CommandLine> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Commands run so far for one subcommand.
    pub fn calls(&self, subcommand: &str) -> Vec<CommandLine> {
        self.history().into_iter().filter(|c| c.subcommand() == subcommand).collect()
    }
}

#[async_trait]
impl Runner for MockRunner {
    async fn run(&self, command: &CommandLine, sink: LineSink<'_>, cancel: &CancellationToken) -> Result<Completion> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner).push(command.clone());
        if cancel.is_cancelled() {
            return Ok(Completion::Cancelled);
        }
        let response = (self.handler)(command);
        for line in response.stdout {
            sink(OutputLine::Stdout(line));
        }
        for line in response.stderr {
            sink(OutputLine::Stderr(line));
        }
        Ok(Completion::Exited(Some(response.code)))
    }
}
