//! Lazy record streams over catalog tool output.
//!
//! The subprocess is started eagerly on a background task when the stream
//! is created. Its output is parsed on that task and handed over through a
//! [`SignalQueue`], so records materialize as the consumer polls. Dropping
//! the stream, or firing the cancellation token, kills the subprocess and
//! ends the stream without an error item.

use crate::command::CommandLine;
use crate::error::{ErrorKind, Result};
use crate::models::Row;
use crate::parse::{CsvReassembler, JsonCollector, Record};
use crate::process::{Completion, ProcessChannel};
use async_stream::stream;
use exn::ResultExt;
use futures::{Stream, StreamExt};
use serde_json::Value;
use shelf_asyncutils::{CancellableExt, CancellationToken, SignalQueue};
use std::sync::{Arc, Mutex, PoisonError};

/// Runs `command` and yields each element of the JSON array it prints.
///
/// An empty output yields nothing. Output that is not a JSON array of
/// objects yields a single [`ErrorKind::MalformedOutput`] item.
pub fn buffered(channel: &ProcessChannel, command: CommandLine, cancel: &CancellationToken) -> impl Stream<Item = Result<Row>> + Send + 'static {
    let context = command.subcommand().to_string();
    let queue: Arc<SignalQueue<Result<Value>>> = Arc::new(SignalQueue::new());
    let token = cancel.child_token();
    {
        let (channel, queue, token) = (channel.clone(), queue.clone(), token.clone());
        tokio::spawn(async move {
            let collector = Mutex::new(JsonCollector::new());
            let push = |line: String| collector.lock().unwrap_or_else(PoisonError::into_inner).push(&line);
            match channel.execute(&command, Some(&push), &token).await {
                Ok(Completion::Cancelled) => {},
                Ok(Completion::Exited(_)) => {
                    let collector = collector.into_inner().unwrap_or_else(PoisonError::into_inner);
                    match collector.finish::<Vec<Value>>(command.subcommand()) {
                        Ok(values) => values.into_iter().flatten().for_each(|value| queue.push(Ok(value))),
                        Err(err) => queue.push(Err(err)),
                    }
                },
                Err(err) => queue.push(Err(err)),
            }
            queue.complete();
        });
    }
    let guard = token.clone().drop_guard();
    stream! {
        let _guard = guard;
        // Records already queued are dropped once cancelled.
        let mut values = std::pin::pin!(queue.drain(token.clone()).cancellable(token));
        while let Some(value) = values.next().await {
            yield value.and_then(|value| serde_json::from_value::<Row>(value).or_raise(|| ErrorKind::MalformedOutput(context.clone())));
        }
    }
}

/// Runs `command` and yields CSV records as soon as each is complete.
pub fn tabular(channel: &ProcessChannel, command: CommandLine, cancel: &CancellationToken) -> impl Stream<Item = Result<Record>> + Send + 'static {
    let queue: Arc<SignalQueue<Result<Record>>> = Arc::new(SignalQueue::new());
    let token = cancel.child_token();
    {
        let (channel, queue, token) = (channel.clone(), queue.clone(), token.clone());
        tokio::spawn(async move {
            let parser = Mutex::new(CsvReassembler::default());
            let push = |line: String| {
                let record = parser.lock().unwrap_or_else(PoisonError::into_inner).push(&line);
                if let Some(record) = record {
                    queue.push(Ok(record));
                }
            };
            match channel.execute(&command, Some(&push), &token).await {
                Ok(Completion::Cancelled) => {},
                Ok(Completion::Exited(_)) => {
                    let mut parser = parser.into_inner().unwrap_or_else(PoisonError::into_inner);
                    if let Some(record) = parser.finish() {
                        queue.push(Ok(record));
                    }
                },
                Err(err) => queue.push(Err(err)),
            }
            queue.complete();
        });
    }
    let guard = token.clone().drop_guard();
    stream! {
        let _guard = guard;
        let mut records = std::pin::pin!(queue.drain(token.clone()).cancellable(token));
        while let Some(record) = records.next().await {
            yield record;
        }
    }
}
