use crate::AsyncSignal;
use crate::error::Result;
use futures::Stream;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;

/// A single-consumer FIFO fed from callbacks and drained asynchronously.
///
/// The producer [`push`](Self::push)es items and eventually calls
/// [`complete`](Self::complete). The consumer drains everything that is
/// queued, re-arms the signal, checks the queue one more time, and only then
/// suspends. That final check is what makes a push racing with the re-arm
/// impossible to lose.
#[derive(Debug)]
pub struct SignalQueue<T> {
    items: Mutex<VecDeque<T>>,
    complete: AtomicBool,
    signal: AsyncSignal,
}

impl<T> Default for SignalQueue<T> {
    fn default() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            complete: AtomicBool::new(false),
            signal: AsyncSignal::new(),
        }
    }
}

impl<T> SignalQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, item: T) {
        self.items.lock().unwrap_or_else(PoisonError::into_inner).push_back(item);
        self.signal.set();
    }

    /// Marks the producer as finished. Items already queued are still yielded.
    pub fn complete(&self) {
        self.complete.store(true, Ordering::Release);
        self.signal.set();
    }

    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }

    fn pop(&self) -> Option<T> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner).pop_front()
    }

    fn is_empty(&self) -> bool {
        self.items.lock().unwrap_or_else(PoisonError::into_inner).is_empty()
    }

    /// Waits for the next item.
    ///
    /// Returns `Ok(None)` once the producer has completed and every queued
    /// item has been taken.
    ///
    /// # Errors
    /// [`ErrorKind::Cancelled`](crate::error::ErrorKind::Cancelled) if
    /// `cancel` fires while waiting.
    pub async fn next(&self, cancel: &CancellationToken) -> Result<Option<T>> {
        loop {
            if let Some(item) = self.pop() {
                return Ok(Some(item));
            }
            if self.is_complete() {
                return Ok(self.pop());
            }
            self.signal.reset();
            if !self.is_empty() || self.is_complete() {
                continue;
            }
            self.signal.wait(None, cancel).await?;
        }
    }

    /// Turns the queue into a stream of items in push order.
    ///
    /// The stream ends when the queue is complete and drained, or as soon as
    /// `cancel` fires. Cancellation is not reported as an item.
    pub fn drain(self: Arc<Self>, cancel: CancellationToken) -> impl Stream<Item = T> {
        futures::stream::unfold((self, cancel), |(queue, cancel)| async move {
            match queue.next(&cancel).await {
                Ok(Some(item)) => Some((item, (queue, cancel))),
                Ok(None) | Err(_) => None,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::time::Duration;

    #[tokio::test]
    async fn test_items_queued_before_completion_are_drained() {
        let queue = Arc::new(SignalQueue::new());
        queue.push(1);
        queue.push(2);
        queue.complete();
        let items: Vec<i32> = queue.drain(CancellationToken::new()).collect().await;
        assert_eq!(items, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_consumer_wakes_for_late_producer() {
        let queue = Arc::new(SignalQueue::new());
        let producer = {
            let queue = queue.clone();
            tokio::spawn(async move {
                for i in 0..5 {
                    queue.push(i);
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
                queue.complete();
            })
        };
        let items: Vec<i32> = queue.clone().drain(CancellationToken::new()).collect().await;
        producer.await.unwrap();
        assert_eq!(items, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_cancellation_ends_stream_without_error() {
        let queue: Arc<SignalQueue<i32>> = Arc::new(SignalQueue::new());
        let cancel = CancellationToken::new();
        queue.push(7);
        let mut stream = Box::pin(queue.clone().drain(cancel.clone()));
        assert_eq!(stream.next().await, Some(7));
        cancel.cancel();
        assert_eq!(stream.next().await, None);
        assert!(!queue.is_complete());
    }

    #[tokio::test]
    async fn test_next_reports_cancellation() {
        let queue: SignalQueue<()> = SignalQueue::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(queue.next(&cancel).await.is_err());
    }
}
