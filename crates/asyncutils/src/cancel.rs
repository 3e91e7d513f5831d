use futures::Stream;
use pin_project_lite::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

pin_project! {
    /// Stream adapter that ends the inner stream once a token is cancelled.
    ///
    /// Items already yielded stay yielded; the stream simply stops producing
    /// more. Cancellation is checked before every poll of the inner stream.
    pub struct Cancellable<S> {
        #[pin]
        stream: S,
        #[pin]
        cancelled: WaitForCancellationFutureOwned,
        done: bool,
    }
}

impl<S: Stream> Stream for Cancellable<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        if *this.done {
            return Poll::Ready(None);
        }
        if this.cancelled.poll(cx).is_ready() {
            *this.done = true;
            return Poll::Ready(None);
        }
        match this.stream.poll_next(cx) {
            Poll::Ready(None) => {
                *this.done = true;
                Poll::Ready(None)
            },
            other => other,
        }
    }
}

pub trait CancellableExt: Stream + Sized {
    fn cancellable(self, token: CancellationToken) -> Cancellable<Self> {
        Cancellable {
            stream: self,
            cancelled: token.cancelled_owned(),
            done: false,
        }
    }
}
impl<S: Stream> CancellableExt for S {}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use futures::stream;

    #[tokio::test]
    async fn test_passes_items_through_until_cancelled() {
        let token = CancellationToken::new();
        let mut s = Box::pin(stream::iter(1..=3).cancellable(token.clone()));
        assert_eq!(s.next().await, Some(1));
        token.cancel();
        assert_eq!(s.next().await, None);
        assert_eq!(s.next().await, None);
    }

    #[tokio::test]
    async fn test_uncancelled_stream_runs_to_completion() {
        let token = CancellationToken::new();
        let items: Vec<_> = stream::iter(1..=3).cancellable(token).collect().await;
        assert_eq!(items, vec![1, 2, 3]);
    }
}
