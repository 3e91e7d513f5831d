//! Small async primitives for bridging push-style producers (subprocess I/O
//! callbacks) with pull-style consumers (streams).
//!
//! - [`AsyncSignal`] is a resettable gate that any number of tasks can wait on.
//! - [`SignalQueue`] pairs a FIFO with an [`AsyncSignal`] so a consumer can
//!   suspend without polling and still never miss a wakeup.
//! - [`Cancellable`] ends any [`Stream`](futures::Stream) quietly once a
//!   [`CancellationToken`] fires.

mod cancel;
pub mod error;
mod queue;
mod signal;

pub use crate::cancel::{Cancellable, CancellableExt};
pub use crate::queue::SignalQueue;
pub use crate::signal::AsyncSignal;
pub use tokio_util::sync::CancellationToken;
