//! Async consumers for the blocking queue.

use super::shared::QueueShared;
use futures_core::Stream;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// A future that resolves to the next item, or `None` once the queue is closed and empty.
///
/// Created by [`BlockingQueue::pop_async`](super::BlockingQueue::pop_async) and
/// [`QueueHandle::pop_async`](super::QueueHandle::pop_async).
#[must_use = "futures do nothing unless you .await or poll them"]
pub struct PopFuture<'a, T> {
  shared: &'a QueueShared<T>,
  key: Option<u64>,
}

impl<'a, T> PopFuture<'a, T> {
  pub(crate) fn new(shared: &'a QueueShared<T>) -> Self {
    Self { shared, key: None }
  }
}

impl<T> fmt::Debug for PopFuture<'_, T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PopFuture")
      .field("registered", &self.key.is_some())
      .finish()
  }
}

impl<T> Future for PopFuture<'_, T> {
  type Output = Option<T>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    let this = self.get_mut();
    this.shared.poll_pop(&mut this.key, cx)
  }
}

impl<T> Drop for PopFuture<'_, T> {
  fn drop(&mut self) {
    self.shared.cancel_pop(self.key.take());
  }
}

/// A stream of items popped from a queue, ending once the queue is closed and drained.
///
/// Created by [`QueueHandle::into_stream`](super::QueueHandle::into_stream).
pub struct PopStream<T> {
  shared: Arc<QueueShared<T>>,
  key: Option<u64>,
}

impl<T> PopStream<T> {
  pub(crate) fn new(shared: Arc<QueueShared<T>>) -> Self {
    Self { shared, key: None }
  }
}

impl<T> fmt::Debug for PopStream<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PopStream")
      .field("queue", &self.shared)
      .field("registered", &self.key.is_some())
      .finish()
  }
}

impl<T> Stream for PopStream<T> {
  type Item = T;

  fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
    let this = self.get_mut();
    this.shared.poll_pop(&mut this.key, cx)
  }
}

impl<T> Drop for PopStream<T> {
  fn drop(&mut self) {
    self.shared.cancel_pop(self.key.take());
  }
}
