// src/blocking_queue/mod.rs

//! A thread-safe, unbounded, blocking FIFO queue with graceful shutdown.
//!
//! [`BlockingQueue`] is the owner of a single buffer guarded by a single lock. Producers
//! [`push`](BlockingQueue::push) items; consumers [`pop`](BlockingQueue::pop) them in
//! insertion order, blocking while the queue is empty. [`close`](BlockingQueue::close)
//! is an irreversible shutdown: further pushes fail, buffered items can still be drained,
//! and every blocked consumer is released once nothing is left.
//!
//! ### Sharing a queue
//!
//! The owner is not `Clone`. Share it either as `Arc<BlockingQueue<T>>` or by handing out
//! [`QueueHandle`]s from [`BlockingQueue::handle`]. Handles reach the same buffer and lock
//! but do not own the queue: dropping a handle never closes it, while dropping the owner
//! always does. That makes the owner's scope the queue's lifetime, and guarantees that a
//! consumer blocked through a handle is released when the owner goes away.
//!
//! ### Mixing sync and async consumers
//!
//! Blocking consumers (`pop`, `pop_for`, `pop_until`, `front`) and async consumers
//! ([`pop_async`](BlockingQueue::pop_async), [`PopStream`]) can wait on the same queue at
//! the same time. Each push wakes exactly one of them.
//!
//! ### Ownership transfer
//!
//! [`take`](BlockingQueue::take) and [`transfer_from`](BlockingQueue::transfer_from) move
//! the contents and running state of one queue into another while both are shared,
//! leaving the source empty and closed. Two-queue transfers acquire both locks in a fixed
//! address order.

use crate::error::{PopTimeoutError, PushError};

pub use async_impl::{PopFuture, PopStream};

mod async_impl;
mod shared;

use self::shared::QueueShared;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::trace;

/// The owning side of a blocking FIFO queue.
///
/// Dropping a `BlockingQueue` closes it. See the [module documentation](self) for the
/// sharing model.
pub struct BlockingQueue<T> {
  shared: Arc<QueueShared<T>>,
}

/// A cloneable, non-owning reference to a [`BlockingQueue`].
///
/// A handle supports every queue operation except ownership transfer. Dropping a handle
/// does not close the queue; once the owner is dropped, the handle observes a closed queue.
pub struct QueueHandle<T> {
  shared: Arc<QueueShared<T>>,
}

// Operations shared by the owner and its handles.
macro_rules! impl_queue_ops {
  ($ty:ident) => {
    impl<T> $ty<T> {
      /// Appends `item` to the tail and wakes one waiting consumer.
      ///
      /// Returns `false` and drops the item if the queue has been closed.
      pub fn push(&self, item: T) -> bool {
        self.shared.push(item).is_ok()
      }

      /// Like [`push`](Self::push), but hands a rejected item back to the caller.
      pub fn try_push(&self, item: T) -> Result<(), PushError<T>> {
        self.shared.push(item).map_err(PushError::Closed)
      }

      /// Appends every item from `items` under one lock acquisition.
      ///
      /// Returns the number of items accepted, which is `0` if the queue is closed. The
      /// iterator is fully consumed before the lock is taken, so a panicking iterator adds
      /// nothing to the queue.
      pub fn extend<I>(&self, items: I) -> usize
      where
        I: IntoIterator<Item = T>,
      {
        self.shared.extend(items)
      }

      /// Removes the head item, blocking until one is available.
      ///
      /// Returns `None` once the queue is closed and empty.
      pub fn pop(&self) -> Option<T> {
        self.shared.pop()
      }

      /// Removes the head item if there is one. Never blocks.
      pub fn try_pop(&self) -> Option<T> {
        self.shared.try_pop()
      }

      /// Like [`pop`](Self::pop), but gives up and returns `None` after `timeout`.
      pub fn pop_for(&self, timeout: Duration) -> Option<T> {
        self.shared.pop_for(timeout).ok()
      }

      /// Like [`pop`](Self::pop), but gives up and returns `None` at `deadline`.
      pub fn pop_until(&self, deadline: Instant) -> Option<T> {
        self.shared.pop_until(deadline).ok()
      }

      /// Like [`pop_for`](Self::pop_for), but reports why no item was returned.
      pub fn pop_timeout(&self, timeout: Duration) -> Result<T, PopTimeoutError> {
        self.shared.pop_for(timeout)
      }

      /// Returns a future that resolves to the next item, or `None` once the queue is
      /// closed and empty.
      pub fn pop_async(&self) -> PopFuture<'_, T> {
        PopFuture::new(&self.shared)
      }

      /// Returns a clone of the head item without removing it.
      ///
      /// Blocks exactly like [`pop`](Self::pop): waits until the queue is non-empty or
      /// closed, and returns `None` only when it is closed and empty.
      pub fn front(&self) -> Option<T>
      where
        T: Clone,
      {
        self.shared.front()
      }

      /// Removes and returns every buffered item in FIFO order. Never blocks.
      pub fn drain(&self) -> Vec<T> {
        self.shared.drain()
      }

      /// Returns the number of buffered items at the time of the call.
      pub fn len(&self) -> usize {
        self.shared.len()
      }

      /// Returns `true` if no items were buffered at the time of the call.
      pub fn is_empty(&self) -> bool {
        self.shared.is_empty()
      }

      /// Returns `true` until the queue has been closed.
      pub fn is_running(&self) -> bool {
        self.shared.is_running()
      }

      /// Closes the queue and wakes every waiter. Idempotent.
      ///
      /// After closing, pushes fail and pops drain the remaining items before returning
      /// `None`.
      pub fn close(&self) {
        self.shared.close();
      }
    }
  };
}

impl_queue_ops!(BlockingQueue);
impl_queue_ops!(QueueHandle);

impl<T> BlockingQueue<T> {
  /// Creates an empty, running queue.
  pub fn new() -> Self {
    Self::with_capacity(0)
  }

  /// Creates an empty, running queue with storage preallocated for `capacity` items.
  ///
  /// This is not a bound: the queue still grows without limit.
  pub fn with_capacity(capacity: usize) -> Self {
    Self {
      shared: Arc::new(QueueShared::with_capacity(capacity)),
    }
  }

  /// Returns a new handle to this queue.
  pub fn handle(&self) -> QueueHandle<T> {
    QueueHandle {
      shared: Arc::clone(&self.shared),
    }
  }

  /// Moves this queue's items and running state into a new queue.
  ///
  /// `self` is left empty and closed, and its waiters are released.
  pub fn take(&self) -> BlockingQueue<T> {
    let (buffer, running) = self.shared.take();
    Self {
      shared: Arc::new(QueueShared::from_buffer(buffer, running)),
    }
  }

  /// Replaces this queue's items and running state with those of `source`.
  ///
  /// `source` is left empty and closed. Items previously held by `self` are dropped.
  /// Waiters on both queues are woken to re-evaluate. Transferring a queue into itself
  /// does nothing.
  pub fn transfer_from(&self, source: &BlockingQueue<T>) {
    let displaced = QueueShared::transfer(&*self.shared, &*source.shared);
    drop(displaced);
  }
}

impl<T> QueueHandle<T> {
  /// Converts this handle into a [`Stream`](futures_core::Stream) of popped items.
  pub fn into_stream(self) -> PopStream<T> {
    PopStream::new(self.shared)
  }
}

impl<T> Default for BlockingQueue<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T> From<VecDeque<T>> for BlockingQueue<T> {
  fn from(buffer: VecDeque<T>) -> Self {
    Self {
      shared: Arc::new(QueueShared::from_buffer(buffer, true)),
    }
  }
}

impl<T> FromIterator<T> for BlockingQueue<T> {
  fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
    Self::from(iter.into_iter().collect::<VecDeque<T>>())
  }
}

impl<T> Drop for BlockingQueue<T> {
  fn drop(&mut self) {
    if self.shared.close() {
      trace!("queue closed by owner drop");
    }
  }
}

impl<T> Clone for QueueHandle<T> {
  fn clone(&self) -> Self {
    Self {
      shared: Arc::clone(&self.shared),
    }
  }
}

impl<T> fmt::Debug for BlockingQueue<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("BlockingQueue")
      .field("shared", &self.shared)
      .finish()
  }
}

impl<T> fmt::Debug for QueueHandle<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("QueueHandle")
      .field("shared", &self.shared)
      .finish()
  }
}
