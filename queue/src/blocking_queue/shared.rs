//! Shared state and the synchronization protocol behind `BlockingQueue`.
//!
//! All state lives behind a single `parking_lot::Mutex`. Blocking threads wait on a
//! `parking_lot::Condvar`; async tasks register a keyed `Waker` in the locked state.
//! Every waiter re-evaluates "non-empty OR closed" under the lock each time it wakes, so
//! spurious wakeups and races with other consumers are harmless.
//!
//! Wake policy:
//! - a push wakes exactly one waiter, preferring a parked thread over a registered task;
//! - close and transfer wake every waiter of both kinds.
//!
//! A waiter that is woken but leaves without consuming (a `front` peek, or a dropped
//! future) passes the wakeup on so that no buffered item is stranded behind a sleeping
//! consumer.

use crate::error::PopTimeoutError;

use std::collections::VecDeque;
use std::fmt;
use std::mem;
use std::ptr;
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::trace;

/// The state protected by the queue lock.
pub(crate) struct QueueState<T> {
  pub(crate) buffer: VecDeque<T>,
  pub(crate) running: bool,
  /// Registered async waiters, in registration order. An entry is removed when it is woken.
  async_waiters: VecDeque<(u64, Waker)>,
  next_waiter_key: u64,
}

impl<T> QueueState<T> {
  fn new(buffer: VecDeque<T>, running: bool) -> Self {
    Self {
      buffer,
      running,
      async_waiters: VecDeque::new(),
      next_waiter_key: 0,
    }
  }

  /// Registers or refreshes the async waiter identified by `key`.
  fn register_waker(&mut self, key: &mut Option<u64>, waker: &Waker) {
    if let Some(k) = *key {
      if let Some((_, existing)) = self.async_waiters.iter_mut().find(|(id, _)| *id == k) {
        if !existing.will_wake(waker) {
          *existing = waker.clone();
        }
        return;
      }
    }
    // Either the first poll or the previous registration was consumed by a wakeup.
    let k = self.next_waiter_key;
    self.next_waiter_key = self.next_waiter_key.wrapping_add(1);
    self.async_waiters.push_back((k, waker.clone()));
    *key = Some(k);
  }

  /// Removes the registration for `key`. Returns `true` if it was still registered,
  /// `false` if a wakeup had already claimed it.
  fn deregister_waker(&mut self, key: u64) -> bool {
    match self.async_waiters.iter().position(|(id, _)| *id == key) {
      Some(pos) => {
        self.async_waiters.remove(pos);
        true
      }
      None => false,
    }
  }
}

/// The shared core of a queue. Owners and handles hold it behind an `Arc`.
pub(crate) struct QueueShared<T> {
  state: Mutex<QueueState<T>>,
  not_empty: Condvar,
}

impl<T> fmt::Debug for QueueShared<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = self.state.lock();
    f.debug_struct("QueueShared")
      .field("len", &state.buffer.len())
      .field("running", &state.running)
      .field("async_waiters", &state.async_waiters.len())
      .finish()
  }
}

impl<T> QueueShared<T> {
  pub(crate) fn with_capacity(capacity: usize) -> Self {
    Self::from_buffer(VecDeque::with_capacity(capacity), true)
  }

  pub(crate) fn from_buffer(buffer: VecDeque<T>, running: bool) -> Self {
    Self {
      state: Mutex::new(QueueState::new(buffer, running)),
      not_empty: Condvar::new(),
    }
  }

  // --- Producers ---

  /// Appends `item` if the queue is running, otherwise hands it back.
  pub(crate) fn push(&self, item: T) -> Result<(), T> {
    {
      let mut state = self.state.lock();
      if !state.running {
        return Err(item);
      }
      state.buffer.push_back(item);
    }
    self.wake_one();
    Ok(())
  }

  /// Appends every item under a single lock acquisition. Returns how many were accepted.
  ///
  /// The caller's iterator is drained before locking, so it can neither leave a partial
  /// batch behind without wakeups if it panics nor re-enter this queue under the lock.
  pub(crate) fn extend<I>(&self, items: I) -> usize
  where
    I: IntoIterator<Item = T>,
  {
    let mut batch: VecDeque<T> = items.into_iter().collect();
    let accepted = batch.len();
    if accepted == 0 {
      return 0;
    }
    {
      let mut state = self.state.lock();
      if !state.running {
        return 0;
      }
      state.buffer.append(&mut batch);
    }
    for _ in 0..accepted {
      if !self.wake_one() {
        break;
      }
    }
    accepted
  }

  // --- Consumers ---

  pub(crate) fn try_pop(&self) -> Option<T> {
    self.state.lock().buffer.pop_front()
  }

  pub(crate) fn pop(&self) -> Option<T> {
    let mut state = self.state.lock();
    loop {
      if let Some(item) = state.buffer.pop_front() {
        return Some(item);
      }
      if !state.running {
        return None;
      }
      self.not_empty.wait(&mut state);
    }
  }

  pub(crate) fn pop_until(&self, deadline: Instant) -> Result<T, PopTimeoutError> {
    let mut state = self.state.lock();
    loop {
      if let Some(item) = state.buffer.pop_front() {
        return Ok(item);
      }
      if !state.running {
        return Err(PopTimeoutError::Closed);
      }
      if self.not_empty.wait_until(&mut state, deadline).timed_out() {
        // The timeout result alone is not trusted: an item may have landed on the boundary.
        return match state.buffer.pop_front() {
          Some(item) => Ok(item),
          None if !state.running => Err(PopTimeoutError::Closed),
          None => Err(PopTimeoutError::Timeout),
        };
      }
    }
  }

  pub(crate) fn pop_for(&self, timeout: Duration) -> Result<T, PopTimeoutError> {
    match Instant::now().checked_add(timeout) {
      Some(deadline) => self.pop_until(deadline),
      // Unrepresentable deadline; the bound can never elapse.
      None => self.pop().ok_or(PopTimeoutError::Closed),
    }
  }

  /// Waits like `pop`, then returns a clone of the head without removing it.
  pub(crate) fn front(&self) -> Option<T>
  where
    T: Clone,
  {
    let mut state = self.state.lock();
    let mut waited = false;
    loop {
      if let Some(head) = state.buffer.front().cloned() {
        drop(state);
        if waited {
          // We may have absorbed a push's single wakeup without consuming its item.
          self.wake_one();
        }
        return Some(head);
      }
      if !state.running {
        return None;
      }
      self.not_empty.wait(&mut state);
      waited = true;
    }
  }

  pub(crate) fn drain(&self) -> Vec<T> {
    self.state.lock().buffer.drain(..).collect()
  }

  // --- Async consumers ---

  /// One poll of an async pop. `key` tracks this waiter's registration across polls.
  pub(crate) fn poll_pop(&self, key: &mut Option<u64>, cx: &mut Context<'_>) -> Poll<Option<T>> {
    let mut state = self.state.lock();
    if let Some(item) = state.buffer.pop_front() {
      if let Some(k) = key.take() {
        state.deregister_waker(k);
      }
      return Poll::Ready(Some(item));
    }
    if !state.running {
      if let Some(k) = key.take() {
        state.deregister_waker(k);
      }
      return Poll::Ready(None);
    }
    state.register_waker(key, cx.waker());
    Poll::Pending
  }

  /// Called when an async pop is abandoned before completing.
  pub(crate) fn cancel_pop(&self, key: Option<u64>) {
    let Some(k) = key else {
      return;
    };
    let mut state = self.state.lock();
    if state.deregister_waker(k) {
      return;
    }
    // A push already spent its wakeup on us; forward it if the item is still there.
    let stranded = !state.buffer.is_empty();
    drop(state);
    if stranded {
      self.wake_one();
    }
  }

  // --- Snapshots ---

  pub(crate) fn len(&self) -> usize {
    self.state.lock().buffer.len()
  }

  pub(crate) fn is_empty(&self) -> bool {
    self.state.lock().buffer.is_empty()
  }

  pub(crate) fn is_running(&self) -> bool {
    self.state.lock().running
  }

  // --- Shutdown and transfer ---

  /// Stops admissions and releases every waiter. Returns `true` on the first call only.
  pub(crate) fn close(&self) -> bool {
    let (was_running, buffered, wakers) = {
      let mut state = self.state.lock();
      let was_running = mem::replace(&mut state.running, false);
      let wakers = mem::take(&mut state.async_waiters);
      (was_running, state.buffer.len(), wakers)
    };
    self.not_empty.notify_all();
    wake_all(wakers);
    if was_running {
      trace!(buffered, "queue closed");
    }
    was_running
  }

  /// Moves this queue's items and running flag out, leaving it empty and closed.
  pub(crate) fn take(&self) -> (VecDeque<T>, bool) {
    let (buffer, running, wakers) = {
      let mut state = self.state.lock();
      let buffer = mem::take(&mut state.buffer);
      let running = mem::replace(&mut state.running, false);
      (buffer, running, mem::take(&mut state.async_waiters))
    };
    self.not_empty.notify_all();
    wake_all(wakers);
    trace!(moved = buffer.len(), running, "queue contents taken");
    (buffer, running)
  }

  /// Replaces `dest`'s contents and running flag with `src`'s, leaving `src` empty and
  /// closed. Returns the items `dest` held before, to be dropped by the caller outside
  /// both locks.
  pub(crate) fn transfer(dest: &Self, src: &Self) -> VecDeque<T> {
    if ptr::eq(dest, src) {
      return VecDeque::new();
    }

    let (displaced, moved, dest_wakers, src_wakers) = {
      let (mut d, mut s) = lock_pair(dest, src);
      let displaced = mem::replace(&mut d.buffer, mem::take(&mut s.buffer));
      d.running = mem::replace(&mut s.running, false);
      (
        displaced,
        d.buffer.len(),
        mem::take(&mut d.async_waiters),
        mem::take(&mut s.async_waiters),
      )
    };

    src.not_empty.notify_all();
    dest.not_empty.notify_all();
    wake_all(src_wakers);
    wake_all(dest_wakers);
    trace!(moved, displaced = displaced.len(), "queue contents transferred");
    displaced
  }

  // --- Wakeups ---

  /// Wakes a single waiter: a parked thread if there is one, otherwise an async task.
  /// Returns `false` if nobody was waiting.
  fn wake_one(&self) -> bool {
    if self.not_empty.notify_one() {
      return true;
    }
    let waiter = self.state.lock().async_waiters.pop_front();
    match waiter {
      Some((_, waker)) => {
        waker.wake();
        true
      }
      None => false,
    }
  }
}

/// Locks both states in ascending address order so two transfers running in opposite
/// directions cannot deadlock. Returns the guards as `(first, second)` argument order.
fn lock_pair<'a, T>(
  first: &'a QueueShared<T>,
  second: &'a QueueShared<T>,
) -> (MutexGuard<'a, QueueState<T>>, MutexGuard<'a, QueueState<T>>) {
  let first_addr = first as *const QueueShared<T> as usize;
  let second_addr = second as *const QueueShared<T> as usize;
  if first_addr < second_addr {
    let a = first.state.lock();
    let b = second.state.lock();
    (a, b)
  } else {
    let b = second.state.lock();
    let a = first.state.lock();
    (a, b)
  }
}

fn wake_all(wakers: VecDeque<(u64, Waker)>) {
  for (_, waker) in wakers {
    waker.wake();
  }
}
