#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

//! A thread-safe, blocking FIFO queue with graceful shutdown.
//!
//! `fibre_queue` provides [`BlockingQueue`], an unbounded multi-producer, multi-consumer
//! queue for building producer/consumer pipelines. Consumers may block, block with a
//! timeout, poll without blocking, or `.await` the next item. Closing the queue stops new
//! admissions, lets consumers drain what is already buffered, and then releases every
//! waiter.
//!
//! ```
//! use fibre_queue::BlockingQueue;
//! use std::thread;
//!
//! let queue = BlockingQueue::new();
//! let consumer = {
//!   let handle = queue.handle();
//!   thread::spawn(move || {
//!     let mut received = Vec::new();
//!     while let Some(item) = handle.pop() {
//!       received.push(item);
//!     }
//!     received
//!   })
//! };
//!
//! for i in 0..3 {
//!   assert!(queue.push(i));
//! }
//! queue.close();
//! assert!(!queue.push(99));
//!
//! assert_eq!(consumer.join().unwrap(), vec![0, 1, 2]);
//! ```

pub mod blocking_queue;
pub mod error;

pub use blocking_queue::{BlockingQueue, PopFuture, PopStream, QueueHandle};
pub use error::{PopTimeoutError, PushError};

// Compile-time check that the queue can be shared across threads.
#[allow(dead_code)]
fn assert_send_sync<T: Send + Sync>() {}

#[allow(dead_code)]
fn assert_queue_types_are_send_sync() {
  assert_send_sync::<BlockingQueue<String>>();
  assert_send_sync::<QueueHandle<String>>();
  assert_send_sync::<PopStream<String>>();
}
