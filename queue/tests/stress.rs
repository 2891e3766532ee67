mod common;
use common::*;

use fibre_queue::BlockingQueue;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[test]
#[cfg(not(debug_assertions))]
fn queue_tsan_stress_test() {
  // Run with RUSTFLAGS="-Z sanitizer=thread" cargo +nightly test --release queue_tsan_stress_test
  let queue = BlockingQueue::new();
  let num_producers = 8;
  let num_consumers = 8;
  let items_per_producer = 200_000;
  let received = Arc::new(AtomicUsize::new(0));

  let producers: Vec<_> = (0..num_producers)
    .map(|p| {
      let handle = queue.handle();
      thread::spawn(move || {
        for j in 0..items_per_producer {
          handle.push((p, j));
          if j % 10 == 0 {
            thread::yield_now();
          }
        }
      })
    })
    .collect();

  let consumers: Vec<_> = (0..num_consumers)
    .map(|_| {
      let handle = queue.handle();
      let received = received.clone();
      thread::spawn(move || {
        while handle.pop().is_some() {
          received.fetch_add(1, Ordering::Relaxed);
        }
      })
    })
    .collect();

  for p in producers {
    p.join().unwrap();
  }
  queue.close();
  for c in consumers {
    c.join().unwrap();
  }

  assert_eq!(received.load(Ordering::Relaxed), num_producers * items_per_producer);
}

#[test]
fn timed_consumers_with_bursty_producer() {
  let queue = BlockingQueue::new();
  let received = Arc::new(AtomicUsize::new(0));

  let consumers: Vec<_> = (0..4)
    .map(|_| {
      let handle = queue.handle();
      let received = received.clone();
      thread::spawn(move || loop {
        match handle.pop_for(Duration::from_millis(2)) {
          Some(_) => {
            received.fetch_add(1, Ordering::Relaxed);
          }
          None if !handle.is_running() && handle.is_empty() => break,
          None => {}
        }
      })
    })
    .collect();

  for burst in 0..ITEMS_LOW {
    queue.extend((0..ITEMS_LOW).map(|i| burst * ITEMS_LOW + i));
    if burst % 5 == 0 {
      thread::sleep(Duration::from_millis(3));
    }
  }
  queue.close();

  let start = Instant::now();
  for c in consumers {
    c.join().unwrap();
  }
  assert!(start.elapsed() < STRESS_TIMEOUT);
  assert_eq!(received.load(Ordering::Relaxed), ITEMS_LOW * ITEMS_LOW);
}

#[test]
fn transfer_into_awaited_queue_delivers_everything() {
  let source = BlockingQueue::new();
  let total = ITEMS_HIGH;
  for i in 0..total {
    source.push(i);
  }

  let dest = Arc::new(BlockingQueue::new());
  let popper = {
    let dest = dest.clone();
    thread::spawn(move || {
      let mut got = 0;
      while dest.pop_for(LONG_TIMEOUT).is_some() {
        got += 1;
        if got == total {
          break;
        }
      }
      got
    })
  };

  thread::sleep(Duration::from_millis(20));
  dest.transfer_from(&source);
  assert_eq!(popper.join().unwrap(), total);
  assert!(!source.is_running());
}
