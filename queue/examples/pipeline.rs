// examples/pipeline.rs
use fibre_queue::{BlockingQueue, PopTimeoutError};
use std::{
  sync::atomic::{AtomicUsize, Ordering},
  sync::Arc,
  thread,
  time::Duration,
};

fn main() {
  println!("--- Pipeline: Sync Producers, Sync Workers ---");
  {
    let jobs = BlockingQueue::<String>::new();
    let num_producers = 3;
    let jobs_per_producer = 4;
    let processed = Arc::new(AtomicUsize::new(0));

    let producers: Vec<_> = (0..num_producers)
      .map(|p| {
        let handle = jobs.handle();
        thread::spawn(move || {
          for j in 0..jobs_per_producer {
            let job = format!("P{}-J{}", p, j);
            println!("[Producer {}] Pushing: {}", p, job);
            if !handle.push(job) {
              println!("[Producer {}] Queue closed.", p);
              break;
            }
            thread::sleep(Duration::from_millis(5 + p as u64 * 3));
          }
        })
      })
      .collect();

    let workers: Vec<_> = (0..2)
      .map(|w| {
        let handle = jobs.handle();
        let processed = Arc::clone(&processed);
        thread::spawn(move || loop {
          match handle.pop_timeout(Duration::from_millis(50)) {
            Ok(job) => {
              println!("[Worker {}] Processing: {}", w, job);
              processed.fetch_add(1, Ordering::Relaxed);
            }
            Err(PopTimeoutError::Timeout) => println!("[Worker {}] Idle.", w),
            Err(PopTimeoutError::Closed) => {
              println!("[Worker {}] Queue closed and drained.", w);
              break;
            }
          }
        })
      })
      .collect();

    for p in producers {
      p.join().unwrap();
    }
    // Dropping the owner closes the queue; workers drain what is left and exit.
    drop(jobs);
    for w in workers {
      w.join().unwrap();
    }
    assert_eq!(processed.load(Ordering::Relaxed), num_producers * jobs_per_producer);
  }

  println!("\n--- Pipeline: Sync Producer, Async Consumer ---");
  let runtime = tokio::runtime::Builder::new_current_thread()
    .enable_all()
    .build()
    .unwrap();
  runtime.block_on(async {
    let queue = BlockingQueue::new();
    let handle = queue.handle();
    let producer = thread::spawn(move || {
      for i in 0..5 {
        handle.push(i);
      }
      handle.close();
    });

    while let Some(value) = queue.pop_async().await {
      println!("[Async Consumer] Received: {}", value);
    }
    println!("[Async Consumer] Queue closed.");
    producer.join().unwrap();
  });

  println!("\n--- Handover: moving a backlog to a new queue ---");
  {
    let old = BlockingQueue::from_iter(["a", "b", "c"]);
    let new = BlockingQueue::new();
    new.transfer_from(&old);
    println!("old running={} len={}", old.is_running(), old.len());
    println!("new running={} drained={:?}", new.is_running(), new.drain());
  }
}
