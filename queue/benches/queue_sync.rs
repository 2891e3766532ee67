use bench_matrix::{
  criterion_runner::sync_suite::SyncBenchmarkSuite, AbstractCombination, MatrixCellValue,
};
use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::thread;
use std::time::{Duration, Instant};

use fibre_queue::{BlockingQueue, QueueHandle};

const ITEM_VALUE: u64 = 42;

#[derive(Debug, Clone)]
struct QueueBenchConfig {
  num_producers: usize,
  num_items: usize,
}

#[derive(Default, Debug)]
struct BenchContext {
  items_processed_total: usize,
}

struct QueueSyncState {
  queue: BlockingQueue<u64>,
}

fn extract_queue_config(combo: &AbstractCombination) -> Result<QueueBenchConfig, String> {
  let num_producers = combo.get_u64(0)? as usize;
  let num_items = combo.get_u64(1)? as usize;

  if num_producers == 0 || num_items % num_producers != 0 {
    return Err(format!(
      "Skipping queue combination: items must split evenly across producers. Producers: {}, Items: {}",
      num_producers, num_items
    ));
  }

  Ok(QueueBenchConfig {
    num_producers,
    num_items,
  })
}

fn setup_fn_queue_sync(_cfg: &QueueBenchConfig) -> Result<(BenchContext, QueueSyncState), String> {
  Ok((
    BenchContext::default(),
    QueueSyncState {
      queue: BlockingQueue::new(),
    },
  ))
}

fn spawn_producer(handle: QueueHandle<u64>, count: usize) -> thread::JoinHandle<()> {
  thread::spawn(move || {
    for _ in 0..count {
      handle.push(ITEM_VALUE);
    }
  })
}

// N producer threads, one consumer on the bench thread.
fn benchmark_logic_queue_sync(
  mut ctx: BenchContext,
  state: QueueSyncState,
  cfg: &QueueBenchConfig,
) -> (BenchContext, QueueSyncState, Duration) {
  let per_producer = cfg.num_items / cfg.num_producers;
  let start_time = Instant::now();

  let producers: Vec<_> = (0..cfg.num_producers)
    .map(|_| spawn_producer(state.queue.handle(), per_producer))
    .collect();

  for _ in 0..cfg.num_items {
    let _ = state.queue.pop();
  }
  for p in producers {
    p.join().unwrap();
  }

  let duration = start_time.elapsed();
  ctx.items_processed_total += cfg.num_items;
  (ctx, state, duration)
}

fn teardown_queue_sync(_ctx: BenchContext, state: QueueSyncState, _cfg: &QueueBenchConfig) {
  state.queue.close();
}

fn queue_sync_benches(c: &mut Criterion) {
  let parameter_axes = vec![
    vec![
      MatrixCellValue::Unsigned(1),
      MatrixCellValue::Unsigned(4),
      MatrixCellValue::Unsigned(8),
    ], // Producers
    vec![
      MatrixCellValue::Unsigned(8_000),
      MatrixCellValue::Unsigned(80_000),
    ], // NumItems
  ];
  let parameter_names = vec!["Prod".to_string(), "Items".to_string()];

  SyncBenchmarkSuite::new(
    c,
    "BlockingQueueSync".to_string(),
    Some(parameter_names),
    parameter_axes,
    Box::new(extract_queue_config),
    setup_fn_queue_sync,
    benchmark_logic_queue_sync,
    teardown_queue_sync,
  )
  .throughput(|cfg: &QueueBenchConfig| Throughput::Elements(cfg.num_items as u64))
  .run();
}

criterion_group!(benches, queue_sync_benches);
criterion_main!(benches);
