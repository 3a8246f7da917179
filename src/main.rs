use flex_pool::WorkerPool;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

fn main() {
    let now = Instant::now();
    let pool = WorkerPool::new(num_cpus::get()).expect("failed to build pool");
    let counter = Arc::new(AtomicU64::new(0));

    for _ in 0..1_000_000 {
        let counter = Arc::clone(&counter);
        pool.submit(move |_index| {
            counter.fetch_add(1, Ordering::Relaxed);
        })
        .expect("pool stopped");
    }

    pool.resize(1).expect("resize failed");
    pool.stop(true);

    println!("counted: {}", counter.load(Ordering::Relaxed));
    println!("elapsed: {:?}", now.elapsed());
}
