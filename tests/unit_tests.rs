#[cfg(test)]
mod tests {
    use flex_pool::{
        errors::{PoolError, TaskError},
        queue::SynchronizedQueue,
        WorkerPool,
    };
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            mpsc, Arc,
        },
        thread,
        time::{Duration, Instant},
    };

    #[test]
    fn test_create_sizes() {
        let pool = WorkerPool::new(4).unwrap();
        assert_eq!(pool.size(), 4);

        let empty = WorkerPool::new(0).unwrap();
        assert_eq!(empty.size(), 0);
        assert_eq!(empty.idle_count(), 0);
    }

    #[test]
    fn test_queue_fifo() {
        let queue = SynchronizedQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.pop(), None);

        queue.push(1);
        queue.push(2);
        queue.push(3);
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.pop(), Some(1));
        assert_eq!(queue.pop(), Some(2));
        assert_eq!(queue.pop(), Some(3));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_submit_returns_value() {
        let pool = WorkerPool::new(3).unwrap();

        let handle = pool.submit(|_index| 42).unwrap();
        assert_eq!(handle.wait(), Ok(42));

        // Extra arguments are bound by capture before submission.
        let bound = 3;
        let handle = pool.submit(move |_index| bound * 2).unwrap();
        assert_eq!(handle.wait(), Ok(6));

        // The worker index is always in range.
        let handle = pool.submit(|index| index).unwrap();
        assert!(handle.wait().unwrap() < 3);
    }

    #[test]
    fn test_try_wait() {
        let pool = WorkerPool::new(1).unwrap();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let mut handle = pool
            .submit(move |_index| {
                release_rx.recv().unwrap();
                5
            })
            .unwrap();

        // Pending while the task is gated.
        assert_eq!(handle.try_wait(), None);

        release_tx.send(()).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            match handle.try_wait() {
                Some(result) => {
                    assert_eq!(result, Ok(5));
                    break;
                }
                None => {
                    assert!(Instant::now() < deadline, "task never finished");
                    thread::yield_now();
                }
            }
        }
    }

    #[test]
    fn test_panic_contained() {
        let pool = WorkerPool::new(2).unwrap();

        let handle = pool.submit(|_index| -> i32 { panic!("boom") }).unwrap();
        match handle.wait() {
            Err(TaskError::Panic(msg)) => assert!(msg.contains("boom")),
            other => panic!("expected panic outcome, got {:?}", other),
        }

        // The worker survives a panicking task.
        assert_eq!(pool.size(), 2);
        let handle = pool.submit(|_index| "still alive").unwrap();
        assert_eq!(handle.wait(), Ok("still alive"));

        let metrics = pool.metrics();
        assert_eq!(metrics.failed_tasks, 1);
        assert_eq!(metrics.completed_tasks, 1);
    }

    #[test]
    fn test_grow_keeps_inflight_tasks() {
        let pool = WorkerPool::new(2).unwrap();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let handle = pool
            .submit(move |_index| {
                release_rx.recv().unwrap();
                "finished"
            })
            .unwrap();

        pool.resize(4).unwrap();
        assert_eq!(pool.size(), 4);

        release_tx.send(()).unwrap();
        assert_eq!(handle.wait(), Ok("finished"));
    }

    #[test]
    fn test_shrink_terminates_retired_workers() {
        let pool = WorkerPool::new(4).unwrap();
        assert_eq!(pool.size(), 4);

        pool.resize(1).unwrap();
        assert_eq!(pool.size(), 1);
        assert!(
            pool.wait_for_live(1, Duration::from_secs(5)),
            "retired workers did not terminate"
        );

        // The remaining worker still serves tasks.
        let handle = pool.submit(|index| index).unwrap();
        assert_eq!(handle.wait(), Ok(0));
    }

    #[test]
    fn test_abandon_cancels_unstarted_tasks() {
        let pool = WorkerPool::new(1).unwrap();
        let started = Arc::new(AtomicUsize::new(0));
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let started_flag = Arc::clone(&started);
        let blocker = pool
            .submit(move |_index| {
                started_flag.fetch_add(1, Ordering::SeqCst);
                release_rx.recv().unwrap();
                "done"
            })
            .unwrap();

        let queued: Vec<_> = (0..50)
            .map(|i| pool.submit(move |_index| i).unwrap())
            .collect();

        while started.load(Ordering::SeqCst) == 0 {
            thread::yield_now();
        }

        // Release the in-flight task while stop() is joining.
        let releaser = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            release_tx.send(()).unwrap();
        });

        pool.stop(false);
        releaser.join().unwrap();

        // The started task completed; every unstarted task was cancelled.
        assert_eq!(blocker.wait(), Ok("done"));
        for handle in queued {
            assert_eq!(handle.wait(), Err(TaskError::Cancelled));
        }

        let metrics = pool.metrics();
        assert_eq!(metrics.completed_tasks, 1);
        assert_eq!(metrics.cancelled_tasks, 50);
        assert_eq!(metrics.settled(), 51);
    }

    #[test]
    fn test_drain_completes_all_tasks() {
        let pool = WorkerPool::new(2).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..100)
            .map(|i| {
                let counter = Arc::clone(&counter);
                pool.submit(move |_index| {
                    thread::sleep(Duration::from_millis(1));
                    counter.fetch_add(1, Ordering::SeqCst);
                    i
                })
                .unwrap()
            })
            .collect();

        pool.stop(true);

        // stop(true) returns only after the last task finished.
        assert_eq!(counter.load(Ordering::SeqCst), 100);
        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.wait(), Ok(i));
        }
        assert_eq!(pool.metrics().queued_tasks, 0);
    }

    #[test]
    fn test_zero_worker_drain_resolves_queued() {
        // With no workers nothing can run; shutdown still resolves the
        // channel instead of leaving the caller blocked forever.
        let pool = WorkerPool::new(0).unwrap();
        let handle = pool.submit(|_index| 1).unwrap();
        pool.stop(true);
        assert_eq!(handle.wait(), Err(TaskError::Cancelled));
    }

    #[test]
    fn test_stop_is_idempotent() {
        let pool = WorkerPool::new(2).unwrap();
        pool.stop(true);
        pool.stop(true);
        pool.stop(false);
        assert_eq!(pool.size(), 0);

        let pool = WorkerPool::new(2).unwrap();
        pool.stop(false);
        pool.stop(false);
        pool.stop(true);
        assert_eq!(pool.size(), 0);
    }

    #[test]
    fn test_operations_after_stop() {
        let pool = WorkerPool::new(2).unwrap();
        pool.stop(true);

        match pool.submit(|_index| ()) {
            Err(PoolError::ShuttingDown) => {}
            _ => panic!("submit after stop must fail fast"),
        }

        // Resize after stop is a silent no-op.
        pool.resize(8).unwrap();
        assert_eq!(pool.size(), 0);
    }

    #[tokio::test]
    async fn test_async_handle() {
        let pool = WorkerPool::new(2).unwrap();

        let handle = pool.submit(|_index| 7).unwrap();
        assert_eq!(handle.await, Ok(7));

        let slow = pool
            .submit(|_index| {
                thread::sleep(Duration::from_millis(200));
                1
            })
            .unwrap();
        assert_eq!(
            slow.await_timeout(Duration::from_millis(10)).await,
            Err(TaskError::Timeout)
        );
    }
}
