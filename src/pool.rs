use super::{
    errors::{PoolError, TaskError},
    handle::{Invocation, Task, TaskHandle},
    model::PoolMetrics,
    queue::SynchronizedQueue,
    result::TaskResult,
};
use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU8, AtomicUsize, Ordering},
        Arc, Condvar, Mutex,
    },
    thread,
    time::{Duration, Instant},
};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Pool configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub initial_workers: usize,
    pub thread_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            initial_workers: num_cpus::get(),
            thread_name: "flex-pool-worker".into(),
        }
    }
}

impl Config {
    pub fn with_workers(initial_workers: usize) -> Self {
        Self {
            initial_workers,
            ..Default::default()
        }
    }
}

/// One owned worker: its join handle and the flag that retires it.
///
/// `thread` goes `None` when the worker is detached by a shrink; the token is
/// never shared between two workers.
struct WorkerSlot {
    thread: Option<thread::JoinHandle<()>>,
    token: CancellationToken,
}

// Pool lifecycle. Exactly one shutdown mode ever claims the pool, via a
// single compare-exchange away from RUNNING.
const RUNNING: u8 = 0;
const DRAINING: u8 = 1;
const ABANDONING: u8 = 2;

/// State shared between the pool handle and every worker thread.
struct Shared {
    queue: SynchronizedQueue<Task>,
    // Pairs with `task_ready`; held only around notify and the wait predicate.
    sync: Mutex<()>,
    task_ready: Condvar,
    idle_workers: AtomicUsize,
    state: AtomicU8,
    // Count of worker threads whose loop has not yet returned, including
    // detached ones. Lets callers observe retirement without polling.
    live_workers: Mutex<usize>,
    worker_exited: Condvar,
    total_submitted: AtomicUsize,
    completed_tasks: AtomicUsize,
    failed_tasks: AtomicUsize,
    cancelled_tasks: AtomicUsize,
}

impl Shared {
    fn is_stopping(&self) -> bool {
        self.state.load(Ordering::SeqCst) != RUNNING
    }

    /// Pops every queued task and resolves its channel as cancelled.
    fn clear_queue(&self) {
        while let Some(task) = self.queue.pop() {
            task(Invocation::Cancel);
        }
    }

    /// Per-worker loop: fetch, execute, wait.
    ///
    /// The cancellation flag is checked only after finishing a task or on wake
    /// from the condvar, so a task once started always completes and its
    /// result channel always resolves.
    fn worker_loop(&self, index: usize, flag: CancellationToken) {
        trace!(worker = index, "worker started");
        let mut task = self.queue.pop();
        loop {
            while let Some(job) = task.take() {
                job(Invocation::Run(index));
                if flag.is_cancelled() {
                    trace!(worker = index, "worker retired after task");
                    return;
                }
                task = self.queue.pop();
            }

            let guard = self.sync.lock().unwrap();
            self.idle_workers.fetch_add(1, Ordering::SeqCst);
            let guard = self
                .task_ready
                .wait_while(guard, |_| {
                    task = self.queue.pop();
                    task.is_none()
                        && self.state.load(Ordering::SeqCst) == RUNNING
                        && !flag.is_cancelled()
                })
                .unwrap();
            self.idle_workers.fetch_sub(1, Ordering::SeqCst);
            drop(guard);

            if task.is_none() {
                // Woken by drain or retirement with nothing left to run.
                trace!(worker = index, "worker terminating");
                return;
            }
        }
    }
}

/// Decrements the live-thread ledger on every exit path, panics included.
struct ExitGuard {
    shared: Arc<Shared>,
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        let mut live = self.shared.live_workers.lock().unwrap();
        *live -= 1;
        self.shared.worker_exited.notify_all();
    }
}

/// Dynamically resizable worker pool over OS threads.
///
/// Submitted callables run on background workers; each submission returns a
/// [`TaskHandle`] resolving to the callable's value, its captured panic, or a
/// cancelled outcome if an abandon-mode shutdown discarded it first.
pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: Mutex<Vec<WorkerSlot>>,
    config: Config,
}

impl WorkerPool {
    pub fn new(initial_workers: usize) -> Result<Self, PoolError> {
        Self::with_config(Config::with_workers(initial_workers))
    }

    pub fn with_config(config: Config) -> Result<Self, PoolError> {
        let shared = Arc::new(Shared {
            queue: SynchronizedQueue::new(),
            sync: Mutex::new(()),
            task_ready: Condvar::new(),
            idle_workers: AtomicUsize::new(0),
            state: AtomicU8::new(RUNNING),
            live_workers: Mutex::new(0),
            worker_exited: Condvar::new(),
            total_submitted: AtomicUsize::new(0),
            completed_tasks: AtomicUsize::new(0),
            failed_tasks: AtomicUsize::new(0),
            cancelled_tasks: AtomicUsize::new(0),
        });

        let pool = Self {
            shared,
            workers: Mutex::new(Vec::new()),
            config,
        };

        {
            let mut workers = pool.workers.lock().unwrap();
            for _ in 0..pool.config.initial_workers {
                pool.spawn_worker(&mut workers)?;
            }
        }

        Ok(pool)
    }

    /// Submits a callable for execution on some worker.
    ///
    /// The callable receives the index of the worker that runs it; extra
    /// arguments are bound by closure capture before submission. Never blocks
    /// on worker availability: with no idle worker the task waits in the
    /// queue. Fails fast once shutdown has begun.
    pub fn submit<F, T>(&self, f: F) -> Result<TaskHandle<T>, PoolError>
    where
        F: FnOnce(usize) -> T + Send + 'static,
        T: Send + 'static,
    {
        if self.shared.is_stopping() {
            return Err(PoolError::ShuttingDown);
        }

        let (tx, rx) = oneshot::channel::<TaskResult<T>>();
        let shared = Arc::clone(&self.shared);
        let task: Task = Box::new(move |call| {
            let result = match call {
                Invocation::Run(index) => {
                    match panic::catch_unwind(AssertUnwindSafe(|| f(index))) {
                        Ok(value) => {
                            shared.completed_tasks.fetch_add(1, Ordering::Relaxed);
                            Ok(value)
                        }
                        Err(payload) => {
                            shared.failed_tasks.fetch_add(1, Ordering::Relaxed);
                            Err(TaskError::Panic(panic_message(payload.as_ref())))
                        }
                    }
                }
                Invocation::Cancel => {
                    shared.cancelled_tasks.fetch_add(1, Ordering::Relaxed);
                    Err(TaskError::Cancelled)
                }
            };
            // Receiver may have been dropped; the outcome is then discarded.
            let _ = tx.send(result);
        });

        {
            // Push under the workers lock, which `stop` holds while claiming
            // shutdown. Either the task lands before `stop` takes the pool
            // (and is drained or cancelled like any other queued task), or
            // shutdown already won and we fail fast. Without this a push
            // racing past a completed `stop` would strand the task in the
            // queue with its handle blocked forever.
            let _workers = self.workers.lock().unwrap();
            if self.shared.is_stopping() {
                return Err(PoolError::ShuttingDown);
            }
            self.shared.total_submitted.fetch_add(1, Ordering::Relaxed);
            self.shared.queue.push(task);
        }
        {
            let _guard = self.shared.sync.lock().unwrap();
            self.shared.task_ready.notify_one();
        }

        Ok(TaskHandle::new(rx))
    }

    /// Grows or shrinks the worker set to `target` workers.
    ///
    /// No-op once shutdown has begun. Growing spawns fresh workers with unset
    /// flags; a thread-creation failure is surfaced and already-spawned
    /// workers are kept. Shrinking retires workers from the tail: each gets
    /// its flag set and its thread detached, so a retired worker may still be
    /// finishing an in-flight task when this returns. Use
    /// [`wait_for_live`](Self::wait_for_live) to observe actual termination.
    pub fn resize(&self, target: usize) -> Result<(), PoolError> {
        let mut workers = self.workers.lock().unwrap();
        // Checked under the lock: a concurrent `stop` claims shutdown while
        // holding it, so workers can never be spawned into a stopped pool.
        if self.shared.is_stopping() {
            return Ok(());
        }

        let current = workers.len();
        if target >= current {
            debug!(from = current, to = target, "growing pool");
            for _ in current..target {
                self.spawn_worker(&mut workers)?;
            }
        } else {
            debug!(from = current, to = target, "shrinking pool");
            for slot in workers.drain(target..).rev() {
                slot.token.cancel();
                // Dropping the join handle detaches the thread; its ExitGuard
                // still reports the exit through the ledger.
                drop(slot.thread);
            }
            let _guard = self.shared.sync.lock().unwrap();
            self.shared.task_ready.notify_all();
        }
        Ok(())
    }

    /// Shuts the pool down.
    ///
    /// With `drain` set, every task already queued is executed before the
    /// workers terminate and this call returns. Without it, queued tasks that
    /// have not started are resolved as cancelled and discarded; tasks already
    /// executing still run to completion. The two modes are mutually
    /// exclusive and each is idempotent: whichever is requested first wins,
    /// and any later call in either mode is a no-op.
    pub fn stop(&self, drain: bool) {
        let target = if drain { DRAINING } else { ABANDONING };
        let mut retired = {
            // Claim shutdown and take the workers in one critical section,
            // serialized against `submit`'s push and `resize`'s spawn. The
            // compare-exchange makes the winning mode unambiguous even when
            // both modes are requested concurrently.
            let mut workers = self.workers.lock().unwrap();
            if self
                .shared
                .state
                .compare_exchange(RUNNING, target, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                return;
            }
            debug!(drain, "stopping pool");
            std::mem::take(&mut *workers)
        };

        if !drain {
            for slot in &retired {
                slot.token.cancel();
            }
            self.shared.clear_queue();
        }

        {
            let _guard = self.shared.sync.lock().unwrap();
            self.shared.task_ready.notify_all();
        }

        for slot in &mut retired {
            if let Some(thread) = slot.thread.take() {
                // A worker loop never panics on its own; a failed join means a
                // broken internal contract.
                thread.join().expect("worker thread panicked");
            }
        }

        // Resolves whatever the workers never consumed, e.g. tasks queued
        // against a zero-worker pool.
        self.shared.clear_queue();
        debug!("pool stopped");
    }

    /// Number of workers the pool currently owns.
    pub fn size(&self) -> usize {
        self.workers.lock().unwrap().len()
    }

    /// Workers currently blocked waiting for a task.
    pub fn idle_count(&self) -> usize {
        self.shared.idle_workers.load(Ordering::SeqCst)
    }

    /// Worker threads whose loop has not yet returned, detached ones included.
    pub fn live_workers(&self) -> usize {
        *self.shared.live_workers.lock().unwrap()
    }

    /// Blocks until at most `target` worker threads remain live, or `timeout`
    /// elapses. Returns whether the target was reached.
    pub fn wait_for_live(&self, target: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut live = self.shared.live_workers.lock().unwrap();
        while *live > target {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .shared
                .worker_exited
                .wait_timeout(live, deadline - now)
                .unwrap();
            live = guard;
        }
        true
    }

    pub fn metrics(&self) -> PoolMetrics {
        PoolMetrics {
            workers: self.size(),
            idle_workers: self.shared.idle_workers.load(Ordering::SeqCst),
            queued_tasks: self.shared.queue.len(),
            total_submitted: self.shared.total_submitted.load(Ordering::Relaxed),
            completed_tasks: self.shared.completed_tasks.load(Ordering::Relaxed),
            failed_tasks: self.shared.failed_tasks.load(Ordering::Relaxed),
            cancelled_tasks: self.shared.cancelled_tasks.load(Ordering::Relaxed),
        }
    }

    /// Spawns one worker at the next index. The ledger is bumped before the
    /// thread starts so `wait_for_live` never observes a dip during growth.
    fn spawn_worker(&self, workers: &mut Vec<WorkerSlot>) -> Result<(), PoolError> {
        let index = workers.len();
        let token = CancellationToken::new();
        let flag = token.clone();
        let shared = Arc::clone(&self.shared);

        *self.shared.live_workers.lock().unwrap() += 1;

        let spawned = thread::Builder::new()
            .name(format!("{}-{}", self.config.thread_name, index))
            .spawn(move || {
                let _guard = ExitGuard {
                    shared: Arc::clone(&shared),
                };
                shared.worker_loop(index, flag);
            });

        match spawned {
            Ok(thread) => {
                workers.push(WorkerSlot {
                    thread: Some(thread),
                    token,
                });
                Ok(())
            }
            Err(e) => {
                *self.shared.live_workers.lock().unwrap() -= 1;
                Err(PoolError::Spawn(e))
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop(true);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
