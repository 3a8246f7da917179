//! Dynamically resizable worker pool over OS threads
//!
//! # Features
//! - Runtime growth and shrinkage of the worker set
//! - Per-task result handles, blocking or awaitable
//! - Drain and abandon shutdown modes
//! - Panic capture at the worker boundary
//! - Pool metrics snapshots

pub mod errors;
pub mod handle;
pub mod model;
pub mod pool;
pub mod queue;
pub mod result;

pub use errors::{PoolError, TaskError};
pub use handle::TaskHandle;
pub use pool::{Config, WorkerPool};
pub use result::TaskResult;
