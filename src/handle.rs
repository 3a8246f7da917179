use super::{
    errors::TaskError,
    result::TaskResult,
};
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};
use tokio::{
    sync::oneshot,
    time::Duration,
};

/// How a queued task is consumed: executed with the index of the worker that
/// picked it up, or resolved as cancelled without ever running.
pub enum Invocation {
    Run(usize),
    Cancel,
}

/// Type-erased single-invocation task. Bound arguments are captured by the
/// closure before boxing; the worker supplies only its index.
pub type Task = Box<dyn FnOnce(Invocation) + Send + 'static>;

/// Handle to a submitted task's eventual result.
///
/// Retrieval blocks the caller, never a worker. The handle also implements
/// [`Future`] so async callers can `.await` it directly.
pub struct TaskHandle<T> {
    receiver: oneshot::Receiver<TaskResult<T>>,
}

impl<T> TaskHandle<T> {
    pub(crate) fn new(receiver: oneshot::Receiver<TaskResult<T>>) -> Self {
        Self { receiver }
    }

    /// Blocks until the task completes, fails, or is cancelled.
    ///
    /// Must not be called from inside an async runtime; use `.await` there.
    pub fn wait(self) -> TaskResult<T> {
        self.receiver
            .blocking_recv()
            .unwrap_or(Err(TaskError::ChannelClosed))
    }

    /// Returns the result if it is already available, without blocking.
    pub fn try_wait(&mut self) -> Option<TaskResult<T>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(TaskError::ChannelClosed)),
        }
    }

    pub async fn await_timeout(self, timeout: Duration) -> TaskResult<T> {
        match tokio::time::timeout(timeout, self.receiver).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(TaskError::ChannelClosed),
            Err(_) => Err(TaskError::Timeout),
        }
    }
}

impl<T> Future for TaskHandle<T> {
    type Output = TaskResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.receiver).poll(cx) {
            Poll::Ready(res) => Poll::Ready(res.unwrap_or(Err(TaskError::ChannelClosed))),
            Poll::Pending => Poll::Pending,
        }
    }
}
