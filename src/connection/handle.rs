//! Handles for requests running on their own task.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::runtime::Handle;
use tokio::sync::{oneshot, Notify};

use crate::error::{ResourceError, ResourceResult};

/// Completion state of a spawned request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HandleState {
    Pending = 0,
    Completed = 1,
    Cancelled = 2,
}

impl From<u8> for HandleState {
    fn from(v: u8) -> Self {
        match v {
            1 => HandleState::Completed,
            2 => HandleState::Cancelled,
            _ => HandleState::Pending,
        }
    }
}

fn cancelled() -> ResourceError {
    ResourceError::ServiceUnavailable("The request was cancelled".into())
}

fn panicked(payload: Box<dyn Any + Send>) -> ResourceError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    tracing::error!(panic = %message, "Request task panicked");
    ResourceError::InternalServerError(format!("The request failed: {message}"))
}

/// Control shared between a handle and its task.
#[derive(Clone)]
struct Control {
    state: Arc<AtomicU8>,
    signal: Arc<Notify>,
}

impl Control {
    fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(HandleState::Pending as u8)),
            signal: Arc::new(Notify::new()),
        }
    }

    /// Moves out of `Pending`. Only the first transition succeeds.
    fn settle(&self, to: HandleState) -> bool {
        self.state
            .compare_exchange(
                HandleState::Pending as u8,
                to as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    fn cancel(&self) -> bool {
        let won = self.settle(HandleState::Cancelled);
        if won {
            self.signal.notify_one();
            tracing::debug!("Request cancelled");
        }
        won
    }

    fn state(&self) -> HandleState {
        self.state.load(Ordering::Acquire).into()
    }
}

/// A request running on a Tokio task.
///
/// The request settles exactly once: either it completes, or a `cancel`
/// wins the race and the outcome becomes ServiceUnavailable. Cancellation
/// is cooperative; the request future is dropped at its next await point.
pub struct RequestHandle<T> {
    control: Control,
    receiver: oneshot::Receiver<ResourceResult<T>>,
    runtime: Handle,
    wait_timeout: Option<Duration>,
}

impl<T: Send + 'static> RequestHandle<T> {
    /// Spawns `future` on the current runtime.
    ///
    /// `on_settle` sees the final outcome, cancellation included, before
    /// it is handed to the waiter. Must be called within a Tokio runtime.
    pub(crate) fn spawn<F, S>(future: F, on_settle: S, wait_timeout: Option<Duration>) -> Self
    where
        F: Future<Output = ResourceResult<T>> + Send + 'static,
        S: FnOnce(&ResourceResult<T>) + Send + 'static,
    {
        let control = Control::new();
        let (tx, receiver) = oneshot::channel();
        let task_control = control.clone();
        let runtime = Handle::current();
        runtime.spawn(async move {
            let mut result = tokio::select! {
                biased;
                _ = task_control.signal.notified() => Err(cancelled()),
                result = AssertUnwindSafe(future).catch_unwind() => {
                    result.unwrap_or_else(|payload| Err(panicked(payload)))
                }
            };
            if !task_control.settle(HandleState::Completed) {
                result = Err(cancelled());
            }
            on_settle(&result);
            let _ = tx.send(result);
        });
        Self {
            control,
            receiver,
            runtime,
            wait_timeout,
        }
    }

    /// Returns `true` only if the request had not completed yet.
    pub fn cancel(&self) -> bool {
        self.control.cancel()
    }

    pub fn is_done(&self) -> bool {
        self.control.state() != HandleState::Pending
    }

    pub fn is_cancelled(&self) -> bool {
        self.control.state() == HandleState::Cancelled
    }

    pub fn state(&self) -> HandleState {
        self.control.state()
    }

    /// Outcome of the request.
    pub async fn get(self) -> ResourceResult<T> {
        match self.receiver.await {
            Ok(result) => result,
            Err(_) => Err(ResourceError::ServiceUnavailable(
                "The request ended without a result".into(),
            )),
        }
    }

    /// Blocks the calling thread until the request settles, bounded by the
    /// connection's wait timeout if one is configured.
    ///
    /// For synchronous callers only: must not be called from async code,
    /// and the runtime must have worker threads to run the request.
    pub fn wait(self) -> ResourceResult<T> {
        match self.wait_timeout {
            Some(timeout) => self.wait_timeout(timeout),
            None => {
                let runtime = self.runtime.clone();
                runtime.block_on(self.get())
            }
        }
    }

    /// Like [`wait`](Self::wait) with an explicit bound. The request is
    /// cancelled when the bound elapses.
    pub fn wait_timeout(self, timeout: Duration) -> ResourceResult<T> {
        let runtime = self.runtime.clone();
        let control = self.control.clone();
        match runtime.block_on(tokio::time::timeout(timeout, self.get())) {
            Ok(result) => result,
            Err(_) => {
                control.cancel();
                Err(ResourceError::ServiceUnavailable(format!(
                    "Timed out after {}ms waiting for the request to complete",
                    timeout.as_millis()
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn<F>(future: F) -> RequestHandle<u32>
    where
        F: Future<Output = ResourceResult<u32>> + Send + 'static,
    {
        RequestHandle::spawn(future, |_| {}, None)
    }

    #[tokio::test]
    async fn test_completed_request_cannot_be_cancelled() {
        let handle = spawn(async { Ok(7) });
        tokio::task::yield_now().await;
        while !handle.is_done() {
            tokio::task::yield_now().await;
        }
        assert!(!handle.cancel());
        assert_eq!(handle.state(), HandleState::Completed);
        assert_eq!(handle.get().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_panicking_request_settles_as_server_error() {
        let seen = Arc::new(std::sync::Mutex::new(None));
        let hook = seen.clone();
        let handle = RequestHandle::spawn(
            async { panic!("boom") },
            move |outcome: &ResourceResult<u32>| {
                *hook.lock().unwrap() = Some(outcome.clone());
            },
            None,
        );
        let err = handle.get().await.unwrap_err();
        assert_eq!(err.code(), 500);
        assert!(err.to_string().contains("boom"));
        assert_eq!(*seen.lock().unwrap(), Some(Err(err)));
    }

    #[tokio::test]
    async fn test_cancel_wins_over_pending_request() {
        let handle = spawn(std::future::pending());
        assert!(handle.cancel());
        assert!(!handle.cancel());
        assert!(handle.is_cancelled());
        let err = handle.get().await.unwrap_err();
        assert_eq!(err, ResourceError::ServiceUnavailable("The request was cancelled".into()));
    }

    #[tokio::test]
    async fn test_settle_hook_sees_cancellation() {
        let (tx, rx) = oneshot::channel();
        let handle = RequestHandle::<u32>::spawn(
            std::future::pending(),
            move |result| {
                let _ = tx.send(result.clone());
            },
            None,
        );
        handle.cancel();
        assert_eq!(rx.await.unwrap().unwrap_err().code(), 503);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_blocking_wait() {
        let handle = spawn(async { Ok(3) });
        let result = tokio::task::spawn_blocking(move || handle.wait()).await.unwrap();
        assert_eq!(result.unwrap(), 3);

        let slow = spawn(std::future::pending());
        let result = tokio::task::spawn_blocking(move || slow.wait_timeout(Duration::from_millis(20)))
            .await
            .unwrap();
        assert_eq!(result.unwrap_err().code(), 503);
    }
}
