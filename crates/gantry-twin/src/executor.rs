//! Single-writer command execution.
//!
//! ```text
//! Session (any thread/task)            gateway thread
//!   execute(executor, |twin| ..) ──mpsc──► recv ─► command(&mut twin)
//!        │                                             │
//!        └────────────── await ◄──oneshot─────────────┘
//! ```
//!
//! Commands run one at a time, in submission order, on a thread that owns
//! the twin. Callers never touch twin state directly.

use crate::{DigitalTwin, ExecutorError};
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread::{self, JoinHandle};
use tokio::sync::{mpsc, oneshot};

/// A unit of work run against the twin.
pub type TwinCommand = Box<dyn FnOnce(&mut dyn DigitalTwin) + Send + 'static>;

/// Serializes access to the twin.
pub trait TwinExecutor: Send + Sync {
    /// Queues `command`. Fails if the executor no longer accepts work.
    fn submit(&self, command: TwinCommand) -> Result<(), ExecutorError>;
}

/// Runs `f` on `executor` and waits for its result.
///
/// # Errors
///
/// - [`ExecutorError::Stopped`] if the command could not be queued
/// - [`ExecutorError::CommandDropped`] if it never produced a result
///
/// # Example
///
/// ```
/// use gantry_twin::{execute, DigitalTwin, GatewayThread, InMemoryTwin};
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let gateway = GatewayThread::spawn(InMemoryTwin::new()).expect("spawn gateway");
/// let count = execute(&gateway, |twin| twin.providers().len()).await;
/// assert_eq!(count, Ok(0));
/// gateway.shutdown();
/// # });
/// ```
pub async fn execute<E, T, F>(executor: &E, f: F) -> Result<T, ExecutorError>
where
    E: TwinExecutor + ?Sized,
    T: Send + 'static,
    F: FnOnce(&mut dyn DigitalTwin) -> T + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    executor.submit(Box::new(move |twin| {
        // The caller may have stopped waiting.
        let _ = tx.send(f(twin));
    }))?;
    rx.await.map_err(|_| ExecutorError::CommandDropped)
}

/// The gateway thread: owns a twin and runs submitted commands.
///
/// A panicking command is logged and skipped; its caller observes
/// [`ExecutorError::CommandDropped`]. Dropping the handle shuts the
/// thread down after it drains queued commands.
pub struct GatewayThread {
    tx: Mutex<Option<mpsc::UnboundedSender<TwinCommand>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl GatewayThread {
    /// Thread name of the gateway thread.
    pub const THREAD_NAME: &'static str = "gantry-gateway";

    /// Moves `twin` onto a new gateway thread.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread cannot be spawned.
    pub fn spawn<T: DigitalTwin + 'static>(twin: T) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = thread::Builder::new()
            .name(Self::THREAD_NAME.to_string())
            .spawn(move || run_command_loop(Box::new(twin), rx))?;
        tracing::debug!("gateway thread started");
        Ok(Self {
            tx: Mutex::new(Some(tx)),
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Returns `true` until [`shutdown`](Self::shutdown) is called.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.tx.lock().is_some()
    }

    /// Stops accepting commands, then waits for queued ones to finish.
    ///
    /// Called from a command running on the gateway thread itself, this
    /// only closes the queue.
    pub fn shutdown(&self) {
        let closed = self.tx.lock().take().is_some();
        let Some(handle) = self.handle.lock().take() else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            tracing::error!("gateway thread terminated abnormally");
        } else if closed {
            tracing::debug!("gateway thread stopped");
        }
    }
}

impl TwinExecutor for GatewayThread {
    fn submit(&self, command: TwinCommand) -> Result<(), ExecutorError> {
        let guard = self.tx.lock();
        let tx = guard.as_ref().ok_or(ExecutorError::Stopped)?;
        tx.send(command).map_err(|_| ExecutorError::Stopped)
    }
}

impl Drop for GatewayThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for GatewayThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayThread")
            .field("running", &self.is_running())
            .finish()
    }
}

fn run_command_loop(mut twin: Box<dyn DigitalTwin>, mut rx: mpsc::UnboundedReceiver<TwinCommand>) {
    while let Some(command) = rx.blocking_recv() {
        let target = twin.as_mut();
        if catch_unwind(AssertUnwindSafe(move || command(target))).is_err() {
            tracing::error!("twin command panicked; caller will see a dropped command");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryTwin;

    #[tokio::test]
    async fn commands_run_in_submission_order() {
        let gateway = GatewayThread::spawn(InMemoryTwin::new()).expect("spawn gateway");
        let log = std::sync::Arc::new(Mutex::new(Vec::new()));

        for i in 0..10 {
            let log = std::sync::Arc::clone(&log);
            gateway
                .submit(Box::new(move |_| log.lock().push(i)))
                .expect("submit");
        }
        execute(&gateway, |_| ()).await.expect("barrier");

        assert_eq!(*log.lock(), (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn panicking_command_is_dropped_and_thread_survives() {
        let gateway = GatewayThread::spawn(InMemoryTwin::new()).expect("spawn gateway");

        let result = execute(&gateway, |_: &mut dyn DigitalTwin| -> usize { panic!("boom") }).await;
        assert_eq!(result, Err(ExecutorError::CommandDropped));

        let result = execute(&gateway, |twin| twin.providers().len()).await;
        assert_eq!(result, Ok(0));
    }

    #[tokio::test]
    async fn submit_after_shutdown_fails() {
        let gateway = GatewayThread::spawn(InMemoryTwin::new()).expect("spawn gateway");
        assert!(gateway.is_running());
        gateway.shutdown();
        assert!(!gateway.is_running());

        let result = execute(&gateway, |_| ()).await;
        assert_eq!(result, Err(ExecutorError::Stopped));
    }

    #[test]
    fn shutdown_is_idempotent() {
        let gateway = GatewayThread::spawn(InMemoryTwin::new()).expect("spawn gateway");
        gateway.shutdown();
        gateway.shutdown();
    }
}
