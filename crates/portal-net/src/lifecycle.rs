//! Ownership, cancellation and death reporting for one background task.
//!
//! A [`Lifecycle`] wraps a spawned task that is handed a stop token. The
//! owner can request a stop, observe death without polling, and read the
//! error the task ended with.
//!
//! ## Rules
//! - The death signal fires exactly once, when the task's future completes,
//!   fails or panics.
//! - The terminal error slot is written at most once: by [`Lifecycle::stop`]
//!   with a cause, or by the task returning `Err`, whichever happens first.
//! - A stop without a cause is a clean exit and leaves the slot empty.
//! - Dropping the handle requests a stop.

use std::future::Future;
use std::sync::{Arc, OnceLock};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::LinkError;

/// Handle to a supervised background task.
pub struct Lifecycle {
    stop: CancellationToken,
    dead: CancellationToken,
    terminal: Arc<OnceLock<Arc<LinkError>>>,
    handle: Option<JoinHandle<()>>,
}

impl Lifecycle {
    /// Spawn `task` on the current runtime.
    ///
    /// `task` receives the stop token and should return promptly once it is
    /// cancelled.
    pub fn spawn<F, Fut>(task: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<(), LinkError>> + Send + 'static,
    {
        let stop = CancellationToken::new();
        let dead = CancellationToken::new();
        let terminal = Arc::new(OnceLock::new());

        let fut = task(stop.clone());
        let slot = Arc::clone(&terminal);
        let on_exit = dead.clone().drop_guard();
        let handle = tokio::spawn(async move {
            let _on_exit = on_exit;
            if let Err(e) = fut.await {
                let _ = slot.set(Arc::new(e));
            }
        });

        Self {
            stop,
            dead,
            terminal,
            handle: Some(handle),
        }
    }

    /// Ask the task to stop. `None` is a clean stop; `Some(cause)` is recorded
    /// as the terminal error unless one is already set.
    pub fn stop(&self, cause: Option<LinkError>) {
        if let Some(cause) = cause {
            let _ = self.terminal.set(Arc::new(cause));
        }
        self.stop.cancel();
    }

    /// Whether a stop was requested.
    pub fn is_stopping(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Whether the task has ended.
    pub fn is_dead(&self) -> bool {
        self.dead.is_cancelled()
    }

    /// Wait until the task has ended.
    pub async fn dead(&self) {
        self.dead.cancelled().await;
    }

    /// The error the task ended with, if any.
    pub fn terminal_error(&self) -> Option<Arc<LinkError>> {
        self.terminal.get().cloned()
    }

    /// Wait for the task to finish and return its terminal error.
    pub async fn join(mut self) -> Option<Arc<LinkError>> {
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        self.terminal_error()
    }
}

impl Drop for Lifecycle {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

impl std::fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lifecycle")
            .field("stopping", &self.is_stopping())
            .field("dead", &self.is_dead())
            .field("terminal", &self.terminal.get())
            .finish()
    }
}
