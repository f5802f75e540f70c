//! Runtime handle for the player's background work.
//!
//! The controller launches metadata lookups and the progress poller through a
//! [`TokioSpawner`] instead of the ambient `tokio::spawn`, so the runtime that
//! owns those tasks is chosen once at bootstrap.

use std::future::Future;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Spawns player tasks onto a fixed Tokio runtime.
///
/// Async tasks are detached; long-running ones watch a cancellation token.
#[derive(Clone)]
pub struct TokioSpawner {
    handle: Handle,
}

impl TokioSpawner {
    /// Binds the spawner to `handle`.
    #[must_use]
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Binds the spawner to the runtime it is called from.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime context.
    #[must_use]
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    /// Runs `future` in the background.
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handle.spawn(future);
    }

    /// Runs blocking work (file I/O, tag parsing) on the runtime's blocking
    /// pool.
    pub fn spawn_blocking<F, R>(&self, work: F) -> JoinHandle<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.handle.spawn_blocking(work)
    }
}
