//! Pending-operation handle: an observable state cell plus the background
//! watcher task driving it to a terminal state.

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Tracks an operation that runs outside the caller's call stack — a queued
/// job being polled, a popup handshake awaiting its callback. The caller
/// observes state transitions through [`subscribe`](Self::subscribe) or
/// waits for a terminal state with [`wait_until`](Self::wait_until).
pub struct OperationHandle<S> {
    rx: watch::Receiver<S>,
    task: JoinHandle<()>,
}

impl<S: Clone> OperationHandle<S> {
    pub(crate) fn new(rx: watch::Receiver<S>, task: JoinHandle<()>) -> Self {
        Self { rx, task }
    }

    /// Latest observed state.
    pub fn current(&self) -> S {
        self.rx.borrow().clone()
    }

    /// Independent subscription for UI updates.
    pub fn subscribe(&self) -> watch::Receiver<S> {
        self.rx.clone()
    }

    /// Wait until the observed state satisfies `predicate` and return it.
    /// If the watcher ends first, the last published state is returned.
    pub async fn wait_until<F>(&mut self, predicate: F) -> S
    where
        F: FnMut(&S) -> bool,
    {
        if let Ok(state) = self.rx.wait_for(predicate).await {
            return state.clone();
        }
        self.rx.borrow().clone()
    }

    /// Abort the watcher task. Resources it owns (subscriptions, tickers)
    /// are released by the abort; the state cell keeps its last value.
    pub fn cancel(&self) {
        self.task.abort();
    }

    /// Whether the watcher task has ended (terminal state reached,
    /// cancelled, or panicked).
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
