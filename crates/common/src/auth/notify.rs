//! Broadcast-once completion cell
//!
//! Many callers can wait on one authorization flow. Each registers a waiter;
//! the first `resolve` releases all of them with the same outcome, in
//! registration order. Waiters attached after resolution complete
//! immediately with the stored outcome.

use parking_lot::Mutex;
use tokio::sync::oneshot;

use super::error::AuthError;

/// Result delivered to every waiter of an authorization flow
pub type AuthOutcome = Result<String, AuthError>;

enum CellState {
    Pending(Vec<oneshot::Sender<AuthOutcome>>),
    Resolved(AuthOutcome),
}

/// One-shot, multi-waiter completion primitive
pub struct CompletionCell {
    state: Mutex<CellState>,
}

impl CompletionCell {
    #[must_use]
    pub fn new() -> Self {
        Self { state: Mutex::new(CellState::Pending(Vec::new())) }
    }

    /// Register a waiter.
    pub fn subscribe(&self) -> CompletionWaiter {
        let (tx, rx) = oneshot::channel();
        let mut state = self.state.lock();
        match &mut *state {
            CellState::Pending(waiters) => waiters.push(tx),
            CellState::Resolved(outcome) => {
                let _ = tx.send(outcome.clone());
            }
        }
        CompletionWaiter { rx }
    }

    /// Resolve the cell. Returns `false` if it was already resolved, in which
    /// case `outcome` is discarded.
    pub fn resolve(&self, outcome: AuthOutcome) -> bool {
        self.resolve_with(outcome, || {})
    }

    /// Resolve the cell, running `commit` first if this call wins. `commit`
    /// runs under the cell lock, so a competing resolution either precedes
    /// it and skips it or follows the commit.
    pub fn resolve_with(&self, outcome: AuthOutcome, commit: impl FnOnce()) -> bool {
        let waiters = {
            let mut state = self.state.lock();
            match &mut *state {
                CellState::Resolved(_) => return false,
                CellState::Pending(waiters) => {
                    commit();
                    let waiters = std::mem::take(waiters);
                    *state = CellState::Resolved(outcome.clone());
                    waiters
                }
            }
        };

        for waiter in waiters {
            // A waiter that gave up has dropped its receiver.
            let _ = waiter.send(outcome.clone());
        }
        true
    }

    #[cfg(test)]
    fn is_resolved(&self) -> bool {
        matches!(&*self.state.lock(), CellState::Resolved(_))
    }

    /// Number of waiters still blocked on this cell.
    #[cfg(test)]
    fn waiter_count(&self) -> usize {
        match &*self.state.lock() {
            CellState::Pending(waiters) => waiters.len(),
            CellState::Resolved(_) => 0,
        }
    }
}

impl Default for CompletionCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle for one registered waiter
pub struct CompletionWaiter {
    rx: oneshot::Receiver<AuthOutcome>,
}

impl CompletionWaiter {
    /// Wait for the cell to resolve.
    ///
    /// A cell dropped without resolution fails the waiter instead of leaving
    /// it hanging.
    pub async fn wait(self) -> AuthOutcome {
        self.rx.await.unwrap_or_else(|_| {
            Err(AuthError::AuthUnavailable("authorization flow was abandoned".to_string()))
        })
    }
}
