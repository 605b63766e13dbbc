//! Two-phase optimistic update.
//!
//! Applies a local value immediately, confirms it remotely, and rolls
//! back on failure or adopts the server's value on mismatch. Replaces
//! ad hoc apply-then-manually-revert branching at call sites.

/// An optimistically updated value.
#[derive(Debug, Clone)]
pub struct Optimistic<T> {
    current: T,
    snapshot: Option<T>,
}

impl<T: Clone + PartialEq> Optimistic<T> {
    /// Wrap a confirmed value.
    pub fn new(value: T) -> Self {
        Self {
            current: value,
            snapshot: None,
        }
    }

    /// The currently visible value.
    pub fn value(&self) -> &T {
        &self.current
    }

    /// Whether an unconfirmed local update is pending.
    pub fn is_pending(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Apply `next` locally, remembering the confirmed value for
    /// rollback. A second apply before confirmation keeps the original
    /// snapshot.
    pub fn apply(&mut self, next: T) {
        if self.snapshot.is_none() {
            self.snapshot = Some(self.current.clone());
        }
        self.current = next;
    }

    /// Confirm the pending update with the server.
    ///
    /// On success the server's value wins (covering mismatches); on
    /// failure the value rolls back to the pre-apply snapshot and the
    /// error is returned.
    pub async fn confirm<F, Fut, E>(&mut self, confirm: F) -> Result<&T, E>
    where
        F: FnOnce(T) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match confirm(self.current.clone()).await {
            Ok(remote) => {
                self.current = remote;
                self.snapshot = None;
                Ok(&self.current)
            }
            Err(err) => {
                if let Some(previous) = self.snapshot.take() {
                    self.current = previous;
                }
                Err(err)
            }
        }
    }
}
