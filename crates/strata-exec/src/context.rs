//! Client context shared across the executors of one query.
//!
//! The context carries two pieces of cross-thread state: the cooperative
//! interrupt flag, checked at every operator-span entry, and the
//! executor-global error slot. The first failure recorded wins; later
//! failures on other workers are replaced by it when they surface.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::ExecError;

/// Shared per-query execution context.
#[derive(Clone, Default)]
pub struct ClientContext {
    interrupted: Arc<AtomicBool>,
    error: Arc<Mutex<Option<ExecError>>>,
}

impl ClientContext {
    /// Creates a fresh context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cooperative cancellation of the query.
    pub fn interrupt(&self) {
        self.interrupted.store(true, Ordering::Release);
    }

    /// Returns true if cancellation has been requested.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::Acquire)
    }

    /// Records a failure. Only the first recorded error is kept.
    pub fn record_error(&self, error: ExecError) {
        let mut slot = self.error.lock();
        if slot.is_none() {
            *slot = Some(error);
        }
    }

    /// Returns true if any worker has recorded a failure.
    #[must_use]
    pub fn has_error(&self) -> bool {
        self.error.lock().is_some()
    }

    /// Takes the stored failure, if any.
    #[must_use]
    pub fn take_error(&self) -> Option<ExecError> {
        self.error.lock().take()
    }
}

impl std::fmt::Debug for ClientContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientContext")
            .field("interrupted", &self.is_interrupted())
            .field("has_error", &self.has_error())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupt_flag() {
        let ctx = ClientContext::new();
        assert!(!ctx.is_interrupted());
        ctx.interrupt();
        assert!(ctx.is_interrupted());

        // Clones share the flag.
        let clone = ctx.clone();
        assert!(clone.is_interrupted());
    }

    #[test]
    fn test_first_error_wins() {
        let ctx = ClientContext::new();
        ctx.record_error(ExecError::internal("first"));
        ctx.record_error(ExecError::internal("second"));

        let stored = ctx.take_error().unwrap();
        assert_eq!(stored.to_string(), "internal executor error: first");
        assert!(!ctx.has_error());
    }
}
