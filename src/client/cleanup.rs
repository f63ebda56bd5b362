//! Scope guard for handles opened on behalf of one call.

use crate::types::SharedHandle;
use tracing::debug;

/// Closes every registered handle exactly once when released or dropped.
///
/// Close failures are logged and swallowed.
#[derive(Debug, Default)]
pub struct CleanupGuard {
    handles: Vec<SharedHandle>,
}

impl CleanupGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handle; registering the same handle twice is a no-op.
    pub fn defer_close(&mut self, handle: SharedHandle) {
        if !self.handles.iter().any(|h| h.ptr_eq(&handle)) {
            self.handles.push(handle);
        }
    }

    /// Take over every handle registered with `other`.
    pub fn absorb(&mut self, mut other: CleanupGuard) {
        for handle in other.handles.drain(..) {
            self.defer_close(handle);
        }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Close all registered handles now.
    pub fn release(&mut self) {
        for handle in self.handles.drain(..) {
            if let Err(e) = handle.close() {
                debug!(error = %e, "ignoring failure while closing upload handle");
            }
        }
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        self.release();
    }
}
