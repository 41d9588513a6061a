//! Close listener protocol
//!
//! Listeners observe a resource context while it closes. Every hook is
//! optional; errors returned from a hook are recorded on the context (first
//! error wins) and never stop the remaining listeners of that phase.

use super::ResourceContext;
use crate::errors::Result;

/// Observer of the close protocol of one resource context
///
/// Hooks of one phase run in ascending [`priority`](CloseListener::priority)
/// order; equal priorities run in registration order.
pub trait CloseListener {
    /// Before sessions are flushed
    ///
    /// # Errors
    ///
    /// Recorded on the context; flushing is then skipped.
    fn closing(&self, _ctx: &ResourceContext) -> Result<()> {
        Ok(())
    }

    /// After every session flushed successfully, before sessions are closed
    ///
    /// # Errors
    ///
    /// Recorded on the context; the close ends on the failure path.
    fn after_session_flush(&self, _ctx: &ResourceContext) -> Result<()> {
        Ok(())
    }

    /// After sessions are closed, when no error was recorded
    ///
    /// # Errors
    ///
    /// Recorded on the context and returned from `close`.
    fn closed(&self, _ctx: &ResourceContext) -> Result<()> {
        Ok(())
    }

    /// After sessions are closed, when an error was recorded
    ///
    /// # Errors
    ///
    /// Dropped in favour of the error that caused the failure.
    fn close_failure(&self, _ctx: &ResourceContext) -> Result<()> {
        Ok(())
    }

    fn priority(&self) -> i32;

    /// When false, registering a second listener of the same type is a no-op
    fn allow_multiple_per_type(&self) -> bool {
        true
    }
}
