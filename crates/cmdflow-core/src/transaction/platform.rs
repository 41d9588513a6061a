use crate::config::Propagation;
use crate::errors::Result;

/// Thread-bound transaction manager of the hosting platform
///
/// Implementations track the active transaction per thread; the manager
/// itself is shared across threads.
pub trait PlatformTransactionManager: Send + Sync {
    /// Whether a platform transaction is active on the calling thread
    fn is_transaction_active(&self) -> bool;

    /// # Errors
    ///
    /// Returned to the caller before the command runs.
    fn begin(&self, propagation: Propagation) -> Result<()>;

    /// # Errors
    ///
    /// Returned to the caller in place of the command's value.
    fn commit(&self) -> Result<()>;

    /// # Errors
    ///
    /// Logged; the command's own error is what the caller sees.
    fn rollback(&self) -> Result<()>;
}
