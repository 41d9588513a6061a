//! Transaction boundaries
//!
//! A [`TransactionContext`] is the transactional boundary opened for one
//! root resource context. It is committed after the context's sessions have
//! been flushed and rolled back when the context closes with an error; the
//! [`TransactionCloseListener`] wires those two moments together.

pub mod close_listener;
pub mod platform;

pub use close_listener::{TransactionCloseListener, TRANSACTION_CLOSE_LISTENER_PRIORITY};
pub use platform::PlatformTransactionManager;

use crate::context;
use crate::errors::{ExError, Result};
use crate::resource_context::ResourceContext;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Moment in a transaction's life a listener can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionState {
    Committing,
    Committed,
    RollingBack,
    RolledBack,
}

impl TransactionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionState::Committing => "committing",
            TransactionState::Committed => "committed",
            TransactionState::RollingBack => "rolling_back",
            TransactionState::RolledBack => "rolled_back",
        }
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Callback fired when a transaction reaches a [`TransactionState`]
pub trait TransactionListener {
    /// # Errors
    ///
    /// Propagated by the transaction context to the close listener that
    /// drove the commit or rollback.
    fn execute(&self, ctx: &ResourceContext) -> Result<()>;
}

impl<F> TransactionListener for F
where
    F: Fn(&ResourceContext) -> Result<()>,
{
    fn execute(&self, ctx: &ResourceContext) -> Result<()> {
        self(ctx)
    }
}

/// One transactional boundary, owned by the resource context that opened it
pub trait TransactionContext {
    /// # Errors
    ///
    /// Recorded on the owning resource context; the close protocol then
    /// finishes on its failure path.
    fn commit(&self) -> Result<()>;

    /// # Errors
    ///
    /// Recorded on the owning resource context.
    fn rollback(&self) -> Result<()>;

    fn add_transaction_listener(&self, state: TransactionState, listener: Rc<dyn TransactionListener>);
}

/// Opens transaction contexts for root resource contexts
pub trait TransactionContextFactory: Send + Sync {
    /// # Errors
    ///
    /// Returned from the interceptor before the command runs.
    fn open_transaction_context(&self, ctx: &ResourceContext) -> Result<Rc<dyn TransactionContext>>;
}

/// Listener registry for [`TransactionContext`] implementations
///
/// ```
/// use cmdflow_core::transaction::{TransactionListeners, TransactionState};
///
/// let listeners = TransactionListeners::new();
/// listeners.add(
///     TransactionState::Committed,
///     |_ctx: &cmdflow_core::ResourceContext| -> cmdflow_core::Result<()> { Ok(()) },
/// );
/// assert_eq!(listeners.len(TransactionState::Committed), 1);
/// assert_eq!(listeners.len(TransactionState::RolledBack), 0);
/// ```
#[derive(Default)]
pub struct TransactionListeners {
    listeners: RefCell<Vec<(TransactionState, Rc<dyn TransactionListener>)>>,
}

impl TransactionListeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<L: TransactionListener + 'static>(&self, state: TransactionState, listener: L) {
        self.add_rc(state, Rc::new(listener));
    }

    pub fn add_rc(&self, state: TransactionState, listener: Rc<dyn TransactionListener>) {
        self.listeners.borrow_mut().push((state, listener));
    }

    pub fn len(&self, state: TransactionState) -> usize {
        self.listeners
            .borrow()
            .iter()
            .filter(|(s, _)| *s == state)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.borrow().is_empty()
    }

    /// Run the listeners registered for `state` in registration order
    /// against the current resource context
    ///
    /// # Errors
    ///
    /// `IllegalState` when no resource context is active on this thread, or
    /// the first listener error (later listeners are skipped).
    pub fn fire(&self, state: TransactionState) -> Result<()> {
        let matching: Vec<Rc<dyn TransactionListener>> = self
            .listeners
            .borrow()
            .iter()
            .filter(|(s, _)| *s == state)
            .map(|(_, l)| l.clone())
            .collect();
        if matching.is_empty() {
            return Ok(());
        }

        let ctx = context::resource_context().ok_or_else(|| {
            ExError::illegal_state(format!(
                "no resource context active while firing {} transaction listeners",
                state
            ))
            .with_op("fire_transaction_listeners")
        })?;
        for listener in matching {
            listener.execute(&ctx)?;
        }
        Ok(())
    }
}

impl fmt::Debug for TransactionListeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.listeners.borrow().iter().map(|(s, _)| s))
            .finish()
    }
}
