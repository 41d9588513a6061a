use super::TransactionContext;
use crate::errors::{ExError, ExErrorKind, Result};
use crate::resource_context::{CloseListener, ResourceContext};
use std::rc::Rc;

/// Priority of [`TransactionCloseListener`]; runs after ordinary listeners
pub const TRANSACTION_CLOSE_LISTENER_PRIORITY: i32 = 10_000;

/// Commits the transaction once sessions are flushed, rolls it back when
/// the resource context closes with an error
pub struct TransactionCloseListener {
    transaction: Rc<dyn TransactionContext>,
}

impl TransactionCloseListener {
    pub fn new(transaction: Rc<dyn TransactionContext>) -> Self {
        Self { transaction }
    }
}

impl CloseListener for TransactionCloseListener {
    fn after_session_flush(&self, _ctx: &ResourceContext) -> Result<()> {
        self.transaction.commit().map_err(|err| as_transaction_error(err, "commit"))
    }

    fn close_failure(&self, _ctx: &ResourceContext) -> Result<()> {
        self.transaction
            .rollback()
            .map_err(|err| as_transaction_error(err, "rollback"))
    }

    fn priority(&self) -> i32 {
        TRANSACTION_CLOSE_LISTENER_PRIORITY
    }

    fn allow_multiple_per_type(&self) -> bool {
        false
    }
}

fn as_transaction_error(err: ExError, op: &'static str) -> ExError {
    match err.kind() {
        ExErrorKind::Transaction => err,
        _ => ExError::new(ExErrorKind::Transaction)
            .with_op(op)
            .with_message(format!("transaction {} failed", op))
            .with_source(err),
    }
}
