use super::{CommandInterceptor, Next};
use crate::command::{CommandOutput, ErasedCommand};
use crate::config::{CommandConfig, Propagation};
use crate::context;
use crate::errors::{ExError, Result};
use crate::executor::CommandExecutor;
use crate::transaction::{TransactionCloseListener, TransactionContextFactory};
use std::sync::Arc;

/// Opens a transaction context for each root resource context
///
/// Reused contexts and `NotSupported` commands run inside whatever
/// transaction is already open, or none.
#[derive(Default)]
pub struct TransactionContextInterceptor {
    factory: Option<Arc<dyn TransactionContextFactory>>,
}

impl TransactionContextInterceptor {
    pub fn new(factory: Option<Arc<dyn TransactionContextFactory>>) -> Self {
        Self { factory }
    }
}

impl CommandInterceptor for TransactionContextInterceptor {
    fn execute(
        &self,
        config: &CommandConfig,
        command: &ErasedCommand<'_>,
        executor: &CommandExecutor,
        next: Next<'_>,
    ) -> Result<CommandOutput> {
        let Some(factory) = self.factory.as_ref() else {
            return next.run(config, command, executor);
        };
        if config.propagation() == Propagation::NotSupported {
            return next.run(config, command, executor);
        }

        let ctx = context::resource_context().ok_or_else(|| {
            ExError::illegal_state("transaction context interceptor requires an active resource context")
                .with_op("open_transaction_context")
                .with_command(command.name())
        })?;
        if ctx.is_reused() {
            return next.run(config, command, executor);
        }

        let transaction = factory.open_transaction_context(&ctx)?;
        if !ctx.add_close_listener(TransactionCloseListener::new(transaction.clone())) {
            if let Err(err) = transaction.rollback() {
                tracing::warn!(context_id = %ctx.id(), error = %err, "rollback of unbound transaction failed");
            }
            return Err(ExError::illegal_state(
                "resource context already has a transaction close listener",
            )
            .with_op("open_transaction_context")
            .with_command(command.name()));
        }
        let _guard = context::push_transaction_context(transaction);
        tracing::trace!(context_id = %ctx.id(), command = command.name(), "transaction context opened");

        next.run(config, command, executor)
    }

    fn name(&self) -> &'static str {
        "TransactionContextInterceptor"
    }
}
