use super::{CommandInterceptor, Next};
use crate::command::{CommandOutput, ErasedCommand};
use crate::config::{CommandConfig, Propagation};
use crate::errors::Result;
use crate::executor::CommandExecutor;
use crate::transaction::PlatformTransactionManager;
use std::sync::Arc;

/// Wraps the rest of the chain in a platform transaction
///
/// With `Required` propagation and a platform transaction already active
/// on the thread, the call passes straight through.
pub struct PlatformTransactionInterceptor {
    manager: Arc<dyn PlatformTransactionManager>,
}

impl PlatformTransactionInterceptor {
    pub fn new(manager: Arc<dyn PlatformTransactionManager>) -> Self {
        Self { manager }
    }
}

impl CommandInterceptor for PlatformTransactionInterceptor {
    fn execute(
        &self,
        config: &CommandConfig,
        command: &ErasedCommand<'_>,
        executor: &CommandExecutor,
        next: Next<'_>,
    ) -> Result<CommandOutput> {
        let propagation = config.propagation();
        if propagation == Propagation::Required && self.manager.is_transaction_active() {
            return next.run(config, command, executor);
        }

        self.manager
            .begin(propagation)
            .map_err(|err| err.with_command(command.name()))?;

        match next.run(config, command, executor) {
            Ok(value) => {
                self.manager
                    .commit()
                    .map_err(|err| err.with_command(command.name()))?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.manager.rollback() {
                    tracing::warn!(
                        command = command.name(),
                        err.code = rollback_err.code(),
                        err.message = rollback_err.message(),
                        "platform rollback failed"
                    );
                }
                Err(err)
            }
        }
    }

    fn name(&self) -> &'static str {
        "PlatformTransactionInterceptor"
    }
}
