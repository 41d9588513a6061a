use super::{CommandInterceptor, Next};
use crate::command::{CommandOutput, ErasedCommand};
use crate::config::CommandConfig;
use crate::context;
use crate::errors::{ExError, Result};
use crate::executor::CommandExecutor;

/// Terminal interceptor: runs the command against the current resource
/// context and passes its value through the context's result slot
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandInvoker;

impl CommandInterceptor for CommandInvoker {
    fn execute(
        &self,
        _config: &CommandConfig,
        command: &ErasedCommand<'_>,
        _executor: &CommandExecutor,
        _next: Next<'_>,
    ) -> Result<CommandOutput> {
        let ctx = context::resource_context().ok_or_else(|| {
            ExError::illegal_state("no resource context active; the chain needs a resource context interceptor")
                .with_op("invoke_command")
                .with_command(command.name())
        })?;

        let value = command.execute(&ctx)?;
        ctx.set_result(value);
        ctx.take_result().ok_or_else(|| {
            ExError::illegal_state("result slot empty after command execution")
                .with_op("invoke_command")
                .with_command(command.name())
        })
    }

    fn name(&self) -> &'static str {
        "CommandInvoker"
    }

    fn is_terminal(&self) -> bool {
        true
    }
}
