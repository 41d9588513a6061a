use super::{CommandInterceptor, Next};
use crate::command::{CommandOutput, ErasedCommand};
use crate::config::CommandConfig;
use crate::errors::Result;
use crate::executor::CommandExecutor;
use crate::{log_op_end, log_op_error, log_op_start};
use std::time::Instant;
use tracing::Level;

/// Logs start, end and failure of every command at DEBUG
///
/// Does nothing unless DEBUG is enabled for this module.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogInterceptor;

impl CommandInterceptor for LogInterceptor {
    fn execute(
        &self,
        config: &CommandConfig,
        command: &ErasedCommand<'_>,
        executor: &CommandExecutor,
        next: Next<'_>,
    ) -> Result<CommandOutput> {
        if !tracing::enabled!(Level::DEBUG) {
            return next.run(config, command, executor);
        }

        let start = Instant::now();
        log_op_start!(
            "execute_command",
            command = command.name(),
            propagation = config.propagation().as_str(),
            context_reuse_possible = config.is_context_reuse_possible()
        );

        let outcome = next.run(config, command, executor);
        let duration_ms = start.elapsed().as_millis() as u64;
        match &outcome {
            Ok(_) => {
                log_op_end!("execute_command", duration_ms = duration_ms, command = command.name());
            }
            Err(err) => {
                log_op_error!("execute_command", err, duration_ms = duration_ms, command = command.name());
            }
        }
        outcome
    }

    fn name(&self) -> &'static str {
        "LogInterceptor"
    }
}
