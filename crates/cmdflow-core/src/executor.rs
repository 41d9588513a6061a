//! Command executor
//!
//! Entry point for running commands. The executor owns the interceptor
//! chain and the default [`CommandConfig`]; it is cheap to clone and shared
//! across threads, and every resource context carries one for nested calls.

use crate::command::{Command, CommandOutput, ErasedCommand};
use crate::config::CommandConfig;
use crate::errors::{ExError, Result};
use crate::interceptor::InterceptorChain;
use std::fmt;
use std::sync::Arc;

struct ExecutorInner {
    default_config: CommandConfig,
    chain: InterceptorChain,
}

/// Runs commands through the interceptor chain
#[derive(Clone)]
pub struct CommandExecutor {
    inner: Arc<ExecutorInner>,
}

impl CommandExecutor {
    pub fn new(default_config: CommandConfig, chain: InterceptorChain) -> Self {
        Self {
            inner: Arc::new(ExecutorInner {
                default_config,
                chain,
            }),
        }
    }

    pub fn default_config(&self) -> &CommandConfig {
        &self.inner.default_config
    }

    pub fn chain(&self) -> &InterceptorChain {
        &self.inner.chain
    }

    /// Execute with the default configuration
    ///
    /// # Errors
    ///
    /// Returns the command's error, or the first error recorded while its
    /// resource context closed.
    pub fn execute<T, C>(&self, command: &C) -> Result<T>
    where
        T: 'static,
        C: Command<T> + ?Sized,
    {
        self.execute_with(&self.inner.default_config, command)
    }

    /// Execute with an explicit configuration
    ///
    /// # Errors
    ///
    /// Returns the command's error, or the first error recorded while its
    /// resource context closed.
    pub fn execute_with<T, C>(&self, config: &CommandConfig, command: &C) -> Result<T>
    where
        T: 'static,
        C: Command<T> + ?Sized,
    {
        let name = command.name();
        let run = |ctx: &crate::resource_context::ResourceContext| -> Result<CommandOutput> {
            command.execute(ctx).map(|value| Box::new(value) as CommandOutput)
        };
        let erased = ErasedCommand::new(name, &run);

        let output = self.inner.chain.execute(config, &erased, self)?;
        output.downcast::<T>().map(|value| *value).map_err(|_| {
            ExError::illegal_state(format!(
                "command produced a value that is not a {}",
                std::any::type_name::<T>()
            ))
            .with_op("execute_command")
            .with_command(name)
        })
    }
}

impl fmt::Debug for CommandExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandExecutor")
            .field("default_config", &self.inner.default_config)
            .field("chain", &self.inner.chain)
            .finish()
    }
}
