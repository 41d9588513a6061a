//! Interceptor chain
//!
//! Every command runs through an immutable, ordered list of interceptors.
//! Each one performs its concern, hands control to the rest of the chain
//! through [`Next`] and may inspect the outcome on the way back. The last
//! element is always the terminal [`CommandInvoker`].
//!
//! Canonical order, outer to inner:
//!
//! ```text
//! LogInterceptor -> PlatformTransactionInterceptor (optional)
//!   -> ResourceContextInterceptor -> TransactionContextInterceptor -> CommandInvoker
//! ```

pub mod invoker;
pub mod log;
pub mod platform_transaction;
pub mod resource_context;
pub mod transaction_context;

pub use invoker::CommandInvoker;
pub use log::LogInterceptor;
pub use platform_transaction::PlatformTransactionInterceptor;
pub use resource_context::ResourceContextInterceptor;
pub use transaction_context::TransactionContextInterceptor;

use crate::command::{CommandOutput, ErasedCommand};
use crate::config::CommandConfig;
use crate::errors::{ConfigError, ExError, Result};
use crate::executor::CommandExecutor;
use std::fmt;

/// One element of the interceptor chain
pub trait CommandInterceptor: Send + Sync {
    /// Perform this interceptor's concern around `next`
    ///
    /// # Errors
    ///
    /// Returns the error of the rest of the chain, possibly replaced by an
    /// error of this interceptor's own concern.
    fn execute(
        &self,
        config: &CommandConfig,
        command: &ErasedCommand<'_>,
        executor: &CommandExecutor,
        next: Next<'_>,
    ) -> Result<CommandOutput>;

    fn name(&self) -> &'static str;

    /// Terminal interceptors never call `next` and must come last
    fn is_terminal(&self) -> bool {
        false
    }
}

/// Remainder of the chain after the current interceptor
#[derive(Clone, Copy)]
pub struct Next<'a> {
    rest: &'a [Box<dyn CommandInterceptor>],
}

impl<'a> Next<'a> {
    /// Run the rest of the chain
    ///
    /// # Errors
    ///
    /// `IllegalState` when called past the terminal interceptor, otherwise
    /// whatever the rest of the chain returns.
    pub fn run(
        self,
        config: &CommandConfig,
        command: &ErasedCommand<'_>,
        executor: &CommandExecutor,
    ) -> Result<CommandOutput> {
        match self.rest.split_first() {
            Some((head, rest)) => head.execute(config, command, executor, Next { rest }),
            None => Err(ExError::illegal_state("interceptor chain ended without a command invoker")
                .with_op("execute_command")
                .with_command(command.name())),
        }
    }
}

/// Validated, immutable interceptor chain
pub struct InterceptorChain {
    interceptors: Vec<Box<dyn CommandInterceptor>>,
}

impl InterceptorChain {
    /// Validate and freeze the chain
    ///
    /// # Errors
    ///
    /// Fails if the chain is empty, does not end with a terminal
    /// interceptor, or has a terminal interceptor anywhere but last.
    pub fn new(interceptors: Vec<Box<dyn CommandInterceptor>>) -> std::result::Result<Self, ConfigError> {
        let last = interceptors.len().checked_sub(1).ok_or(ConfigError::EmptyChain)?;
        if let Some(position) = interceptors[..last].iter().position(|i| i.is_terminal()) {
            return Err(ConfigError::InvokerNotLast { position });
        }
        if !interceptors[last].is_terminal() {
            return Err(ConfigError::MissingInvoker);
        }
        Ok(Self { interceptors })
    }

    /// # Errors
    ///
    /// Whatever the chain returns for this command.
    pub fn execute(
        &self,
        config: &CommandConfig,
        command: &ErasedCommand<'_>,
        executor: &CommandExecutor,
    ) -> Result<CommandOutput> {
        Next {
            rest: &self.interceptors,
        }
        .run(config, command, executor)
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Interceptor names, outer to inner
    pub fn names(&self) -> Vec<&'static str> {
        self.interceptors.iter().map(|i| i.name()).collect()
    }
}

impl fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
