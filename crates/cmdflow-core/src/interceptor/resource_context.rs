use super::{CommandInterceptor, Next};
use crate::command::{CommandOutput, ErasedCommand};
use crate::config::CommandConfig;
use crate::context;
use crate::errors::{ExError, Result};
use crate::executor::CommandExecutor;
use crate::resource_context::{ResourceContext, ResourceContextFactory};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

/// Creates or reuses the resource context a command runs in
///
/// A fresh context is created when the command forbids reuse, when none is
/// active, or when the active one already holds an error. The context is
/// on the thread's stack for the whole call; an owned context is closed
/// before it is popped.
#[derive(Debug, Clone, Default)]
pub struct ResourceContextInterceptor {
    factory: ResourceContextFactory,
    engine_key: Option<String>,
}

impl ResourceContextInterceptor {
    pub fn new(factory: ResourceContextFactory) -> Self {
        Self {
            factory,
            engine_key: None,
        }
    }

    /// Key pushed onto the context's engine-key stack while this chain runs
    pub fn with_engine_key(mut self, key: impl Into<String>) -> Self {
        self.engine_key = Some(key.into());
        self
    }

    pub fn factory(&self) -> &ResourceContextFactory {
        &self.factory
    }
}

impl CommandInterceptor for ResourceContextInterceptor {
    fn execute(
        &self,
        config: &CommandConfig,
        command: &ErasedCommand<'_>,
        executor: &CommandExecutor,
        next: Next<'_>,
    ) -> Result<CommandOutput> {
        let current = context::resource_context();
        let (ctx, owned, original_reused) = match current {
            Some(ctx) if config.is_context_reuse_possible() && !ctx.has_exception() => {
                let original = ctx.is_reused();
                ctx.set_reused(true);
                tracing::trace!(context_id = %ctx.id(), command = command.name(), reused = true, "resource context reused");
                (ctx, false, original)
            }
            _ => {
                let ctx = Rc::new(self.factory.create(command.name(), executor));
                tracing::trace!(context_id = %ctx.id(), command = command.name(), reused = false, "resource context created");
                (ctx, true, false)
            }
        };

        if let Some(key) = &self.engine_key {
            ctx.push_engine_key(key);
        }
        let guard = context::push_resource_context(ctx.clone());

        let value = match catch_unwind(AssertUnwindSafe(|| next.run(config, command, executor))) {
            Ok(Ok(value)) => Some(value),
            Ok(Err(err)) => {
                ctx.record_exception(tag_command(err, command.name()));
                None
            }
            Err(payload) => {
                ctx.record_exception(
                    ExError::from_panic(payload)
                        .with_op("execute_command")
                        .with_command(command.name()),
                );
                None
            }
        };

        let close_result = if owned { Some(ctx.close()) } else { None };
        ctx.set_reused(original_reused);
        if self.engine_key.is_some() {
            ctx.pop_engine_key();
        }
        drop(guard);

        match close_result {
            Some(closed) => {
                closed?;
                value.ok_or_else(|| missing_value(&ctx, command))
            }
            None => match ctx.take_exception() {
                Some(err) => Err(err),
                None => value.ok_or_else(|| missing_value(&ctx, command)),
            },
        }
    }

    fn name(&self) -> &'static str {
        "ResourceContextInterceptor"
    }
}

fn tag_command(err: ExError, command: &'static str) -> ExError {
    if err.command().is_some() {
        err
    } else {
        err.with_command(command)
    }
}

fn missing_value(ctx: &ResourceContext, command: &ErasedCommand<'_>) -> ExError {
    ExError::illegal_state("command finished without a value or an error")
        .with_op("execute_command")
        .with_command(command.name())
        .with_request_id(ctx.id().clone())
}
