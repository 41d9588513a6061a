//! Assembled engine

use crate::registry::EngineRegistry;
use cmdflow_core::{Command, CommandConfig, CommandExecutor, ExError, Result};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Observer of engine build and close
pub trait EngineLifecycleListener: Send + Sync {
    fn on_engine_built(&self, _engine: &Engine) {}

    fn on_engine_closed(&self, _engine: &Engine) {}
}

pub(crate) type CloseHook = Box<dyn Fn() + Send + Sync>;

/// Named engine owning a command executor
pub struct Engine {
    name: String,
    executor: CommandExecutor,
    lifecycle_listeners: Vec<Arc<dyn EngineLifecycleListener>>,
    close_hook: Option<CloseHook>,
    registry: Arc<EngineRegistry>,
    closed: AtomicBool,
}

impl Engine {
    pub(crate) fn new(
        name: String,
        executor: CommandExecutor,
        lifecycle_listeners: Vec<Arc<dyn EngineLifecycleListener>>,
        close_hook: Option<CloseHook>,
        registry: Arc<EngineRegistry>,
    ) -> Self {
        Self {
            name,
            executor,
            lifecycle_listeners,
            close_hook,
            registry,
            closed: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn command_executor(&self) -> &CommandExecutor {
        &self.executor
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Execute with the engine's default command configuration
    ///
    /// # Errors
    ///
    /// `IllegalState` once the engine is closed, otherwise the command's
    /// outcome.
    pub fn execute<T, C>(&self, command: &C) -> Result<T>
    where
        T: 'static,
        C: Command<T> + ?Sized,
    {
        self.ensure_open(command.name())?;
        self.executor.execute(command)
    }

    /// # Errors
    ///
    /// `IllegalState` once the engine is closed, otherwise the command's
    /// outcome.
    pub fn execute_with<T, C>(&self, config: &CommandConfig, command: &C) -> Result<T>
    where
        T: 'static,
        C: Command<T> + ?Sized,
    {
        self.ensure_open(command.name())?;
        self.executor.execute_with(config, command)
    }

    /// Registry this engine was registered in at build time
    pub fn registry(&self) -> &Arc<EngineRegistry> {
        &self.registry
    }

    /// Close the engine; later calls are no-ops
    ///
    /// Leaves the registry, runs the configured close hook, then notifies
    /// lifecycle listeners.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.registry.unregister(self);
        if let Some(hook) = &self.close_hook {
            hook();
        }
        for listener in &self.lifecycle_listeners {
            listener.on_engine_closed(self);
        }
        tracing::info!(engine = %self.name, "engine closed");
    }

    pub(crate) fn notify_built(&self) {
        for listener in &self.lifecycle_listeners {
            listener.on_engine_built(self);
        }
    }

    fn ensure_open(&self, command: &'static str) -> Result<()> {
        if self.is_closed() {
            return Err(ExError::illegal_state(format!("engine '{}' is closed", self.name))
                .with_op("execute_command")
                .with_command(command));
        }
        Ok(())
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("name", &self.name)
            .field("closed", &self.is_closed())
            .field("chain", self.executor.chain())
            .finish()
    }
}
