//! Engine assembly
//!
//! [`EngineConfiguration`] collects the collaborators of an engine and
//! freezes them into the canonical interceptor chain:
//!
//! ```text
//! custom pre-interceptors
//!   -> LogInterceptor
//!   -> PlatformTransactionInterceptor   (when a platform manager is set)
//!   -> ResourceContextInterceptor       (engine key = engine name)
//!   -> TransactionContextInterceptor
//!   -> custom post-interceptors
//!   -> CommandInvoker
//! ```

use crate::engine::{CloseHook, Engine, EngineLifecycleListener};
use crate::registry::EngineRegistry;
use crate::settings::EngineSettings;
use cmdflow_core::errors::ConfigError;
use cmdflow_core::interceptor::{
    CommandInvoker, LogInterceptor, PlatformTransactionInterceptor, ResourceContextInterceptor,
    TransactionContextInterceptor,
};
use cmdflow_core::session::SessionFactory;
use cmdflow_core::transaction::PlatformTransactionManager;
use cmdflow_core::{
    log_op_end, log_op_error, log_op_start, Clock, Command, CommandConfig, CommandExecutor,
    CommandInterceptor, InterceptorChain, ResourceContext, ResourceContextFactory, Result,
    SessionFactories, SystemClock, TransactionContextFactory,
};
use std::sync::Arc;
use std::time::Instant;

type SchemaOperation = Box<dyn Fn(&ResourceContext) -> Result<()> + Send + Sync>;

/// Schema management step run once while the engine is built
struct SchemaManagement {
    config: CommandConfig,
    operation: SchemaOperation,
}

impl Command<()> for SchemaManagement {
    fn execute(&self, ctx: &ResourceContext) -> Result<()> {
        (self.operation)(ctx)
    }

    fn name(&self) -> &'static str {
        "SchemaManagement"
    }
}

/// Builder for an [`Engine`]
pub struct EngineConfiguration {
    name: String,
    default_config: CommandConfig,
    session_factories: SessionFactories,
    transaction_factory: Option<Arc<dyn TransactionContextFactory>>,
    platform_manager: Option<Arc<dyn PlatformTransactionManager>>,
    pre_interceptors: Vec<Box<dyn CommandInterceptor>>,
    post_interceptors: Vec<Box<dyn CommandInterceptor>>,
    clock: Arc<dyn Clock>,
    schema_management: Option<SchemaManagement>,
    lifecycle_listeners: Vec<Arc<dyn EngineLifecycleListener>>,
    close_hook: Option<CloseHook>,
    registry: Option<Arc<EngineRegistry>>,
    pending_error: Option<ConfigError>,
}

impl EngineConfiguration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_config: CommandConfig::default(),
            session_factories: SessionFactories::new(),
            transaction_factory: None,
            platform_manager: None,
            pre_interceptors: Vec::new(),
            post_interceptors: Vec::new(),
            clock: Arc::new(SystemClock),
            schema_management: None,
            lifecycle_listeners: Vec::new(),
            close_hook: None,
            registry: None,
            pending_error: None,
        }
    }

    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self::new(settings.name.clone()).with_default_config(settings.default_config)
    }

    pub fn with_default_config(mut self, config: CommandConfig) -> Self {
        self.default_config = config;
        self
    }

    /// Register a session factory; a second factory for the same session
    /// type fails the build
    pub fn with_session_factory(mut self, factory: Arc<dyn SessionFactory>) -> Self {
        if let Err(err) = self.session_factories.register(factory) {
            self.pending_error.get_or_insert(err);
        }
        self
    }

    pub fn with_transaction_factory(mut self, factory: Arc<dyn TransactionContextFactory>) -> Self {
        self.transaction_factory = Some(factory);
        self
    }

    pub fn with_platform_transaction_manager(mut self, manager: Arc<dyn PlatformTransactionManager>) -> Self {
        self.platform_manager = Some(manager);
        self
    }

    /// Interceptor placed before the default interceptors
    pub fn with_pre_interceptor(mut self, interceptor: Box<dyn CommandInterceptor>) -> Self {
        self.pre_interceptors.push(interceptor);
        self
    }

    /// Interceptor placed right before the command invoker
    pub fn with_post_interceptor(mut self, interceptor: Box<dyn CommandInterceptor>) -> Self {
        self.post_interceptors.push(interceptor);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Command run once through the assembled engine before `build` returns
    pub fn with_schema_management<F>(mut self, config: CommandConfig, operation: F) -> Self
    where
        F: Fn(&ResourceContext) -> Result<()> + Send + Sync + 'static,
    {
        self.schema_management = Some(SchemaManagement {
            config,
            operation: Box::new(operation),
        });
        self
    }

    pub fn with_lifecycle_listener(mut self, listener: Arc<dyn EngineLifecycleListener>) -> Self {
        self.lifecycle_listeners.push(listener);
        self
    }

    /// Runs once when the engine closes, before lifecycle listeners
    pub fn with_close_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.close_hook = Some(Box::new(hook));
        self
    }

    /// Registry the built engine joins; defaults to [`EngineRegistry::global`]
    pub fn with_registry(mut self, registry: Arc<EngineRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Assemble the interceptor chain and build the engine
    ///
    /// # Errors
    ///
    /// `Configuration` for a duplicate session factory or an invalid chain
    /// (for example a custom terminal interceptor), otherwise whatever the
    /// schema management command returns.
    pub fn build(self) -> Result<Arc<Engine>> {
        let start = Instant::now();
        log_op_start!("build_engine", engine = self.name.as_str());

        let result = self.assemble();
        let duration_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(engine) => {
                log_op_end!("build_engine", duration_ms = duration_ms, engine = engine.name());
            }
            Err(err) => {
                log_op_error!("build_engine", err, duration_ms = duration_ms);
            }
        }
        result
    }

    fn assemble(self) -> Result<Arc<Engine>> {
        if let Some(err) = self.pending_error {
            return Err(err.into());
        }

        let context_factory = ResourceContextFactory::new(self.session_factories).with_clock(self.clock);

        let mut interceptors = self.pre_interceptors;
        interceptors.push(Box::new(LogInterceptor));
        if let Some(manager) = self.platform_manager {
            interceptors.push(Box::new(PlatformTransactionInterceptor::new(manager)));
        }
        interceptors.push(Box::new(
            ResourceContextInterceptor::new(context_factory).with_engine_key(self.name.clone()),
        ));
        interceptors.push(Box::new(TransactionContextInterceptor::new(self.transaction_factory)));
        interceptors.extend(self.post_interceptors);
        interceptors.push(Box::new(CommandInvoker));

        let chain = InterceptorChain::new(interceptors)?;
        tracing::debug!(engine = %self.name, chain = ?chain.names(), "interceptor chain assembled");

        let registry = self.registry.unwrap_or_else(EngineRegistry::global);
        let executor = CommandExecutor::new(self.default_config, chain);
        let engine = Arc::new(Engine::new(
            self.name,
            executor,
            self.lifecycle_listeners,
            self.close_hook,
            registry.clone(),
        ));

        if let Some(schema) = self.schema_management {
            engine
                .command_executor()
                .execute_with::<(), _>(&schema.config, &schema)?;
        }

        registry.register(engine.clone());
        engine.notify_built();
        Ok(engine)
    }
}
