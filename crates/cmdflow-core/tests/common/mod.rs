use cmdflow_core::interceptor::{
    CommandInvoker, LogInterceptor, PlatformTransactionInterceptor, ResourceContextInterceptor,
    TransactionContextInterceptor,
};
use cmdflow_core::session::session_factory;
use cmdflow_core::transaction::{
    PlatformTransactionManager, TransactionListener, TransactionListeners,
};
use cmdflow_core::{
    CloseListener, CommandConfig, CommandExecutor, CommandInterceptor, ExError, InterceptorChain,
    Propagation, ResourceContext, ResourceContextFactory, Result, Session, SessionFactories,
    TransactionContext, TransactionContextFactory, TransactionState,
};
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Thread-safe, append-only record of what the fakes observed
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

#[allow(dead_code)]
impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries().iter().filter(|e| e.as_str() == entry).count()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().position(|e| e.as_str() == entry)
    }

    /// Entries starting with `prefix`, in order
    pub fn with_prefix(&self, prefix: &str) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|e| e.starts_with(prefix))
            .collect()
    }
}

// ----- sessions -----

pub struct RecordingSession {
    journal: Journal,
    fail_flush: bool,
    fail_close: bool,
}

impl Session for RecordingSession {
    fn flush(&self) -> Result<()> {
        self.journal.record("session:flush");
        if self.fail_flush {
            return Err(ExError::engine("flush rejected"));
        }
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.journal.record("session:close");
        if self.fail_close {
            return Err(ExError::engine("close rejected"));
        }
        Ok(())
    }
}

/// Second session type, always healthy
pub struct AuditSession {
    journal: Journal,
}

impl Session for AuditSession {
    fn flush(&self) -> Result<()> {
        self.journal.record("audit:flush");
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.journal.record("audit:close");
        Ok(())
    }
}

#[allow(dead_code)]
pub fn session_factories(journal: &Journal) -> SessionFactories {
    session_factories_failing(journal, false, false)
}

#[allow(dead_code)]
pub fn session_factories_failing(journal: &Journal, fail_flush: bool, fail_close: bool) -> SessionFactories {
    let mut factories = SessionFactories::new();
    let recording = journal.clone();
    factories
        .register(Arc::new(session_factory(move |_ctx| {
            recording.record("session:open");
            Ok(RecordingSession {
                journal: recording.clone(),
                fail_flush,
                fail_close,
            })
        })))
        .unwrap();
    let audit = journal.clone();
    factories
        .register(Arc::new(session_factory(move |_ctx| {
            Ok(AuditSession {
                journal: audit.clone(),
            })
        })))
        .unwrap();
    factories
}

// ----- close listeners -----

pub struct RecordingListener {
    pub tag: String,
    pub priority: i32,
    pub journal: Journal,
}

#[allow(dead_code)]
impl RecordingListener {
    pub fn new(tag: impl Into<String>, priority: i32, journal: &Journal) -> Self {
        Self {
            tag: tag.into(),
            priority,
            journal: journal.clone(),
        }
    }
}

impl CloseListener for RecordingListener {
    fn closing(&self, _ctx: &ResourceContext) -> Result<()> {
        self.journal.record(format!("{}:closing", self.tag));
        Ok(())
    }

    fn after_session_flush(&self, _ctx: &ResourceContext) -> Result<()> {
        self.journal.record(format!("{}:after_session_flush", self.tag));
        Ok(())
    }

    fn closed(&self, _ctx: &ResourceContext) -> Result<()> {
        self.journal.record(format!("{}:closed", self.tag));
        Ok(())
    }

    fn close_failure(&self, _ctx: &ResourceContext) -> Result<()> {
        self.journal.record(format!("{}:close_failure", self.tag));
        Ok(())
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

// ----- transaction contexts -----

pub struct RecordingTransaction {
    journal: Journal,
    fail_commit: bool,
    listeners: TransactionListeners,
}

impl TransactionContext for RecordingTransaction {
    fn commit(&self) -> Result<()> {
        self.listeners.fire(TransactionState::Committing)?;
        self.journal.record("tx:commit");
        if self.fail_commit {
            return Err(ExError::engine("commit rejected"));
        }
        self.listeners.fire(TransactionState::Committed)
    }

    fn rollback(&self) -> Result<()> {
        self.listeners.fire(TransactionState::RollingBack)?;
        self.journal.record("tx:rollback");
        self.listeners.fire(TransactionState::RolledBack)
    }

    fn add_transaction_listener(&self, state: TransactionState, listener: Rc<dyn TransactionListener>) {
        self.listeners.add_rc(state, listener);
    }
}

pub struct RecordingTransactionFactory {
    journal: Journal,
    fail_commit: bool,
    opened: AtomicUsize,
}

#[allow(dead_code)]
impl RecordingTransactionFactory {
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
            fail_commit: false,
            opened: AtomicUsize::new(0),
        }
    }

    pub fn failing_commit(journal: &Journal) -> Self {
        Self {
            fail_commit: true,
            ..Self::new(journal)
        }
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl TransactionContextFactory for RecordingTransactionFactory {
    fn open_transaction_context(&self, _ctx: &ResourceContext) -> Result<Rc<dyn TransactionContext>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.journal.record("tx:open");
        Ok(Rc::new(RecordingTransaction {
            journal: self.journal.clone(),
            fail_commit: self.fail_commit,
            listeners: TransactionListeners::new(),
        }))
    }
}

// ----- platform transactions -----

pub struct FakePlatformManager {
    journal: Journal,
    depth: Mutex<usize>,
}

#[allow(dead_code)]
impl FakePlatformManager {
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
            depth: Mutex::new(0),
        }
    }
}

impl PlatformTransactionManager for FakePlatformManager {
    fn is_transaction_active(&self) -> bool {
        *self.depth.lock().unwrap() > 0
    }

    fn begin(&self, propagation: Propagation) -> Result<()> {
        *self.depth.lock().unwrap() += 1;
        self.journal.record(format!("platform:begin:{}", propagation));
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        *self.depth.lock().unwrap() -= 1;
        self.journal.record("platform:commit");
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        *self.depth.lock().unwrap() -= 1;
        self.journal.record("platform:rollback");
        Ok(())
    }
}

// ----- pipelines -----

/// Canonical chain with recording sessions and an optional transaction factory
#[allow(dead_code)]
pub fn executor(
    journal: &Journal,
    transactions: Option<Arc<RecordingTransactionFactory>>,
) -> CommandExecutor {
    executor_with(session_factories(journal), transactions, None)
}

#[allow(dead_code)]
pub fn executor_with(
    factories: SessionFactories,
    transactions: Option<Arc<RecordingTransactionFactory>>,
    platform: Option<Arc<FakePlatformManager>>,
) -> CommandExecutor {
    let mut chain: Vec<Box<dyn CommandInterceptor>> = vec![Box::new(LogInterceptor)];
    if let Some(manager) = platform {
        chain.push(Box::new(PlatformTransactionInterceptor::new(manager)));
    }
    chain.push(Box::new(
        ResourceContextInterceptor::new(ResourceContextFactory::new(factories)).with_engine_key("test-engine"),
    ));
    chain.push(Box::new(TransactionContextInterceptor::new(
        transactions.map(|f| f as Arc<dyn TransactionContextFactory>),
    )));
    chain.push(Box::new(CommandInvoker));

    CommandExecutor::new(CommandConfig::default(), InterceptorChain::new(chain).unwrap())
}
