//! Creation of fresh resource contexts

use super::ResourceContext;
use crate::clock::{Clock, SystemClock};
use crate::executor::CommandExecutor;
use crate::session::SessionFactories;
use std::fmt;
use std::sync::Arc;

/// Builds resource contexts with the assembly-time session factories and clock
#[derive(Clone)]
pub struct ResourceContextFactory {
    session_factories: Arc<SessionFactories>,
    clock: Arc<dyn Clock>,
}

impl ResourceContextFactory {
    pub fn new(session_factories: SessionFactories) -> Self {
        Self {
            session_factories: Arc::new(session_factories),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn session_factories(&self) -> &SessionFactories {
        &self.session_factories
    }

    /// Fresh, open, non-reused context for a root invocation of `command_name`
    pub fn create(&self, command_name: &'static str, executor: &CommandExecutor) -> ResourceContext {
        ResourceContext::new(
            command_name,
            executor.clone(),
            self.session_factories.clone(),
            self.clock.clone(),
        )
    }
}

impl Default for ResourceContextFactory {
    fn default() -> Self {
        Self::new(SessionFactories::new())
    }
}

impl fmt::Debug for ResourceContextFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceContextFactory")
            .field("session_factories", &self.session_factories)
            .finish_non_exhaustive()
    }
}
