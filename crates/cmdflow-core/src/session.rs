//! Session abstraction
//!
//! A session is a stateful resource manager (for example a persistence
//! unit of work) that a resource context opens lazily on first request and
//! flushes/closes during its close protocol. Sessions never leave the
//! thread that opened them; factories are shared across threads.

use crate::errors::{ConfigError, Result};
use crate::resource_context::ResourceContext;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::Arc;

/// Per-type stateful resource manager
///
/// Methods take `&self`; implementations keep their mutable state behind
/// `Cell`/`RefCell`, which is enough because a session is confined to one
/// thread.
pub trait Session {
    /// Push pending in-memory changes to the backing resource
    ///
    /// # Errors
    ///
    /// A failure is recorded on the owning context and turns the close
    /// protocol onto its failure path.
    fn flush(&self) -> Result<()>;

    /// Release the backing resource
    ///
    /// # Errors
    ///
    /// A failure is recorded on the owning context; other sessions are
    /// still closed.
    fn close(&self) -> Result<()>;
}

/// Key identifying a session implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionType {
    id: TypeId,
    name: &'static str,
}

impl SessionType {
    pub fn of<S: Session + 'static>() -> Self {
        Self {
            id: TypeId::of::<S>(),
            name: std::any::type_name::<S>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Freshly opened session, typed view and protocol view of the same value
#[derive(Clone)]
pub struct SessionHandle {
    session_type: SessionType,
    session: Rc<dyn Session>,
    any: Rc<dyn Any>,
}

impl SessionHandle {
    pub fn new<S: Session + 'static>(session: S) -> Self {
        let rc = Rc::new(session);
        Self {
            session_type: SessionType::of::<S>(),
            session: rc.clone(),
            any: rc,
        }
    }

    pub fn session_type(&self) -> SessionType {
        self.session_type
    }

    pub(crate) fn session(&self) -> &Rc<dyn Session> {
        &self.session
    }

    pub(crate) fn downcast<S: 'static>(&self) -> Option<Rc<S>> {
        self.any.clone().downcast::<S>().ok()
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("session_type", &self.session_type.name)
            .finish_non_exhaustive()
    }
}

/// Opens sessions of one type on behalf of a resource context
pub trait SessionFactory: Send + Sync {
    fn session_type(&self) -> SessionType;

    /// # Errors
    ///
    /// Returned to the command that requested the session.
    fn open_session(&self, ctx: &ResourceContext) -> Result<SessionHandle>;
}

/// Session factory backed by a closure
pub struct FnSessionFactory<S, F> {
    open: F,
    _session: PhantomData<fn() -> S>,
}

/// Build a factory from a closure that opens an `S`
///
/// ```
/// use cmdflow_core::session::{session_factory, Session, SessionFactory, SessionType};
/// use cmdflow_core::Result;
///
/// struct NoopSession;
/// impl Session for NoopSession {
///     fn flush(&self) -> Result<()> { Ok(()) }
///     fn close(&self) -> Result<()> { Ok(()) }
/// }
///
/// let factory = session_factory(|_ctx| Ok(NoopSession));
/// assert_eq!(factory.session_type(), SessionType::of::<NoopSession>());
/// ```
pub fn session_factory<S, F>(open: F) -> FnSessionFactory<S, F>
where
    S: Session + 'static,
    F: Fn(&ResourceContext) -> Result<S> + Send + Sync,
{
    FnSessionFactory {
        open,
        _session: PhantomData,
    }
}

impl<S, F> SessionFactory for FnSessionFactory<S, F>
where
    S: Session + 'static,
    F: Fn(&ResourceContext) -> Result<S> + Send + Sync,
{
    fn session_type(&self) -> SessionType {
        SessionType::of::<S>()
    }

    fn open_session(&self, ctx: &ResourceContext) -> Result<SessionHandle> {
        (self.open)(ctx).map(SessionHandle::new)
    }
}

/// Session factories registered at assembly time, one per session type
#[derive(Clone, Default)]
pub struct SessionFactories {
    factories: HashMap<SessionType, Arc<dyn SessionFactory>>,
}

impl SessionFactories {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// Fails if a factory for the same session type is already registered.
    pub fn register(&mut self, factory: Arc<dyn SessionFactory>) -> std::result::Result<(), ConfigError> {
        let session_type = factory.session_type();
        if self.factories.contains_key(&session_type) {
            return Err(ConfigError::DuplicateSessionFactory {
                session_type: session_type.name().to_string(),
            });
        }
        self.factories.insert(session_type, factory);
        Ok(())
    }

    pub fn get(&self, session_type: &SessionType) -> Option<&Arc<dyn SessionFactory>> {
        self.factories.get(session_type)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for SessionFactories {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.factories.keys().map(SessionType::name))
            .finish()
    }
}
