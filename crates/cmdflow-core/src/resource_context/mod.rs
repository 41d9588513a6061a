//! Per-execution resource context
//!
//! A `ResourceContext` lives for exactly one root command invocation. It
//! owns the sessions opened on behalf of that invocation, a scratch
//! attribute map, the result slot, the first recorded error and the close
//! listeners, and it drives the multi-phase close protocol:
//!
//! ```text
//! Open -> Closing -> {Flushed | FlushSkipped} -> {AfterFlushOk | AfterFlushSkipped}
//!      -> SessionsClosed -> {Closed | CloseFailed}
//! ```
//!
//! Nested commands that reuse the context share the same instance through
//! the thread-local stack in [`crate::context`]; all mutation goes through
//! `Cell`/`RefCell` and no borrow is held while collaborator code runs.

pub mod close_listener;
pub mod factory;

pub use close_listener::CloseListener;
pub use factory::ResourceContextFactory;

use crate::clock::Clock;
use crate::command::CommandOutput;
use crate::errors::{ExError, ExErrorKind, Result};
use crate::executor::CommandExecutor;
use crate::session::{Session, SessionFactories, SessionHandle, SessionType};
use chrono::{DateTime, Utc};
use cmdflow_core_types::schema::{
    PHASE_AFTER_SESSION_FLUSH, PHASE_CLOSED, PHASE_CLOSE_FAILURE, PHASE_CLOSE_SESSIONS,
    PHASE_CLOSING, PHASE_FLUSH,
};
use cmdflow_core_types::RequestId;
use std::any::{Any, TypeId};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::Arc;

/// Position of a context in its close protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseState {
    Open,
    Closing,
    Flushed,
    FlushSkipped,
    AfterFlushOk,
    AfterFlushSkipped,
    SessionsClosed,
    Closed,
    CloseFailed,
}

impl CloseState {
    /// Sessions have been released; none may be opened any more
    pub fn sessions_released(&self) -> bool {
        matches!(
            self,
            CloseState::SessionsClosed | CloseState::Closed | CloseState::CloseFailed
        )
    }
}

struct RegisteredListener {
    type_id: TypeId,
    listener: Rc<dyn CloseListener>,
}

/// Holder of sessions, attributes, error state and close listeners for one
/// root command execution
pub struct ResourceContext {
    id: RequestId,
    command_name: &'static str,
    executor: CommandExecutor,
    session_factories: Arc<SessionFactories>,
    clock: Arc<dyn Clock>,
    sessions: RefCell<HashMap<SessionType, SessionHandle>>,
    attributes: RefCell<HashMap<String, Rc<dyn Any>>>,
    close_listeners: RefCell<Vec<RegisteredListener>>,
    results: RefCell<Vec<CommandOutput>>,
    exception: RefCell<Option<ExError>>,
    reused: Cell<bool>,
    state: Cell<CloseState>,
    engine_keys: RefCell<Vec<String>>,
}

impl ResourceContext {
    pub(crate) fn new(
        command_name: &'static str,
        executor: CommandExecutor,
        session_factories: Arc<SessionFactories>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            id: RequestId::new(),
            command_name,
            executor,
            session_factories,
            clock,
            sessions: RefCell::new(HashMap::new()),
            attributes: RefCell::new(HashMap::new()),
            close_listeners: RefCell::new(Vec::new()),
            results: RefCell::new(Vec::new()),
            exception: RefCell::new(None),
            reused: Cell::new(false),
            state: Cell::new(CloseState::Open),
            engine_keys: RefCell::new(Vec::new()),
        }
    }

    /// Correlation id, logged as `context_id`
    pub fn id(&self) -> &RequestId {
        &self.id
    }

    /// Name of the root command this context was created for
    pub fn command_name(&self) -> &'static str {
        self.command_name
    }

    /// Executor to issue nested commands through
    pub fn command_executor(&self) -> &CommandExecutor {
        &self.executor
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn close_state(&self) -> CloseState {
        self.state.get()
    }

    // ----- reuse -----

    /// True while a nested invocation is running inside this context
    pub fn is_reused(&self) -> bool {
        self.reused.get()
    }

    pub(crate) fn set_reused(&self, reused: bool) {
        self.reused.set(reused);
    }

    // ----- engine keys -----

    pub(crate) fn push_engine_key(&self, key: &str) {
        self.engine_keys.borrow_mut().push(key.to_string());
    }

    pub(crate) fn pop_engine_key(&self) {
        self.engine_keys.borrow_mut().pop();
    }

    /// Key of the engine whose interceptor chain is currently executing
    pub fn current_engine_key(&self) -> Option<String> {
        self.engine_keys.borrow().last().cloned()
    }

    // ----- error state -----

    /// Record a failure; only the first one is kept
    pub fn record_exception(&self, err: ExError) {
        let err = err.or_request_id(&self.id);
        let mut slot = self.exception.borrow_mut();
        match slot.as_ref() {
            None => *slot = Some(err),
            Some(first) => {
                tracing::warn!(
                    context_id = %self.id,
                    first.code = first.code(),
                    err.code = err.code(),
                    err.message = err.message(),
                    "dropping secondary error, first error wins"
                );
            }
        }
    }

    pub fn has_exception(&self) -> bool {
        self.exception.borrow().is_some()
    }

    /// Copy of the recorded error, if any
    pub fn exception(&self) -> Option<ExError> {
        self.exception.borrow().clone()
    }

    /// Remove and return the recorded error
    pub fn take_exception(&self) -> Option<ExError> {
        self.exception.borrow_mut().take()
    }

    pub fn reset_exception(&self) {
        self.exception.borrow_mut().take();
    }

    // ----- result slot -----

    pub fn set_result(&self, value: CommandOutput) {
        self.results.borrow_mut().push(value);
    }

    /// Take the most recently stored result
    pub fn take_result(&self) -> Option<CommandOutput> {
        self.results.borrow_mut().pop()
    }

    // ----- attributes -----

    pub fn set_attribute<V: Any>(&self, key: impl Into<String>, value: V) {
        self.attributes
            .borrow_mut()
            .insert(key.into(), Rc::new(value));
    }

    /// Attribute value, if present and of type `V`
    pub fn attribute<V: Any>(&self, key: &str) -> Option<Rc<V>> {
        let value = self.attributes.borrow().get(key).cloned()?;
        value.downcast::<V>().ok()
    }

    pub fn has_attribute(&self, key: &str) -> bool {
        self.attributes.borrow().contains_key(key)
    }

    pub fn remove_attribute(&self, key: &str) -> bool {
        self.attributes.borrow_mut().remove(key).is_some()
    }

    // ----- sessions -----

    /// Session of type `S`, opened through its factory on first request
    ///
    /// # Errors
    ///
    /// `Configuration` if no factory is registered for `S`, `IllegalState`
    /// once the context has released its sessions, or whatever the factory
    /// returns.
    pub fn session<S: Session + 'static>(&self) -> Result<Rc<S>> {
        let session_type = SessionType::of::<S>();
        if self.state.get().sessions_released() {
            return Err(ExError::illegal_state(format!(
                "cannot open session {} after the resource context released its sessions",
                session_type
            ))
            .with_op("session")
            .with_request_id(self.id.clone()));
        }

        let existing = self.sessions.borrow().get(&session_type).cloned();
        let handle = match existing {
            Some(handle) => handle,
            None => {
                let factory = self.session_factories.get(&session_type).cloned().ok_or_else(|| {
                    ExError::configuration(format!(
                        "no session factory configured for {}",
                        session_type
                    ))
                    .with_op("session")
                })?;
                let opened = factory.open_session(self)?;
                tracing::trace!(context_id = %self.id, session = session_type.name(), "session opened");
                self.sessions
                    .borrow_mut()
                    .entry(session_type)
                    .or_insert(opened)
                    .clone()
            }
        };

        handle.downcast::<S>().ok_or_else(|| {
            ExError::illegal_state(format!(
                "session factory for {} produced a session of type {}",
                session_type,
                handle.session_type()
            ))
            .with_op("session")
        })
    }

    pub fn has_session<S: Session + 'static>(&self) -> bool {
        self.sessions
            .borrow()
            .contains_key(&SessionType::of::<S>())
    }

    pub fn open_session_count(&self) -> usize {
        self.sessions.borrow().len()
    }

    // ----- close listeners -----

    /// Register a close listener
    ///
    /// Listeners are kept sorted by ascending priority, ties in registration
    /// order. Returns `false` when the listener does not allow multiple
    /// instances per type and one of its type is already registered.
    pub fn add_close_listener<L: CloseListener + 'static>(&self, listener: L) -> bool {
        let type_id = TypeId::of::<L>();
        let mut listeners = self.close_listeners.borrow_mut();
        if !listener.allow_multiple_per_type() && listeners.iter().any(|r| r.type_id == type_id) {
            return false;
        }
        listeners.push(RegisteredListener {
            type_id,
            listener: Rc::new(listener),
        });
        // stable: equal priorities keep registration order
        listeners.sort_by_key(|r| r.listener.priority());
        true
    }

    pub fn close_listener_count(&self) -> usize {
        self.close_listeners.borrow().len()
    }

    // ----- close protocol -----

    /// Run the close protocol
    ///
    /// # Errors
    ///
    /// Returns the recorded error if the command or any close phase failed.
    /// A second call returns `IllegalState` without touching sessions or
    /// listeners.
    pub fn close(&self) -> Result<()> {
        if self.state.get() != CloseState::Open {
            return Err(ExError::illegal_state("resource context is already closed")
                .with_op("close")
                .with_request_id(self.id.clone()));
        }

        self.transition(CloseState::Closing, PHASE_CLOSING);
        self.notify_listeners(PHASE_CLOSING, |l, ctx| l.closing(ctx));

        if self.has_exception() {
            self.transition(CloseState::FlushSkipped, PHASE_FLUSH);
        } else {
            self.flush_sessions();
            self.transition(CloseState::Flushed, PHASE_FLUSH);
        }

        if self.has_exception() {
            self.transition(CloseState::AfterFlushSkipped, PHASE_AFTER_SESSION_FLUSH);
        } else {
            self.notify_listeners(PHASE_AFTER_SESSION_FLUSH, |l, ctx| {
                l.after_session_flush(ctx)
            });
            self.transition(CloseState::AfterFlushOk, PHASE_AFTER_SESSION_FLUSH);
        }

        self.close_sessions();
        self.transition(CloseState::SessionsClosed, PHASE_CLOSE_SESSIONS);

        if self.has_exception() {
            self.transition(CloseState::CloseFailed, PHASE_CLOSE_FAILURE);
            self.notify_listeners(PHASE_CLOSE_FAILURE, |l, ctx| l.close_failure(ctx));
        } else {
            self.transition(CloseState::Closed, PHASE_CLOSED);
            self.notify_listeners(PHASE_CLOSED, |l, ctx| l.closed(ctx));
        }

        match self.exception() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn transition(&self, next: CloseState, phase: &'static str) {
        tracing::trace!(
            context_id = %self.id,
            phase,
            from = ?self.state.get(),
            to = ?next,
            "close protocol"
        );
        self.state.set(next);
    }

    fn notify_listeners<F>(&self, phase: &'static str, hook: F)
    where
        F: Fn(&dyn CloseListener, &ResourceContext) -> Result<()>,
    {
        let listeners: Vec<Rc<dyn CloseListener>> = self
            .close_listeners
            .borrow()
            .iter()
            .map(|r| r.listener.clone())
            .collect();
        for listener in listeners {
            if let Err(err) = guarded(phase, || hook(listener.as_ref(), self)) {
                self.record_exception(err);
            }
        }
    }

    fn open_sessions(&self) -> Vec<Rc<dyn Session>> {
        self.sessions
            .borrow()
            .values()
            .map(|h| h.session().clone())
            .collect()
    }

    // Stops at the first failing session: flushing the rest would persist
    // partially-failed state.
    fn flush_sessions(&self) {
        for session in self.open_sessions() {
            if let Err(err) = guarded(PHASE_FLUSH, || session.flush()) {
                self.record_exception(err);
                return;
            }
        }
    }

    fn close_sessions(&self) {
        let sessions = std::mem::take(&mut *self.sessions.borrow_mut());
        for handle in sessions.into_values() {
            let session = handle.session().clone();
            if let Err(err) = guarded(PHASE_CLOSE_SESSIONS, || session.close()) {
                self.record_exception(err);
            }
        }
    }
}

/// Run collaborator code, turning a panic into a `ClosePhase` error
fn guarded<F>(phase: &'static str, f: F) -> Result<()>
where
    F: FnOnce() -> Result<()>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(ExError::new(ExErrorKind::ClosePhase)
            .with_op(phase)
            .with_message(format!("panic in {} phase", phase))
            .with_source(ExError::from_panic(payload))),
    }
}

impl fmt::Debug for ResourceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceContext")
            .field("id", &self.id)
            .field("command", &self.command_name)
            .field("state", &self.state.get())
            .field("reused", &self.reused.get())
            .field("has_exception", &self.has_exception())
            .field("sessions", &self.open_session_count())
            .field("close_listeners", &self.close_listener_count())
            .finish()
    }
}
