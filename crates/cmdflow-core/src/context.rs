//! Thread-local context stacks
//!
//! Each thread carries a stack of resource contexts and a stack of
//! transaction contexts. Pushing returns a guard that pops on drop, so the
//! stack depth always equals the command nesting depth on the thread, on
//! early return and on unwind alike. A reused resource context is pushed
//! once per nested invocation.
//!
//! ```
//! use cmdflow_core::context;
//!
//! assert!(context::resource_context().is_none());
//! assert_eq!(context::resource_context_depth(), 0);
//! assert!(!context::is_transaction_context_active());
//! ```

use crate::resource_context::ResourceContext;
use crate::transaction::TransactionContext;
use std::cell::RefCell;
use std::marker::PhantomData;
use std::rc::Rc;

thread_local! {
    static RESOURCE_CONTEXTS: RefCell<Vec<Rc<ResourceContext>>> = const { RefCell::new(Vec::new()) };
    static TRANSACTION_CONTEXTS: RefCell<Vec<Rc<dyn TransactionContext>>> = const { RefCell::new(Vec::new()) };
}

/// Resource context on top of this thread's stack
pub fn resource_context() -> Option<Rc<ResourceContext>> {
    RESOURCE_CONTEXTS.with(|stack| stack.borrow().last().cloned())
}

pub fn resource_context_depth() -> usize {
    RESOURCE_CONTEXTS.with(|stack| stack.borrow().len())
}

/// Push `ctx`; it is popped when the returned guard drops
pub fn push_resource_context(ctx: Rc<ResourceContext>) -> ResourceContextGuard {
    RESOURCE_CONTEXTS.with(|stack| stack.borrow_mut().push(ctx));
    ResourceContextGuard {
        _thread_bound: PhantomData,
    }
}

/// Pops the resource context stack on drop
#[must_use = "the context is popped as soon as the guard is dropped"]
pub struct ResourceContextGuard {
    _thread_bound: PhantomData<*const ()>,
}

impl Drop for ResourceContextGuard {
    fn drop(&mut self) {
        // try_with: the thread-local may already be gone during thread teardown
        let _ = RESOURCE_CONTEXTS.try_with(|stack| stack.borrow_mut().pop());
    }
}

/// Transaction context on top of this thread's stack
pub fn transaction_context() -> Option<Rc<dyn TransactionContext>> {
    TRANSACTION_CONTEXTS.with(|stack| stack.borrow().last().cloned())
}

pub fn is_transaction_context_active() -> bool {
    TRANSACTION_CONTEXTS.with(|stack| !stack.borrow().is_empty())
}

pub fn transaction_context_depth() -> usize {
    TRANSACTION_CONTEXTS.with(|stack| stack.borrow().len())
}

/// Push `tx`; it is popped when the returned guard drops
pub fn push_transaction_context(tx: Rc<dyn TransactionContext>) -> TransactionContextGuard {
    TRANSACTION_CONTEXTS.with(|stack| stack.borrow_mut().push(tx));
    TransactionContextGuard {
        _thread_bound: PhantomData,
    }
}

/// Pops the transaction context stack on drop
#[must_use = "the transaction context is popped as soon as the guard is dropped"]
pub struct TransactionContextGuard {
    _thread_bound: PhantomData<*const ()>,
}

impl Drop for TransactionContextGuard {
    fn drop(&mut self) {
        let _ = TRANSACTION_CONTEXTS.try_with(|stack| stack.borrow_mut().pop());
    }
}
