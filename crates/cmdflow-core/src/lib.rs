//! cmdflow core - command execution pipeline
//!
//! This crate provides the pieces a command runs through:
//! - `CommandExecutor` and the immutable interceptor chain
//! - `ResourceContext` with lazily opened sessions, attributes, close
//!   listeners and a multi-phase close protocol
//! - Thread-local resource and transaction context stacks
//! - Transaction boundaries bound to the resource context lifecycle
//! - Canonical `ExError` error facility and structured logging
//!
//! # Example
//!
//! ```
//! use cmdflow_core::interceptor::{CommandInvoker, InterceptorChain, ResourceContextInterceptor};
//! use cmdflow_core::{CommandConfig, CommandExecutor, ResourceContext, Result};
//!
//! let chain = InterceptorChain::new(vec![
//!     Box::new(ResourceContextInterceptor::default()),
//!     Box::new(CommandInvoker),
//! ])
//! .unwrap();
//! let executor = CommandExecutor::new(CommandConfig::default(), chain);
//!
//! let value = executor
//!     .execute(&|_ctx: &ResourceContext| -> Result<u32> { Ok(7) })
//!     .unwrap();
//! assert_eq!(value, 7);
//! ```

pub mod clock;
pub mod command;
pub mod config;
pub mod context;
pub mod errors;
pub mod executor;
pub mod interceptor;
pub mod logging_facility;
pub mod resource_context;
pub mod session;
pub mod transaction;

// Used by the logging macros
pub use cmdflow_core_types;

// Re-export commonly used types
pub use clock::{Clock, FixedClock, SystemClock};
pub use command::{Command, CommandOutput};
pub use config::{CommandConfig, Propagation};
pub use errors::{ConfigError, ExError, ExErrorKind, Result};
pub use executor::CommandExecutor;
pub use interceptor::{CommandInterceptor, InterceptorChain};
pub use resource_context::{CloseListener, CloseState, ResourceContext, ResourceContextFactory};
pub use session::{Session, SessionFactories, SessionFactory};
pub use transaction::{TransactionContext, TransactionContextFactory, TransactionState};
