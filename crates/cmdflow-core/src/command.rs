//! Command abstraction
//!
//! A command is a typed unit of work run by the pipeline against the
//! current [`ResourceContext`]. Inside the interceptor chain the value type
//! is erased to [`CommandOutput`]; the executor restores it on the way out.

use crate::errors::Result;
use crate::resource_context::ResourceContext;
use std::any::Any;
use std::fmt;

/// Command value as it travels back up the interceptor chain
pub type CommandOutput = Box<dyn Any>;

/// Unit of work executed through the pipeline
///
/// Closures of shape `Fn(&ResourceContext) -> Result<T>` are commands too.
///
/// # Example
///
/// ```
/// use cmdflow_core::{Command, ResourceContext, Result};
///
/// struct CountDefinitions;
///
/// impl Command<usize> for CountDefinitions {
///     fn execute(&self, _ctx: &ResourceContext) -> Result<usize> {
///         Ok(3)
///     }
/// }
///
/// assert_eq!(CountDefinitions.name(), "CountDefinitions");
/// ```
pub trait Command<T> {
    /// Run the command
    ///
    /// # Errors
    ///
    /// Any error is recorded on the resource context and drives the close
    /// protocol onto its failure path.
    fn execute(&self, ctx: &ResourceContext) -> Result<T>;

    /// Short name used in logs and error context
    fn name(&self) -> &'static str {
        short_type_name(std::any::type_name::<Self>())
    }
}

impl<T, F> Command<T> for F
where
    F: Fn(&ResourceContext) -> Result<T>,
{
    fn execute(&self, ctx: &ResourceContext) -> Result<T> {
        self(ctx)
    }
}

fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Command with its value type erased, as seen by interceptors
pub struct ErasedCommand<'a> {
    name: &'static str,
    run: &'a dyn Fn(&ResourceContext) -> Result<CommandOutput>,
}

impl<'a> ErasedCommand<'a> {
    pub fn new(
        name: &'static str,
        run: &'a dyn Fn(&ResourceContext) -> Result<CommandOutput>,
    ) -> Self {
        Self { name, run }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// # Errors
    ///
    /// Returns whatever the underlying command returns.
    pub fn execute(&self, ctx: &ResourceContext) -> Result<CommandOutput> {
        (self.run)(ctx)
    }
}

impl fmt::Debug for ErasedCommand<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErasedCommand")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
