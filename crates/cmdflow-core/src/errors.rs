use cmdflow_core_types::RequestId;
use std::any::Any;
use std::sync::Arc;
use thiserror::Error;

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Every failure that crosses the pipeline boundary is an [`ExError`] with
/// one of these kinds. Kinds raised by commands (`IllegalArgument`,
/// `NotFound`) pass through the pipeline unchanged; anything the pipeline
/// did not expect is surfaced as `Engine` with the original kept as cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Generic wrapper
    Engine,

    // Raised by collaborator commands
    IllegalArgument,
    NotFound,

    // Close protocol
    /// A close listener hook or a session flush/close failed
    ClosePhase,

    // Transaction boundary
    /// Commit or rollback of a transaction context or platform transaction failed
    Transaction,

    // Programming errors
    /// The pipeline was used in a way its protocol forbids (double close, no active context)
    IllegalState,

    // Assembly
    Configuration,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::Engine => "ERR_ENGINE",
            ExErrorKind::IllegalArgument => "ERR_ILLEGAL_ARGUMENT",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::ClosePhase => "ERR_CLOSE_PHASE",
            ExErrorKind::Transaction => "ERR_TRANSACTION",
            ExErrorKind::IllegalState => "ERR_ILLEGAL_STATE",
            ExErrorKind::Configuration => "ERR_CONFIGURATION",
        }
    }
}

/// Canonical structured error type
///
/// Cloneable so a resource context can hand out its recorded error for
/// inspection while still owning it.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    command: Option<String>,
    request_id: Option<RequestId>,
    message: String,
    source: Option<Box<ExError>>,
    cause: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            command: None,
            request_id: None,
            message: String::new(),
            source: None,
            cause: None,
        }
    }

    /// Generic engine error with a message
    pub fn engine(message: impl Into<String>) -> Self {
        Self::new(ExErrorKind::Engine).with_message(message)
    }

    pub fn illegal_argument(message: impl Into<String>) -> Self {
        Self::new(ExErrorKind::IllegalArgument).with_message(message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ExErrorKind::NotFound).with_message(message)
    }

    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::new(ExErrorKind::IllegalState).with_message(message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ExErrorKind::Configuration).with_message(message)
    }

    /// Wrap a foreign error as an `Engine` error, keeping it as the cause
    pub fn wrap<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::new(ExErrorKind::Engine)
            .with_message(err.to_string())
            .with_cause(err)
    }

    /// Convert a caught panic payload into an `Engine` error
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let detail = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::engine(format!("panic during command execution: {}", detail))
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add the name of the command that was executing
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    /// Add request ID context
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Add a foreign cause
    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(cause));
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Get the operation context, if any
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// Get the command name, if any
    pub fn command(&self) -> Option<&str> {
        self.command.as_deref()
    }

    /// Get the request ID context, if any
    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the source error, if any
    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }

    /// Get the foreign cause, if any
    pub fn cause(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    /// Tag the error with the request it failed under, unless already tagged
    pub(crate) fn or_request_id(mut self, request_id: &RequestId) -> Self {
        if self.request_id.is_none() {
            self.request_id = Some(request_id.clone());
        }
        self
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(command) = &self.command {
            write!(f, " (command: {})", command)?;
        }
        if let Some(request_id) = &self.request_id {
            write!(f, " (request_id: {})", request_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        if let Some(cause) = &self.cause {
            return Some(cause.as_ref());
        }
        self.source
            .as_deref()
            .map(|s| s as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Assembly and configuration failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Propagation value outside REQUIRED / REQUIRES_NEW / NOT_SUPPORTED
    #[error("Unsupported transaction propagation: {value}")]
    UnsupportedPropagation { value: String },

    /// Settings document could not be parsed
    #[error("Invalid engine settings: {reason}")]
    InvalidSettings { reason: String },

    /// Interceptor chain has no elements
    #[error("Interceptor chain is empty")]
    EmptyChain,

    /// Chain does not end with a terminal interceptor
    #[error("Interceptor chain must end with a command invoker")]
    MissingInvoker,

    /// A terminal interceptor was given a successor
    #[error("Command invoker at position {position} must be the last interceptor in the chain")]
    InvokerNotLast { position: usize },

    /// Two session factories claim the same session type
    #[error("Session factory already registered for {session_type}")]
    DuplicateSessionFactory { session_type: String },
}

impl From<ConfigError> for ExError {
    fn from(err: ConfigError) -> Self {
        ExError::new(ExErrorKind::Configuration)
            .with_op("configure")
            .with_message(err.to_string())
    }
}
