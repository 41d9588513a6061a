//! cmdflow engine - assembly layer
//!
//! Turns a set of collaborators (session factories, transaction factory,
//! platform transaction manager, custom interceptors) into a named
//! [`Engine`] with a ready-to-use command executor.

pub mod configuration;
pub mod engine;
pub mod registry;
pub mod settings;

pub use configuration::EngineConfiguration;
pub use engine::{Engine, EngineLifecycleListener};
pub use registry::EngineRegistry;
pub use settings::EngineSettings;
