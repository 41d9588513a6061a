//! Per-invocation command configuration
//!
//! A `CommandConfig` is built once per call site and never mutated; the
//! `with_*` methods return a new value.

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Transactional relationship a command requests with an already-active
/// transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Propagation {
    /// Join the active transaction, or start one if none is active
    #[default]
    Required,
    /// Always start a fresh transaction, suspending any active one
    RequiresNew,
    /// Run outside of any transaction
    NotSupported,
}

impl Propagation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Propagation::Required => "REQUIRED",
            Propagation::RequiresNew => "REQUIRES_NEW",
            Propagation::NotSupported => "NOT_SUPPORTED",
        }
    }
}

impl fmt::Display for Propagation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Propagation {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "REQUIRED" => Ok(Propagation::Required),
            "REQUIRES_NEW" => Ok(Propagation::RequiresNew),
            "NOT_SUPPORTED" => Ok(Propagation::NotSupported),
            other => Err(ConfigError::UnsupportedPropagation {
                value: other.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for Propagation {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Propagation> for String {
    fn from(p: Propagation) -> Self {
        p.as_str().to_string()
    }
}

/// Immutable settings for one command invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    context_reuse_possible: bool,
    propagation: Propagation,
}

impl CommandConfig {
    pub fn new(context_reuse_possible: bool, propagation: Propagation) -> Self {
        Self {
            context_reuse_possible,
            propagation,
        }
    }

    /// Whether a nested invocation may run inside the caller's resource context
    pub fn is_context_reuse_possible(&self) -> bool {
        self.context_reuse_possible
    }

    pub fn propagation(&self) -> Propagation {
        self.propagation
    }

    pub fn with_context_reuse_possible(self, context_reuse_possible: bool) -> Self {
        Self {
            context_reuse_possible,
            ..self
        }
    }

    pub fn with_propagation(self, propagation: Propagation) -> Self {
        Self {
            propagation,
            ..self
        }
    }

    /// Config that forces a fresh resource context
    pub fn with_new_context(self) -> Self {
        self.with_context_reuse_possible(false)
    }

    /// Config that runs outside any transaction
    pub fn transactions_not_supported(self) -> Self {
        self.with_propagation(Propagation::NotSupported)
    }

    /// Config that always starts a fresh transaction
    pub fn transaction_requires_new(self) -> Self {
        self.with_propagation(Propagation::RequiresNew)
    }
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self::new(true, Propagation::Required)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CommandConfig::default();
        assert!(config.is_context_reuse_possible());
        assert_eq!(config.propagation(), Propagation::Required);
    }

    #[test]
    fn test_with_methods_do_not_touch_original() {
        let base = CommandConfig::default();
        let derived = base.with_new_context().transaction_requires_new();

        assert!(base.is_context_reuse_possible());
        assert_eq!(base.propagation(), Propagation::Required);
        assert!(!derived.is_context_reuse_possible());
        assert_eq!(derived.propagation(), Propagation::RequiresNew);
    }

    #[test]
    fn test_propagation_parse() {
        assert_eq!("REQUIRED".parse::<Propagation>(), Ok(Propagation::Required));
        assert_eq!(
            "NOT_SUPPORTED".parse::<Propagation>(),
            Ok(Propagation::NotSupported)
        );
        assert_eq!(
            "MANDATORY".parse::<Propagation>(),
            Err(ConfigError::UnsupportedPropagation {
                value: "MANDATORY".to_string()
            })
        );
    }

    #[test]
    fn test_config_json_shape() {
        let config: CommandConfig =
            serde_json::from_str(r#"{"context_reuse_possible":false,"propagation":"REQUIRES_NEW"}"#)
                .unwrap();
        assert_eq!(
            config,
            CommandConfig::new(false, Propagation::RequiresNew)
        );

        // missing fields fall back to defaults
        let partial: CommandConfig = serde_json::from_str(r#"{"propagation":"NOT_SUPPORTED"}"#).unwrap();
        assert!(partial.is_context_reuse_possible());
        assert_eq!(partial.propagation(), Propagation::NotSupported);
    }

    #[test]
    fn test_unknown_propagation_rejected_by_serde() {
        let result: std::result::Result<CommandConfig, _> =
            serde_json::from_str(r#"{"propagation":"NESTED"}"#);
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Unsupported transaction propagation: NESTED"));
    }
}
