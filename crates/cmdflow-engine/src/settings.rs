//! Engine settings document
//!
//! ```json
//! {
//!   "name": "orders",
//!   "default_config": { "context_reuse_possible": true, "propagation": "REQUIRED" },
//!   "verbose": false,
//!   "profile": "production"
//! }
//! ```
//!
//! Everything but `name` is optional.

use cmdflow_core::errors::ConfigError;
use cmdflow_core::logging_facility::{self, Profile};
use cmdflow_core::CommandConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    pub name: String,
    #[serde(default)]
    pub default_config: CommandConfig,
    /// Log every command at DEBUG regardless of `profile`
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub profile: Profile,
}

impl EngineSettings {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_config: CommandConfig::default(),
            verbose: false,
            profile: Profile::default(),
        }
    }

    /// # Errors
    ///
    /// `InvalidSettings` for malformed JSON, a missing name or an unknown
    /// propagation value.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::InvalidSettings {
            reason: e.to_string(),
        })
    }

    /// # Errors
    ///
    /// `InvalidSettings` if serialization fails.
    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::InvalidSettings {
            reason: e.to_string(),
        })
    }

    /// Profile the logging facility should be initialised with
    pub fn logging_profile(&self) -> Profile {
        if self.verbose {
            Profile::Development
        } else {
            self.profile
        }
    }

    /// Initialise the logging facility from these settings (first call wins)
    pub fn init_logging(&self) {
        logging_facility::init(self.logging_profile());
    }
}
