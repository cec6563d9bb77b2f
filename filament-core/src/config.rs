//! Runtime Configuration
//!
//! Process-wide knobs shared by every thread's reactive runtime. The
//! configuration is read on each flush and each effect creation, so changes
//! made with [`configure`] apply to subsequent work immediately.
//!
//! # Example
//!
//! ```rust
//! use filament_core::config::{configure, RuntimeConfig};
//!
//! let cfg = RuntimeConfig::from_json(r#"{ "max_flush_epochs": 32 }"#).unwrap();
//! configure(cfg);
//! ```

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::ReactiveError;

/// Default cap on flush epochs before a cycle is reported.
pub const DEFAULT_MAX_FLUSH_EPOCHS: usize = 100;

/// Tunable runtime policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// How many flush epochs may run back to back before the scheduler gives
    /// up with [`ReactiveError::CyclicUpdate`].
    pub max_flush_epochs: usize,

    /// Emit a warning when an effect is created with no owner and therefore
    /// becomes its own root.
    pub warn_on_implicit_root: bool,

    /// Catch panics escaping effect bodies and cleanups and report them
    /// instead of unwinding through the flush loop.
    pub catch_effect_panics: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_flush_epochs: DEFAULT_MAX_FLUSH_EPOCHS,
            warn_on_implicit_root: true,
            catch_effect_panics: true,
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ReactiveError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ReactiveError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the values are usable.
    pub fn validate(&self) -> Result<(), ReactiveError> {
        if self.max_flush_epochs == 0 {
            return Err(ReactiveError::Config(
                "max_flush_epochs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

static CONFIG: RwLock<RuntimeConfig> = RwLock::new(RuntimeConfig {
    max_flush_epochs: DEFAULT_MAX_FLUSH_EPOCHS,
    warn_on_implicit_root: true,
    catch_effect_panics: true,
});

/// Install a new process-wide configuration.
pub fn configure(config: RuntimeConfig) {
    *CONFIG.write() = config;
}

/// Snapshot of the current configuration.
pub fn config() -> RuntimeConfig {
    CONFIG.read().clone()
}
