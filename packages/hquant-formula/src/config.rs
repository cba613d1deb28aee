use serde::Deserialize;

use crate::error::ConfigError;

/// Per-session settings.
///
/// ```json
/// { "max_errors": 16, "series_capacity": 4096 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Parsing stops once this many errors were reported, whatever the handler says.
    pub max_errors: usize,
    /// Capacity hint for series buffers created by the session's quote helpers.
    pub series_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_errors: 100,
            series_capacity: 1024,
        }
    }
}

impl SessionConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let cfg: SessionConfig = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_errors == 0 {
            return Err(ConfigError::Invalid("max_errors must be > 0".into()));
        }
        Ok(())
    }
}
