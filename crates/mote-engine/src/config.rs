//! Engine configuration.
//!
//! ```
//! use mote_engine::config::EngineConfig;
//!
//! let config = EngineConfig::from_json_str(r#"{ "seed": 7, "max_frames": 600 }"#).unwrap();
//! assert_eq!(config.seed, Some(7));
//! assert_eq!(config.target_fps, 60.0);
//! ```

use serde::{Deserialize, Serialize};

use mote_ecs::rng::DEFAULT_UID_LENGTH;

use crate::EngineError;

/// Configuration for an [`Engine`](crate::tick::Engine).
///
/// Every field has a default, so a partial JSON document is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Seed for the world's random generator. `None` seeds from entropy.
    pub seed: Option<u64>,
    /// Length of generated entity aliases. Must be non-zero.
    pub uid_length: usize,
    /// Frame rate wall-clock frame sources pace to. Must be positive and
    /// finite.
    pub target_fps: f64,
    /// Stop pumping after this many frames in total.
    pub max_frames: Option<u64>,
}

impl Default for EngineConfig {
    /// Entropy-seeded, 16-character aliases, 60 fps, unbounded.
    fn default() -> Self {
        Self {
            seed: None,
            uid_length: DEFAULT_UID_LENGTH,
            target_fps: 60.0,
            max_frames: None,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
        let config: Self = serde_json::from_str(json).map_err(|e| EngineError::MalformedConfig {
            details: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.target_fps > 0.0 && self.target_fps.is_finite()) {
            return Err(EngineError::InvalidConfig {
                details: format!("target_fps must be positive and finite, got {}", self.target_fps),
            });
        }
        if self.uid_length == 0 {
            return Err(EngineError::InvalidConfig {
                details: "uid_length must be non-zero".to_owned(),
            });
        }
        Ok(())
    }

    /// Milliseconds per frame at [`target_fps`](Self::target_fps).
    pub fn frame_interval_ms(&self) -> f64 {
        1000.0 / self.target_fps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert!((config.frame_interval_ms() - 1000.0 / 60.0).abs() < f64::EPSILON);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config = EngineConfig::from_json_str(r#"{"uid_length": 8}"#).unwrap();
        assert_eq!(config.uid_length, 8);
        assert_eq!(config.seed, None);
        assert_eq!(config.max_frames, None);
    }

    #[test]
    fn rejects_bad_values() {
        for json in [r#"{"target_fps": 0}"#, r#"{"target_fps": -30}"#, r#"{"uid_length": 0}"#] {
            assert!(
                matches!(EngineConfig::from_json_str(json), Err(EngineError::InvalidConfig { .. })),
                "{json} should be rejected"
            );
        }
        let infinite = EngineConfig {
            target_fps: f64::INFINITY,
            ..Default::default()
        };
        assert!(infinite.validate().is_err());
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            EngineConfig::from_json_str("{ seed: "),
            Err(EngineError::MalformedConfig { .. })
        ));
        assert!(matches!(
            EngineConfig::from_json_str(r#"{"seed": "seven"}"#),
            Err(EngineError::MalformedConfig { .. })
        ));
    }
}
