use std::{env, path::PathBuf, time::Duration};

use thiserror::Error;

pub const MODEL_DIR_ENV: &str = "GESTURE_SCROLL_MODEL_DIR";
pub const COOLDOWN_ENV: &str = "GESTURE_SCROLL_COOLDOWN_MS";
pub const MIN_CONFIDENCE_ENV: &str = "GESTURE_SCROLL_MIN_CONFIDENCE";
pub const MAX_HANDS_ENV: &str = "GESTURE_SCROLL_MAX_HANDS";

const DEFAULT_COOLDOWN: Duration = Duration::from_millis(3_000);
const DEFAULT_MIN_HAND_CONFIDENCE: f32 = 0.2;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{var} must be a non-negative integer number of milliseconds, got {value:?}")]
    InvalidCooldown { var: &'static str, value: String },
    #[error("{var} must be a number between 0 and 1, got {value:?}")]
    InvalidConfidence { var: &'static str, value: String },
    #[error("{var} must be a positive integer, got {value:?}")]
    InvalidMaxHands { var: &'static str, value: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub model_dir: PathBuf,
    /// How long an emitted gesture suppresses the next one.
    pub cooldown: Duration,
    /// Hands scoring below this are treated as not detected.
    pub min_hand_confidence: f32,
    pub max_hands: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            cooldown: DEFAULT_COOLDOWN,
            min_hand_confidence: DEFAULT_MIN_HAND_CONFIDENCE,
            max_hands: 1,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(dir) = lookup(MODEL_DIR_ENV).filter(|v| !v.trim().is_empty()) {
            cfg.model_dir = PathBuf::from(dir.trim());
        }

        if let Some(raw) = lookup(COOLDOWN_ENV) {
            let ms = raw
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidCooldown {
                    var: COOLDOWN_ENV,
                    value: raw.clone(),
                })?;
            cfg.cooldown = Duration::from_millis(ms);
        }

        if let Some(raw) = lookup(MIN_CONFIDENCE_ENV) {
            let value = raw
                .trim()
                .parse::<f32>()
                .ok()
                .filter(|v| (0.0..=1.0).contains(v))
                .ok_or_else(|| ConfigError::InvalidConfidence {
                    var: MIN_CONFIDENCE_ENV,
                    value: raw.clone(),
                })?;
            cfg.min_hand_confidence = value;
        }

        if let Some(raw) = lookup(MAX_HANDS_ENV) {
            let value = raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|v| *v >= 1)
                .ok_or_else(|| ConfigError::InvalidMaxHands {
                    var: MAX_HANDS_ENV,
                    value: raw.clone(),
                })?;
            cfg.max_hands = value;
        }

        Ok(cfg)
    }
}
