//! Runtime configuration
//!
//! Every tunable of the pipeline lives here. Defaults reproduce the behavior of
//! the deployed application; a decision threshold is only applied when the
//! caller supplies one.

use crate::error::AuthError;
use crate::window::DEFAULT_WINDOW_CAPACITY;
use serde::{Deserialize, Serialize};

/// Default number of enrollment trials
pub const DEFAULT_ENROLLMENT_TRIALS: usize = 20;

/// Default number of verification vectors averaged together
pub const DEFAULT_AUTHENTICATION_WINDOW: usize = 20;

/// Default per-stream ingestion queue depth
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Upper bound on samples kept per stream and phase
pub const MAX_WINDOW_CAPACITY: usize = 4096;

/// Upper bound on enrollment trials and on the verification window
pub const MAX_AGGREGATE_LEN: usize = 4096;

/// Upper bound on the per-stream ingestion queue depth
pub const MAX_CHANNEL_CAPACITY: usize = 65_536;

/// Key under which the enrolled embedding is persisted
pub const DEFAULT_CREDENTIAL_KEY: &str = "EnrolledEmbedding";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Samples kept per stream and phase
    pub window_capacity: usize,
    /// Trials averaged into one enrollment
    pub enrollment_trials: usize,
    /// Verification vectors kept in the rolling window
    pub authentication_window: usize,
    /// Lower bound applied to features before inference
    pub clamp_min: f32,
    /// Upper bound applied to features before inference
    pub clamp_max: f32,
    /// Pending samples buffered per stream before producers are shed
    pub channel_capacity: usize,
    /// Storage key of the enrolled embedding
    pub credential_key: String,
    /// Distance below which a verification counts as genuine
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision_threshold: Option<f32>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            enrollment_trials: DEFAULT_ENROLLMENT_TRIALS,
            authentication_window: DEFAULT_AUTHENTICATION_WINDOW,
            clamp_min: -10.0,
            clamp_max: 10.0,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            credential_key: DEFAULT_CREDENTIAL_KEY.to_string(),
            decision_threshold: None,
        }
    }
}

impl AuthConfig {
    /// Check that every field is usable
    pub fn validate(&self) -> Result<(), AuthError> {
        check_range("window_capacity", self.window_capacity, MAX_WINDOW_CAPACITY)?;
        check_range("enrollment_trials", self.enrollment_trials, MAX_AGGREGATE_LEN)?;
        check_range("authentication_window", self.authentication_window, MAX_AGGREGATE_LEN)?;
        check_range("channel_capacity", self.channel_capacity, MAX_CHANNEL_CAPACITY)?;
        if !(self.clamp_min.is_finite() && self.clamp_max.is_finite())
            || self.clamp_min > self.clamp_max
        {
            return Err(AuthError::InvalidConfig(format!(
                "clamp range [{}, {}] is invalid",
                self.clamp_min, self.clamp_max
            )));
        }
        if let Some(threshold) = self.decision_threshold {
            if !threshold.is_finite() || threshold < 0.0 {
                return Err(AuthError::InvalidConfig(format!(
                    "decision_threshold {threshold} must be a non-negative number"
                )));
            }
        }
        if self.credential_key.is_empty() {
            return Err(AuthError::InvalidConfig(
                "credential_key must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Load and validate a configuration from JSON; missing fields take defaults
    pub fn from_json(json: &str) -> Result<Self, AuthError> {
        let config: AuthConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn check_range(field: &str, value: usize, max: usize) -> Result<(), AuthError> {
    if value == 0 || value > max {
        return Err(AuthError::InvalidConfig(format!(
            "{field} must be between 1 and {max}, got {value}"
        )));
    }
    Ok(())
}
