//! Player configuration

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Player configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Buffered seconds required before a stalled stream resumes on its own
    pub minimum_buffer_duration: f64,
    /// Cadence of current-time notifications (milliseconds)
    pub interval_of_time_observation: u64,
    /// Restart from the beginning when the item plays to its end
    pub repeat_playback: bool,
    /// Keep the display attached in the background for picture-in-picture
    pub allows_picture_in_picture_playback: bool,
    /// Volume applied to every new player (0.0 - 1.0)
    pub volume: f32,
    /// Mute state applied to every new player
    pub muted: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            minimum_buffer_duration: 5.0,
            interval_of_time_observation: 500,
            repeat_playback: false,
            allows_picture_in_picture_playback: true,
            volume: 1.0,
            muted: false,
        }
    }
}

impl PlayerConfig {
    /// Parse a configuration from JSON, filling omitted fields with defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: PlayerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every field is within its accepted range
    pub fn validate(&self) -> Result<()> {
        if !self.minimum_buffer_duration.is_finite() || self.minimum_buffer_duration < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "minimum_buffer_duration must be a non-negative number of seconds, got {}",
                self.minimum_buffer_duration
            )));
        }

        if self.interval_of_time_observation == 0 {
            return Err(Error::InvalidConfig(
                "interval_of_time_observation must be at least 1 ms".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.volume) {
            return Err(Error::InvalidConfig(format!(
                "volume must be within 0.0..=1.0, got {}",
                self.volume
            )));
        }

        Ok(())
    }

    /// Time observation interval as a `Duration`
    pub fn time_observation_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.interval_of_time_observation)
    }
}
