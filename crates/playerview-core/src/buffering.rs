//! Buffering policy - automatic resume after a stall
//!
//! Watches the earliest buffered range and asks for playback to resume
//! once a stalled stream has buffered enough. At most one resume is issued
//! per stall.

use crate::types::PlaybackStatus;

/// Outcome of evaluating a buffered-range change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferDecision {
    /// Issue play on the current player
    Resume,
    /// Leave transport untouched
    Hold,
}

/// Auto-resume policy for stalled playback
#[derive(Debug, Clone)]
pub struct BufferingPolicy {
    /// Required buffered seconds before resuming
    minimum_buffer_duration: f64,
    /// A resume was issued for the current stall and is awaiting confirmation
    resume_requested: bool,
}

impl BufferingPolicy {
    pub fn new(minimum_buffer_duration: f64) -> Self {
        Self {
            minimum_buffer_duration,
            resume_requested: false,
        }
    }

    pub fn minimum_buffer_duration(&self) -> f64 {
        self.minimum_buffer_duration
    }

    pub fn set_minimum_buffer_duration(&mut self, seconds: f64) {
        self.minimum_buffer_duration = seconds;
    }

    pub fn is_resume_pending(&self) -> bool {
        self.resume_requested
    }

    /// Evaluate a buffered-range change against the current transport status
    pub fn evaluate(&mut self, status: PlaybackStatus, range_duration: Option<f64>) -> BufferDecision {
        if status != PlaybackStatus::Stalled || self.resume_requested {
            return BufferDecision::Hold;
        }

        match range_duration {
            Some(buffered) if buffered >= self.minimum_buffer_duration => {
                self.resume_requested = true;
                BufferDecision::Resume
            }
            _ => BufferDecision::Hold,
        }
    }

    /// Any transport transition ends the current stall episode
    pub fn on_playback_status_changed(&mut self) {
        self.resume_requested = false;
    }

    pub fn reset(&mut self) {
        self.resume_requested = false;
    }
}

impl Default for BufferingPolicy {
    fn default() -> Self {
        Self::new(5.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resume_when_stalled_and_buffered() {
        let mut policy = BufferingPolicy::new(5.0);
        assert_eq!(policy.evaluate(PlaybackStatus::Stalled, Some(6.0)), BufferDecision::Resume);
        assert!(policy.is_resume_pending());
    }

    #[test]
    fn test_hold_below_threshold() {
        let mut policy = BufferingPolicy::new(5.0);
        assert_eq!(policy.evaluate(PlaybackStatus::Stalled, Some(4.9)), BufferDecision::Hold);
        assert_eq!(policy.evaluate(PlaybackStatus::Stalled, None), BufferDecision::Hold);
        // Threshold is inclusive
        assert_eq!(policy.evaluate(PlaybackStatus::Stalled, Some(5.0)), BufferDecision::Resume);
    }

    #[test]
    fn test_hold_unless_stalled() {
        let mut policy = BufferingPolicy::new(5.0);
        for status in [
            PlaybackStatus::Unstarted,
            PlaybackStatus::Playing,
            PlaybackStatus::Paused,
            PlaybackStatus::Ended,
        ] {
            assert_eq!(policy.evaluate(status, Some(60.0)), BufferDecision::Hold);
        }
    }

    #[test]
    fn test_single_resume_per_stall() {
        let mut policy = BufferingPolicy::new(5.0);
        assert_eq!(policy.evaluate(PlaybackStatus::Stalled, Some(6.0)), BufferDecision::Resume);
        assert_eq!(policy.evaluate(PlaybackStatus::Stalled, Some(7.0)), BufferDecision::Hold);

        // Playback confirmed, then a new stall
        policy.on_playback_status_changed();
        assert_eq!(policy.evaluate(PlaybackStatus::Playing, Some(8.0)), BufferDecision::Hold);
        policy.on_playback_status_changed();
        assert_eq!(policy.evaluate(PlaybackStatus::Stalled, Some(8.0)), BufferDecision::Resume);
    }
}
