//! Playback state machine
//!
//! Sole writer of `PlayerStatus` and `PlaybackStatus`. Every setter returns
//! the applied change, or `None` when the value did not change, so callers
//! notify observers strictly on A -> B transitions.

use crate::types::{PlaybackStatus, PlayerStatus, Readiness};

/// An applied status transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    Player { from: PlayerStatus, to: PlayerStatus },
    Playback { from: PlaybackStatus, to: PlaybackStatus },
}

/// Item state sampled when a zero rate is observed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackContext {
    pub likely_to_keep_up: bool,
    /// Current position in seconds
    pub position: f64,
    /// Item duration in seconds
    pub duration: f64,
}

/// Owner of the two externally observable status values
#[derive(Debug, Clone, Default)]
pub struct StatusMachine {
    player_status: PlayerStatus,
    playback_status: PlaybackStatus,
}

impl StatusMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn player_status(&self) -> PlayerStatus {
        self.player_status
    }

    pub fn playback_status(&self) -> PlaybackStatus {
        self.playback_status
    }

    fn set_player_status(&mut self, status: PlayerStatus) -> Option<StatusChange> {
        let from = self.player_status;
        if from == status {
            return None;
        }
        self.player_status = status;
        Some(StatusChange::Player { from, to: status })
    }

    fn set_playback_status(&mut self, status: PlaybackStatus) -> Option<StatusChange> {
        let from = self.playback_status;
        if from == status {
            return None;
        }
        self.playback_status = status;
        Some(StatusChange::Playback { from, to: status })
    }

    /// Record a terminal readiness determination. Within a session the
    /// player status only leaves Unknown, never returns to it.
    pub fn resolve_player_status(&mut self, status: PlayerStatus) -> Option<StatusChange> {
        if self.player_status.is_terminal() || !status.is_terminal() {
            return None;
        }
        self.set_player_status(status)
    }

    /// Map a readiness report from the decoding pipeline
    pub fn apply_readiness(&mut self, readiness: Readiness) -> Option<StatusChange> {
        match readiness {
            Readiness::Unknown => None,
            Readiness::ReadyToPlay => self.resolve_player_status(PlayerStatus::ReadyToPlay),
            Readiness::Failed => self.resolve_player_status(PlayerStatus::Failed),
        }
    }

    /// Apply an observed transport rate.
    ///
    /// A zero rate only means Paused when the item can keep up and the
    /// position is before the end; a stall or the end of the item is
    /// reported by its own notification.
    pub fn apply_rate(&mut self, rate: f32, context: PlaybackContext) -> Option<StatusChange> {
        if rate.abs() > 0.0 {
            return self.set_playback_status(PlaybackStatus::Playing);
        }

        if self.playback_status == PlaybackStatus::Unstarted {
            return None;
        }

        if !context.likely_to_keep_up {
            None
        } else if context.position < context.duration {
            self.set_playback_status(PlaybackStatus::Paused)
        } else {
            None
        }
    }

    pub fn mark_ended(&mut self) -> Option<StatusChange> {
        self.set_playback_status(PlaybackStatus::Ended)
    }

    pub fn mark_stalled(&mut self) -> Option<StatusChange> {
        self.set_playback_status(PlaybackStatus::Stalled)
    }

    /// Return both statuses to their initial values at a session boundary
    pub fn reset(&mut self) -> Vec<StatusChange> {
        [
            self.set_player_status(PlayerStatus::Unknown),
            self.set_playback_status(PlaybackStatus::Unstarted),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}
