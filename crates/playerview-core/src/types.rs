//! Core types for PlayerView

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies one load-to-clear playback session.
///
/// Every asynchronous callback is tagged with the token of the session that
/// registered it, so completions from a superseded session can be told apart
/// from those of the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionToken(pub Uuid);

impl SessionToken {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a backend object (asset, item, player, display surface)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId(pub u64);

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "object#{}", self.0)
    }
}

/// Handle returned by the backend for every subscription it accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "subscription#{}", self.0)
    }
}

/// Asset/item level readiness, independent of transport state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerStatus {
    #[default]
    Unknown,
    ReadyToPlay,
    Failed,
}

impl PlayerStatus {
    /// Unknown is the only non-terminal status within a session
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PlayerStatus::Unknown)
    }
}

impl std::fmt::Display for PlayerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayerStatus::Unknown => write!(f, "Unknown"),
            PlayerStatus::ReadyToPlay => write!(f, "ReadyToPlay"),
            PlayerStatus::Failed => write!(f, "Failed"),
        }
    }
}

/// Transport state of the current item
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaybackStatus {
    #[default]
    Unstarted,
    Playing,
    Paused,
    Ended,
    Stalled,
}

impl std::fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackStatus::Unstarted => write!(f, "Unstarted"),
            PlaybackStatus::Playing => write!(f, "Playing"),
            PlaybackStatus::Paused => write!(f, "Paused"),
            PlaybackStatus::Ended => write!(f, "Ended"),
            PlaybackStatus::Stalled => write!(f, "Stalled"),
        }
    }
}

/// Readiness reported by the decoding pipeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Readiness {
    #[default]
    Unknown,
    ReadyToPlay,
    Failed,
}

/// Asset metadata keys that must resolve before an item is built
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKey {
    Playable,
    Duration,
}

impl AssetKey {
    /// Keys probed for every session
    pub const REQUIRED: [AssetKey; 2] = [AssetKey::Playable, AssetKey::Duration];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKey::Playable => "playable",
            AssetKey::Duration => "duration",
        }
    }
}

impl std::fmt::Display for AssetKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolution status of a single probed key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyStatus {
    Unknown,
    Loading,
    Loaded,
    Failed,
    Cancelled,
}

/// A contiguous span of locally available media, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub duration: f64,
}

impl TimeRange {
    pub fn new(start: f64, duration: f64) -> Self {
        Self { start, duration }
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time < self.end()
    }
}

/// Natural (unscaled) size of the video track
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoSize {
    pub width: f64,
    pub height: f64,
}

impl VideoSize {
    pub const ZERO: VideoSize = VideoSize { width: 0.0, height: 0.0 };

    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

impl std::fmt::Display for VideoSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Rectangle the video occupies within the display surface
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl VideoRect {
    pub const ZERO: VideoRect = VideoRect {
        x: 0.0,
        y: 0.0,
        width: 0.0,
        height: 0.0,
    };

    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }
}

/// Whether the display surface currently references the session's player
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attachment {
    #[default]
    Attached,
    Detached,
}

impl std::fmt::Display for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Attachment::Attached => write!(f, "attached"),
            Attachment::Detached => write!(f, "detached"),
        }
    }
}

/// Point-in-time view of the player for embedding applications
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    /// Current session, if one is loaded
    pub session: Option<SessionToken>,
    pub player_status: PlayerStatus,
    pub playback_status: PlaybackStatus,
    /// Item duration in seconds (0 without an item)
    pub duration: f64,
    /// Playback position in seconds (0 without a player)
    pub current_time: f64,
    pub video_natural_size: VideoSize,
    pub video_rect: VideoRect,
    pub ready_for_display: bool,
    pub attachment: Attachment,
    pub volume: f32,
    pub muted: bool,
}
