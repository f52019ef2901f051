//! Opaque media backend
//!
//! The core never decodes, renders or fetches media. It drives a backend
//! made of four collaborators:
//! - an asset that probes metadata keys asynchronously
//! - an item built from the asset that reports buffering and end/stall
//! - a player bound to the item that reports readiness and rate
//! - a display surface that binds a player and reports display readiness
//!
//! Backends report back through sinks handed out at subscription time.
//! Each sink carries the tag (session token, object, key) it was created
//! with, so callbacks never need pointer identity to find their origin.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use url::Url;

use crate::events::{Envelope, EventOrigin};
use crate::types::{
    AssetKey, KeyStatus, ObjectId, Readiness, SessionToken, SubscriptionId, TimeRange, VideoRect,
    VideoSize,
};

/// Errors reported by backend handles
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("Failed to construct {what}: {reason}")]
    Construction { what: &'static str, reason: String },

    #[error("Unknown subscription: {0}")]
    UnknownSubscription(SubscriptionId),

    #[error("Cancellation failed: {0}")]
    Cancellation(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// Properties and notifications the core subscribes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservedKey {
    /// Item: buffered time ranges
    LoadedTimeRanges,
    /// Item: played to end notification
    DidPlayToEnd,
    /// Item: playback stalled notification
    PlaybackStalled,
    /// Player: decoding pipeline readiness
    Status,
    /// Player: transport rate
    Rate,
    /// Display surface: first frame is ready
    ReadyForDisplay,
}

impl ObservedKey {
    /// Keys observed on every item
    pub const ITEM: [ObservedKey; 3] = [
        ObservedKey::LoadedTimeRanges,
        ObservedKey::DidPlayToEnd,
        ObservedKey::PlaybackStalled,
    ];

    /// Keys observed on every player
    pub const PLAYER: [ObservedKey; 2] = [ObservedKey::Status, ObservedKey::Rate];

    pub fn as_str(&self) -> &'static str {
        match self {
            ObservedKey::LoadedTimeRanges => "loadedTimeRanges",
            ObservedKey::DidPlayToEnd => "didPlayToEnd",
            ObservedKey::PlaybackStalled => "playbackStalled",
            ObservedKey::Status => "status",
            ObservedKey::Rate => "rate",
            ObservedKey::ReadyForDisplay => "readyForDisplay",
        }
    }
}

impl std::fmt::Display for ObservedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw value carried by an observation
#[derive(Debug, Clone, PartialEq)]
pub enum ObservedValue {
    TimeRanges(Vec<TimeRange>),
    Readiness(Readiness),
    Rate(f32),
    Flag(bool),
    /// Discrete notification without payload
    Notified,
}

impl ObservedValue {
    pub fn kind(&self) -> &'static str {
        match self {
            ObservedValue::TimeRanges(_) => "time-ranges",
            ObservedValue::Readiness(_) => "readiness",
            ObservedValue::Rate(_) => "rate",
            ObservedValue::Flag(_) => "flag",
            ObservedValue::Notified => "notification",
        }
    }
}

/// Result of an asynchronous asset probe
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    /// Per-key resolution status
    Resolved(Vec<(AssetKey, KeyStatus)>),
    /// The probe as a whole was rejected
    Rejected(String),
}

impl ProbeOutcome {
    /// Required keys that did not resolve
    pub fn failed_keys(&self) -> Vec<AssetKey> {
        match self {
            ProbeOutcome::Rejected(_) => AssetKey::REQUIRED.to_vec(),
            ProbeOutcome::Resolved(statuses) => AssetKey::REQUIRED
                .iter()
                .copied()
                .filter(|key| {
                    !statuses
                        .iter()
                        .any(|(resolved, status)| resolved == key && *status == KeyStatus::Loaded)
                })
                .collect(),
        }
    }
}

/// Host application lifecycle signals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HostSignal {
    DidEnterBackground,
    WillEnterForeground,
}

/// Tag attached to a subscription when it is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObservationTag {
    pub origin: EventOrigin,
    pub object: ObjectId,
    pub key: ObservedKey,
}

/// Delivers property changes and notifications for one subscription
#[derive(Debug, Clone)]
pub struct ObservationSink {
    tag: ObservationTag,
    tx: mpsc::UnboundedSender<Envelope>,
}

impl ObservationSink {
    pub(crate) fn new(tag: ObservationTag, tx: mpsc::UnboundedSender<Envelope>) -> Self {
        Self { tag, tx }
    }

    pub fn tag(&self) -> &ObservationTag {
        &self.tag
    }

    /// Queue a value for the owner context. Returns false once the owner is gone.
    pub fn emit(&self, value: ObservedValue) -> bool {
        self.tx
            .send(Envelope::Observation {
                tag: self.tag,
                value,
            })
            .is_ok()
    }
}

/// Completion handle for one asset probe
#[derive(Debug)]
pub struct ProbeSink {
    token: SessionToken,
    asset: ObjectId,
    tx: mpsc::UnboundedSender<Envelope>,
}

impl ProbeSink {
    pub(crate) fn new(token: SessionToken, asset: ObjectId, tx: mpsc::UnboundedSender<Envelope>) -> Self {
        Self { token, asset, tx }
    }

    pub fn token(&self) -> SessionToken {
        self.token
    }

    pub fn asset(&self) -> ObjectId {
        self.asset
    }

    /// Report the probe result. Consumes the sink: a probe completes once.
    pub fn complete(self, outcome: ProbeOutcome) -> bool {
        self.tx
            .send(Envelope::ProbeCompleted {
                token: self.token,
                asset: self.asset,
                outcome,
            })
            .is_ok()
    }
}

/// Delivers host lifecycle signals
#[derive(Debug, Clone)]
pub struct HostSink {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl HostSink {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Envelope>) -> Self {
        Self { tx }
    }

    pub fn signal(&self, signal: HostSignal) -> bool {
        self.tx.send(Envelope::Host(signal)).is_ok()
    }
}

/// Media resource whose metadata is probed before playback
pub trait MediaAsset: Send + 'static {
    fn id(&self) -> ObjectId;

    /// Start resolving `keys`. The backend must call `completion` exactly
    /// once, from any thread, unless the owner has gone away.
    fn load_values_async(&self, keys: &[AssetKey], completion: ProbeSink);

    fn cancel_loading(&self) -> Result<(), BackendError>;

    /// Natural size of the first video track, once tracks are known
    fn natural_size(&self) -> Option<VideoSize>;
}

/// Playable item built from a probed asset
pub trait MediaItem: Send + 'static {
    fn id(&self) -> ObjectId;

    /// Subscribe to the key named in the sink's tag
    fn observe(&self, sink: ObservationSink) -> Result<SubscriptionId, BackendError>;

    fn unobserve(&self, subscription: SubscriptionId) -> Result<(), BackendError>;

    /// Item duration in seconds (may be NaN while unknown or infinite for live)
    fn duration(&self) -> f64;

    fn is_playback_likely_to_keep_up(&self) -> bool;

    fn cancel_pending_seeks(&self) -> Result<(), BackendError>;
}

/// Transport controller bound to one item
pub trait MediaPlayer: Send + 'static {
    fn id(&self) -> ObjectId;

    /// Subscribe to the key named in the sink's tag
    fn observe(&self, sink: ObservationSink) -> Result<SubscriptionId, BackendError>;

    fn unobserve(&self, subscription: SubscriptionId) -> Result<(), BackendError>;

    fn play(&self);

    fn pause(&self);

    /// Seek to a position in seconds
    fn seek(&self, seconds: f64);

    fn cancel_pending_prerolls(&self) -> Result<(), BackendError>;

    /// Current playback position in seconds
    fn current_time(&self) -> f64;

    fn rate(&self) -> f32;

    fn set_volume(&self, volume: f32);

    fn set_muted(&self, muted: bool);
}

/// Factory for session objects plus the host-scoped display surface
pub trait MediaBackend: Send + 'static {
    type Asset: MediaAsset;
    type Item: MediaItem;
    type Player: MediaPlayer;

    // -- session objects --

    fn create_asset(&mut self, url: &Url) -> Self::Asset;

    fn create_item(&mut self, asset: &Self::Asset) -> Result<Self::Item, BackendError>;

    fn create_player(&mut self, item: &Self::Item) -> Result<Self::Player, BackendError>;

    // -- display surface --

    fn display_id(&self) -> ObjectId;

    /// Bind `player` to the display surface, or unbind with `None`
    fn bind_player(&mut self, player: Option<&Self::Player>);

    fn bound_player(&self) -> Option<ObjectId>;

    fn is_ready_for_display(&self) -> bool;

    fn video_rect(&self) -> VideoRect;

    fn observe_display(&mut self, sink: ObservationSink) -> Result<SubscriptionId, BackendError>;

    fn unobserve_display(&mut self, subscription: SubscriptionId) -> Result<(), BackendError>;

    // -- picture in picture --

    fn supports_picture_in_picture(&self) -> bool;

    /// Prepare a picture-in-picture controller bound to the display surface
    fn prepare_picture_in_picture(&mut self) -> Result<(), BackendError>;

    // -- host lifecycle --

    fn observe_lifecycle(&mut self, sink: HostSink) -> Result<SubscriptionId, BackendError>;

    fn unobserve_lifecycle(&mut self, subscription: SubscriptionId) -> Result<(), BackendError>;
}
