//! PlayerView Core - playback state machine for an embeddable video view
//!
//! This crate owns everything between a host application and an opaque
//! media backend:
//! - Session lifecycle: asset probing, item/player construction, teardown
//! - Event normalization of backend callbacks
//! - Player and playback status with observer notifications
//! - Automatic resume after a stall once enough media is buffered
//! - Display attachment across background/foreground transitions
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      PlayerController                           │
//! │             (owner task: commands, events, ticker)              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐           │
//! │  │   Session    │  │    Event     │  │   Status     │           │
//! │  │  Lifecycle   │  │  Normalizer  │  │   Machine    │           │
//! │  └──────┬───────┘  └──────┬───────┘  └──────┬───────┘           │
//! │         │                 │                 │                   │
//! │         └─────────────────┼─────────────────┘                   │
//! │                           │                                     │
//! │                    ┌──────┴──────┐                              │
//! │                    │ PlayerCore  │                              │
//! │                    └──────┬──────┘                              │
//! │                           │                                     │
//! │  ┌──────────────┐  ┌──────┴──────┐  ┌──────────────┐            │
//! │  │  Buffering   │  │  Notifier   │  │  Background  │            │
//! │  │   Policy     │  │ (observers) │  │ Coordinator  │            │
//! │  └──────────────┘  └─────────────┘  └──────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//!                             │
//!                    ┌────────┴────────┐
//!                    │  MediaBackend   │
//!                    └─────────────────┘
//! ```

pub mod error;
pub mod types;
pub mod config;
pub mod backend;
pub mod events;
pub mod state;
pub mod buffering;
pub mod background;
pub mod session;
pub mod observer;
pub mod player_core;
pub mod controller;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use error::{Error, InvariantViolation, Result};
pub use types::*;
pub use config::PlayerConfig;
pub use backend::{
    BackendError, HostSignal, HostSink, MediaAsset, MediaBackend, MediaItem, MediaPlayer,
    ObservationSink, ObservationTag, ObservedKey, ObservedValue, ProbeOutcome, ProbeSink,
};
pub use events::{CoreEvent, Envelope, EventOrigin};
pub use observer::{NoopObserver, Notification, PlayerObserver};
pub use player_core::{CoreChannels, PlayerCore};
pub use controller::PlayerController;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
