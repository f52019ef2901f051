//! Observer notifications
//!
//! The core never calls observers directly. Notifications are queued in
//! the order transitions were applied and delivered from a separate
//! context, so an observer callback can never re-enter the state machine.

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tracing::trace;

use crate::types::{PlaybackStatus, PlayerStatus};

/// Notification queued for the embedding application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notification {
    PlayerStatusChanged { status: PlayerStatus },
    PlaybackStatusChanged { status: PlaybackStatus },
    ReadyForDisplay,
    CurrentTimeChanged { current_time: f64 },
}

/// Callbacks for the embedding application.
///
/// `current_time_changed` is optional; the default implementation ignores
/// periodic time updates.
pub trait PlayerObserver: Send + 'static {
    fn player_status_changed(&mut self, status: PlayerStatus);

    fn playback_status_changed(&mut self, status: PlaybackStatus);

    fn ready_for_display(&mut self);

    fn current_time_changed(&mut self, _current_time: f64) {}
}

/// Observer that ignores every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl PlayerObserver for NoopObserver {
    fn player_status_changed(&mut self, _status: PlayerStatus) {}

    fn playback_status_changed(&mut self, _status: PlaybackStatus) {}

    fn ready_for_display(&mut self) {}
}

/// Hand one notification to an observer
pub fn dispatch<O: PlayerObserver + ?Sized>(observer: &mut O, notification: Notification) {
    trace!(?notification, "Delivering notification");
    match notification {
        Notification::PlayerStatusChanged { status } => observer.player_status_changed(status),
        Notification::PlaybackStatusChanged { status } => observer.playback_status_changed(status),
        Notification::ReadyForDisplay => observer.ready_for_display(),
        Notification::CurrentTimeChanged { current_time } => observer.current_time_changed(current_time),
    }
}

/// Outbound side of the core: the ordered notification queue plus watch
/// channels mirroring the latest status values.
#[derive(Debug)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Notification>,
    player_status: watch::Sender<PlayerStatus>,
    playback_status: watch::Sender<PlaybackStatus>,
}

impl Notifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (player_status, _) = watch::channel(PlayerStatus::default());
        let (playback_status, _) = watch::channel(PlaybackStatus::default());

        (
            Self {
                tx,
                player_status,
                playback_status,
            },
            rx,
        )
    }

    pub fn player_status_changed(&self, status: PlayerStatus) {
        self.player_status.send_replace(status);
        self.send(Notification::PlayerStatusChanged { status });
    }

    pub fn playback_status_changed(&self, status: PlaybackStatus) {
        self.playback_status.send_replace(status);
        self.send(Notification::PlaybackStatusChanged { status });
    }

    pub fn ready_for_display(&self) {
        self.send(Notification::ReadyForDisplay);
    }

    pub fn current_time_changed(&self, current_time: f64) {
        self.send(Notification::CurrentTimeChanged { current_time });
    }

    pub fn watch_player_status(&self) -> watch::Receiver<PlayerStatus> {
        self.player_status.subscribe()
    }

    pub fn watch_playback_status(&self) -> watch::Receiver<PlaybackStatus> {
        self.playback_status.subscribe()
    }

    fn send(&self, notification: Notification) {
        // Receiver gone means nobody is listening anymore
        let _ = self.tx.send(notification);
    }
}
