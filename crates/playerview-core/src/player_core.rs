//! Player core - the single owner of playback state
//!
//! Coordinates:
//! - Session lifecycle (load / clear) and backend commands
//! - Event intake: normalization, superseded-session filtering
//! - Status transitions and observer notifications
//! - Buffering recovery and display attachment
//!
//! `PlayerCore` is synchronous. It must only be driven from one context;
//! `PlayerController` provides that context on a tokio task.

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::background::{BackgroundCoordinator, SurfaceAction};
use crate::backend::{
    HostSink, MediaAsset, MediaBackend, MediaItem, MediaPlayer, ObservationSink, ObservationTag,
    ObservedKey,
};
use crate::buffering::{BufferDecision, BufferingPolicy};
use crate::config::PlayerConfig;
use crate::error::{Error, InvariantViolation};
use crate::events::{normalize, CoreEvent, Envelope, EventOrigin, TrackedObjects};
use crate::observer::{Notification, Notifier};
use crate::session::{Session, SessionStage};
use crate::state::{PlaybackContext, StatusChange, StatusMachine};
use crate::types::{
    AssetKey, Attachment, PlaybackStatus, PlayerSnapshot, PlayerStatus, Readiness, SessionToken,
    SubscriptionId, VideoRect, VideoSize,
};

/// Receiving ends created alongside a core
#[derive(Debug)]
pub struct CoreChannels {
    /// Backend envelopes; feed each one to `PlayerCore::handle`
    pub events: mpsc::UnboundedReceiver<Envelope>,
    /// Observer notifications in transition order
    pub notifications: mpsc::UnboundedReceiver<Notification>,
}

/// Host-scoped subscriptions, held from construction to shutdown
#[derive(Debug, Default)]
struct HostSubscriptions {
    lifecycle: Option<SubscriptionId>,
    display: Option<SubscriptionId>,
}

/// Playback state-machine core
pub struct PlayerCore<B: MediaBackend> {
    backend: B,
    config: PlayerConfig,
    machine: StatusMachine,
    buffering: BufferingPolicy,
    background: BackgroundCoordinator,
    session: Option<Session<B>>,
    notifier: Notifier,
    events_tx: mpsc::UnboundedSender<Envelope>,
    host: HostSubscriptions,
    closed: bool,
}

impl<B: MediaBackend> PlayerCore<B> {
    /// Create a core and subscribe to the host-scoped event sources
    pub fn new(mut backend: B, config: PlayerConfig) -> (Self, CoreChannels) {
        let (events_tx, events) = mpsc::unbounded_channel();
        let (notifier, notifications) = Notifier::new();

        let lifecycle = backend
            .observe_lifecycle(HostSink::new(events_tx.clone()))
            .map_err(|e| warn!(error = %e, "Failed to observe host lifecycle"))
            .ok();

        let display_tag = ObservationTag {
            origin: EventOrigin::Host,
            object: backend.display_id(),
            key: ObservedKey::ReadyForDisplay,
        };
        let display = backend
            .observe_display(ObservationSink::new(display_tag, events_tx.clone()))
            .map_err(|e| warn!(error = %e, "Failed to observe display readiness"))
            .ok();

        let core = Self {
            backend,
            buffering: BufferingPolicy::new(config.minimum_buffer_duration),
            config,
            machine: StatusMachine::new(),
            background: BackgroundCoordinator::new(),
            session: None,
            notifier,
            events_tx,
            host: HostSubscriptions { lifecycle, display },
            closed: false,
        };

        (
            core,
            CoreChannels {
                events,
                notifications,
            },
        )
    }

    // -- operations --

    /// Supersede the current session and start probing `url`
    #[instrument(skip(self, url), fields(url = %url))]
    pub fn load(&mut self, url: Url) {
        self.clear();
        self.session = Some(Session::begin(&mut self.backend, url, &self.events_tx));
    }

    /// Tear down the current session, if any, and reset both statuses
    #[instrument(skip(self))]
    pub fn clear(&mut self) {
        if let Some(session) = self.session.take() {
            let token = session.token();
            let report = session.teardown();
            if report.failures > 0 {
                warn!(session = %token, failures = report.failures, "Session released with teardown failures");
            }
        }

        self.sync_surface();
        self.buffering.reset();

        for change in self.machine.reset() {
            self.publish(Some(change));
        }
    }

    /// Start playback, optionally seeking first
    pub fn play(&mut self, from: Option<f64>) {
        let Some(player) = self.player() else {
            debug!("Play ignored: no player");
            return;
        };

        if let Some(target) = from.and_then(|seconds| self.clamp_seek_target(seconds)) {
            player.seek(target);
        }
        player.play();
    }

    pub fn pause(&mut self) {
        match self.player() {
            Some(player) => player.pause(),
            None => debug!("Pause ignored: no player"),
        }
    }

    /// Seek to a position in seconds, clamped to the item
    pub fn seek(&mut self, to: f64) {
        let Some(player) = self.player() else {
            debug!("Seek ignored: no player");
            return;
        };

        match self.clamp_seek_target(to) {
            Some(target) => player.seek(target),
            None => warn!(to, "Seek ignored: target is not a number"),
        }
    }

    /// Remote-control style toggle between Playing and Paused
    pub fn toggle_play_pause(&mut self) {
        let status = self.machine.playback_status();
        let Some(player) = self.player() else {
            return;
        };

        match status {
            PlaybackStatus::Playing => player.pause(),
            PlaybackStatus::Paused => player.play(),
            _ => debug!(%status, "Toggle ignored"),
        }
    }

    /// Set the output volume, clamped to 0..=1
    pub fn set_volume(&mut self, volume: f32) {
        if volume.is_nan() {
            warn!(volume, "Volume ignored: not a number");
            return;
        }
        self.config.volume = volume.clamp(0.0, 1.0);
        if let Some(player) = self.player() {
            player.set_volume(self.config.volume);
        }
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.config.muted = muted;
        if let Some(player) = self.player() {
            player.set_muted(muted);
        }
    }

    /// Replace the configuration; applies to subsequent decisions
    pub fn set_config(&mut self, config: PlayerConfig) {
        self.buffering
            .set_minimum_buffer_duration(config.minimum_buffer_duration);
        if let Some(player) = self.player() {
            player.set_volume(config.volume);
            player.set_muted(config.muted);
        }
        self.config = config;
    }

    /// Emit a current-time notification for the periodic time observer
    pub fn publish_current_time(&self) {
        if let Some(player) = self.player() {
            self.notifier.current_time_changed(player.current_time());
        }
    }

    /// Clear the session and release host-scoped subscriptions
    pub fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.clear();

        if let Some(id) = self.host.lifecycle.take() {
            if let Err(e) = self.backend.unobserve_lifecycle(id) {
                warn!(error = %e, "Failed to remove host lifecycle subscription");
            }
        }
        if let Some(id) = self.host.display.take() {
            if let Err(e) = self.backend.unobserve_display(id) {
                warn!(error = %e, "Failed to remove display subscription");
            }
        }

        self.closed = true;
        info!("Player core shut down");
    }

    // -- event intake --

    /// Normalize and apply one backend envelope
    pub fn handle(&mut self, envelope: Envelope) {
        match normalize(envelope, &self.tracked()) {
            Ok((origin, event)) => self.apply_event(origin, event),
            Err(violation) => self.invariant_violation(violation),
        }
    }

    /// Apply a normalized event. Events from a superseded session are dropped.
    pub fn apply_event(&mut self, origin: EventOrigin, event: CoreEvent) {
        if let Err(violation) = event.check_scope(origin) {
            return self.invariant_violation(violation);
        }

        if let EventOrigin::Session(token) = origin {
            if self.session_token() != Some(token) {
                debug!(session = %token, event = event.name(), "Dropping event from superseded session");
                return;
            }
        }

        match event {
            CoreEvent::AssetProbeCompleted {
                succeeded,
                failed_keys,
            } => self.on_probe_completed(succeeded, failed_keys),
            CoreEvent::BufferedRangeChanged { range_duration } => self.on_buffered_range(range_duration),
            CoreEvent::PlayerReadinessChanged { readiness } => self.on_readiness(readiness),
            CoreEvent::RateChanged { rate } => self.on_rate(rate),
            CoreEvent::ItemEnded => self.on_item_ended(),
            CoreEvent::PlaybackStalled => {
                // A repeated stall report re-arms auto-resume
                self.buffering.reset();
                let change = self.machine.mark_stalled();
                self.publish(change);
            }
            CoreEvent::DisplayReady { ready } => {
                if ready {
                    self.notifier.ready_for_display();
                }
            }
            CoreEvent::AppBackgrounded => self.on_backgrounded(),
            CoreEvent::AppForegrounded => self.on_foregrounded(),
        }
    }

    fn on_probe_completed(&mut self, succeeded: bool, failed_keys: Vec<AssetKey>) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let token = session.token();

        if session.stage() != SessionStage::Probing {
            return self.invariant_violation(InvariantViolation::DuplicateProbe {
                session: token.to_string(),
            });
        }

        let result = if succeeded {
            session
                .build(&mut self.backend, &self.config, &self.events_tx)
                .map_err(Error::from)
        } else {
            let keys: Vec<&str> = failed_keys.iter().map(AssetKey::as_str).collect();
            Err(Error::AssetNotPlayable(keys.join(", ")))
        };

        match result {
            Ok(()) => {
                info!(session = %token, "Session pipeline ready");
                if self.background.binds_new_players() {
                    self.sync_surface();
                }
                if self.backend.supports_picture_in_picture() {
                    if let Err(e) = self.backend.prepare_picture_in_picture() {
                        warn!(session = %token, error = %e, "Failed to prepare picture-in-picture");
                    }
                }
            }
            Err(e) => {
                session.mark_failed();
                warn!(
                    session = %token,
                    code = e.error_code(),
                    recoverable = e.is_recoverable(),
                    error = %e,
                    "Session setup failed"
                );
                let change = self.machine.resolve_player_status(PlayerStatus::Failed);
                self.publish(change);
            }
        }
    }

    fn on_readiness(&mut self, readiness: Readiness) {
        let change = self.machine.apply_readiness(readiness);
        if change.is_none() && readiness != Readiness::Unknown {
            debug!(?readiness, status = %self.machine.player_status(), "Readiness ignored");
        }
        self.publish(change);
    }

    fn on_rate(&mut self, rate: f32) {
        let Some(context) = self.playback_context() else {
            debug!(rate, "Rate change without an item");
            return;
        };
        let change = self.machine.apply_rate(rate, context);
        self.publish(change);
    }

    fn on_buffered_range(&mut self, range_duration: Option<f64>) {
        let status = self.machine.playback_status();
        if self.buffering.evaluate(status, range_duration) == BufferDecision::Resume {
            info!(
                buffered = range_duration.unwrap_or_default(),
                minimum = self.buffering.minimum_buffer_duration(),
                "Resuming stalled playback"
            );
            if let Some(player) = self.player() {
                player.play();
            }
        }
    }

    fn on_item_ended(&mut self) {
        let change = self.machine.mark_ended();
        self.publish(change);

        if self.config.repeat_playback {
            if let Some(player) = self.player() {
                debug!("Repeating playback from the beginning");
                player.seek(0.0);
                player.play();
            }
        }
    }

    fn on_backgrounded(&mut self) {
        let picture_in_picture = self.backend.supports_picture_in_picture()
            && self.config.allows_picture_in_picture_playback;

        match self.background.on_backgrounded(picture_in_picture) {
            SurfaceAction::Keep => {}
            SurfaceAction::Bind | SurfaceAction::Unbind => self.sync_surface(),
        }
    }

    fn on_foregrounded(&mut self) {
        match self.background.on_foregrounded() {
            SurfaceAction::Keep => {}
            SurfaceAction::Bind | SurfaceAction::Unbind => self.sync_surface(),
        }
    }

    // -- internals --

    /// Bring the display's player reference in line with the attachment
    /// state. A no-op when the surface already references the right player.
    fn sync_surface(&mut self) {
        let desired = match self.background.attachment() {
            Attachment::Attached => self.session.as_ref().and_then(Session::player),
            Attachment::Detached => None,
        };
        let desired_id = desired.map(MediaPlayer::id);

        if self.backend.bound_player() == desired_id {
            return;
        }

        debug!(
            player = ?desired_id,
            attachment = %self.background.attachment(),
            "Updating display surface"
        );
        self.backend.bind_player(desired);
    }

    fn publish(&mut self, change: Option<StatusChange>) {
        let Some(change) = change else {
            return;
        };

        match change {
            StatusChange::Player { from, to } => {
                info!(session = ?self.session_token(), from = %from, to = %to, "Player status changed");
                self.notifier.player_status_changed(to);
            }
            StatusChange::Playback { from, to } => {
                info!(session = ?self.session_token(), from = %from, to = %to, "Playback status changed");
                self.buffering.on_playback_status_changed();
                self.notifier.playback_status_changed(to);
            }
        }
    }

    fn invariant_violation(&self, violation: InvariantViolation) {
        let e = Error::from(violation);
        error!(code = e.error_code(), error = %e, "Internal invariant violated");
        if cfg!(debug_assertions) {
            panic!("{e}");
        }
    }

    fn player(&self) -> Option<&B::Player> {
        self.session.as_ref().and_then(Session::player)
    }

    fn playback_context(&self) -> Option<PlaybackContext> {
        let session = self.session.as_ref()?;
        let item = session.item()?;
        let player = session.player()?;

        Some(PlaybackContext {
            likely_to_keep_up: item.is_playback_likely_to_keep_up(),
            position: player.current_time(),
            duration: item.duration(),
        })
    }

    fn clamp_seek_target(&self, seconds: f64) -> Option<f64> {
        if seconds.is_nan() {
            return None;
        }

        let duration = self.duration();
        if duration.is_finite() && duration > 0.0 {
            Some(seconds.clamp(0.0, duration))
        } else {
            Some(seconds.max(0.0))
        }
    }

    fn tracked(&self) -> TrackedObjects {
        let session = self.session.as_ref();
        TrackedObjects {
            session: session.map(Session::token),
            asset: session.map(|s| s.asset().id()),
            item: session.and_then(Session::item).map(MediaItem::id),
            player: session.and_then(Session::player).map(MediaPlayer::id),
            display: self.backend.display_id(),
        }
    }

    // -- queries --

    pub fn player_status(&self) -> PlayerStatus {
        self.machine.player_status()
    }

    pub fn playback_status(&self) -> PlaybackStatus {
        self.machine.playback_status()
    }

    pub fn session_token(&self) -> Option<SessionToken> {
        self.session.as_ref().map(Session::token)
    }

    pub fn session(&self) -> Option<&Session<B>> {
        self.session.as_ref()
    }

    /// Item duration in seconds (0 without an item)
    pub fn duration(&self) -> f64 {
        self.session
            .as_ref()
            .and_then(Session::item)
            .map(MediaItem::duration)
            .unwrap_or(0.0)
    }

    /// Playback position in seconds (0 without a player)
    pub fn current_time(&self) -> f64 {
        self.player().map(MediaPlayer::current_time).unwrap_or(0.0)
    }

    pub fn video_natural_size(&self) -> VideoSize {
        self.session
            .as_ref()
            .filter(|session| session.item().is_some())
            .and_then(|session| session.asset().natural_size())
            .unwrap_or(VideoSize::ZERO)
    }

    pub fn video_rect(&self) -> VideoRect {
        self.backend.video_rect()
    }

    pub fn ready_for_display(&self) -> bool {
        self.backend.is_ready_for_display()
    }

    pub fn attachment(&self) -> Attachment {
        self.background.attachment()
    }

    pub fn volume(&self) -> f32 {
        self.config.volume
    }

    pub fn is_muted(&self) -> bool {
        self.config.muted
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn watch_player_status(&self) -> watch::Receiver<PlayerStatus> {
        self.notifier.watch_player_status()
    }

    pub fn watch_playback_status(&self) -> watch::Receiver<PlaybackStatus> {
        self.notifier.watch_playback_status()
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            session: self.session_token(),
            player_status: self.player_status(),
            playback_status: self.playback_status(),
            duration: self.duration(),
            current_time: self.current_time(),
            video_natural_size: self.video_natural_size(),
            video_rect: self.video_rect(),
            ready_for_display: self.ready_for_display(),
            attachment: self.attachment(),
            volume: self.volume(),
            muted: self.is_muted(),
        }
    }
}

impl<B: MediaBackend> Drop for PlayerCore<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
