//! Player controller - runs a `PlayerCore` on its own tokio task
//!
//! Coordinates:
//! - Command intake from any number of handles
//! - Backend event intake (sinks marshal callbacks onto the owner task)
//! - Periodic current-time publication
//! - Observer delivery on a separate task
//!
//! All state lives on the owner task; handles only send commands and read
//! watch channels.

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use url::Url;

use crate::backend::MediaBackend;
use crate::config::PlayerConfig;
use crate::events::Envelope;
use crate::observer::{dispatch, Notification, PlayerObserver};
use crate::player_core::PlayerCore;
use crate::types::{PlaybackStatus, PlayerSnapshot, PlayerStatus};
use crate::{Error, Result};

/// Requests processed by the owner task, in order
#[derive(Debug)]
enum Command {
    Load(Url),
    Clear,
    Play(Option<f64>),
    Pause,
    Seek(f64),
    TogglePlayPause,
    SetVolume(f32),
    SetMuted(bool),
    SetConfig(PlayerConfig),
    Snapshot(oneshot::Sender<PlayerSnapshot>),
    Shutdown(oneshot::Sender<()>),
}

/// Handle to a player running on a tokio task
#[derive(Debug, Clone)]
pub struct PlayerController {
    commands: mpsc::UnboundedSender<Command>,
    player_status: watch::Receiver<PlayerStatus>,
    playback_status: watch::Receiver<PlaybackStatus>,
}

impl PlayerController {
    /// Start the owner and delivery tasks. Must be called within a tokio runtime.
    pub fn spawn<B, O>(backend: B, config: PlayerConfig, observer: O) -> Result<Self>
    where
        B: MediaBackend,
        O: PlayerObserver,
    {
        config.validate()?;

        let (core, channels) = PlayerCore::new(backend, config);
        let player_status = core.watch_player_status();
        let playback_status = core.watch_playback_status();
        let (commands, command_rx) = mpsc::unbounded_channel();

        tokio::spawn(deliver(observer, channels.notifications));
        tokio::spawn(run(core, channels.events, command_rx));

        info!("Player controller started");

        Ok(Self {
            commands,
            player_status,
            playback_status,
        })
    }

    pub fn load(&self, url: Url) {
        self.send(Command::Load(url));
    }

    pub fn clear(&self) {
        self.send(Command::Clear);
    }

    /// Start playback, optionally seeking to `from` seconds first
    pub fn play(&self, from: Option<f64>) {
        self.send(Command::Play(from));
    }

    pub fn pause(&self) {
        self.send(Command::Pause);
    }

    pub fn seek(&self, to: f64) {
        self.send(Command::Seek(to));
    }

    pub fn toggle_play_pause(&self) {
        self.send(Command::TogglePlayPause);
    }

    pub fn set_volume(&self, volume: f32) {
        self.send(Command::SetVolume(volume));
    }

    pub fn set_muted(&self, muted: bool) {
        self.send(Command::SetMuted(muted));
    }

    /// Replace the configuration at runtime
    pub fn set_config(&self, config: PlayerConfig) -> Result<()> {
        config.validate()?;
        self.commands
            .send(Command::SetConfig(config))
            .map_err(|_| Error::ControllerClosed)
    }

    pub fn player_status(&self) -> PlayerStatus {
        *self.player_status.borrow()
    }

    pub fn playback_status(&self) -> PlaybackStatus {
        *self.playback_status.borrow()
    }

    pub fn watch_player_status(&self) -> watch::Receiver<PlayerStatus> {
        self.player_status.clone()
    }

    pub fn watch_playback_status(&self) -> watch::Receiver<PlaybackStatus> {
        self.playback_status.clone()
    }

    /// Read the full player state from the owner task
    pub async fn snapshot(&self) -> Result<PlayerSnapshot> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Snapshot(reply))
            .map_err(|_| Error::ControllerClosed)?;
        response.await.map_err(|_| Error::ControllerClosed)
    }

    /// Tear down the session, release host subscriptions and stop the owner task
    pub async fn shutdown(&self) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.commands
            .send(Command::Shutdown(ack))
            .map_err(|_| Error::ControllerClosed)?;
        done.await.map_err(|_| Error::ControllerClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            warn!("Player controller is closed; command ignored");
        }
    }
}

async fn run<B: MediaBackend>(
    mut core: PlayerCore<B>,
    mut events: mpsc::UnboundedReceiver<Envelope>,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    let mut ticker = time_ticker(core.config());

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(command) => match apply(&mut core, command) {
                    Step::Continue => {}
                    Step::Retick => ticker = time_ticker(core.config()),
                    Step::Stop => break,
                },
                None => {
                    debug!("All controller handles dropped");
                    core.shutdown();
                    break;
                }
            },
            Some(envelope) = events.recv() => core.handle(envelope),
            _ = ticker.tick() => {
                if core.playback_status() == PlaybackStatus::Playing {
                    core.publish_current_time();
                }
            }
        }
    }

    debug!("Player owner task finished");
}

/// What the owner loop does after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Continue,
    /// The time observation interval changed
    Retick,
    Stop,
}

fn apply<B: MediaBackend>(core: &mut PlayerCore<B>, command: Command) -> Step {
    match command {
        Command::Load(url) => core.load(url),
        Command::Clear => core.clear(),
        Command::Play(from) => core.play(from),
        Command::Pause => core.pause(),
        Command::Seek(to) => core.seek(to),
        Command::TogglePlayPause => core.toggle_play_pause(),
        Command::SetVolume(volume) => core.set_volume(volume),
        Command::SetMuted(muted) => core.set_muted(muted),
        Command::SetConfig(config) => {
            let interval_changed =
                config.interval_of_time_observation != core.config().interval_of_time_observation;
            core.set_config(config);
            if interval_changed {
                return Step::Retick;
            }
        }
        Command::Snapshot(reply) => {
            let _ = reply.send(core.snapshot());
        }
        Command::Shutdown(ack) => {
            core.shutdown();
            let _ = ack.send(());
            return Step::Stop;
        }
    }
    Step::Continue
}

fn time_ticker(config: &PlayerConfig) -> Interval {
    let period = config.time_observation_interval();
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

async fn deliver<O: PlayerObserver>(mut observer: O, mut notifications: mpsc::UnboundedReceiver<Notification>) {
    while let Some(notification) = notifications.recv().await {
        dispatch(&mut observer, notification);
    }
    debug!("Observer delivery finished");
}
