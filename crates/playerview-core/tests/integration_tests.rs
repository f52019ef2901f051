//! Integration tests for PlayerView Core

use std::sync::{Arc, Mutex};
use std::time::Duration;

use playerview_core::testing::{BackendCall, SimulatedBackend};
use playerview_core::{
    Attachment, Error, MediaBackend, Notification, PlaybackStatus, PlayerConfig, PlayerController,
    PlayerCore, PlayerObserver, PlayerStatus, ProbeOutcome, Readiness, TimeRange,
};
use url::Url;

/// Observer that records every notification in delivery order
#[derive(Clone, Default)]
struct Recorder {
    seen: Arc<Mutex<Vec<Notification>>>,
}

impl Recorder {
    fn seen(&self) -> Vec<Notification> {
        self.seen.lock().unwrap().clone()
    }

    fn playback(&self) -> Vec<PlaybackStatus> {
        self.seen()
            .into_iter()
            .filter_map(|notification| match notification {
                Notification::PlaybackStatusChanged { status } => Some(status),
                _ => None,
            })
            .collect()
    }
}

impl PlayerObserver for Recorder {
    fn player_status_changed(&mut self, status: PlayerStatus) {
        self.seen
            .lock()
            .unwrap()
            .push(Notification::PlayerStatusChanged { status });
    }

    fn playback_status_changed(&mut self, status: PlaybackStatus) {
        self.seen
            .lock()
            .unwrap()
            .push(Notification::PlaybackStatusChanged { status });
    }

    fn ready_for_display(&mut self) {
        self.seen.lock().unwrap().push(Notification::ReadyForDisplay);
    }
}

fn movie() -> Url {
    Url::parse("https://cdn.example.com/movie.m3u8").unwrap()
}

async fn eventually(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("condition not reached");
}

async fn ready(controller: &PlayerController, sim: &SimulatedBackend) {
    controller.load(movie());
    controller.snapshot().await.unwrap();
    sim.resolve_probe();
    eventually(|| sim.latest_player().is_some()).await;
    sim.report_readiness(Readiness::ReadyToPlay);
    let mut status = controller.watch_player_status();
    status
        .wait_for(|status| *status == PlayerStatus::ReadyToPlay)
        .await
        .unwrap();
}

async fn wait_for_playback(controller: &PlayerController, expected: PlaybackStatus) {
    let mut status = controller.watch_playback_status();
    tokio::time::timeout(Duration::from_secs(2), status.wait_for(|status| *status == expected))
        .await
        .expect("playback status timed out")
        .unwrap();
}

// =============================================================================
// Configuration Tests
// =============================================================================

#[test]
fn test_config_from_json_fills_defaults() {
    let config = PlayerConfig::from_json(r#"{"minimum_buffer_duration": 2.5, "repeat_playback": true}"#).unwrap();
    assert_eq!(config.minimum_buffer_duration, 2.5);
    assert!(config.repeat_playback);
    assert_eq!(config.interval_of_time_observation, 500);
    assert!(config.allows_picture_in_picture_playback);
}

#[test]
fn test_config_from_json_rejects_invalid_values() {
    let err = PlayerConfig::from_json(r#"{"volume": 1.5}"#).unwrap_err();
    assert_eq!(err.error_code(), "INVALID_CONFIG");

    let err = PlayerConfig::from_json("not json").unwrap_err();
    assert!(matches!(err, Error::ConfigParse(_)));
}

// =============================================================================
// Controller Scenarios
// =============================================================================

#[tokio::test]
async fn test_happy_path_and_user_pause() {
    let sim = SimulatedBackend::new();
    let recorder = Recorder::default();
    let controller = PlayerController::spawn(sim.clone(), PlayerConfig::default(), recorder.clone()).unwrap();

    ready(&controller, &sim).await;
    controller.play(None);
    wait_for_playback(&controller, PlaybackStatus::Playing).await;

    sim.set_current_time(10.0);
    controller.pause();
    wait_for_playback(&controller, PlaybackStatus::Paused).await;

    controller.shutdown().await.unwrap();
    eventually(|| recorder.playback().len() == 3).await;
    assert_eq!(
        recorder.playback(),
        vec![PlaybackStatus::Playing, PlaybackStatus::Paused, PlaybackStatus::Unstarted]
    );
    assert_eq!(
        recorder.seen().first(),
        Some(&Notification::PlayerStatusChanged {
            status: PlayerStatus::ReadyToPlay
        })
    );
}

#[tokio::test]
async fn test_stall_with_insufficient_then_sufficient_buffer() {
    let sim = SimulatedBackend::new();
    let controller = PlayerController::spawn(sim.clone(), PlayerConfig::default(), Recorder::default()).unwrap();

    ready(&controller, &sim).await;
    controller.play(None);
    wait_for_playback(&controller, PlaybackStatus::Playing).await;
    let player = sim.latest_player().unwrap();

    sim.report_stalled();
    wait_for_playback(&controller, PlaybackStatus::Stalled).await;

    sim.report_buffered(vec![TimeRange::new(0.0, 3.0)]);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(controller.playback_status(), PlaybackStatus::Stalled);
    assert_eq!(sim.count_calls(|call| *call == BackendCall::Play(player)), 1);

    sim.report_buffered(vec![TimeRange::new(0.0, 6.0)]);
    wait_for_playback(&controller, PlaybackStatus::Playing).await;
    assert_eq!(sim.count_calls(|call| *call == BackendCall::Play(player)), 2);
}

#[tokio::test]
async fn test_rapid_reload_ignores_superseded_probe() {
    let sim = SimulatedBackend::new();
    let recorder = Recorder::default();
    let controller = PlayerController::spawn(sim.clone(), PlayerConfig::default(), recorder.clone()).unwrap();

    controller.load(movie());
    controller.snapshot().await.unwrap();
    let first = sim.latest_asset().unwrap();

    controller.load(Url::parse("https://cdn.example.com/trailer.m3u8").unwrap());
    let snapshot = controller.snapshot().await.unwrap();
    sim.complete_probe_for(first, ProbeOutcome::Rejected("late".to_string()));
    controller.snapshot().await.unwrap();

    // The stale rejection must not fail the new session
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(controller.player_status(), PlayerStatus::Unknown);
    assert_eq!(controller.snapshot().await.unwrap().session, snapshot.session);

    sim.resolve_probe();
    eventually(|| sim.latest_player().is_some()).await;
    assert!(recorder.seen().is_empty());
}

#[tokio::test]
async fn test_background_detach_and_foreground_reattach() {
    let sim = SimulatedBackend::new();
    let controller = PlayerController::spawn(sim.clone(), PlayerConfig::default(), Recorder::default()).unwrap();

    ready(&controller, &sim).await;
    controller.play(None);
    wait_for_playback(&controller, PlaybackStatus::Playing).await;
    let player = sim.latest_player();

    sim.enter_background();
    eventually(|| sim.bound_player().is_none()).await;
    let snapshot = controller.snapshot().await.unwrap();
    assert_eq!(snapshot.attachment, Attachment::Detached);
    assert_eq!(snapshot.playback_status, PlaybackStatus::Playing);

    sim.enter_foreground();
    eventually(|| sim.bound_player() == player).await;
    assert_eq!(controller.snapshot().await.unwrap().attachment, Attachment::Attached);
}

#[tokio::test]
async fn test_repeat_playback_restarts_item() {
    let sim = SimulatedBackend::new();
    let recorder = Recorder::default();
    let config = PlayerConfig {
        repeat_playback: true,
        ..PlayerConfig::default()
    };
    let controller = PlayerController::spawn(sim.clone(), config, recorder.clone()).unwrap();

    ready(&controller, &sim).await;
    controller.play(None);
    wait_for_playback(&controller, PlaybackStatus::Playing).await;

    sim.report_ended();
    eventually(|| recorder.playback().len() == 3).await;
    assert_eq!(
        recorder.playback(),
        vec![PlaybackStatus::Playing, PlaybackStatus::Ended, PlaybackStatus::Playing]
    );
}

#[tokio::test]
async fn test_ready_for_display_reaches_observer() {
    let sim = SimulatedBackend::new();
    let recorder = Recorder::default();
    let controller = PlayerController::spawn(sim.clone(), PlayerConfig::default(), recorder.clone()).unwrap();

    ready(&controller, &sim).await;
    sim.set_ready_for_display(true);
    eventually(|| recorder.seen().contains(&Notification::ReadyForDisplay)).await;
    assert!(controller.snapshot().await.unwrap().ready_for_display);
}

#[tokio::test]
async fn test_dropping_every_handle_releases_backend() {
    let sim = SimulatedBackend::new();
    let controller = PlayerController::spawn(sim.clone(), PlayerConfig::default(), Recorder::default()).unwrap();
    ready(&controller, &sim).await;
    assert_eq!(sim.active_subscriptions(), 5);

    drop(controller);
    eventually(|| sim.host_subscriptions() == 0).await;
    assert_eq!(sim.active_subscriptions(), 0);
    assert_eq!(sim.subscribe_count(), sim.unsubscribe_count());
}

// =============================================================================
// Core Without A Runtime
// =============================================================================

#[test]
fn test_core_is_usable_synchronously() {
    let sim = SimulatedBackend::new();
    let (mut core, mut channels) = PlayerCore::new(sim.clone(), PlayerConfig::default());

    core.load(movie());
    sim.resolve_probe();
    while let Ok(envelope) = channels.events.try_recv() {
        core.handle(envelope);
    }

    assert!(core.session().is_some());
    assert_eq!(core.duration(), 60.0);
    assert_eq!(sim.active_subscriptions(), 5);
}

#[test]
fn test_controller_on_current_thread_runtime() {
    tokio_test::block_on(async {
        let sim = SimulatedBackend::new();
        let controller = PlayerController::spawn(sim.clone(), PlayerConfig::default(), Recorder::default()).unwrap();
        controller.set_volume(0.25);
        let snapshot = controller.snapshot().await.unwrap();
        assert_eq!(snapshot.volume, 0.25);
        assert_eq!(snapshot.player_status, PlayerStatus::Unknown);
    });
}
