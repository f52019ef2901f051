//! Simulated playback example
//!
//! Drives a player through load, playback, a stall with automatic resume,
//! a trip to the background and the end of the item, printing every
//! observer notification.
//!
//! Run with: RUST_LOG=playerview_core=debug cargo run -p playerview-core --example simulated_playback --features test-utils

use std::time::Duration;

use anyhow::{Context, Result};
use playerview_core::testing::SimulatedBackend;
use playerview_core::{
    PlaybackStatus, PlayerConfig, PlayerController, PlayerObserver, PlayerStatus, Readiness,
    TimeRange,
};
use tracing_subscriber::EnvFilter;
use url::Url;

struct PrintingObserver;

impl PlayerObserver for PrintingObserver {
    fn player_status_changed(&mut self, status: PlayerStatus) {
        println!("  player status   -> {}", status);
    }

    fn playback_status_changed(&mut self, status: PlaybackStatus) {
        println!("  playback status -> {}", status);
    }

    fn ready_for_display(&mut self) {
        println!("  first frame ready for display");
    }

    fn current_time_changed(&mut self, current_time: f64) {
        println!("  current time    -> {:.1}s", current_time);
    }
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("PlayerView Core {} - Simulated Playback", playerview_core::VERSION);
    println!("====================================\n");

    let config = PlayerConfig::from_json(
        r#"{ "minimum_buffer_duration": 3.0, "interval_of_time_observation": 40 }"#,
    )
    .context("invalid player configuration")?;

    let sim = SimulatedBackend::new();
    let controller = PlayerController::spawn(sim.clone(), config, PrintingObserver)?;

    println!("Loading stream:");
    controller.load(Url::parse("https://cdn.example.com/movie.m3u8")?);
    controller.snapshot().await?;
    sim.resolve_probe();
    settle().await;
    sim.report_readiness(Readiness::ReadyToPlay);
    sim.set_ready_for_display(true);
    settle().await;

    println!("\nPlaying from 5s:");
    controller.play(Some(5.0));
    settle().await;

    println!("\nNetwork stall:");
    sim.report_stalled();
    sim.report_buffered(vec![TimeRange::new(5.0, 1.5)]);
    settle().await;
    sim.report_buffered(vec![TimeRange::new(5.0, 4.0)]);
    settle().await;

    println!("\nBackground and foreground:");
    sim.enter_background();
    settle().await;
    let snapshot = controller.snapshot().await?;
    println!("  attachment in background: {}", snapshot.attachment);
    sim.enter_foreground();
    settle().await;

    println!("\nEnd of item:");
    sim.report_ended();
    settle().await;

    let snapshot = controller.snapshot().await?;
    println!("\nFinal snapshot:");
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    controller.shutdown().await?;
    settle().await;
    Ok(())
}
