//! Demo runner for the Worldstream streamer.
//!
//! Wires the lifecycle orchestrator to the in-memory demo world and walks a
//! scripted observer across it, logging every lifecycle event the renderer
//! would receive.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `worldstream-config.yaml` (defaults if absent)
//! 2. Initialize structured logging (tracing)
//! 3. Build the demo world resolver and the orchestrator
//! 4. Publish the render distance and start the event logger task
//! 5. Walk the observer, reconciling a visibility delta per step
//! 6. Log the final scene census

mod error;
mod world;

use std::path::Path;

use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use worldstream_core::{SceneLifecycle, StreamerConfig};
use worldstream_events::{RenderDistanceFeed, SceneEvent, SceneStatusUpdate, StatusFeed};
use worldstream_types::SceneState;

use crate::error::RunnerError;

/// Path of the optional configuration file, relative to the working dir.
const CONFIG_PATH: &str = "worldstream-config.yaml";

/// Application entry point for the demo runner.
///
/// # Errors
///
/// Returns an error if configuration loading fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration (before logging so the level can come from it).
    let config = load_config()?;

    // 2. Initialize structured logging; RUST_LOG overrides the config level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!(
        world = config.world.name,
        render_distance = config.streaming.render_distance,
        empty_parcels = config.streaming.empty_parcels_enabled,
        "worldstream-runner starting"
    );

    // 3. Build the demo world and the orchestrator.
    let resolver = world::demo_world();
    info!(scenes = resolver.scene_count(), "demo world created");
    let lifecycle = SceneLifecycle::new(resolver, &config.streaming);

    // 4. Process-wide feeds and the event logger task.
    let render_distance = RenderDistanceFeed::new(config.streaming.render_distance);
    let status_feed = StatusFeed::new();
    let logger = spawn_event_logger(&lifecycle, status_feed.clone());

    // 5. Walk the observer across the world.
    let distance = render_distance.current();
    let mut previous = None;
    for &position in world::WALK {
        let (sighted, lost) = world::step_delta(previous, position, distance);
        let delta = lifecycle.report_visibility_delta(&sighted, &lost).await;
        info!(
            x = position.0,
            y = position.1,
            sighted = delta.sighted.len(),
            lost = delta.lost_sight.len(),
            "observer stepped"
        );

        // Wait for the fire-and-forget loads, then play the renderer's
        // part: report data loaded and a successful start for every scene
        // that woke up.
        lifecycle.drain_loads().await;
        for id in lifecycle.scenes_in_state(SceneState::Awake).await {
            lifecycle.report_data_loaded(&id).await;
            lifecycle.report_status(&id, SceneState::Ready).await;
        }
        previous = Some(position);
    }

    // 6. Final census.
    let ready = lifecycle.scenes_in_state(SceneState::Ready).await;
    let unloaded = lifecycle.scenes_in_state(SceneState::Unloaded).await;
    info!(
        ready = ready.len(),
        unloaded = unloaded.len(),
        last_status = ?status_feed.latest().map(|u| u.state),
        "walk finished"
    );

    logger.abort();
    Ok(())
}

/// Load configuration, falling back to defaults when the file is absent.
fn load_config() -> Result<StreamerConfig, RunnerError> {
    let path = Path::new(CONFIG_PATH);
    if path.exists() {
        Ok(StreamerConfig::from_file(path)?)
    } else {
        Ok(StreamerConfig::default())
    }
}

/// Subscribe to the orchestrator's bus, log every event, and forward
/// status changes to the process-wide feed.
fn spawn_event_logger<R: worldstream_core::SceneResolver>(
    lifecycle: &SceneLifecycle<R>,
    status_feed: StatusFeed,
) -> tokio::task::JoinHandle<()> {
    let mut rx = lifecycle.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(SceneEvent::Preload { id }) => info!(scene = %id, "preload"),
                Ok(SceneEvent::Unload { id }) => info!(scene = %id, "unload"),
                Ok(SceneEvent::Start { id }) => info!(scene = %id, "start"),
                Ok(SceneEvent::StatusChanged { id, state }) => {
                    info!(scene = %id, %state, "status changed");
                    status_feed.publish(SceneStatusUpdate { id, state });
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event logger lagged behind the bus");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
