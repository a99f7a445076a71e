//! Lifecycle events and delivery channels for the Worldstream streamer.
//!
//! The orchestrator announces scene transitions as [`SceneEvent`]s over a
//! [`SceneEventBus`], a thin wrapper around [`tokio::sync::broadcast`].
//! Delivery is best-effort fan-out: zero subscribers is not an error, and a
//! subscriber that falls behind skips to the newest events.
//!
//! Two process-wide last-writer-wins feeds complement the bus, built on
//! [`tokio::sync::watch`]: [`StatusFeed`] carries the most recent scene
//! status report and [`RenderDistanceFeed`] the current render distance.
//! Neither buffers -- late subscribers observe only the latest value.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tracing::trace;
use worldstream_types::{SceneId, SceneState};

/// Default capacity of the scene event broadcast channel.
///
/// A subscriber that falls behind by more than this many events receives
/// [`broadcast::error::RecvError::Lagged`] and resumes at the newest event.
pub const EVENT_BUS_CAPACITY: usize = 256;

/// A scene lifecycle transition announced by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SceneEvent {
    /// Loading was initiated; the renderer should begin preloading assets.
    Preload {
        /// The scene entering `awake`.
        id: SceneId,
    },
    /// The scene left sight (or was invalidated) and should be torn down.
    Unload {
        /// The scene leaving `awake`.
        id: SceneId,
    },
    /// Scene data finished loading; the renderer should start the scene.
    Start {
        /// The scene entering `loaded`.
        id: SceneId,
    },
    /// An externally-driven state overwrite was applied.
    StatusChanged {
        /// The affected scene.
        id: SceneId,
        /// The new state tag.
        state: SceneState,
    },
}

impl SceneEvent {
    /// The scene this event concerns.
    pub const fn scene_id(&self) -> &SceneId {
        match self {
            Self::Preload { id } | Self::Unload { id } | Self::Start { id } => id,
            Self::StatusChanged { id, .. } => id,
        }
    }
}

/// Best-effort broadcast channel for [`SceneEvent`]s.
///
/// Cloning the bus clones the sender; all clones feed the same subscribers.
#[derive(Debug, Clone)]
pub struct SceneEventBus {
    tx: broadcast::Sender<SceneEvent>,
}

impl SceneEventBus {
    /// Create a bus with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(EVENT_BUS_CAPACITY)
    }

    /// Create a bus with an explicit channel capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all events emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<SceneEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all current subscribers.
    ///
    /// Returns the number of receivers the event reached. Zero receivers is
    /// normal (nobody is listening yet) and not an error.
    pub fn emit(&self, event: SceneEvent) -> usize {
        trace!(scene = %event.scene_id(), "emitting scene event");
        // send errs only when there are zero receivers, which is fine for a
        // fire-and-forget bus.
        self.tx.send(event).unwrap_or(0)
    }
}

impl Default for SceneEventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Payload of the process-wide status feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneStatusUpdate {
    /// The reported scene.
    pub id: SceneId,
    /// Its reported state.
    pub state: SceneState,
}

/// Last-writer-wins feed of the most recent scene status report.
///
/// `None` until the first report is published.
#[derive(Debug, Clone)]
pub struct StatusFeed {
    // watch senders are single-producer; clones of the feed share one.
    tx: Arc<watch::Sender<Option<SceneStatusUpdate>>>,
}

impl StatusFeed {
    /// Create a feed with no report published yet.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Publish a status update, replacing any previous value.
    pub fn publish(&self, update: SceneStatusUpdate) {
        // send_replace succeeds even with zero subscribers.
        let _ = self.tx.send_replace(Some(update));
    }

    /// Subscribe to the feed; the receiver starts at the current value.
    pub fn subscribe(&self) -> watch::Receiver<Option<SceneStatusUpdate>> {
        self.tx.subscribe()
    }

    /// The most recently published update, if any.
    pub fn latest(&self) -> Option<SceneStatusUpdate> {
        self.tx.borrow().clone()
    }
}

impl Default for StatusFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// Last-writer-wins feed of the current render distance, in parcels.
#[derive(Debug, Clone)]
pub struct RenderDistanceFeed {
    tx: Arc<watch::Sender<u32>>,
}

impl RenderDistanceFeed {
    /// Create a feed starting at the given distance.
    pub fn new(initial: u32) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    /// Publish a new render distance, replacing the previous value.
    pub fn publish(&self, parcels: u32) {
        let _ = self.tx.send_replace(parcels);
    }

    /// Subscribe to the feed; the receiver starts at the current value.
    pub fn subscribe(&self) -> watch::Receiver<u32> {
        self.tx.subscribe()
    }

    /// The current render distance.
    pub fn current(&self) -> u32 {
        *self.tx.borrow()
    }
}
