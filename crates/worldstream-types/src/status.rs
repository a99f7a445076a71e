//! Per-scene lifecycle state machine.
//!
//! Every tracked scene owns a [`SceneStatus`]: the immutable manifest plus a
//! mutable [`SceneState`] tag. Transitions are explicit methods that report
//! whether they fired, so callers can make duplicate reports idempotent.
//!
//! The legal transition graph:
//!
//! ```text
//! dead ----(start loading)----> awake
//! awake --(data loaded)-------> loaded
//! awake --(stop loading)------> unloaded
//! loaded --(render engine)----> ready | failed
//! unloaded --(re-sighted)-----> awake
//! ```
//!
//! `dead` is the initial state. No state is hard-terminal: invalidation
//! removes the scene entirely instead of transitioning it. The one escape
//! hatch is [`SceneStatus::force_state`], which overwrites the tag without
//! validation for externally-driven reports (e.g. render-engine failures).

use serde::{Deserialize, Serialize};

use crate::scene::SceneManifest;

/// Lifecycle state tag for a tracked scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneState {
    /// Manifest fetched, loading not yet started.
    Dead,
    /// Loading initiated; the renderer should begin preloading.
    Awake,
    /// Scene data delivered to the renderer.
    Loaded,
    /// Loading stopped because the scene left sight.
    Unloaded,
    /// Render engine reports the scene is fully running.
    Ready,
    /// Render engine reports the scene failed to start.
    Failed,
}

impl core::fmt::Display for SceneState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let tag = match self {
            Self::Dead => "dead",
            Self::Awake => "awake",
            Self::Loaded => "loaded",
            Self::Unloaded => "unloaded",
            Self::Ready => "ready",
            Self::Failed => "failed",
        };
        write!(f, "{tag}")
    }
}

/// Owned status record for one tracked scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneStatus {
    state: SceneState,
    manifest: SceneManifest,
}

impl SceneStatus {
    /// Track a freshly fetched manifest; every scene starts `dead`.
    pub const fn new(manifest: SceneManifest) -> Self {
        Self {
            state: SceneState::Dead,
            manifest,
        }
    }

    /// Current state tag.
    pub const fn state(&self) -> SceneState {
        self.state
    }

    /// The manifest this scene was created from.
    pub const fn manifest(&self) -> &SceneManifest {
        &self.manifest
    }

    /// Transition `dead | unloaded -> awake`.
    ///
    /// Returns whether the transition fired; any other current state is
    /// left untouched.
    pub const fn wake(&mut self) -> bool {
        match self.state {
            SceneState::Dead | SceneState::Unloaded => {
                self.state = SceneState::Awake;
                true
            }
            _ => false,
        }
    }

    /// Transition `awake -> loaded`.
    pub const fn mark_loaded(&mut self) -> bool {
        match self.state {
            SceneState::Awake => {
                self.state = SceneState::Loaded;
                true
            }
            _ => false,
        }
    }

    /// Transition `awake -> unloaded`.
    pub const fn sleep(&mut self) -> bool {
        match self.state {
            SceneState::Awake => {
                self.state = SceneState::Unloaded;
                true
            }
            _ => false,
        }
    }

    /// Overwrite the state tag without validation.
    ///
    /// Escape hatch for externally-driven state reports; prefer the
    /// transition methods everywhere else.
    pub const fn force_state(&mut self, state: SceneState) {
        self.state = state;
    }

    /// Whether the scene is in the initial `dead` state.
    pub const fn is_dead(&self) -> bool {
        matches!(self.state, SceneState::Dead)
    }

    /// Whether loading has been initiated and not stopped.
    pub const fn is_awake(&self) -> bool {
        matches!(self.state, SceneState::Awake)
    }

    /// Whether the render engine reported the scene running.
    pub const fn is_ready(&self) -> bool {
        matches!(self.state, SceneState::Ready)
    }

    /// Whether the render engine reported a startup failure.
    pub const fn is_failed(&self) -> bool {
        matches!(self.state, SceneState::Failed)
    }

    /// Whether the renderer can stop waiting on this scene.
    ///
    /// Both `ready` and `failed` count: the renderer treats a failed scene
    /// as settled rather than pending.
    pub const fn is_renderable(&self) -> bool {
        self.is_ready() || self.is_failed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parcel::Parcel;

    fn status() -> SceneStatus {
        SceneStatus::new(SceneManifest::empty_at(&Parcel::at(0, 0)))
    }

    #[test]
    fn starts_dead() {
        let status = status();
        assert!(status.is_dead());
        assert_eq!(status.state(), SceneState::Dead);
    }

    #[test]
    fn wake_fires_from_dead_and_unloaded_only() {
        let mut status = status();
        assert!(status.wake());
        assert!(status.is_awake());
        // Already awake: no-op.
        assert!(!status.wake());

        assert!(status.sleep());
        assert_eq!(status.state(), SceneState::Unloaded);
        // Re-sighted after unload.
        assert!(status.wake());
        assert!(status.is_awake());
    }

    #[test]
    fn mark_loaded_requires_awake() {
        let mut status = status();
        assert!(!status.mark_loaded());
        status.force_state(SceneState::Awake);
        assert!(status.mark_loaded());
        assert_eq!(status.state(), SceneState::Loaded);
        // Duplicate report: no-op.
        assert!(!status.mark_loaded());
    }

    #[test]
    fn sleep_is_idempotent() {
        let mut status = status();
        status.force_state(SceneState::Awake);
        assert!(status.sleep());
        assert!(!status.sleep());
        assert_eq!(status.state(), SceneState::Unloaded);
    }

    #[test]
    fn renderable_means_ready_or_failed() {
        let mut status = status();
        assert!(!status.is_renderable());
        status.force_state(SceneState::Ready);
        assert!(status.is_renderable());
        status.force_state(SceneState::Failed);
        assert!(status.is_renderable());
        status.force_state(SceneState::Loaded);
        assert!(!status.is_renderable());
    }
}
