//! Shared type definitions for the Worldstream scene streamer.
//!
//! This crate is the single source of truth for the vocabulary shared across
//! the Worldstream workspace: grid parcels, scene identifiers, scene
//! manifests, and the per-scene lifecycle state machine.
//!
//! # Modules
//!
//! - [`parcel`] -- [`Parcel`], the opaque grid-cell key (`"x,y"`)
//! - [`scene`] -- [`SceneId`] and [`SceneManifest`], plus synthetic
//!   placeholder ids for empty parcels
//! - [`status`] -- [`SceneState`] and [`SceneStatus`], the lifecycle state
//!   machine driven by the orchestrator

pub mod parcel;
pub mod scene;
pub mod status;

// Re-export all public types at crate root for convenience.
pub use parcel::Parcel;
pub use scene::{EMPTY_SCENE_ID_LEN, SceneId, SceneManifest};
pub use status::{SceneState, SceneStatus};
