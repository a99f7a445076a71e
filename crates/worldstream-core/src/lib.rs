//! Scene lifecycle orchestration for the Worldstream streamer.
//!
//! This crate owns the hard part of the streamer: resolving which scenes
//! occupy the parcels an observer can see, deduplicating concurrent
//! resolution requests per parcel, tracking each scene's loading lifecycle,
//! and emitting transition events for the renderer.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `worldstream-config.yaml`
//!   into strongly-typed structs.
//! - [`error`] -- [`ResolverError`], the resolver boundary error type.
//! - [`lifecycle`] -- [`SceneLifecycle`], the orchestrator itself.
//! - [`resolver`] -- [`SceneResolver`] trait and [`StaticSceneResolver`].
//!
//! [`ResolverError`]: error::ResolverError
//! [`SceneLifecycle`]: lifecycle::SceneLifecycle
//! [`SceneResolver`]: resolver::SceneResolver
//! [`StaticSceneResolver`]: resolver::StaticSceneResolver

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod resolver;

// Re-export primary types at crate root.
pub use config::{ConfigError, LoggingConfig, StreamerConfig, StreamingConfig, WorldConfig};
pub use error::ResolverError;
pub use lifecycle::{SceneLifecycle, VisibilityDelta};
pub use resolver::{SceneResolver, StaticSceneResolver};
