//! Error types for the resolver boundary.
//!
//! The orchestrator itself never returns errors to its callers -- per-scene
//! failures are isolated and logged. [`ResolverError`] is what a backend
//! implementation surfaces when a lookup fails.

use worldstream_types::SceneId;

/// Errors produced by a [`SceneResolver`] backend.
///
/// [`SceneResolver`]: crate::resolver::SceneResolver
#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    /// The backend lookup itself failed (transport, availability).
    #[error("backend lookup failed: {message}")]
    Backend {
        /// Description of the failure.
        message: String,
    },

    /// The backend returned a manifest payload that could not be decoded.
    #[error("manifest decode failed for scene {id}: {reason}")]
    Decode {
        /// The scene whose manifest was malformed.
        id: SceneId,
        /// Why decoding failed.
        reason: String,
    },
}
