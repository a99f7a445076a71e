//! Scene resolver trait and in-memory implementation.
//!
//! The orchestrator is generic over a [`SceneResolver`]: the backend that
//! maps parcels to scene ids, fetches scene manifests, and drops its own
//! cached mappings on invalidation. In production this is a remote content
//! server; [`StaticSceneResolver`] serves a fixed manifest set for the demo
//! runner and for tests.

use std::collections::BTreeMap;
use std::future::Future;

use tracing::debug;
use worldstream_types::{Parcel, SceneId, SceneManifest};

use crate::error::ResolverError;

/// A backend that resolves parcels to scenes.
///
/// All methods are async: a real implementation talks to a remote content
/// server. Futures must be `Send` because scene loads are dispatched as
/// independent tasks.
pub trait SceneResolver: Send + Sync + 'static {
    /// Fetch the manifest for a scene.
    ///
    /// Returns `Ok(None)` when the backend knows no scene with this id.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError`] when the lookup itself fails; the
    /// orchestrator logs the failure and retries on the next sighting.
    fn resolve_manifest(
        &self,
        id: &SceneId,
    ) -> impl Future<Output = Result<Option<SceneManifest>, ResolverError>> + Send;

    /// Resolve a batch of parcels to scene ids.
    ///
    /// Must return exactly one `(parcel, id)` pair per requested parcel,
    /// with `None` for parcels that have no published scene.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError`] when the batch lookup fails as a whole.
    fn resolve_parcels(
        &self,
        parcels: &[Parcel],
    ) -> impl Future<Output = Result<Vec<(Parcel, Option<SceneId>)>, ResolverError>> + Send;

    /// Drop any backend-side cache for the given parcels.
    fn invalidate_parcels(&self, parcels: &[Parcel]) -> impl Future<Output = ()> + Send;
}

/// In-memory resolver over a fixed set of manifests.
///
/// Parcels not covered by any registered manifest resolve to `None`.
/// Manifest requests for synthetic empty-scene ids are answered with the
/// trivial single-parcel manifest, mirroring how a real backend treats
/// empty space.
#[derive(Debug, Clone, Default)]
pub struct StaticSceneResolver {
    manifests: BTreeMap<SceneId, SceneManifest>,
    parcel_index: BTreeMap<Parcel, SceneId>,
}

impl StaticSceneResolver {
    /// Create an empty resolver.
    pub const fn new() -> Self {
        Self {
            manifests: BTreeMap::new(),
            parcel_index: BTreeMap::new(),
        }
    }

    /// Create a resolver serving the given manifests.
    pub fn with_scenes(manifests: impl IntoIterator<Item = SceneManifest>) -> Self {
        let mut resolver = Self::new();
        for manifest in manifests {
            resolver.insert(manifest);
        }
        resolver
    }

    /// Register a manifest, indexing every parcel it spans.
    ///
    /// A parcel already claimed by another scene is reassigned to the new
    /// manifest, matching last-publish-wins backend semantics.
    pub fn insert(&mut self, manifest: SceneManifest) {
        for parcel in &manifest.parcels {
            self.parcel_index.insert(parcel.clone(), manifest.id.clone());
        }
        self.manifests.insert(manifest.id.clone(), manifest);
    }

    /// Number of registered scenes.
    pub fn scene_count(&self) -> usize {
        self.manifests.len()
    }
}

impl SceneResolver for StaticSceneResolver {
    async fn resolve_manifest(&self, id: &SceneId) -> Result<Option<SceneManifest>, ResolverError> {
        if let Some(manifest) = self.manifests.get(id) {
            return Ok(Some(manifest.clone()));
        }
        // Synthetic empty scenes carry their parcel in the id itself.
        if let Some(parcel) = id.empty_parcel() {
            return Ok(Some(SceneManifest::empty_at(&parcel)));
        }
        Ok(None)
    }

    async fn resolve_parcels(
        &self,
        parcels: &[Parcel],
    ) -> Result<Vec<(Parcel, Option<SceneId>)>, ResolverError> {
        Ok(parcels
            .iter()
            .map(|parcel| (parcel.clone(), self.parcel_index.get(parcel).cloned()))
            .collect())
    }

    async fn invalidate_parcels(&self, parcels: &[Parcel]) {
        // Nothing is cached beyond the fixed manifest set.
        debug!(parcels = parcels.len(), "static resolver invalidation (no-op)");
    }
}
