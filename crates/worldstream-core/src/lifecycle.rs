//! The scene lifecycle orchestrator.
//!
//! [`SceneLifecycle`] owns three tables: the parcel-to-scene memo cache, the
//! in-flight resolution handles that deduplicate concurrent backend lookups,
//! and the per-scene status table. Callers report visibility deltas (parcels
//! newly sighted / newly out of sight); the orchestrator resolves both sets,
//! initiates loading for sighted scenes, and unloads scenes that are out of
//! sight and not re-sighted in the same report.
//!
//! # Concurrency
//!
//! All tables live under one async mutex that is never held across a call
//! into the resolver backend. Concurrent resolution requests for the same
//! parcel share a single in-flight handle: exactly one backend batch call is
//! made and every waiter observes the same resolved value.
//!
//! Scene loads are dispatched as independent tasks and are *not* awaited by
//! [`report_visibility_delta`] -- the method returns once loading has been
//! initiated, not completed. [`drain_loads`] joins all outstanding load
//! tasks, mainly for tests and orderly shutdown. A failure or panic in one
//! load task never affects its siblings.
//!
//! [`report_visibility_delta`]: SceneLifecycle::report_visibility_delta
//! [`drain_loads`]: SceneLifecycle::drain_loads

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinSet;
use tracing::{debug, warn};
use worldstream_events::{SceneEvent, SceneEventBus};
use worldstream_types::{Parcel, SceneId, SceneState, SceneStatus};

use crate::config::StreamingConfig;
use crate::resolver::SceneResolver;

/// Value broadcast to every waiter on an in-flight parcel resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ParcelResolution {
    /// The backend lookup has not completed yet.
    Pending,
    /// The final value: the scene occupying the parcel, or nothing.
    Resolved(Option<SceneId>),
}

/// Resolved scene-id sets returned by a visibility report.
///
/// Both sets reflect *resolution*, not load completion: a scene in
/// `sighted` has had loading initiated but not necessarily finished.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisibilityDelta {
    /// Scenes occupying the newly sighted parcels.
    pub sighted: BTreeSet<SceneId>,
    /// Scenes occupying the newly lost-sight parcels.
    pub lost_sight: BTreeSet<SceneId>,
}

/// Per-parcel outcome of the table scan, before any backend call.
enum Slot {
    /// Cache hit; value already final.
    Ready(Option<SceneId>),
    /// Another request is in flight; await its handle.
    Wait(watch::Receiver<ParcelResolution>),
    /// This request owns the lookup; part of the new batch.
    Fetch(Parcel),
}

/// The three orchestrator tables, guarded together.
///
/// Invariant: a parcel is in `pending` XOR in `parcel_to_scene` XOR in
/// neither -- never both. Entries move from `pending` to the cache under a
/// single lock acquisition when the batch result is committed.
struct Tables {
    /// Memoized parcel resolution (`None` = no scene, and synthesis is off).
    parcel_to_scene: BTreeMap<Parcel, Option<SceneId>>,
    /// In-flight resolution handles, at most one per parcel.
    pending: BTreeMap<Parcel, watch::Sender<ParcelResolution>>,
    /// Status records for every successfully fetched manifest.
    scenes: BTreeMap<SceneId, SceneStatus>,
}

struct Inner<R> {
    resolver: R,
    events: SceneEventBus,
    empty_parcels: bool,
    tables: Mutex<Tables>,
}

impl<R: SceneResolver> Inner<R> {
    /// Fetch-and-wake path for one scene, run as an independent task.
    ///
    /// Unknown scenes fetch their manifest first; a fetch failure is logged
    /// and leaves no status entry, so the scene is retried the next time it
    /// is sighted. Known scenes (including unloaded ones) skip the fetch.
    async fn load_scene(&self, id: SceneId) {
        let known = self.tables.lock().await.scenes.contains_key(&id);
        if !known {
            match self.resolver.resolve_manifest(&id).await {
                Ok(Some(manifest)) => {
                    let mut tables = self.tables.lock().await;
                    tables
                        .scenes
                        .entry(id.clone())
                        .or_insert_with(|| SceneStatus::new(manifest));
                }
                Ok(None) => {
                    debug!(scene = %id, "no manifest for scene, skipping load");
                    return;
                }
                Err(error) => {
                    warn!(scene = %id, %error, "manifest fetch failed, will retry on next sighting");
                    return;
                }
            }
        }

        let woke = {
            let mut tables = self.tables.lock().await;
            tables.scenes.get_mut(&id).is_some_and(SceneStatus::wake)
        };
        if woke {
            self.events.emit(SceneEvent::Preload { id });
        }
    }
}

/// Orchestrates which scenes are loaded based on observed parcels.
///
/// Cheap to clone: clones share the same tables, event bus, and load task
/// set. Generic over the [`SceneResolver`] backend.
pub struct SceneLifecycle<R> {
    inner: Arc<Inner<R>>,
    loads: Arc<Mutex<JoinSet<()>>>,
}

impl<R> Clone for SceneLifecycle<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            loads: Arc::clone(&self.loads),
        }
    }
}

impl<R: SceneResolver> SceneLifecycle<R> {
    /// Create an orchestrator with its own event bus sized from config.
    pub fn new(resolver: R, streaming: &StreamingConfig) -> Self {
        Self::with_bus(
            resolver,
            streaming,
            SceneEventBus::with_capacity(streaming.event_capacity),
        )
    }

    /// Create an orchestrator emitting on an externally-owned bus.
    pub fn with_bus(resolver: R, streaming: &StreamingConfig, events: SceneEventBus) -> Self {
        Self {
            inner: Arc::new(Inner {
                resolver,
                events,
                empty_parcels: streaming.empty_parcels_enabled,
                tables: Mutex::new(Tables {
                    parcel_to_scene: BTreeMap::new(),
                    pending: BTreeMap::new(),
                    scenes: BTreeMap::new(),
                }),
            }),
            loads: Arc::new(Mutex::new(JoinSet::new())),
        }
    }

    /// The event bus this orchestrator emits on.
    pub fn events(&self) -> &SceneEventBus {
        &self.inner.events
    }

    /// Subscribe to lifecycle events emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<SceneEvent> {
        self.inner.events.subscribe()
    }

    /// Reconcile a visibility delta reported by the observer.
    ///
    /// Resolves the sighted parcels, then the lost-sight parcels (a parcel
    /// appearing in both sets is resolved once and the value reused),
    /// initiates loading for every sighted scene, and unloads every scene
    /// that is lost and not also sighted. Returns both resolved sets.
    ///
    /// This method never fails: per-scene errors are logged and isolated so
    /// one bad scene cannot abort the batch. It returns once loading has
    /// been *initiated* -- newly sighted scenes have not necessarily
    /// reached `awake` yet (see [`drain_loads`]).
    ///
    /// [`drain_loads`]: SceneLifecycle::drain_loads
    pub async fn report_visibility_delta(
        &self,
        sighted: &[Parcel],
        lost_sight: &[Parcel],
    ) -> VisibilityDelta {
        let sighted_ids: BTreeSet<SceneId> = self
            .resolve_parcels(sighted)
            .await
            .into_iter()
            .flatten()
            .collect();
        let lost_ids: BTreeSet<SceneId> = self
            .resolve_parcels(lost_sight)
            .await
            .into_iter()
            .flatten()
            .collect();

        self.start_loading(sighted_ids.iter().cloned()).await;

        let still_lost: Vec<SceneId> = lost_ids.difference(&sighted_ids).cloned().collect();
        self.stop_loading(&still_lost).await;

        debug!(
            sighted = sighted_ids.len(),
            lost = lost_ids.len(),
            unloaded = still_lost.len(),
            "visibility delta reconciled"
        );

        VisibilityDelta {
            sighted: sighted_ids,
            lost_sight: lost_ids,
        }
    }

    /// Invalidate a scene and load whatever now occupies its parcels.
    ///
    /// Emits [`SceneEvent::Unload`], clears every table entry for the scene
    /// (and the backend's own cache), re-resolves the scene's parcel list
    /// from scratch and initiates loading for the result -- normally the
    /// same scene, but a republished manifest may yield a different id.
    /// No-op for unknown scenes.
    pub async fn reload_scene(&self, id: &SceneId) {
        let parcels = {
            let tables = self.inner.tables.lock().await;
            tables
                .scenes
                .get(id)
                .map(|status| status.manifest().parcels.clone())
        };
        let Some(parcels) = parcels else {
            debug!(scene = %id, "reload requested for unknown scene");
            return;
        };

        self.invalidate(id).await;
        self.inner.events.emit(SceneEvent::Unload { id: id.clone() });

        let ids: BTreeSet<SceneId> = self
            .resolve_parcels(&parcels)
            .await
            .into_iter()
            .flatten()
            .collect();
        self.start_loading(ids).await;
    }

    /// Report that a scene's data finished loading.
    ///
    /// Transitions `awake -> loaded` and emits [`SceneEvent::Start`].
    /// Silently ignores unknown scenes and any other current state, so
    /// late or duplicate reports are harmless.
    pub async fn report_data_loaded(&self, id: &SceneId) {
        let marked = {
            let mut tables = self.inner.tables.lock().await;
            tables
                .scenes
                .get_mut(id)
                .is_some_and(SceneStatus::mark_loaded)
        };
        if marked {
            self.inner.events.emit(SceneEvent::Start { id: id.clone() });
        }
    }

    /// Whether the renderer can stop waiting on this scene.
    ///
    /// True iff the scene is known and in `ready` or `failed`.
    pub async fn is_renderable(&self, id: &SceneId) -> bool {
        self.inner
            .tables
            .lock()
            .await
            .scenes
            .get(id)
            .is_some_and(SceneStatus::is_renderable)
    }

    /// Overwrite a scene's state with no transition validation.
    ///
    /// Escape hatch for externally-driven state (render-engine failures and
    /// the like). Emits [`SceneEvent::StatusChanged`] when the scene is
    /// known; logs and no-ops otherwise.
    pub async fn report_status(&self, id: &SceneId, state: SceneState) {
        let known = {
            let mut tables = self.inner.tables.lock().await;
            match tables.scenes.get_mut(id) {
                Some(status) => {
                    status.force_state(state);
                    true
                }
                None => false,
            }
        };
        if known {
            self.inner.events.emit(SceneEvent::StatusChanged {
                id: id.clone(),
                state,
            });
        } else {
            warn!(scene = %id, %state, "status report for unknown scene");
        }
    }

    /// Forget a scene entirely, leaving its parcels eligible for a fresh
    /// resolution.
    ///
    /// Removes the status entry, purges every parcel of the manifest from
    /// the cache and the in-flight table (dropping an in-flight handle
    /// unblocks its waiters with "absent"), and tells the resolver to drop
    /// its own cached mapping. Idempotent: unknown scenes are a no-op.
    pub async fn invalidate(&self, id: &SceneId) {
        let parcels = {
            let mut tables = self.inner.tables.lock().await;
            match tables.scenes.remove(id) {
                Some(status) => {
                    let parcels = status.manifest().parcels.clone();
                    for parcel in &parcels {
                        tables.parcel_to_scene.remove(parcel);
                        tables.pending.remove(parcel);
                    }
                    parcels
                }
                None => Vec::new(),
            }
        };
        if !parcels.is_empty() {
            self.inner.resolver.invalidate_parcels(&parcels).await;
            debug!(scene = %id, parcels = parcels.len(), "scene invalidated");
        }
    }

    /// Current state of a scene, if tracked.
    pub async fn scene_state(&self, id: &SceneId) -> Option<SceneState> {
        self.inner
            .tables
            .lock()
            .await
            .scenes
            .get(id)
            .map(SceneStatus::state)
    }

    /// All tracked scenes currently in the given state.
    pub async fn scenes_in_state(&self, state: SceneState) -> Vec<SceneId> {
        self.inner
            .tables
            .lock()
            .await
            .scenes
            .iter()
            .filter(|(_, status)| status.state() == state)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Join every outstanding load task.
    ///
    /// The public contract never awaits loads; this hook exists for tests
    /// and orderly shutdown. A panicked or cancelled task is logged and
    /// does not affect the others.
    pub async fn drain_loads(&self) {
        let mut loads = self.loads.lock().await;
        while let Some(result) = loads.join_next().await {
            if let Err(error) = result {
                warn!(%error, "scene load task aborted");
            }
        }
    }

    /// Resolve parcels to scene ids, deduplicating concurrent requests.
    ///
    /// Cached parcels are reused; parcels with an in-flight handle await
    /// that handle; the rest form a single backend batch call. Results come
    /// back for every requested parcel in input order. A batch failure
    /// resolves its parcels as absent *without* caching, so they are
    /// retried the next time they are sighted.
    async fn resolve_parcels(&self, parcels: &[Parcel]) -> Vec<Option<SceneId>> {
        let mut slots = Vec::with_capacity(parcels.len());
        let mut batch: Vec<Parcel> = Vec::new();
        {
            let mut tables = self.inner.tables.lock().await;
            for parcel in parcels {
                if let Some(cached) = tables.parcel_to_scene.get(parcel) {
                    slots.push(Slot::Ready(cached.clone()));
                } else if let Some(tx) = tables.pending.get(parcel) {
                    slots.push(Slot::Wait(tx.subscribe()));
                } else {
                    let (tx, _rx) = watch::channel(ParcelResolution::Pending);
                    tables.pending.insert(parcel.clone(), tx);
                    batch.push(parcel.clone());
                    slots.push(Slot::Fetch(parcel.clone()));
                }
            }
        }

        let fetched = if batch.is_empty() {
            BTreeMap::new()
        } else {
            self.fetch_batch(&batch).await
        };

        let mut resolved = Vec::with_capacity(slots.len());
        for slot in slots {
            match slot {
                Slot::Ready(value) => resolved.push(value),
                Slot::Fetch(parcel) => resolved.push(fetched.get(&parcel).cloned().flatten()),
                Slot::Wait(mut rx) => {
                    let value = match rx
                        .wait_for(|r| matches!(r, ParcelResolution::Resolved(_)))
                        .await
                    {
                        Ok(resolution) => match &*resolution {
                            ParcelResolution::Resolved(value) => value.clone(),
                            ParcelResolution::Pending => None,
                        },
                        // Handle dropped by invalidation before resolving.
                        Err(_) => None,
                    };
                    resolved.push(value);
                }
            }
        }
        resolved
    }

    /// Perform one backend batch lookup and commit the results.
    ///
    /// Commits cache entries and resolves the in-flight handles under a
    /// single lock acquisition, after the backend call returns. The lock is
    /// never held across the call itself.
    async fn fetch_batch(&self, batch: &[Parcel]) -> BTreeMap<Parcel, Option<SceneId>> {
        let mut fetched = BTreeMap::new();
        match self.inner.resolver.resolve_parcels(batch).await {
            Ok(pairs) => {
                let mut tables = self.inner.tables.lock().await;
                for (parcel, id) in pairs {
                    let value = match id {
                        Some(id) => Some(id),
                        None if self.inner.empty_parcels => Some(SceneId::empty_for(&parcel)),
                        None => None,
                    };
                    if let Some(tx) = tables.pending.remove(&parcel) {
                        tables.parcel_to_scene.insert(parcel.clone(), value.clone());
                        let _ = tx.send(ParcelResolution::Resolved(value.clone()));
                    } else {
                        // Invalidated while the batch was in flight: leave
                        // the parcel uncached so it re-resolves next time.
                        debug!(%parcel, "parcel invalidated during batch, result not cached");
                    }
                    fetched.insert(parcel, value);
                }
                // The backend contract is one pair per requested parcel.
                // Drop the handle for anything it omitted so waiters
                // unblock; the parcel stays uncached and is retried later.
                for parcel in batch {
                    if !fetched.contains_key(parcel) {
                        warn!(%parcel, "backend omitted parcel from batch result");
                        tables.pending.remove(parcel);
                    }
                }
            }
            Err(error) => {
                warn!(%error, parcels = batch.len(), "batch parcel resolution failed");
                let mut tables = self.inner.tables.lock().await;
                for parcel in batch {
                    if let Some(tx) = tables.pending.remove(parcel) {
                        let _ = tx.send(ParcelResolution::Resolved(None));
                    }
                    fetched.insert(parcel.clone(), None);
                }
            }
        }
        fetched
    }

    /// Initiate loading for each scene as an independent task.
    ///
    /// Fire-and-forget: callers observe initiation, not completion. Scenes
    /// already tracked skip the manifest fetch and wake directly.
    async fn start_loading(&self, ids: impl IntoIterator<Item = SceneId>) {
        let mut loads = self.loads.lock().await;
        for id in ids {
            let inner = Arc::clone(&self.inner);
            loads.spawn(async move { inner.load_scene(id).await });
        }
    }

    /// Unload every scene in the set that is currently awake.
    ///
    /// Scenes in any other state are untouched, which makes unloading
    /// idempotent and safe for scenes that never started loading.
    async fn stop_loading(&self, ids: &[SceneId]) {
        let mut tables = self.inner.tables.lock().await;
        for id in ids {
            if let Some(status) = tables.scenes.get_mut(id) {
                if status.sleep() {
                    self.inner.events.emit(SceneEvent::Unload { id: id.clone() });
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use worldstream_types::SceneManifest;

    use super::*;
    use crate::error::ResolverError;

    /// Test resolver over a fixed parcel index that records every call and
    /// can delay or fail batch lookups.
    #[derive(Debug, Clone, Default)]
    struct RecordingResolver {
        manifests: BTreeMap<SceneId, SceneManifest>,
        index: BTreeMap<Parcel, SceneId>,
        batch_calls: Arc<StdMutex<Vec<Vec<Parcel>>>>,
        manifest_calls: Arc<StdMutex<Vec<SceneId>>>,
        invalidations: Arc<StdMutex<Vec<Vec<Parcel>>>>,
        batch_delay: Option<Duration>,
        fail_batches: Arc<AtomicBool>,
    }

    impl RecordingResolver {
        fn with_scene(id: &str, parcels: &[Parcel]) -> Self {
            let mut resolver = Self::default();
            resolver.add_scene(id, parcels);
            resolver
        }

        fn add_scene(&mut self, id: &str, parcels: &[Parcel]) {
            let id = SceneId::new(id);
            for parcel in parcels {
                self.index.insert(parcel.clone(), id.clone());
            }
            let manifest = SceneManifest::new(id.clone(), parcels.to_vec(), "").unwrap();
            self.manifests.insert(id, manifest);
        }

        fn batch_call_count(&self) -> usize {
            self.batch_calls.lock().unwrap().len()
        }

        fn manifest_call_count(&self) -> usize {
            self.manifest_calls.lock().unwrap().len()
        }
    }

    impl SceneResolver for RecordingResolver {
        async fn resolve_manifest(
            &self,
            id: &SceneId,
        ) -> Result<Option<SceneManifest>, ResolverError> {
            self.manifest_calls.lock().unwrap().push(id.clone());
            if let Some(manifest) = self.manifests.get(id) {
                return Ok(Some(manifest.clone()));
            }
            if let Some(parcel) = id.empty_parcel() {
                return Ok(Some(SceneManifest::empty_at(&parcel)));
            }
            Ok(None)
        }

        async fn resolve_parcels(
            &self,
            parcels: &[Parcel],
        ) -> Result<Vec<(Parcel, Option<SceneId>)>, ResolverError> {
            if let Some(delay) = self.batch_delay {
                tokio::time::sleep(delay).await;
            }
            self.batch_calls.lock().unwrap().push(parcels.to_vec());
            if self.fail_batches.load(Ordering::SeqCst) {
                return Err(ResolverError::Backend {
                    message: "backend down".to_owned(),
                });
            }
            Ok(parcels
                .iter()
                .map(|p| (p.clone(), self.index.get(p).cloned()))
                .collect())
        }

        async fn invalidate_parcels(&self, parcels: &[Parcel]) {
            self.invalidations.lock().unwrap().push(parcels.to_vec());
        }
    }

    fn lifecycle(resolver: RecordingResolver) -> SceneLifecycle<RecordingResolver> {
        SceneLifecycle::new(resolver, &StreamingConfig::default())
    }

    fn lifecycle_without_empty(resolver: RecordingResolver) -> SceneLifecycle<RecordingResolver> {
        let streaming = StreamingConfig {
            empty_parcels_enabled: false,
            ..StreamingConfig::default()
        };
        SceneLifecycle::new(resolver, &streaming)
    }

    fn drain_events(rx: &mut broadcast::Receiver<SceneEvent>) -> Vec<SceneEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_batch_call() {
        let mut resolver = RecordingResolver::with_scene("x", &[Parcel::at(0, 0)]);
        resolver.batch_delay = Some(Duration::from_millis(20));
        let counters = resolver.clone();
        let lc = lifecycle_without_empty(resolver);

        let parcels = [Parcel::at(0, 0)];
        let (first, second) = tokio::join!(
            lc.report_visibility_delta(&parcels, &[]),
            lc.report_visibility_delta(&parcels, &[]),
        );

        assert_eq!(counters.batch_call_count(), 1);
        let recorded = counters.batch_calls.lock().unwrap().clone();
        assert_eq!(recorded.first().map(Vec::len), Some(1));
        assert_eq!(first.sighted, second.sighted);
        assert!(first.sighted.contains(&SceneId::new("x")));
    }

    #[tokio::test]
    async fn resolved_parcels_are_cached() {
        let resolver = RecordingResolver::with_scene("x", &[Parcel::at(1, 1)]);
        let counters = resolver.clone();
        let lc = lifecycle_without_empty(resolver);

        let parcels = [Parcel::at(1, 1)];
        lc.report_visibility_delta(&parcels, &[]).await;
        lc.report_visibility_delta(&parcels, &[]).await;
        lc.report_visibility_delta(&[], &parcels).await;

        assert_eq!(counters.batch_call_count(), 1);
    }

    #[tokio::test]
    async fn duplicate_parcel_in_one_call_resolves_once() {
        let resolver = RecordingResolver::with_scene("x", &[Parcel::at(2, 2)]);
        let counters = resolver.clone();
        let lc = lifecycle_without_empty(resolver);

        // Same parcel sighted and lost in one report.
        let parcels = [Parcel::at(2, 2)];
        let delta = lc.report_visibility_delta(&parcels, &parcels).await;

        assert_eq!(counters.batch_call_count(), 1);
        assert_eq!(delta.sighted, delta.lost_sight);
        // Sighted wins: the scene is not unloaded.
        lc.drain_loads().await;
        assert_eq!(
            lc.scene_state(&SceneId::new("x")).await,
            Some(SceneState::Awake)
        );
    }

    #[tokio::test]
    async fn empty_parcels_synthesize_placeholder_ids() {
        let lc = lifecycle(RecordingResolver::default());
        let parcel = Parcel::at(9, 9);

        let delta = lc.report_visibility_delta(&[parcel.clone()], &[]).await;

        let expected = SceneId::empty_for(&parcel);
        assert!(delta.sighted.contains(&expected));
        assert_eq!(expected.as_str().len(), worldstream_types::EMPTY_SCENE_ID_LEN);

        lc.drain_loads().await;
        assert_eq!(lc.scene_state(&expected).await, Some(SceneState::Awake));
    }

    #[tokio::test]
    async fn empty_parcels_filtered_when_synthesis_disabled() {
        let lc = lifecycle_without_empty(RecordingResolver::default());

        let delta = lc.report_visibility_delta(&[Parcel::at(9, 9)], &[]).await;

        assert!(delta.sighted.is_empty());
        assert!(delta.lost_sight.is_empty());
    }

    #[tokio::test]
    async fn diff_excludes_scenes_still_sighted() {
        let mut resolver = RecordingResolver::with_scene("a", &[Parcel::at(0, 0)]);
        resolver.add_scene("b", &[Parcel::at(0, 1)]);
        resolver.add_scene("c", &[Parcel::at(0, 2)]);
        let lc = lifecycle_without_empty(resolver);
        let mut rx = lc.subscribe();

        // Make B and C awake first.
        lc.report_visibility_delta(&[Parcel::at(0, 1), Parcel::at(0, 2)], &[])
            .await;
        lc.drain_loads().await;
        drain_events(&mut rx);

        // Sighted {A, B}, lost {B, C}: only C is unloaded.
        let delta = lc
            .report_visibility_delta(
                &[Parcel::at(0, 0), Parcel::at(0, 1)],
                &[Parcel::at(0, 1), Parcel::at(0, 2)],
            )
            .await;
        lc.drain_loads().await;

        let ids: Vec<&str> = delta.sighted.iter().map(SceneId::as_str).collect();
        assert_eq!(ids, vec!["a", "b"]);
        let lost: Vec<&str> = delta.lost_sight.iter().map(SceneId::as_str).collect();
        assert_eq!(lost, vec!["b", "c"]);

        let unloads: Vec<SceneEvent> = drain_events(&mut rx)
            .into_iter()
            .filter(|e| matches!(e, SceneEvent::Unload { .. }))
            .collect();
        assert_eq!(
            unloads,
            vec![SceneEvent::Unload {
                id: SceneId::new("c")
            }]
        );
        assert_eq!(
            lc.scene_state(&SceneId::new("b")).await,
            Some(SceneState::Awake)
        );
    }

    #[tokio::test]
    async fn unload_twice_emits_one_event() {
        let resolver = RecordingResolver::with_scene("x", &[Parcel::at(0, 0)]);
        let lc = lifecycle_without_empty(resolver);
        lc.report_visibility_delta(&[Parcel::at(0, 0)], &[]).await;
        lc.drain_loads().await;

        let mut rx = lc.subscribe();
        let ids = [SceneId::new("x")];
        lc.stop_loading(&ids).await;
        lc.stop_loading(&ids).await;

        let unloads = drain_events(&mut rx);
        assert_eq!(
            unloads,
            vec![SceneEvent::Unload {
                id: SceneId::new("x")
            }]
        );
        assert_eq!(
            lc.scene_state(&SceneId::new("x")).await,
            Some(SceneState::Unloaded)
        );
    }

    #[tokio::test]
    async fn batch_failure_is_isolated_and_retried() {
        let resolver = RecordingResolver::with_scene("x", &[Parcel::at(3, 3)]);
        let counters = resolver.clone();
        counters.fail_batches.store(true, Ordering::SeqCst);
        let lc = lifecycle_without_empty(resolver);

        // Failure: no scenes resolved, nothing cached, no error surfaced.
        let delta = lc.report_visibility_delta(&[Parcel::at(3, 3)], &[]).await;
        assert!(delta.sighted.is_empty());

        // Backend recovers: the parcel is retried on the next sighting.
        counters.fail_batches.store(false, Ordering::SeqCst);
        let delta = lc.report_visibility_delta(&[Parcel::at(3, 3)], &[]).await;
        assert!(delta.sighted.contains(&SceneId::new("x")));
        assert_eq!(counters.batch_call_count(), 2);
    }

    #[tokio::test]
    async fn manifest_fetch_failure_leaves_no_status_entry() {
        // Parcel resolves to a scene id the manifest lookup does not know.
        let mut resolver = RecordingResolver::default();
        resolver
            .index
            .insert(Parcel::at(5, 5), SceneId::new("ghost"));
        let lc = lifecycle_without_empty(resolver);

        let delta = lc.report_visibility_delta(&[Parcel::at(5, 5)], &[]).await;
        lc.drain_loads().await;

        // Resolution reported the id, but no status entry was created.
        assert!(delta.sighted.contains(&SceneId::new("ghost")));
        assert_eq!(lc.scene_state(&SceneId::new("ghost")).await, None);
    }

    #[tokio::test]
    async fn data_loaded_requires_awake() {
        let resolver = RecordingResolver::with_scene("x", &[Parcel::at(0, 0)]);
        let lc = lifecycle_without_empty(resolver);
        let mut rx = lc.subscribe();
        let id = SceneId::new("x");

        // Unknown scene: silent no-op.
        lc.report_data_loaded(&id).await;
        assert!(drain_events(&mut rx).is_empty());

        lc.report_visibility_delta(&[Parcel::at(0, 0)], &[]).await;
        lc.drain_loads().await;
        drain_events(&mut rx);

        lc.report_data_loaded(&id).await;
        assert_eq!(lc.scene_state(&id).await, Some(SceneState::Loaded));
        assert_eq!(
            drain_events(&mut rx),
            vec![SceneEvent::Start { id: id.clone() }]
        );

        // Duplicate report: no second event.
        lc.report_data_loaded(&id).await;
        assert!(drain_events(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn report_status_overwrites_and_announces() {
        let resolver = RecordingResolver::with_scene("x", &[Parcel::at(0, 0)]);
        let lc = lifecycle_without_empty(resolver);
        let id = SceneId::new("x");

        lc.report_visibility_delta(&[Parcel::at(0, 0)], &[]).await;
        lc.drain_loads().await;
        let mut rx = lc.subscribe();

        assert!(!lc.is_renderable(&id).await);
        lc.report_status(&id, SceneState::Failed).await;
        assert!(lc.is_renderable(&id).await);
        assert_eq!(
            drain_events(&mut rx),
            vec![SceneEvent::StatusChanged {
                id: id.clone(),
                state: SceneState::Failed
            }]
        );

        // Unknown scene: logged, no event.
        lc.report_status(&SceneId::new("nobody"), SceneState::Ready)
            .await;
        assert!(drain_events(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn invalidate_purges_all_tables_and_notifies_resolver() {
        let parcels = [Parcel::at(0, 0), Parcel::at(0, 1)];
        let resolver = RecordingResolver::with_scene("x", &parcels);
        let counters = resolver.clone();
        let lc = lifecycle_without_empty(resolver);
        let id = SceneId::new("x");

        lc.report_visibility_delta(&parcels, &[]).await;
        lc.drain_loads().await;
        assert_eq!(counters.batch_call_count(), 1);
        assert_eq!(counters.manifest_call_count(), 1);

        lc.invalidate(&id).await;
        assert_eq!(lc.scene_state(&id).await, None);
        assert_eq!(
            counters.invalidations.lock().unwrap().first().map(Vec::len),
            Some(2)
        );

        // Invalidation is idempotent.
        lc.invalidate(&id).await;
        assert_eq!(counters.invalidations.lock().unwrap().len(), 1);

        // Re-sighting resolves and fetches from scratch.
        lc.report_visibility_delta(&parcels, &[]).await;
        lc.drain_loads().await;
        assert_eq!(counters.batch_call_count(), 2);
        assert_eq!(counters.manifest_call_count(), 2);
        assert_eq!(lc.scene_state(&id).await, Some(SceneState::Awake));
    }
}
