//! Built-in demo world and observer visibility math.
//!
//! The demo world is a small strip of published scenes with gaps of empty
//! parcels between them, enough to exercise multi-parcel scenes, empty
//! synthesis, and load/unload churn as the observer walks east.

use std::collections::BTreeSet;

use worldstream_core::StaticSceneResolver;
use worldstream_types::{Parcel, SceneId, SceneManifest};

/// Grid position of the observer.
pub type Position = (i32, i32);

/// The scripted walk the runner drives, west to east.
pub const WALK: &[Position] = &[(0, 0), (2, 0), (4, 0), (6, 0)];

/// Build the fixed demo world.
///
/// Three scenes along the walk: a four-parcel plaza at the origin, a
/// two-parcel museum, and a single-parcel tower off the path. Everything
/// else is empty space.
pub fn demo_world() -> StaticSceneResolver {
    let scenes = [
        manifest(
            "genesis-plaza",
            "Genesis Plaza",
            &[(0, 0), (0, 1), (1, 0), (1, 1)],
        ),
        manifest("museum", "Museum District", &[(3, 0), (4, 0)]),
        manifest("tower", "Watchtower", &[(6, 1)]),
    ];
    StaticSceneResolver::with_scenes(scenes.into_iter().flatten())
}

fn manifest(id: &str, title: &str, coords: &[(i32, i32)]) -> Option<SceneManifest> {
    let parcels = coords.iter().map(|&(x, y)| Parcel::at(x, y)).collect();
    SceneManifest::new(SceneId::new(id), parcels, title)
}

/// All parcels within `distance` (Chebyshev) of the observer.
pub fn visible_parcels(center: Position, distance: u32) -> BTreeSet<Parcel> {
    let d = i32::try_from(distance).unwrap_or(i32::MAX);
    let mut parcels = BTreeSet::new();
    for x in center.0.saturating_sub(d)..=center.0.saturating_add(d) {
        for y in center.1.saturating_sub(d)..=center.1.saturating_add(d) {
            parcels.insert(Parcel::at(x, y));
        }
    }
    parcels
}

/// The sighted/lost parcel delta for one observer step.
///
/// Sighted parcels are visible from `to` but not from `from`; lost parcels
/// the reverse. `from = None` means the observer just spawned and sights
/// everything visible.
pub fn step_delta(
    from: Option<Position>,
    to: Position,
    distance: u32,
) -> (Vec<Parcel>, Vec<Parcel>) {
    let now = visible_parcels(to, distance);
    let before = from.map_or_else(BTreeSet::new, |p| visible_parcels(p, distance));

    let sighted = now.difference(&before).cloned().collect();
    let lost = before.difference(&now).cloned().collect();
    (sighted, lost)
}
