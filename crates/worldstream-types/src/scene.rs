//! Scene identifiers and manifests.
//!
//! A scene is a loadable content unit occupying one or more parcels. Its
//! [`SceneManifest`] is the immutable descriptor fetched from the resolver
//! backend, enumerating the parcels the scene spans.
//!
//! Parcels with no real scene can optionally be assigned a synthetic
//! placeholder id (see [`SceneId::empty_for`]) so downstream logic treats
//! empty space as a loadable, trivial scene.

use serde::{Deserialize, Serialize};

use crate::parcel::Parcel;

/// Length every synthetic empty-scene identifier is padded to.
///
/// Ids for canonical `"x,y"` parcel keys are exactly this long; an
/// oversized key produces a proportionally longer id (see
/// [`SceneId::empty_for`]).
pub const EMPTY_SCENE_ID_LEN: usize = 40;

/// Prefix marking a synthetic empty-scene identifier.
const EMPTY_SCENE_ID_PREFIX: &str = "empty-";

/// Pad character filling synthetic ids up to [`EMPTY_SCENE_ID_LEN`].
///
/// Underscore never appears in canonical `"x,y"` parcel keys (which may
/// contain `-` for negative coordinates), so the encoded key can be
/// recovered unambiguously.
const EMPTY_SCENE_ID_PAD: char = '_';

/// Opaque identifier for a loadable content unit.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SceneId(String);

impl SceneId {
    /// Create a scene id from an arbitrary identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Return the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the id and return the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Build the deterministic placeholder id for an empty parcel.
    ///
    /// The id embeds the parcel key and is right-padded to
    /// [`EMPTY_SCENE_ID_LEN`], so the same parcel always yields the same id
    /// and ids for different parcels never collide.
    ///
    /// The fixed length holds for every canonical `"x,y"` key. A parcel key
    /// longer than the pad width is embedded whole rather than truncated,
    /// producing a longer id; determinism and [`SceneId::empty_parcel`]
    /// recovery are unaffected.
    pub fn empty_for(parcel: &Parcel) -> Self {
        let raw = format!("{EMPTY_SCENE_ID_PREFIX}{parcel}");
        Self(format!("{raw:_<width$}", width = EMPTY_SCENE_ID_LEN))
    }

    /// Whether this id is a synthetic empty-scene placeholder.
    pub fn is_empty_scene(&self) -> bool {
        self.0.starts_with(EMPTY_SCENE_ID_PREFIX)
    }

    /// Recover the parcel encoded in a synthetic empty-scene id.
    ///
    /// Returns `None` for ids not produced by [`SceneId::empty_for`].
    pub fn empty_parcel(&self) -> Option<Parcel> {
        let encoded = self.0.strip_prefix(EMPTY_SCENE_ID_PREFIX)?;
        let key = encoded.trim_end_matches(EMPTY_SCENE_ID_PAD);
        if key.is_empty() {
            return None;
        }
        Some(Parcel::new(key))
    }
}

impl core::fmt::Display for SceneId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SceneId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for SceneId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Immutable descriptor for a scene.
///
/// Fetched once per scene from the resolver backend and retained until the
/// scene is explicitly invalidated. The parcel list is the authoritative
/// footprint used for cache eviction and re-resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneManifest {
    /// The scene this manifest describes.
    pub id: SceneId,

    /// Anchor parcel the scene is positioned from.
    pub base: Parcel,

    /// Every parcel the scene occupies (includes `base`).
    pub parcels: Vec<Parcel>,

    /// Human-readable scene name, empty when the publisher set none.
    #[serde(default)]
    pub title: String,
}

impl SceneManifest {
    /// Build a manifest spanning the given parcels, anchored at the first.
    ///
    /// Returns `None` when `parcels` is empty -- a scene must occupy at
    /// least one parcel.
    pub fn new(id: SceneId, parcels: Vec<Parcel>, title: impl Into<String>) -> Option<Self> {
        let base = parcels.first()?.clone();
        Some(Self {
            id,
            base,
            parcels,
            title: title.into(),
        })
    }

    /// Build the trivial single-parcel manifest for an empty parcel.
    ///
    /// The id is the deterministic placeholder from [`SceneId::empty_for`].
    pub fn empty_at(parcel: &Parcel) -> Self {
        Self {
            id: SceneId::empty_for(parcel),
            base: parcel.clone(),
            parcels: vec![parcel.clone()],
            title: String::new(),
        }
    }
}
