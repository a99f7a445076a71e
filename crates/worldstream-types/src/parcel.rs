//! Grid parcel keys.
//!
//! A [`Parcel`] is the atomic unit of observed space: one grid cell,
//! identified by an opaque string key. The canonical key format is `"x,y"`
//! with signed integer coordinates, but the streamer never parses the key --
//! it only compares, stores, and forwards it.

use serde::{Deserialize, Serialize};

/// Opaque key identifying one grid cell.
///
/// Parcels are cheap to clone and fully ordered so they can serve as map
/// keys throughout the streamer. Many parcels map to at most one scene.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parcel(String);

impl Parcel {
    /// Create a parcel from an arbitrary key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Create a parcel from grid coordinates, producing the canonical
    /// `"x,y"` key.
    pub fn at(x: i32, y: i32) -> Self {
        Self(format!("{x},{y}"))
    }

    /// Return the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the parcel and return the inner key.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl core::fmt::Display for Parcel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Parcel {
    fn from(key: &str) -> Self {
        Self(key.to_owned())
    }
}

impl From<String> for Parcel {
    fn from(key: String) -> Self {
        Self(key)
    }
}
