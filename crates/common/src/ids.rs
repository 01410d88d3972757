//! Stable identities used as cache keys.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_SCENE_ID: AtomicU32 = AtomicU32::new(1);

/// Identity of a recorded scene. Unique for the lifetime of the process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SceneId(u32);

impl SceneId {
    /// Allocate a fresh id.
    pub fn next() -> Self {
        Self(NEXT_SCENE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }
}

/// Key of a cached layer: the owning scene plus the layer id within it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerKey {
    pub scene: SceneId,
    pub layer: u32,
}

impl LayerKey {
    #[inline]
    pub const fn new(scene: SceneId, layer: u32) -> Self {
        Self { scene, layer }
    }
}

impl fmt::Display for LayerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scene#{}/layer#{}", self.scene.0, self.layer)
    }
}
