//! The set of layers locked by one scan.

use cache::{LayerCache, LayerHandle};
use common::geometry::{IPoint, IRect, Transform};
use common::LayerKey;
use indexmap::IndexMap;
use scene::Scene;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// Where one occurrence of a layer is composited.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    /// Device-space origin of the layer.
    pub offset: IPoint,
    /// Transform from the layer's scene to the device.
    pub transform: Transform,
}

/// A cached layer the scan found and locked.
#[derive(Clone)]
pub struct LayerCandidate {
    pub key: LayerKey,
    pub handle: LayerHandle,
    /// Scene that recorded the layer.
    pub scene: Arc<Scene>,
    /// Device bounds of the first occurrence.
    pub bounds: IRect,
    /// Every occurrence, in discovery order. The first one is rendered; the
    /// others are aliases sharing its texture.
    pub placements: SmallVec<[Placement; 1]>,
}

impl LayerCandidate {
    pub fn primary(&self) -> &Placement {
        &self.placements[0]
    }

    pub fn aliases(&self) -> &[Placement] {
        &self.placements[1..]
    }
}

impl fmt::Debug for LayerCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayerCandidate")
            .field("key", &self.key)
            .field("bounds", &self.bounds)
            .field("placements", &self.placements.len())
            .finish()
    }
}

/// A locked layer together with the work it needs.
#[derive(Clone, Debug)]
pub enum HoistedLayer {
    /// Needs rendering into the shared atlas.
    Atlased(LayerCandidate),
    /// Needs rendering into its own texture.
    NonAtlased(LayerCandidate),
    /// Already valid; only needs placing.
    Recycled(LayerCandidate),
}

impl HoistedLayer {
    pub fn candidate(&self) -> &LayerCandidate {
        match self {
            Self::Atlased(c) | Self::NonAtlased(c) | Self::Recycled(c) => c,
        }
    }

    pub(crate) fn candidate_mut(&mut self) -> &mut LayerCandidate {
        match self {
            Self::Atlased(c) | Self::NonAtlased(c) | Self::Recycled(c) => c,
        }
    }

    pub fn is_atlased(&self) -> bool {
        matches!(self, Self::Atlased(_))
    }

    pub fn is_non_atlased(&self) -> bool {
        matches!(self, Self::NonAtlased(_))
    }

    pub fn is_recycled(&self) -> bool {
        matches!(self, Self::Recycled(_))
    }
}

/// Layers locked by one call to `find_layers_to_hoist`.
///
/// Each entry holds exactly one lock in the cache. The plan is consumed by
/// `unlock_layers`; if it is dropped instead, the locks are released then.
pub struct HoistPlan {
    cache: Arc<dyn LayerCache>,
    layers: IndexMap<LayerKey, HoistedLayer>,
    released: bool,
}

impl HoistPlan {
    pub(crate) fn new(cache: Arc<dyn LayerCache>, layers: IndexMap<LayerKey, HoistedLayer>) -> Self {
        Self {
            cache,
            layers,
            released: false,
        }
    }

    /// Layers in discovery order.
    pub fn layers(&self) -> impl Iterator<Item = &HoistedLayer> {
        self.layers.values()
    }

    pub fn get(&self, key: LayerKey) -> Option<&HoistedLayer> {
        self.layers.get(&key)
    }

    pub fn atlased(&self) -> impl Iterator<Item = &LayerCandidate> {
        self.layers().filter_map(|layer| match layer {
            HoistedLayer::Atlased(c) => Some(c),
            _ => None,
        })
    }

    pub fn non_atlased(&self) -> impl Iterator<Item = &LayerCandidate> {
        self.layers().filter_map(|layer| match layer {
            HoistedLayer::NonAtlased(c) => Some(c),
            _ => None,
        })
    }

    pub fn recycled(&self) -> impl Iterator<Item = &LayerCandidate> {
        self.layers().filter_map(|layer| match layer {
            HoistedLayer::Recycled(c) => Some(c),
            _ => None,
        })
    }

    /// Number of distinct layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Unlock every layer once.
    pub(crate) fn release(mut self) {
        self.unlock_all();
    }

    fn unlock_all(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        for key in self.layers.keys() {
            self.cache.unlock(*key);
        }
    }
}

impl Drop for HoistPlan {
    fn drop(&mut self) {
        if !self.released {
            tracing::warn!(layers = self.layers.len(), "hoist plan dropped without unlock_layers");
            self.unlock_all();
        }
    }
}

impl fmt::Debug for HoistPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HoistPlan")
            .field("layers", &self.layers)
            .field("released", &self.released)
            .finish()
    }
}
