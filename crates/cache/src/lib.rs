//! Cross-frame cache of layer textures.

pub mod layer_cache;

pub use layer_cache::{
    CacheStats, InMemoryLayerCache, LayerCache, LayerCacheConfig, LayerHandle, LayerPlacement,
};
