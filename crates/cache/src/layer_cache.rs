//! Layer cache with lock counts and LRU eviction.
//!
//! Entries are keyed by [`LayerKey`] and addressed through [`LayerHandle`]s while
//! locked. A locked entry is never evicted or repurposed; it becomes eligible
//! for eviction again once it has been unlocked as many times as it was locked.

use common::{HoistError, HoistResult, IRect, LayerKey, SceneId};
use gpu::{AtlasManager, AtlasRegion, GpuCaps, TextureId, TexturePool};
use lru::LruCache;
use parking_lot::Mutex;
use slotmap::{new_key_type, SlotMap};
use std::sync::Arc;

new_key_type! {
    /// Handle to a cache entry. Only meaningful while the entry is locked.
    pub struct LayerHandle;
}

/// Where a valid layer's pixels live.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayerPlacement {
    pub texture: TextureId,
    /// Region of `texture` holding the layer.
    pub rect: IRect,
    /// Whether `texture` is a shared atlas page.
    pub atlased: bool,
}

/// The contract the hoister relies on. Implementations are internally
/// synchronized; every method may be called concurrently from several
/// pipelines.
pub trait LayerCache: Send + Sync {
    /// Lock the entry for `key`, creating a placeholder on first sight.
    /// `bounds` is the layer's device-space extent.
    fn lock(&self, key: LayerKey, bounds: IRect) -> HoistResult<LayerHandle>;

    /// Drop one lock on `key`.
    fn unlock(&self, key: LayerKey);

    /// Whether the entry already holds the layer's pixels.
    fn is_valid(&self, handle: LayerHandle) -> bool;

    /// Whether the entry should be rendered into the shared atlas.
    fn prefers_atlas(&self, handle: LayerHandle) -> bool;

    /// Placement of a valid entry.
    fn placement(&self, handle: LayerHandle) -> Option<LayerPlacement>;

    /// Record that the entry's pixels were rendered to `placement` and return
    /// the placement now in effect.
    ///
    /// If another holder already made the entry valid, its placement stays and
    /// is returned; the caller keeps ownership of `placement` and must free it.
    /// Otherwise the cache takes ownership of the placement's texture space.
    fn mark_valid(&self, handle: LayerHandle, placement: LayerPlacement) -> HoistResult<LayerPlacement>;

    /// Record a failed render of the entry. Entries that are already valid are
    /// left alone.
    fn mark_failed(&self, handle: LayerHandle);

    /// Current lock count for `key`; zero for unknown keys.
    fn lock_count(&self, key: LayerKey) -> u32;
}

/// Layer cache settings.
#[derive(Clone, Debug)]
pub struct LayerCacheConfig {
    /// Maximum number of entries, locked or not.
    pub capacity: usize,
    /// Whether any layer may prefer the atlas.
    pub atlas_enabled: bool,
    /// Layers wider or taller than this get a standalone texture.
    pub max_atlas_layer_size: u32,
    /// Consecutive failed renders after which an entry is evicted as soon as
    /// it is unlocked.
    pub max_render_failures: u32,
}

impl Default for LayerCacheConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            atlas_enabled: true,
            max_atlas_layer_size: 512,
            max_render_failures: 3,
        }
    }
}

impl LayerCacheConfig {
    /// Defaults adjusted to what the device supports.
    pub fn for_caps(caps: &GpuCaps) -> Self {
        let defaults = Self::default();
        Self {
            atlas_enabled: caps.atlas_layers,
            max_atlas_layer_size: defaults.max_atlas_layer_size.min(caps.max_texture_size),
            ..defaults
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_atlas(mut self, enabled: bool) -> Self {
        self.atlas_enabled = enabled;
        self
    }

    pub fn with_max_atlas_layer_size(mut self, size: u32) -> Self {
        self.max_atlas_layer_size = size;
        self
    }

    pub fn with_max_render_failures(mut self, failures: u32) -> Self {
        self.max_render_failures = failures;
        self
    }
}

/// Cache statistics.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub locked: usize,
    pub valid: usize,
    pub evictions: u64,
}

#[derive(Debug)]
struct CachedLayer {
    key: LayerKey,
    bounds: IRect,
    valid: bool,
    prefers_atlas: bool,
    lock_count: u32,
    failures: u32,
    placement: Option<LayerPlacement>,
}

struct CacheState {
    entries: SlotMap<LayerHandle, CachedLayer>,
    /// Key index in recency order.
    recency: LruCache<LayerKey, LayerHandle>,
    evictions: u64,
}

impl CacheState {
    fn remove(&mut self, handle: LayerHandle) -> Option<CachedLayer> {
        let entry = self.entries.remove(handle)?;
        self.recency.pop(&entry.key);
        self.evictions += 1;
        Some(entry)
    }

    /// Remove the least recently used unlocked entry.
    fn evict_lru(&mut self) -> Option<CachedLayer> {
        let entries = &self.entries;
        let victim = self
            .recency
            .iter()
            .rev()
            .map(|(_, handle)| *handle)
            .find(|handle| entries.get(*handle).map_or(true, |e| e.lock_count == 0))?;
        self.remove(victim)
    }
}

/// Process-local layer cache backed by a [`TexturePool`] and an [`AtlasManager`].
pub struct InMemoryLayerCache {
    state: Mutex<CacheState>,
    config: LayerCacheConfig,
    atlas: Arc<dyn AtlasManager>,
    textures: Arc<TexturePool>,
}

impl InMemoryLayerCache {
    pub fn new(
        config: LayerCacheConfig,
        atlas: Arc<dyn AtlasManager>,
        textures: Arc<TexturePool>,
    ) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: SlotMap::with_key(),
                recency: LruCache::unbounded(),
                evictions: 0,
            }),
            config,
            atlas,
            textures,
        }
    }

    pub fn config(&self) -> &LayerCacheConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: LayerKey) -> bool {
        self.state.lock().recency.contains(&key)
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            entries: state.entries.len(),
            locked: state.entries.values().filter(|e| e.lock_count > 0).count(),
            valid: state.entries.values().filter(|e| e.valid).count(),
            evictions: state.evictions,
        }
    }

    /// Evict every unlocked entry.
    pub fn purge_unlocked(&self) {
        self.purge_where(|_| true);
    }

    /// Evict the unlocked entries belonging to `scene`, typically once the
    /// scene has been dropped.
    pub fn purge_scene(&self, scene: SceneId) {
        self.purge_where(|key| key.scene == scene);
    }

    fn purge_where(&self, mut matches: impl FnMut(&LayerKey) -> bool) {
        let mut state = self.state.lock();
        let victims: Vec<LayerHandle> = state
            .entries
            .iter()
            .filter(|(_, e)| e.lock_count == 0 && matches(&e.key))
            .map(|(handle, _)| handle)
            .collect();
        for handle in victims {
            if let Some(entry) = state.remove(handle) {
                self.release_resources(&entry);
            }
        }
    }

    fn prefers_atlas_for(&self, bounds: &IRect) -> bool {
        let limit = self.config.max_atlas_layer_size.min(self.atlas.page_size());
        self.config.atlas_enabled && bounds.width <= limit && bounds.height <= limit
    }

    fn release_placement(&self, placement: LayerPlacement) {
        if placement.atlased {
            self.atlas.free(&AtlasRegion {
                texture: placement.texture,
                rect: placement.rect,
            });
        } else {
            self.textures.release(placement.texture);
        }
    }

    fn release_resources(&self, entry: &CachedLayer) {
        tracing::trace!(key = %entry.key, "evicting layer");
        if let Some(placement) = entry.placement {
            self.release_placement(placement);
        }
    }
}

impl LayerCache for InMemoryLayerCache {
    fn lock(&self, key: LayerKey, bounds: IRect) -> HoistResult<LayerHandle> {
        let mut state = self.state.lock();

        if let Some(handle) = state.recency.get(&key).copied() {
            let prefers_atlas = self.prefers_atlas_for(&bounds);
            let Some(entry) = state.entries.get_mut(handle) else {
                return Err(HoistError::StaleHandle);
            };
            if !entry.bounds.same_size(&bounds) {
                if entry.lock_count == 0 {
                    tracing::debug!(%key, "layer size changed, invalidating");
                    if let Some(placement) = entry.placement.take() {
                        self.release_placement(placement);
                    }
                    entry.valid = false;
                    entry.bounds = bounds;
                    entry.prefers_atlas = prefers_atlas;
                } else {
                    // Someone else is using the current pixels; keep them.
                    tracing::debug!(
                        %key,
                        cached = ?(entry.bounds.width, entry.bounds.height),
                        requested = ?(bounds.width, bounds.height),
                        "layer size changed while locked elsewhere, keeping old pixels"
                    );
                }
            }
            entry.lock_count += 1;
            return Ok(handle);
        }

        if state.entries.len() >= self.config.capacity {
            match state.evict_lru() {
                Some(evicted) => self.release_resources(&evicted),
                None => return Err(HoistError::CacheExhausted),
            }
        }

        let handle = state.entries.insert(CachedLayer {
            key,
            bounds,
            valid: false,
            prefers_atlas: self.prefers_atlas_for(&bounds),
            lock_count: 1,
            failures: 0,
            placement: None,
        });
        state.recency.put(key, handle);
        tracing::trace!(%key, "created placeholder layer");
        Ok(handle)
    }

    fn unlock(&self, key: LayerKey) {
        let mut state = self.state.lock();
        let Some(handle) = state.recency.peek(&key).copied() else {
            tracing::warn!(%key, "unlock of unknown layer");
            return;
        };
        let Some(entry) = state.entries.get_mut(handle) else {
            return;
        };
        if entry.lock_count == 0 {
            tracing::warn!(%key, "unlock of a layer that is not locked");
            return;
        }
        entry.lock_count -= 1;

        if entry.lock_count == 0 && entry.failures >= self.config.max_render_failures {
            tracing::warn!(%key, failures = entry.failures, "evicting layer that keeps failing to render");
            if let Some(entry) = state.remove(handle) {
                self.release_resources(&entry);
            }
        }
    }

    fn is_valid(&self, handle: LayerHandle) -> bool {
        self.state.lock().entries.get(handle).map_or(false, |e| e.valid)
    }

    fn prefers_atlas(&self, handle: LayerHandle) -> bool {
        self.state.lock().entries.get(handle).map_or(false, |e| e.prefers_atlas)
    }

    fn placement(&self, handle: LayerHandle) -> Option<LayerPlacement> {
        let state = self.state.lock();
        let entry = state.entries.get(handle)?;
        if entry.valid {
            entry.placement
        } else {
            None
        }
    }

    fn mark_valid(&self, handle: LayerHandle, placement: LayerPlacement) -> HoistResult<LayerPlacement> {
        let mut state = self.state.lock();
        let entry = state.entries.get_mut(handle).ok_or(HoistError::StaleHandle)?;
        if entry.valid {
            if let Some(current) = entry.placement {
                // Other holders may be drawing from the current pixels.
                tracing::debug!(key = %entry.key, "layer already rendered by another holder");
                return Ok(current);
            }
        }
        if let Some(previous) = entry.placement.replace(placement) {
            if previous != placement {
                self.release_placement(previous);
            }
        }
        entry.valid = true;
        entry.failures = 0;
        Ok(placement)
    }

    fn mark_failed(&self, handle: LayerHandle) {
        if let Some(entry) = self.state.lock().entries.get_mut(handle) {
            if entry.valid {
                tracing::trace!(key = %entry.key, "render failed but another holder's pixels are valid");
                return;
            }
            entry.failures += 1;
        }
    }

    fn lock_count(&self, key: LayerKey) -> u32 {
        let state = self.state.lock();
        state
            .recency
            .peek(&key)
            .and_then(|handle| state.entries.get(*handle))
            .map_or(0, |e| e.lock_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpu::{AtlasConfig, ShelfAtlas, TexturePoolConfig};

    struct Fixture {
        cache: InMemoryLayerCache,
        atlas: Arc<ShelfAtlas>,
        textures: Arc<TexturePool>,
    }

    fn fixture(config: LayerCacheConfig) -> Fixture {
        let atlas = Arc::new(ShelfAtlas::new(AtlasConfig::default().with_page_size(1024)));
        let textures = Arc::new(TexturePool::new(TexturePoolConfig::default()));
        let cache = InMemoryLayerCache::new(config, atlas.clone(), textures.clone());
        Fixture { cache, atlas, textures }
    }

    fn key(layer: u32) -> LayerKey {
        LayerKey::new(SceneId::from_raw(1), layer)
    }

    const SMALL: IRect = IRect::new(0, 0, 64, 64);
    const LARGE: IRect = IRect::new(0, 0, 800, 600);

    #[test]
    fn test_lock_creates_placeholder() {
        let f = fixture(LayerCacheConfig::default());
        let handle = f.cache.lock(key(0), SMALL).unwrap();
        assert!(!f.cache.is_valid(handle));
        assert!(f.cache.prefers_atlas(handle));
        assert_eq!(f.cache.placement(handle), None);
        assert_eq!(f.cache.lock_count(key(0)), 1);
        assert_eq!(f.cache.len(), 1);
    }

    #[test]
    fn test_placement_preference() {
        let f = fixture(LayerCacheConfig::default());
        let large = f.cache.lock(key(1), LARGE).unwrap();
        assert!(!f.cache.prefers_atlas(large));

        let f = fixture(LayerCacheConfig::default().with_atlas(false));
        let small = f.cache.lock(key(0), SMALL).unwrap();
        assert!(!f.cache.prefers_atlas(small));
    }

    #[test]
    fn test_lock_counts_round_trip() {
        let f = fixture(LayerCacheConfig::default());
        let a = f.cache.lock(key(0), SMALL).unwrap();
        let b = f.cache.lock(key(0), SMALL).unwrap();
        assert_eq!(a, b);
        assert_eq!(f.cache.lock_count(key(0)), 2);

        f.cache.unlock(key(0));
        f.cache.unlock(key(0));
        assert_eq!(f.cache.lock_count(key(0)), 0);

        // Extra unlocks never underflow.
        f.cache.unlock(key(0));
        assert_eq!(f.cache.lock_count(key(0)), 0);
        f.cache.unlock(key(42));
        assert_eq!(f.cache.lock_count(key(42)), 0);
    }

    #[test]
    fn test_mark_valid() {
        let f = fixture(LayerCacheConfig::default());
        let handle = f.cache.lock(key(0), SMALL).unwrap();
        let placement = LayerPlacement {
            texture: TextureId::next(),
            rect: IRect::new(1, 1, 64, 64),
            atlased: true,
        };
        f.cache.mark_valid(handle, placement).unwrap();
        assert!(f.cache.is_valid(handle));
        assert_eq!(f.cache.placement(handle), Some(placement));
        assert_eq!(f.cache.stats().valid, 1);
    }

    #[test]
    fn test_eviction_skips_locked_entries() {
        let f = fixture(LayerCacheConfig::default().with_capacity(2));
        f.cache.lock(key(0), SMALL).unwrap();
        f.cache.lock(key(1), SMALL).unwrap();
        f.cache.unlock(key(1));

        // key(0) is older but locked, so key(1) goes.
        f.cache.lock(key(2), SMALL).unwrap();
        assert!(f.cache.contains(key(0)));
        assert!(!f.cache.contains(key(1)));
        assert!(f.cache.contains(key(2)));
        assert_eq!(f.cache.stats().evictions, 1);
    }

    #[test]
    fn test_exhausted_cache() {
        let f = fixture(LayerCacheConfig::default().with_capacity(1));
        f.cache.lock(key(0), SMALL).unwrap();
        assert_eq!(f.cache.lock(key(1), SMALL), Err(HoistError::CacheExhausted));
        assert_eq!(f.cache.lock_count(key(1)), 0);
        assert_eq!(f.cache.len(), 1);
    }

    #[test]
    fn test_eviction_returns_resources() {
        let f = fixture(LayerCacheConfig::default().with_capacity(2));

        let region = f.atlas.allocate(64, 64).unwrap();
        let atlased = f.cache.lock(key(0), SMALL).unwrap();
        f.cache
            .mark_valid(atlased, LayerPlacement { texture: region.texture, rect: region.rect, atlased: true })
            .unwrap();

        let texture = f.textures.acquire(800, 600).unwrap();
        let standalone = f.cache.lock(key(1), LARGE).unwrap();
        f.cache
            .mark_valid(standalone, LayerPlacement { texture: texture.id, rect: LARGE, atlased: false })
            .unwrap();

        f.cache.unlock(key(0));
        f.cache.unlock(key(1));
        f.cache.purge_unlocked();

        assert!(f.cache.is_empty());
        assert_eq!(f.atlas.live_regions(), 0);
        assert_eq!(f.textures.in_use(), 0);
        assert_eq!(f.textures.free_count(), 1);
    }

    #[test]
    fn test_size_change_invalidates() {
        let f = fixture(LayerCacheConfig::default());
        let texture = f.textures.acquire(800, 600).unwrap();
        let handle = f.cache.lock(key(0), LARGE).unwrap();
        f.cache
            .mark_valid(handle, LayerPlacement { texture: texture.id, rect: LARGE, atlased: false })
            .unwrap();
        f.cache.unlock(key(0));

        let handle = f.cache.lock(key(0), SMALL).unwrap();
        assert!(!f.cache.is_valid(handle));
        assert!(f.cache.prefers_atlas(handle));
        assert_eq!(f.textures.in_use(), 0);
    }

    #[test]
    fn test_size_change_while_locked_keeps_pixels() {
        let f = fixture(LayerCacheConfig::default());
        let texture = f.textures.acquire(800, 600).unwrap();
        let handle = f.cache.lock(key(0), LARGE).unwrap();
        f.cache
            .mark_valid(handle, LayerPlacement { texture: texture.id, rect: LARGE, atlased: false })
            .unwrap();

        let again = f.cache.lock(key(0), SMALL).unwrap();
        assert!(f.cache.is_valid(again));
        assert_eq!(f.cache.lock_count(key(0)), 2);
    }

    #[test]
    fn test_failing_layer_is_evicted_after_limit() {
        let f = fixture(LayerCacheConfig::default().with_max_render_failures(2));

        let handle = f.cache.lock(key(0), SMALL).unwrap();
        f.cache.mark_failed(handle);
        f.cache.unlock(key(0));
        assert!(f.cache.contains(key(0)), "first failure is retried");

        let handle = f.cache.lock(key(0), SMALL).unwrap();
        f.cache.mark_failed(handle);
        f.cache.unlock(key(0));
        assert!(!f.cache.contains(key(0)));

        // A stale handle is rejected.
        let placement = LayerPlacement { texture: TextureId::next(), rect: SMALL, atlased: false };
        assert_eq!(f.cache.mark_valid(handle, placement), Err(HoistError::StaleHandle));
        assert!(!f.cache.is_valid(handle));
    }

    #[test]
    fn test_mark_valid_keeps_pixels_already_in_use() {
        let f = fixture(LayerCacheConfig::default());
        let first = f.atlas.allocate(64, 64).unwrap();
        let second = f.atlas.allocate(64, 64).unwrap();
        let handle = f.cache.lock(key(0), SMALL).unwrap();
        f.cache.lock(key(0), SMALL).unwrap();

        let kept = LayerPlacement { texture: first.texture, rect: first.rect, atlased: true };
        assert_eq!(f.cache.mark_valid(handle, kept), Ok(kept));

        // A second render of the same entry does not displace the first.
        let late = LayerPlacement { texture: second.texture, rect: second.rect, atlased: true };
        assert_eq!(f.cache.mark_valid(handle, late), Ok(kept));
        assert_eq!(f.cache.placement(handle), Some(kept));
        assert_eq!(f.atlas.live_regions(), 2, "the cache freed nothing");

        // Nor does a failed one invalidate it.
        f.cache.mark_failed(handle);
        assert!(f.cache.is_valid(handle));
    }

    #[test]
    fn test_success_resets_failures() {
        let f = fixture(LayerCacheConfig::default().with_max_render_failures(2));
        let handle = f.cache.lock(key(0), SMALL).unwrap();
        f.cache.mark_failed(handle);
        let placement = LayerPlacement { texture: TextureId::next(), rect: SMALL, atlased: true };
        f.cache.mark_valid(handle, placement).unwrap();
        f.cache.mark_failed(handle);
        f.cache.unlock(key(0));
        assert!(f.cache.contains(key(0)));
    }

    #[test]
    fn test_purge_scene_keeps_locked_and_other_scenes() {
        let f = fixture(LayerCacheConfig::default());
        let other = LayerKey::new(SceneId::from_raw(2), 0);
        f.cache.lock(key(0), SMALL).unwrap();
        f.cache.lock(key(1), SMALL).unwrap();
        f.cache.lock(other, SMALL).unwrap();
        f.cache.unlock(key(1));
        f.cache.unlock(other);

        f.cache.purge_scene(SceneId::from_raw(1));
        assert!(f.cache.contains(key(0)));
        assert!(!f.cache.contains(key(1)));
        assert!(f.cache.contains(other));
    }

    #[test]
    fn test_for_caps() {
        let config = LayerCacheConfig::for_caps(&GpuCaps { max_texture_size: 256, atlas_layers: false });
        assert!(!config.atlas_enabled);
        assert_eq!(config.max_atlas_layer_size, 256);
    }
}
