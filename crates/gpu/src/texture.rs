//! Texture handles and the standalone render-target pool.

use common::{HoistError, HoistResult};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TEXTURE_ID: AtomicU64 = AtomicU64::new(1);

/// Handle to a GPU texture. The texture itself is owned by whoever allocated it
/// (the atlas or the texture pool); holders of a `TextureId` never free it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(u64);

impl TextureId {
    /// Allocate a fresh, never reused id.
    pub fn next() -> Self {
        Self(NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TextureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tex#{}", self.0)
    }
}

/// A render-target texture description.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureDesc {
    pub id: TextureId,
    pub width: u32,
    pub height: u32,
}

impl TextureDesc {
    #[inline]
    pub fn byte_size(&self) -> u64 {
        self.width as u64 * self.height as u64 * 4
    }

    #[inline]
    fn fits(&self, width: u32, height: u32) -> bool {
        self.width >= width && self.height >= height
    }
}

/// Texture pool settings.
#[derive(Clone, Debug)]
pub struct TexturePoolConfig {
    /// Largest texture the device can create.
    pub max_texture_size: u32,
    /// Released textures kept around for reuse.
    pub max_free_textures: usize,
}

impl Default for TexturePoolConfig {
    fn default() -> Self {
        Self {
            max_texture_size: 4096,
            max_free_textures: 16,
        }
    }
}

impl TexturePoolConfig {
    pub fn with_max_texture_size(mut self, size: u32) -> Self {
        self.max_texture_size = size;
        self
    }

    pub fn with_max_free_textures(mut self, count: usize) -> Self {
        self.max_free_textures = count;
        self
    }
}

#[derive(Default)]
struct PoolState {
    free: Vec<TextureDesc>,
    in_use: Vec<TextureDesc>,
    created: u64,
}

/// Pool of standalone render targets for layers that do not go into the atlas.
pub struct TexturePool {
    state: Mutex<PoolState>,
    config: TexturePoolConfig,
}

impl TexturePool {
    pub fn new(config: TexturePoolConfig) -> Self {
        Self {
            state: Mutex::new(PoolState::default()),
            config,
        }
    }

    pub fn config(&self) -> &TexturePoolConfig {
        &self.config
    }

    /// Get a texture at least `width` x `height`, reusing the smallest free one
    /// that fits.
    pub fn acquire(&self, width: u32, height: u32) -> HoistResult<TextureDesc> {
        let max = self.config.max_texture_size;
        if width > max || height > max {
            return Err(HoistError::TextureTooLarge { width, height, max });
        }
        if width == 0 || height == 0 {
            return Err(HoistError::allocation("empty texture requested"));
        }

        let mut state = self.state.lock();
        let best = state
            .free
            .iter()
            .enumerate()
            .filter(|(_, desc)| desc.fits(width, height))
            .min_by_key(|(_, desc)| desc.byte_size())
            .map(|(index, _)| index);

        let desc = match best {
            Some(index) => state.free.swap_remove(index),
            None => {
                state.created += 1;
                TextureDesc {
                    id: TextureId::next(),
                    width,
                    height,
                }
            }
        };
        state.in_use.push(desc);
        Ok(desc)
    }

    /// Return a texture to the pool.
    pub fn release(&self, id: TextureId) {
        let mut state = self.state.lock();
        let Some(index) = state.in_use.iter().position(|desc| desc.id == id) else {
            tracing::warn!(%id, "released a texture the pool does not own");
            return;
        };
        let desc = state.in_use.swap_remove(index);
        if state.free.len() < self.config.max_free_textures {
            state.free.push(desc);
        } else {
            tracing::trace!(%id, "dropping released texture, free list full");
        }
    }

    pub fn in_use(&self) -> usize {
        self.state.lock().in_use.len()
    }

    pub fn free_count(&self) -> usize {
        self.state.lock().free.len()
    }

    /// Number of textures created over the pool's lifetime.
    pub fn created(&self) -> u64 {
        self.state.lock().created
    }
}

impl Default for TexturePool {
    fn default() -> Self {
        Self::new(TexturePoolConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_and_reuse() {
        let pool = TexturePool::default();
        let a = pool.acquire(100, 50).unwrap();
        assert_eq!((a.width, a.height), (100, 50));
        pool.release(a.id);
        assert_eq!(pool.free_count(), 1);

        // A smaller request reuses the free texture.
        let b = pool.acquire(80, 40).unwrap();
        assert_eq!(b.id, a.id);
        assert_eq!(pool.created(), 1);

        // A larger one does not fit and creates a new texture.
        let c = pool.acquire(200, 200).unwrap();
        assert_ne!(c.id, a.id);
        assert_eq!(pool.created(), 2);
        assert_eq!(pool.in_use(), 2);
    }

    #[test]
    fn test_reuse_prefers_smallest_fit() {
        let pool = TexturePool::default();
        let big = pool.acquire(512, 512).unwrap();
        let small = pool.acquire(64, 64).unwrap();
        pool.release(big.id);
        pool.release(small.id);

        assert_eq!(pool.acquire(32, 32).unwrap().id, small.id);
    }

    #[test]
    fn test_too_large() {
        let pool = TexturePool::new(TexturePoolConfig::default().with_max_texture_size(256));
        assert_eq!(
            pool.acquire(300, 10),
            Err(HoistError::TextureTooLarge { width: 300, height: 10, max: 256 })
        );
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn test_free_list_is_bounded() {
        let pool = TexturePool::new(TexturePoolConfig::default().with_max_free_textures(1));
        let a = pool.acquire(10, 10).unwrap();
        let b = pool.acquire(10, 10).unwrap();
        pool.release(a.id);
        pool.release(b.id);
        assert_eq!(pool.free_count(), 1);
        assert_eq!(pool.in_use(), 0);
    }
}
