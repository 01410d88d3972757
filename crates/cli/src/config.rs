//! Demo configuration.

use cache::LayerCacheConfig;
use gpu::{AtlasConfig, GpuCaps};
use hoister::HoisterConfig;

/// Demo configuration.
#[derive(Clone, Debug)]
pub struct DemoConfig {
    /// Viewport width.
    pub viewport_width: u32,
    /// Viewport height.
    pub viewport_height: u32,
    /// Number of frames to render.
    pub frames: u32,
    /// How many times each sub-scene is drawn.
    pub copies: u32,
    /// Atlas page size.
    pub atlas_size: u32,
    /// Maximum number of cached layers.
    pub cache_capacity: usize,
    /// Whether small layers go into the atlas.
    pub atlas_enabled: bool,
}

impl DemoConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set viewport size.
    pub fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }

    pub fn with_frames(mut self, frames: u32) -> Self {
        self.frames = frames;
        self
    }

    pub fn with_copies(mut self, copies: u32) -> Self {
        self.copies = copies;
        self
    }

    pub fn with_atlas_size(mut self, size: u32) -> Self {
        self.atlas_size = size;
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn with_atlas(mut self, enabled: bool) -> Self {
        self.atlas_enabled = enabled;
        self
    }

    /// Cache settings derived from the device and the demo flags.
    pub fn cache_config(&self, caps: &GpuCaps) -> LayerCacheConfig {
        let config = LayerCacheConfig::for_caps(caps).with_capacity(self.cache_capacity);
        if self.atlas_enabled {
            config
        } else {
            config.with_atlas(false)
        }
    }

    /// Atlas page size, clamped to the device limit.
    pub fn atlas_config(&self, caps: &GpuCaps) -> AtlasConfig {
        AtlasConfig::default().with_page_size(self.atlas_size.min(caps.max_texture_size))
    }

    pub fn hoister_config(&self) -> HoisterConfig {
        HoisterConfig::default()
    }
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            viewport_width: 1280,
            viewport_height: 720,
            frames: 3,
            copies: 4,
            atlas_size: 2048,
            cache_capacity: 1024,
            atlas_enabled: true,
        }
    }
}
