//! Shared texture atlas for small layers.

use crate::texture::TextureId;
use common::IRect;
use parking_lot::Mutex;

/// A region within an atlas page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AtlasRegion {
    /// The page texture holding the region.
    pub texture: TextureId,
    /// Sub-rectangle inside the page texture.
    pub rect: IRect,
}

/// Space allocation within shared atlas textures.
///
/// Implementations are internally synchronized.
pub trait AtlasManager: Send + Sync {
    /// Reserve a `width` x `height` region, or `None` when the atlas is full.
    fn allocate(&self, width: u32, height: u32) -> Option<AtlasRegion>;

    /// Give a region back.
    fn free(&self, region: &AtlasRegion);

    /// Side length of a page.
    fn page_size(&self) -> u32;
}

/// Atlas settings.
#[derive(Clone, Debug)]
pub struct AtlasConfig {
    /// Side length of each square page.
    pub page_size: u32,
    /// Maximum number of pages.
    pub max_pages: usize,
    /// Padding between regions.
    pub padding: u32,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            page_size: 2048,
            max_pages: 2,
            padding: 1,
        }
    }
}

impl AtlasConfig {
    pub fn with_page_size(mut self, size: u32) -> Self {
        self.page_size = size;
        self
    }

    pub fn with_max_pages(mut self, pages: usize) -> Self {
        self.max_pages = pages;
        self
    }
}

/// One page: a texture filled row by row.
struct AtlasPage {
    texture: TextureId,
    /// Current row y position.
    current_y: u32,
    /// Current row height.
    current_row_height: u32,
    /// Current x position in row.
    current_x: u32,
    /// Regions handed out and not yet freed.
    live: usize,
}

impl AtlasPage {
    fn new() -> Self {
        Self {
            texture: TextureId::next(),
            current_y: 0,
            current_row_height: 0,
            current_x: 0,
            live: 0,
        }
    }

    fn allocate(&mut self, size: u32, padding: u32, width: u32, height: u32) -> Option<IRect> {
        let padded_width = width + padding * 2;
        let padded_height = height + padding * 2;

        if padded_width > size {
            return None;
        }

        // Check if fits in current row
        let (mut x, mut y, mut row_height) =
            (self.current_x, self.current_y, self.current_row_height);
        if x + padded_width > size {
            x = 0;
            y += row_height;
            row_height = 0;
        }

        if y + padded_height > size {
            return None;
        }

        self.current_x = x + padded_width;
        self.current_y = y;
        self.current_row_height = row_height.max(padded_height);
        self.live += 1;

        Some(IRect::new((x + padding) as i32, (y + padding) as i32, width, height))
    }

    fn reset(&mut self) {
        self.current_x = 0;
        self.current_y = 0;
        self.current_row_height = 0;
    }
}

/// Row-packing atlas over a bounded number of pages.
///
/// Rows cannot be compacted, so a page only gets its space back once every
/// region on it has been freed.
pub struct ShelfAtlas {
    pages: Mutex<Vec<AtlasPage>>,
    config: AtlasConfig,
}

impl ShelfAtlas {
    pub fn new(config: AtlasConfig) -> Self {
        Self {
            pages: Mutex::new(Vec::new()),
            config,
        }
    }

    /// Number of pages created so far.
    pub fn page_count(&self) -> usize {
        self.pages.lock().len()
    }

    /// Regions currently handed out across all pages.
    pub fn live_regions(&self) -> usize {
        self.pages.lock().iter().map(|page| page.live).sum()
    }
}

impl Default for ShelfAtlas {
    fn default() -> Self {
        Self::new(AtlasConfig::default())
    }
}

impl AtlasManager for ShelfAtlas {
    fn allocate(&self, width: u32, height: u32) -> Option<AtlasRegion> {
        if width == 0 || height == 0 {
            return None;
        }
        let AtlasConfig { page_size, max_pages, padding } = self.config;
        let mut pages = self.pages.lock();

        for page in pages.iter_mut() {
            if let Some(rect) = page.allocate(page_size, padding, width, height) {
                return Some(AtlasRegion { texture: page.texture, rect });
            }
        }

        if pages.len() >= max_pages {
            tracing::trace!(width, height, "atlas full");
            return None;
        }

        let mut page = AtlasPage::new();
        let rect = page.allocate(page_size, padding, width, height)?;
        let texture = page.texture;
        tracing::debug!(%texture, "created atlas page");
        pages.push(page);
        Some(AtlasRegion { texture, rect })
    }

    fn free(&self, region: &AtlasRegion) {
        let mut pages = self.pages.lock();
        let Some(page) = pages.iter_mut().find(|page| page.texture == region.texture) else {
            tracing::warn!(texture = %region.texture, "freed a region from an unknown atlas page");
            return;
        };
        page.live = page.live.saturating_sub(1);
        if page.live == 0 {
            page.reset();
        }
    }

    fn page_size(&self) -> u32 {
        self.config.page_size
    }
}
