//! Frame loop over the hoisting pipeline.

use crate::config::DemoConfig;
use cache::{CacheStats, InMemoryLayerCache};
use common::geometry::{Rect, Transform};
use gpu::{ContextInfo, GlInterface, GpuError, ShelfAtlas, TexturePool, TexturePoolConfig};
use hoister::{HoistStats, LayerHoister, LayerPainter, ReplacingCanvas};
use scene::{Canvas, Color, Scene};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// What happened while rendering one frame.
#[derive(Clone, Debug, Default)]
pub struct FrameReport {
    /// Frame number, starting at 0.
    pub frame: u64,
    /// Layers the scan found and locked.
    pub hoisted: usize,
    /// Layers drawn from a texture in the final pass.
    pub quads: usize,
    /// Fills drawn directly in the final pass.
    pub inline_fills: usize,
    pub hoist: HoistStats,
    pub cache: CacheStats,
}

/// Canvas for the final pass that only counts what reaches it.
#[derive(Default)]
struct InlineCanvas {
    fills: usize,
}

impl Canvas for InlineCanvas {
    fn fill_rect(&mut self, _rect: Rect, _color: Color, _ctm: &Transform) {
        self.fills += 1;
    }
}

/// Owns the collaborators shared across frames and drives the pipeline.
pub struct FrameRenderer {
    config: DemoConfig,
    context: ContextInfo,
    cache: Arc<InMemoryLayerCache>,
    hoister: LayerHoister,
    frames: AtomicU64,
}

impl FrameRenderer {
    /// Detect the device behind `interface` and set up the cache, atlas and
    /// texture pool for it.
    pub fn new(config: DemoConfig, interface: &dyn GlInterface) -> Result<Self, GpuError> {
        let context = ContextInfo::create(interface)?;
        let caps = context.caps();

        let atlas = Arc::new(ShelfAtlas::new(config.atlas_config(&caps)));
        let textures = Arc::new(TexturePool::new(
            TexturePoolConfig::default().with_max_texture_size(caps.max_texture_size),
        ));
        let cache = Arc::new(InMemoryLayerCache::new(
            config.cache_config(&caps),
            atlas.clone(),
            textures.clone(),
        ));
        let hoister = LayerHoister::new(cache.clone(), atlas, textures, config.hoister_config());

        tracing::info!(
            vendor = ?context.vendor,
            renderer = ?context.renderer,
            max_texture_size = caps.max_texture_size,
            atlas = caps.atlas_layers,
            "renderer ready"
        );

        Ok(Self {
            config,
            context,
            cache,
            hoister,
            frames: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &DemoConfig {
        &self.config
    }

    pub fn context(&self) -> &ContextInfo {
        &self.context
    }

    pub fn cache(&self) -> &InMemoryLayerCache {
        &self.cache
    }

    /// Render one frame of `scene`: hoist, draw with the replacements, release.
    pub fn render_frame(&self, scene: &Arc<Scene>, painter: &mut dyn LayerPainter) -> FrameReport {
        let frame = self.frames.fetch_add(1, Ordering::Relaxed);
        let viewport = Rect::new(
            0.0,
            0.0,
            self.config.viewport_width as f32,
            self.config.viewport_height as f32,
        );

        let mut report = FrameReport {
            frame,
            ..FrameReport::default()
        };

        match self.hoister.find_layers_to_hoist(scene, &viewport) {
            Some(plan) => {
                report.hoisted = plan.len();
                let replacements = self.hoister.draw_layers(&plan, painter);

                let mut canvas = ReplacingCanvas::new(InlineCanvas::default(), &replacements);
                scene.playback(&Transform::identity(), &mut canvas);
                let (inline, quads) = canvas.into_parts();
                report.quads = quads.len();
                report.inline_fills = inline.fills;

                self.hoister.unlock_layers(plan);
            }
            None => {
                let mut canvas = InlineCanvas::default();
                scene.playback(&Transform::identity(), &mut canvas);
                report.inline_fills = canvas.fills;
            }
        }

        report.hoist = self.hoister.stats();
        report.cache = self.cache.stats();
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample;
    use gpu::StaticGlInterface;
    use hoister::RecordingPainter;

    fn renderer(config: DemoConfig) -> FrameRenderer {
        FrameRenderer::new(config, &StaticGlInterface::headless()).unwrap()
    }

    #[test]
    fn test_second_frame_recycles_everything() {
        let renderer = renderer(DemoConfig::default());
        let scene = sample::demo_scene(1280, 720, 4);
        let mut painter = RecordingPainter::new();

        let first = renderer.render_frame(&scene, &mut painter);
        assert_eq!(first.frame, 0);
        // Banner, icon and card.
        assert_eq!(first.hoisted, 3);
        assert_eq!(first.hoist.aliases, 6);
        assert_eq!(first.hoist.rendered, 3);
        assert_eq!(first.quads, 9);
        // Only the background is drawn inline.
        assert_eq!(first.inline_fills, 1);
        assert_eq!(first.cache.locked, 0);

        painter.clear();
        let second = renderer.render_frame(&scene, &mut painter);
        assert_eq!(second.hoist.recycled, 3);
        assert_eq!(second.hoist.rendered, 0);
        assert!(painter.commands().is_empty());
        assert_eq!(second.quads, 9);
    }

    #[test]
    fn test_without_atlas_everything_is_standalone() {
        let renderer = renderer(DemoConfig::default().with_atlas(false));
        let scene = sample::demo_scene(1280, 720, 2);
        let report = renderer.render_frame(&scene, &mut RecordingPainter::new());
        assert_eq!(report.hoist.atlased, 0);
        assert_eq!(report.hoist.non_atlased, 3);
    }

    #[test]
    fn test_exhausted_cache_draws_inline() {
        let renderer = renderer(DemoConfig::default().with_cache_capacity(1));
        let scene = sample::demo_scene(1280, 720, 1);
        let report = renderer.render_frame(&scene, &mut RecordingPainter::new());
        assert_eq!(report.hoisted, 1);
        assert_eq!(report.hoist.lock_failures, 2);
        assert_eq!(report.quads, 1);
        assert!(report.inline_fills > 1);
    }
}
