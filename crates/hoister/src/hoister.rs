//! Scan, render and release of hoisted layers.

use crate::painter::{LayerPainter, PaintJob};
use crate::plan::{HoistPlan, HoistedLayer, LayerCandidate, Placement};
use crate::replacements::ReplacementMap;
use cache::{LayerCache, LayerPlacement};
use common::geometry::{IRect, Rect, Transform};
use common::{HoistError, LayerKey};
use gpu::{AtlasManager, AtlasRegion, TextureId, TexturePool};
use indexmap::IndexMap;
use parking_lot::Mutex;
use scene::Scene;
use smallvec::smallvec;
use std::sync::Arc;

/// Hoister settings.
#[derive(Clone, Debug)]
pub struct HoisterConfig {
    /// When disabled no layer is hoisted and everything is drawn inline.
    pub enabled: bool,
    /// Render a layer into a standalone texture when the atlas has no room.
    pub atlas_fallback: bool,
}

impl Default for HoisterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            atlas_fallback: true,
        }
    }
}

impl HoisterConfig {
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_atlas_fallback(mut self, fallback: bool) -> Self {
        self.atlas_fallback = fallback;
        self
    }
}

/// Statistics for the most recent scan and draw.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HoistStats {
    /// Layers classified for the atlas.
    pub atlased: u32,
    /// Layers classified for standalone textures.
    pub non_atlased: u32,
    /// Layers that were already valid.
    pub recycled: u32,
    /// Extra occurrences of an already classified layer.
    pub aliases: u32,
    /// Occurrences of a classified layer at a different device size. They
    /// are drawn inline.
    pub size_mismatches: u32,
    /// Layers larger than any texture, drawn inline.
    pub oversized: u32,
    /// Layers the cache refused to lock.
    pub lock_failures: u32,
    /// Layers rendered this frame.
    pub rendered: u32,
    /// Layers left out of the replacement map.
    pub render_failures: u32,
    /// Atlased layers moved to a standalone texture.
    pub atlas_fallbacks: u32,
}

/// Drives the three hoisting phases against injected collaborators.
pub struct LayerHoister {
    cache: Arc<dyn LayerCache>,
    atlas: Arc<dyn AtlasManager>,
    textures: Arc<TexturePool>,
    config: HoisterConfig,
    stats: Mutex<HoistStats>,
}

impl LayerHoister {
    pub fn new(
        cache: Arc<dyn LayerCache>,
        atlas: Arc<dyn AtlasManager>,
        textures: Arc<TexturePool>,
        config: HoisterConfig,
    ) -> Self {
        Self {
            cache,
            atlas,
            textures,
            config,
            stats: Mutex::new(HoistStats::default()),
        }
    }

    pub fn config(&self) -> &HoisterConfig {
        &self.config
    }

    pub fn stats(&self) -> HoistStats {
        self.stats.lock().clone()
    }

    /// Find and lock the layers of `scene` that intersect `query`, including
    /// layers inside nested scenes.
    ///
    /// Returns `None` when nothing is worth hoisting; nothing is locked then.
    /// Layers the cache refuses to lock, and layers too large for a texture,
    /// are left out and get drawn inline.
    pub fn find_layers_to_hoist(&self, scene: &Arc<Scene>, query: &Rect) -> Option<HoistPlan> {
        let mut stats = HoistStats::default();
        if !self.config.enabled {
            *self.stats.lock() = stats;
            return None;
        }
        let max_size = self.textures.config().max_texture_size;

        let mut layers: IndexMap<LayerKey, HoistedLayer> = IndexMap::new();
        scene.visit_layers(query, &Transform::identity(), &mut |visit| {
            let key = visit.scene.layer_key(visit.layer.id);
            let bounds = visit.device_bounds.round_out();
            if bounds.is_empty() {
                return;
            }
            let placement = Placement {
                offset: bounds.origin(),
                transform: visit.ctm,
            };

            if let Some(existing) = layers.get_mut(&key) {
                let candidate = existing.candidate_mut();
                // One texture serves every alias, so they must share its size.
                if !candidate.bounds.size_close_to(&bounds) {
                    tracing::debug!(%key, ?bounds, primary = ?candidate.bounds, "alias differs in size, drawing inline");
                    stats.size_mismatches += 1;
                    return;
                }
                tracing::trace!(%key, ?bounds, "recording alias");
                candidate.placements.push(placement);
                stats.aliases += 1;
                return;
            }

            if bounds.width > max_size || bounds.height > max_size {
                tracing::debug!(%key, ?bounds, max_size, "layer larger than any texture, drawing inline");
                stats.oversized += 1;
                return;
            }

            let handle = match self.cache.lock(key, bounds) {
                Ok(handle) => handle,
                Err(err) => {
                    tracing::warn!(%key, %err, "could not lock layer, drawing inline");
                    stats.lock_failures += 1;
                    return;
                }
            };

            let candidate = LayerCandidate {
                key,
                handle,
                scene: visit.scene.clone(),
                bounds,
                placements: smallvec![placement],
            };
            let hoisted = if self.cache.is_valid(handle) {
                stats.recycled += 1;
                HoistedLayer::Recycled(candidate)
            } else if self.cache.prefers_atlas(handle) {
                stats.atlased += 1;
                HoistedLayer::Atlased(candidate)
            } else {
                stats.non_atlased += 1;
                HoistedLayer::NonAtlased(candidate)
            };
            tracing::debug!(%key, ?bounds, kind = kind_name(&hoisted), "classified layer");
            layers.insert(key, hoisted);
        });

        *self.stats.lock() = stats;
        if layers.is_empty() {
            return None;
        }
        Some(HoistPlan::new(self.cache.clone(), layers))
    }

    /// Render every stale layer of `plan` and describe where each layer's
    /// pixels are.
    ///
    /// Layers whose render fails are left out of the map and marked failed in
    /// the cache; the rest of the plan is unaffected. Lock counts are not
    /// touched.
    pub fn draw_layers(&self, plan: &HoistPlan, painter: &mut dyn LayerPainter) -> ReplacementMap {
        let mut replacements = ReplacementMap::new();
        let mut stats = self.stats.lock().clone();

        for candidate in plan.recycled() {
            match self.cache.placement(candidate.handle) {
                Some(placement) => {
                    replacements.insert(candidate, placement.texture, placement.rect, placement.atlased);
                }
                None => self.fail(candidate, &HoistError::StaleHandle, &mut stats),
            }
        }

        let mut batches: IndexMap<TextureId, Vec<(&LayerCandidate, AtlasRegion)>> = IndexMap::new();
        let mut standalone: Vec<&LayerCandidate> = Vec::new();
        for candidate in plan.atlased() {
            match self.atlas.allocate(candidate.bounds.width, candidate.bounds.height) {
                Some(region) => batches.entry(region.texture).or_default().push((candidate, region)),
                None if self.config.atlas_fallback => {
                    tracing::debug!(key = %candidate.key, "atlas full, using a standalone texture");
                    stats.atlas_fallbacks += 1;
                    standalone.push(candidate);
                }
                None => {
                    let err = HoistError::allocation("no atlas space");
                    self.fail(candidate, &err, &mut stats);
                }
            }
        }

        for (texture, batch) in batches {
            self.draw_atlas_batch(texture, batch, painter, &mut replacements, &mut stats);
        }

        // Standalone renders go last so atlas passes are not interleaved with them.
        standalone.extend(plan.non_atlased());
        for candidate in standalone {
            self.draw_standalone(candidate, painter, &mut replacements, &mut stats);
        }

        *self.stats.lock() = stats;
        replacements
    }

    /// Release every lock taken by the scan that produced `plan`.
    pub fn unlock_layers(&self, plan: HoistPlan) {
        plan.release();
    }

    fn draw_atlas_batch(
        &self,
        texture: TextureId,
        batch: Vec<(&LayerCandidate, AtlasRegion)>,
        painter: &mut dyn LayerPainter,
        replacements: &mut ReplacementMap,
        stats: &mut HoistStats,
    ) {
        if let Err(err) = painter.begin_pass(texture) {
            for (candidate, region) in &batch {
                self.atlas.free(region);
                self.fail(candidate, &err, stats);
            }
            return;
        }

        for (candidate, region) in batch {
            let rendered = LayerPlacement {
                texture,
                rect: region.rect,
                atlased: true,
            };
            let result = painter
                .paint_layer(&paint_job(candidate, texture, region.rect))
                .and_then(|()| self.cache.mark_valid(candidate.handle, rendered));
            match result {
                Ok(placement) => {
                    if placement != rendered {
                        self.atlas.free(&region);
                    }
                    stats.rendered += 1;
                    replacements.insert(candidate, placement.texture, placement.rect, placement.atlased);
                }
                Err(err) => {
                    self.atlas.free(&region);
                    self.fail(candidate, &err, stats);
                }
            }
        }
        painter.end_pass();
    }

    fn draw_standalone(
        &self,
        candidate: &LayerCandidate,
        painter: &mut dyn LayerPainter,
        replacements: &mut ReplacementMap,
        stats: &mut HoistStats,
    ) {
        let desc = match self.textures.acquire(candidate.bounds.width, candidate.bounds.height) {
            Ok(desc) => desc,
            Err(err) => {
                self.fail(candidate, &err, stats);
                return;
            }
        };
        let dst = IRect::from_size(candidate.bounds.width, candidate.bounds.height);

        let result = painter.begin_pass(desc.id).and_then(|()| {
            let painted = painter.paint_layer(&paint_job(candidate, desc.id, dst));
            painter.end_pass();
            painted
        });
        let rendered = LayerPlacement {
            texture: desc.id,
            rect: dst,
            atlased: false,
        };
        let result = result.and_then(|()| self.cache.mark_valid(candidate.handle, rendered));

        match result {
            Ok(placement) => {
                if placement != rendered {
                    self.textures.release(desc.id);
                }
                stats.rendered += 1;
                replacements.insert(candidate, placement.texture, placement.rect, placement.atlased);
            }
            Err(err) => {
                self.textures.release(desc.id);
                self.fail(candidate, &err, stats);
            }
        }
    }

    fn fail(&self, candidate: &LayerCandidate, err: &HoistError, stats: &mut HoistStats) {
        tracing::warn!(key = %candidate.key, %err, "layer not hoisted, drawing inline");
        self.cache.mark_failed(candidate.handle);
        stats.render_failures += 1;
    }
}

/// Job rendering the primary occurrence of `candidate` into `dst`.
fn paint_job(candidate: &LayerCandidate, target: TextureId, dst: IRect) -> PaintJob<'_> {
    let dx = dst.x - candidate.bounds.x;
    let dy = dst.y - candidate.bounds.y;
    PaintJob {
        key: candidate.key,
        scene: &candidate.scene,
        layer: candidate.key.layer,
        target,
        dst,
        transform: candidate
            .primary()
            .transform
            .then(&Transform::translation(dx as f32, dy as f32)),
    }
}

fn kind_name(layer: &HoistedLayer) -> &'static str {
    match layer {
        HoistedLayer::Atlased(_) => "atlased",
        HoistedLayer::NonAtlased(_) => "non-atlased",
        HoistedLayer::Recycled(_) => "recycled",
    }
}
