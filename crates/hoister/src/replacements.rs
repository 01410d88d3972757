//! Textures substituted for layer content during the final draw.

use crate::plan::{LayerCandidate, Placement};
use common::geometry::{IRect, Rect, Transform};
use common::{LayerKey, SceneId};
use gpu::TextureId;
use indexmap::IndexMap;
use scene::{Canvas, Color, SavedLayer};
use smallvec::SmallVec;

/// Rendered pixels of one layer and every place they are drawn.
#[derive(Clone, Debug, PartialEq)]
pub struct Replacement {
    pub texture: TextureId,
    /// Region of `texture` holding the layer.
    pub src: IRect,
    pub atlased: bool,
    pub placements: SmallVec<[Placement; 2]>,
}

/// Layer key to replacement, valid for a single draw.
#[derive(Clone, Debug, Default)]
pub struct ReplacementMap {
    entries: IndexMap<LayerKey, Replacement>,
}

impl ReplacementMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the replacement for `candidate`. Entries are write-once; returns
    /// `false` if the layer already has one.
    pub fn insert(&mut self, candidate: &LayerCandidate, texture: TextureId, src: IRect, atlased: bool) -> bool {
        if self.entries.contains_key(&candidate.key) {
            return false;
        }
        self.entries.insert(
            candidate.key,
            Replacement {
                texture,
                src,
                atlased,
                placements: candidate.placements.iter().copied().collect(),
            },
        );
        true
    }

    pub fn get(&self, key: LayerKey) -> Option<&Replacement> {
        self.entries.get(&key)
    }

    pub fn lookup(&self, scene: SceneId, layer: u32) -> Option<&Replacement> {
        self.get(LayerKey::new(scene, layer))
    }

    pub fn contains(&self, key: LayerKey) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LayerKey, &Replacement)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A layer drawn from its cached texture.
#[derive(Clone, Debug, PartialEq)]
pub struct TexturedQuad {
    pub key: LayerKey,
    pub texture: TextureId,
    pub src: IRect,
    pub dst: Rect,
    pub opacity: f32,
}

/// Canvas adapter for the final draw: layers with a replacement are drawn as
/// textured quads, everything else goes to the wrapped canvas.
pub struct ReplacingCanvas<'a, C> {
    inner: C,
    replacements: &'a ReplacementMap,
    quads: Vec<TexturedQuad>,
}

impl<'a, C: Canvas> ReplacingCanvas<'a, C> {
    pub fn new(inner: C, replacements: &'a ReplacementMap) -> Self {
        Self {
            inner,
            replacements,
            quads: Vec::new(),
        }
    }

    pub fn quads(&self) -> &[TexturedQuad] {
        &self.quads
    }

    pub fn into_parts(self) -> (C, Vec<TexturedQuad>) {
        (self.inner, self.quads)
    }
}

impl<C: Canvas> Canvas for ReplacingCanvas<'_, C> {
    fn fill_rect(&mut self, rect: Rect, color: Color, ctm: &Transform) {
        self.inner.fill_rect(rect, color, ctm);
    }

    fn draw_layer(&mut self, key: LayerKey, layer: &SavedLayer, ctm: &Transform) -> bool {
        let Some(replacement) = self.replacements.get(key) else {
            return self.inner.draw_layer(key, layer, ctm);
        };
        let dst = ctm.transform_rect(layer.bounds);
        // Stretching the texture would resample it; draw the content instead.
        if !replacement.src.size_close_to(&dst.round_out()) {
            tracing::trace!(%key, src = ?replacement.src, ?dst, "replacement size differs, drawing inline");
            return self.inner.draw_layer(key, layer, ctm);
        }
        self.quads.push(TexturedQuad {
            key,
            texture: replacement.texture,
            src: replacement.src,
            dst,
            opacity: layer.opacity,
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::geometry::IPoint;
    use scene::SceneBuilder;
    use std::sync::Arc;

    #[derive(Default)]
    struct Fills(Vec<Rect>);

    impl Canvas for Fills {
        fn fill_rect(&mut self, rect: Rect, _color: Color, ctm: &Transform) {
            self.0.push(ctm.transform_rect(rect));
        }
    }

    fn candidate(scene: &Arc<scene::Scene>, layer: u32, offsets: &[(i32, i32)]) -> LayerCandidate {
        LayerCandidate {
            key: scene.layer_key(layer),
            handle: Default::default(),
            scene: scene.clone(),
            bounds: IRect::new(offsets[0].0, offsets[0].1, 10, 10),
            placements: offsets
                .iter()
                .map(|&(x, y)| Placement {
                    offset: IPoint::new(x, y),
                    transform: Transform::translation(x as f32, y as f32),
                })
                .collect(),
        }
    }

    #[test]
    fn test_insert_is_write_once() {
        let scene = SceneBuilder::new(Rect::ZERO).build();
        let c = candidate(&scene, 0, &[(0, 0), (20, 0)]);
        let mut map = ReplacementMap::new();

        let first = TextureId::next();
        assert!(map.insert(&c, first, IRect::from_size(10, 10), true));
        assert!(!map.insert(&c, TextureId::next(), IRect::from_size(10, 10), false));

        let replacement = map.lookup(scene.id(), 0).unwrap();
        assert_eq!(replacement.texture, first);
        assert_eq!(replacement.placements.len(), 2);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_replacing_canvas_substitutes_layers() {
        let mut builder = SceneBuilder::new(Rect::new(0.0, 0.0, 100.0, 100.0));
        builder.push_layer(Rect::new(0.0, 0.0, 10.0, 10.0));
        builder.fill_rect(Rect::new(0.0, 0.0, 10.0, 10.0), 0xff0000ff);
        builder.pop_layer();
        builder.push_layer(Rect::new(50.0, 50.0, 10.0, 10.0));
        builder.fill_rect(Rect::new(50.0, 50.0, 10.0, 10.0), 0x00ff00ff);
        builder.pop_layer();
        let scene = builder.build();

        let mut map = ReplacementMap::new();
        let texture = TextureId::next();
        map.insert(&candidate(&scene, 0, &[(0, 0)]), texture, IRect::new(1, 1, 10, 10), true);

        let mut canvas = ReplacingCanvas::new(Fills::default(), &map);
        scene.playback(&Transform::identity(), &mut canvas);
        let (fills, quads) = canvas.into_parts();

        // Layer 0 came from the texture, layer 1 was drawn inline.
        assert_eq!(fills.0, vec![Rect::new(50.0, 50.0, 10.0, 10.0)]);
        assert_eq!(quads.len(), 1);
        assert_eq!(quads[0].texture, texture);
        assert_eq!(quads[0].src, IRect::new(1, 1, 10, 10));
        assert_eq!(quads[0].dst, Rect::new(0.0, 0.0, 10.0, 10.0));
    }

    #[test]
    fn test_scaled_occurrence_is_drawn_inline() {
        let mut builder = SceneBuilder::new(Rect::new(0.0, 0.0, 100.0, 100.0));
        builder.push_layer(Rect::new(0.0, 0.0, 10.0, 10.0));
        builder.fill_rect(Rect::new(0.0, 0.0, 10.0, 10.0), 0xff0000ff);
        builder.pop_layer();
        let scene = builder.build();

        let mut map = ReplacementMap::new();
        map.insert(&candidate(&scene, 0, &[(0, 0)]), TextureId::next(), IRect::new(1, 1, 10, 10), true);

        let mut canvas = ReplacingCanvas::new(Fills::default(), &map);
        scene.playback(&Transform::scale(2.0, 2.0), &mut canvas);
        let (fills, quads) = canvas.into_parts();
        assert!(quads.is_empty());
        assert_eq!(fills.0, vec![Rect::new(0.0, 0.0, 20.0, 20.0)]);
    }
}
