//! Replaying a scene into a drawing target.

use crate::scene::{Color, DrawOp, SavedLayer, Scene};
use common::geometry::{Rect, Transform};
use common::LayerKey;

/// Receiver of playback commands.
pub trait Canvas {
    fn fill_rect(&mut self, rect: Rect, color: Color, ctm: &Transform);

    /// Called before a layer's content is replayed. Returning `true` means the
    /// canvas drew the layer itself and its content is skipped.
    fn draw_layer(&mut self, key: LayerKey, layer: &SavedLayer, ctm: &Transform) -> bool {
        let _ = (key, layer, ctm);
        false
    }
}

impl Scene {
    /// Replay the whole scene.
    pub fn playback(&self, ctm: &Transform, canvas: &mut dyn Canvas) {
        self.playback_ops(self.ops(), ctm, canvas);
    }

    /// Replay the content of a single layer. Returns `false` if the layer
    /// does not exist.
    pub fn playback_layer(&self, id: u32, ctm: &Transform, canvas: &mut dyn Canvas) -> bool {
        match self.layer(id) {
            Some(layer) => {
                self.playback_ops(&layer.ops, ctm, canvas);
                true
            }
            None => false,
        }
    }

    fn playback_ops(&self, ops: &[DrawOp], ctm: &Transform, canvas: &mut dyn Canvas) {
        for op in ops {
            match op {
                DrawOp::FillRect { rect, color } => canvas.fill_rect(*rect, *color, ctm),
                DrawOp::Layer(id) => {
                    let Some(layer) = self.layer(*id) else {
                        continue;
                    };
                    if !canvas.draw_layer(self.layer_key(*id), layer, ctm) {
                        self.playback_ops(&layer.ops, ctm, canvas);
                    }
                }
                DrawOp::Scene { scene, transform } => {
                    scene.playback(&transform.then(ctm), canvas);
                }
            }
        }
    }
}
