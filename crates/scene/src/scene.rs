//! Recorded scenes.

use common::geometry::{Rect, Transform};
use common::{LayerKey, SceneId};
use smallvec::SmallVec;
use std::sync::Arc;

/// RGBA color packed as `0xRRGGBBAA`.
pub type Color = u32;

/// A single drawing command.
#[derive(Clone, Debug)]
pub enum DrawOp {
    /// Fill a rectangle with a solid color.
    FillRect { rect: Rect, color: Color },
    /// Draw the saved layer with the given id.
    Layer(u32),
    /// Draw a nested scene under a transform.
    Scene { scene: Arc<Scene>, transform: Transform },
}

/// Content that is composited as a unit and can be cached as a texture.
#[derive(Clone, Debug)]
pub struct SavedLayer {
    /// Id within the owning scene.
    pub id: u32,
    /// Bounds in scene coordinates.
    pub bounds: Rect,
    /// Opacity applied when compositing.
    pub opacity: f32,
    /// Content of the layer.
    pub ops: Vec<DrawOp>,
}

/// An immutable recorded scene.
#[derive(Debug)]
pub struct Scene {
    id: SceneId,
    cull_rect: Rect,
    ops: Vec<DrawOp>,
    layers: Vec<SavedLayer>,
}

impl Scene {
    pub fn id(&self) -> SceneId {
        self.id
    }

    /// Conservative bounds of everything the scene draws.
    pub fn cull_rect(&self) -> Rect {
        self.cull_rect
    }

    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    /// Get a layer by id.
    pub fn layer(&self, id: u32) -> Option<&SavedLayer> {
        self.layers.get(id as usize)
    }

    pub fn layer_key(&self, id: u32) -> LayerKey {
        LayerKey::new(self.id, id)
    }

    /// Number of layers recorded in this scene, nested ones included.
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }
}

/// Builder for recording scenes.
pub struct SceneBuilder {
    cull_rect: Rect,
    ops: Vec<DrawOp>,
    layers: Vec<SavedLayer>,
    /// Open layers, innermost last.
    layer_stack: SmallVec<[u32; 4]>,
}

impl SceneBuilder {
    pub fn new(cull_rect: Rect) -> Self {
        Self {
            cull_rect,
            ops: Vec::new(),
            layers: Vec::new(),
            layer_stack: SmallVec::new(),
        }
    }

    fn current_ops(&mut self) -> &mut Vec<DrawOp> {
        match self.layer_stack.last() {
            Some(&id) => &mut self.layers[id as usize].ops,
            None => &mut self.ops,
        }
    }

    /// Push a new layer.
    pub fn push_layer(&mut self, bounds: Rect) -> u32 {
        let id = self.layers.len() as u32;
        self.current_ops().push(DrawOp::Layer(id));
        self.layers.push(SavedLayer {
            id,
            bounds,
            opacity: 1.0,
            ops: Vec::new(),
        });
        self.layer_stack.push(id);
        id
    }

    /// Pop the current layer.
    pub fn pop_layer(&mut self) {
        if self.layer_stack.pop().is_none() {
            tracing::warn!("pop_layer without a matching push_layer");
        }
    }

    /// Set the opacity of the current layer.
    pub fn set_opacity(&mut self, opacity: f32) {
        if let Some(&id) = self.layer_stack.last() {
            self.layers[id as usize].opacity = opacity;
        }
    }

    pub fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.current_ops().push(DrawOp::FillRect { rect, color });
    }

    /// Draw another scene under `transform`.
    pub fn draw_scene(&mut self, scene: Arc<Scene>, transform: Transform) {
        self.current_ops().push(DrawOp::Scene { scene, transform });
    }

    /// Build the scene. Layers left open are closed.
    pub fn build(self) -> Arc<Scene> {
        if !self.layer_stack.is_empty() {
            tracing::warn!(open = self.layer_stack.len(), "scene built with open layers");
        }
        Arc::new(Scene {
            id: SceneId::next(),
            cull_rect: self.cull_rect,
            ops: self.ops,
            layers: self.layers,
        })
    }
}
