//! Query-pruned traversal of the layers a scene draws.

use crate::scene::{DrawOp, SavedLayer, Scene};
use common::geometry::{Rect, Transform};
use std::sync::Arc;

/// A layer encountered during traversal.
pub struct LayerVisit<'a> {
    /// The scene that recorded the layer.
    pub scene: &'a Arc<Scene>,
    pub layer: &'a SavedLayer,
    /// Transform from the layer's scene to the device.
    pub ctm: Transform,
    /// Layer bounds mapped to the device.
    pub device_bounds: Rect,
}

impl Scene {
    /// Visit every layer drawn by this scene, or by scenes nested in it, whose
    /// device bounds intersect `query`.
    ///
    /// Layers nested inside another layer are part of that layer's content and
    /// are not visited. Pruning is conservative: a visited layer may still be
    /// fully covered by something else.
    pub fn visit_layers<'a, F>(self: &'a Arc<Self>, query: &Rect, ctm: &Transform, visitor: &mut F)
    where
        F: FnMut(LayerVisit<'a>),
    {
        for op in self.ops() {
            match op {
                DrawOp::FillRect { .. } => {}
                DrawOp::Layer(id) => {
                    let Some(layer) = self.layer(*id) else {
                        continue;
                    };
                    let device_bounds = ctm.transform_rect(layer.bounds);
                    if device_bounds.intersects(query) {
                        visitor(LayerVisit {
                            scene: self,
                            layer,
                            ctm: *ctm,
                            device_bounds,
                        });
                    }
                }
                DrawOp::Scene { scene, transform } => {
                    let child_ctm = transform.then(ctm);
                    if child_ctm.transform_rect(scene.cull_rect()).intersects(query) {
                        scene.visit_layers(query, &child_ctm, visitor);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::scene::SceneBuilder;
    use common::geometry::{Rect, Transform};
    use common::LayerKey;

    fn collect(scene: &std::sync::Arc<crate::Scene>, query: Rect) -> Vec<(LayerKey, Rect)> {
        let mut found = Vec::new();
        scene.visit_layers(&query, &Transform::identity(), &mut |visit| {
            found.push((visit.scene.layer_key(visit.layer.id), visit.device_bounds));
        });
        found
    }

    #[test]
    fn test_visits_nested_scene_layers() {
        let mut inner = SceneBuilder::new(Rect::new(0.0, 0.0, 50.0, 50.0));
        let layer = inner.push_layer(Rect::new(0.0, 0.0, 50.0, 50.0));
        inner.pop_layer();
        let inner = inner.build();

        let mut outer = SceneBuilder::new(Rect::new(0.0, 0.0, 500.0, 500.0));
        outer.draw_scene(inner.clone(), Transform::translation(100.0, 100.0));
        outer.draw_scene(inner.clone(), Transform::translation(300.0, 100.0));
        let outer = outer.build();

        let found = collect(&outer, Rect::new(0.0, 0.0, 500.0, 500.0));
        assert_eq!(found.len(), 2);
        assert_eq!(found[0], (inner.layer_key(layer), Rect::new(100.0, 100.0, 50.0, 50.0)));
        assert_eq!(found[1], (inner.layer_key(layer), Rect::new(300.0, 100.0, 50.0, 50.0)));
    }

    #[test]
    fn test_query_prunes() {
        let mut builder = SceneBuilder::new(Rect::new(0.0, 0.0, 500.0, 500.0));
        builder.push_layer(Rect::new(0.0, 0.0, 50.0, 50.0));
        builder.pop_layer();
        builder.push_layer(Rect::new(400.0, 400.0, 50.0, 50.0));
        builder.pop_layer();
        let scene = builder.build();

        let found = collect(&scene, Rect::new(390.0, 390.0, 100.0, 100.0));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0.layer, 1);

        assert!(collect(&scene, Rect::new(100.0, 100.0, 10.0, 10.0)).is_empty());
    }

    #[test]
    fn test_layers_inside_layers_are_not_visited() {
        let mut builder = SceneBuilder::new(Rect::new(0.0, 0.0, 100.0, 100.0));
        builder.push_layer(Rect::new(0.0, 0.0, 100.0, 100.0));
        builder.push_layer(Rect::new(10.0, 10.0, 10.0, 10.0));
        builder.pop_layer();
        builder.pop_layer();
        let scene = builder.build();

        let found = collect(&scene, Rect::new(0.0, 0.0, 100.0, 100.0));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0.layer, 0);
    }
}
