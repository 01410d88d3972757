//! Sample content for the demo and the benchmarks.

use common::geometry::{Rect, Transform};
use scene::{Scene, SceneBuilder};
use std::sync::Arc;

/// Small icon drawn in one layer; fits the atlas.
pub fn icon() -> Arc<Scene> {
    let mut builder = SceneBuilder::new(Rect::new(0.0, 0.0, 64.0, 64.0));
    builder.push_layer(Rect::new(0.0, 0.0, 64.0, 64.0));
    builder.fill_rect(Rect::new(0.0, 0.0, 64.0, 64.0), 0x2266ccff);
    builder.fill_rect(Rect::new(16.0, 16.0, 32.0, 32.0), 0xffffffff);
    builder.pop_layer();
    builder.build()
}

/// Translucent card with a nested highlight layer. Only the outer layer is
/// hoisted; the highlight is part of its content.
pub fn card() -> Arc<Scene> {
    let mut builder = SceneBuilder::new(Rect::new(0.0, 0.0, 300.0, 200.0));
    builder.push_layer(Rect::new(0.0, 0.0, 300.0, 200.0));
    builder.set_opacity(0.9);
    builder.fill_rect(Rect::new(0.0, 0.0, 300.0, 200.0), 0xf0f0f0ff);
    builder.push_layer(Rect::new(10.0, 10.0, 280.0, 40.0));
    builder.fill_rect(Rect::new(10.0, 10.0, 280.0, 40.0), 0xffcc00ff);
    builder.pop_layer();
    builder.pop_layer();
    builder.build()
}

/// Banner too wide for the atlas.
pub fn banner(width: f32) -> Arc<Scene> {
    let mut builder = SceneBuilder::new(Rect::new(0.0, 0.0, width, 120.0));
    builder.push_layer(Rect::new(0.0, 0.0, width, 120.0));
    builder.fill_rect(Rect::new(0.0, 0.0, width, 120.0), 0x333333ff);
    builder.pop_layer();
    builder.build()
}

/// A viewport-sized scene drawing `copies` icons and cards plus one banner.
///
/// Repeated sub-scenes share their layers, so each distinct layer is rendered
/// once no matter how many copies are placed.
pub fn demo_scene(width: u32, height: u32, copies: u32) -> Arc<Scene> {
    let (width, height) = (width as f32, height as f32);
    let icon = icon();
    let card = card();

    let mut builder = SceneBuilder::new(Rect::new(0.0, 0.0, width, height));
    builder.fill_rect(Rect::new(0.0, 0.0, width, height), 0xffffffff);
    builder.draw_scene(banner(width), Transform::identity());

    for i in 0..copies {
        let x = 20.0 + i as f32 * 80.0;
        builder.draw_scene(icon.clone(), Transform::translation(x, 140.0));
    }
    for i in 0..copies {
        let column = (i % 3) as f32;
        let row = (i / 3) as f32;
        builder.draw_scene(
            card.clone(),
            Transform::translation(20.0 + column * 320.0, 230.0 + row * 220.0),
        );
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_scene_layers() {
        let scene = demo_scene(1280, 720, 3);
        let mut visits = 0;
        scene.visit_layers(&Rect::new(0.0, 0.0, 1280.0, 720.0), &Transform::identity(), &mut |_| {
            visits += 1
        });
        // One banner, three icons and three cards.
        assert_eq!(visits, 7);
    }

    #[test]
    fn test_card_nests_highlight() {
        let card = card();
        assert_eq!(card.layer_count(), 2);
        assert_eq!(card.ops().len(), 1);
    }
}
