//! Scene description consumed by the layer hoister.
//!
//! A scene is a list of drawing commands. Commands may open a saved layer
//! (content that can be cached as a texture) or draw another scene under a
//! transform, so the description forms a tree.

pub mod playback;
pub mod scene;
pub mod traverse;

pub use playback::Canvas;
pub use scene::{Color, DrawOp, SavedLayer, Scene, SceneBuilder};
pub use traverse::LayerVisit;
