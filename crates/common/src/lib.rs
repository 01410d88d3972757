//! Common types shared across the layer hoisting crates.

pub mod error;
pub mod geometry;
pub mod ids;

pub use error::{HoistError, HoistResult};
pub use geometry::{IPoint, IRect, Point, Rect, Transform};
pub use ids::{LayerKey, SceneId};
