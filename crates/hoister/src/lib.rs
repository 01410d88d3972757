//! Layer hoisting.
//!
//! For each scene render:
//! - [`LayerHoister::find_layers_to_hoist`] is called once to collect and lock the layers
//! - [`LayerHoister::draw_layers`] is called once to render the stale ones
//! - the scene is drawn using the resulting [`ReplacementMap`]
//! - [`LayerHoister::unlock_layers`] is called once so the textures can be recycled

pub mod hoister;
pub mod painter;
pub mod plan;
pub mod replacements;

pub use hoister::{HoistStats, HoisterConfig, LayerHoister};
pub use painter::{LayerPainter, PaintCommand, PaintJob, RecordingPainter};
pub use plan::{HoistPlan, HoistedLayer, LayerCandidate, Placement};
pub use replacements::{Replacement, ReplacementMap, ReplacingCanvas, TexturedQuad};
