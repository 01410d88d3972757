//! Demo driver for the layer hoister.
//!
//! Builds a scene that repeats a few sub-scenes and renders it for a number of
//! frames through the full hoisting pipeline, drawing into recorded commands
//! instead of a device.

pub mod config;
pub mod frame;
pub mod sample;

pub use config::DemoConfig;
pub use frame::{FrameReport, FrameRenderer};

/// Demo version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
