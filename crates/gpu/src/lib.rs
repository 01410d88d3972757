//! GPU-side collaborators of the layer hoister.
//!
//! This crate provides:
//! - driver and capability detection
//! - texture handles and a pool of standalone render targets
//! - the shared layer atlas

pub mod atlas;
pub mod context;
pub mod texture;

pub use atlas::{AtlasConfig, AtlasManager, AtlasRegion, ShelfAtlas};
pub use context::{ContextInfo, GlInterface, GpuCaps, GpuError, StaticGlInterface};
pub use texture::{TextureDesc, TextureId, TexturePool, TexturePoolConfig};
