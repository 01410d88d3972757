//! Common error types.

use thiserror::Error;

/// Error type for the layer hoisting pipeline and its collaborators.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HoistError {
    #[error("Layer cache exhausted: every entry is locked")]
    CacheExhausted,

    #[error("Stale layer handle")]
    StaleHandle,

    #[error("Allocation failed: {0}")]
    AllocationFailed(String),

    #[error("Texture too large: {width}x{height} exceeds {max}")]
    TextureTooLarge { width: u32, height: u32, max: u32 },

    #[error("Render error: {0}")]
    RenderFailed(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

pub type HoistResult<T> = Result<T, HoistError>;

impl HoistError {
    pub fn allocation(msg: impl Into<String>) -> Self {
        Self::AllocationFailed(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::RenderFailed(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidOperation(msg.into())
    }
}
