//! Renderer error types.

use thiserror::Error;

/// Errors surfaced by the frame lifecycle.
#[derive(Error, Debug)]
pub enum RenderError {
    /// A GPU-level operation failed.
    #[error(transparent)]
    Gpu(#[from] thalassa_gpu::GpuError),

    /// A raw Vulkan call failed.
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] ash::vk::Result),
}

/// Convenience result type for renderer operations.
pub type Result<T> = std::result::Result<T, RenderError>;
