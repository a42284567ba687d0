//! GPU error types.

use std::path::PathBuf;

use ash::vk;
use thiserror::Error;

/// GPU-related errors.
#[derive(Error, Debug)]
pub enum GpuError {
    /// Vulkan error.
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] vk::Result),

    /// The Vulkan loader could not be found or initialized.
    #[error("Failed to load Vulkan library: {0}")]
    LibraryLoad(String),

    /// No physical device passed negotiation.
    #[error("No suitable GPU found")]
    NoSuitableDevice,

    /// No memory type satisfies both the resource requirements and the
    /// requested property flags.
    #[error("No compatible memory type (type bits {type_bits:#x}, flags {flags:?})")]
    NoCompatibleMemoryType {
        type_bits: u32,
        flags: vk::MemoryPropertyFlags,
    },

    /// The layout pair has no entry in the barrier mask table.
    #[error("Unsupported image layout transition: {old:?} -> {new:?}")]
    UnsupportedLayoutTransition {
        old: vk::ImageLayout,
        new: vk::ImageLayout,
    },

    /// Surface creation failed.
    #[error("Surface creation failed: {0}")]
    SurfaceCreation(String),

    /// Swapchain creation failed.
    #[error("Swapchain creation failed: {0}")]
    SwapchainCreation(String),

    /// A SPIR-V file could not be read.
    #[error("Failed to load shader {path}: {source}")]
    ShaderLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Pipeline creation failed.
    #[error("Pipeline creation failed: {0}")]
    PipelineCreation(String),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, GpuError>;
