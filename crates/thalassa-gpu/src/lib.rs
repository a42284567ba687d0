//! Vulkan abstraction layer for the Thalassa engine.
//!
//! This crate provides:
//! - Vulkan instance, device and queue negotiation
//! - Buffer and image wrappers with explicit layout transitions
//! - Descriptor, pipeline and render pass configuration
//! - Swapchain handling

pub mod buffer;
pub mod command;
pub mod context;
pub mod descriptors;
pub mod error;
pub mod image;
pub mod instance;
pub mod memory;
pub mod pipeline;
pub mod render_pass;
pub mod shader;
pub mod surface;
pub mod swapchain;
pub mod sync;

pub use buffer::{record_buffer_copy, Buffer, BufferLayout};
pub use context::{DeviceSupport, GpuContext, GpuContextBuilder, QueueSelection};
pub use descriptors::{
    allocate_descriptor_sets, DescriptorPoolConfig, DescriptorSetLayoutConfig, DescriptorSetUpdate,
};
pub use error::{GpuError, Result};
pub use image::{Image, ImageConfig, SamplerConfig};
pub use pipeline::{GraphicsPipelineConfig, PipelineLayoutConfig};
pub use render_pass::RenderPassConfig;
pub use surface::SurfaceInfo;
pub use swapchain::Swapchain;
pub use sync::{create_fence, create_semaphore};
