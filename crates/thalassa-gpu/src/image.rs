//! Images with tracked layouts, barrier planning, mipmap generation
//! and sampler configuration.

use std::sync::Arc;

use ash::vk;

use crate::buffer::Buffer;
use crate::command;
use crate::error::{GpuError, Result};
use crate::memory::{self, mip_extent};

/// Number of mip levels needed for a full chain down to one texel.
#[must_use]
pub fn max_mip_levels(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// Barrier masks for one layout transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutTransition {
    pub src_access: vk::AccessFlags,
    pub dst_access: vk::AccessFlags,
    pub src_stage: vk::PipelineStageFlags,
    pub dst_stage: vk::PipelineStageFlags,
}

fn source_masks(layout: vk::ImageLayout) -> Option<(vk::AccessFlags, vk::PipelineStageFlags)> {
    match layout {
        vk::ImageLayout::UNDEFINED => Some((
            vk::AccessFlags::empty(),
            vk::PipelineStageFlags::TOP_OF_PIPE,
        )),
        vk::ImageLayout::PREINITIALIZED => {
            Some((vk::AccessFlags::HOST_WRITE, vk::PipelineStageFlags::HOST))
        }
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL => Some((
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        )),
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL => Some((
            vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS
                | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
        )),
        vk::ImageLayout::TRANSFER_SRC_OPTIMAL => Some((
            vk::AccessFlags::TRANSFER_READ,
            vk::PipelineStageFlags::TRANSFER,
        )),
        vk::ImageLayout::TRANSFER_DST_OPTIMAL => Some((
            vk::AccessFlags::TRANSFER_WRITE,
            vk::PipelineStageFlags::TRANSFER,
        )),
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL => Some((
            vk::AccessFlags::SHADER_READ,
            vk::PipelineStageFlags::FRAGMENT_SHADER,
        )),
        vk::ImageLayout::GENERAL => Some((
            vk::AccessFlags::MEMORY_WRITE,
            vk::PipelineStageFlags::ALL_COMMANDS,
        )),
        vk::ImageLayout::PRESENT_SRC_KHR => Some((
            vk::AccessFlags::empty(),
            vk::PipelineStageFlags::BOTTOM_OF_PIPE,
        )),
        _ => None,
    }
}

fn destination_masks(
    layout: vk::ImageLayout,
) -> Option<(vk::AccessFlags, vk::PipelineStageFlags)> {
    match layout {
        vk::ImageLayout::TRANSFER_DST_OPTIMAL => Some((
            vk::AccessFlags::TRANSFER_WRITE,
            vk::PipelineStageFlags::TRANSFER,
        )),
        vk::ImageLayout::TRANSFER_SRC_OPTIMAL => Some((
            vk::AccessFlags::TRANSFER_READ,
            vk::PipelineStageFlags::TRANSFER,
        )),
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL => Some((
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        )),
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL => Some((
            vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS
                | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
        )),
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL => Some((
            vk::AccessFlags::SHADER_READ,
            vk::PipelineStageFlags::FRAGMENT_SHADER,
        )),
        vk::ImageLayout::GENERAL => Some((
            vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE,
            vk::PipelineStageFlags::ALL_COMMANDS,
        )),
        vk::ImageLayout::PRESENT_SRC_KHR => Some((
            vk::AccessFlags::empty(),
            vk::PipelineStageFlags::BOTTOM_OF_PIPE,
        )),
        _ => None,
    }
}

/// Plan the barrier for a transition between two layouts.
///
/// Returns `Ok(None)` when the layouts already match, so no barrier
/// needs recording. Layout pairs outside the mask tables are an error.
///
/// When the destination is `SHADER_READ_ONLY_OPTIMAL` and the source
/// produced no writes to wait on, the source access is widened to host
/// and transfer writes so earlier uploads are visible.
pub fn plan_transition(
    current: vk::ImageLayout,
    new: vk::ImageLayout,
) -> Result<Option<LayoutTransition>> {
    if current == new {
        return Ok(None);
    }

    let unsupported = || GpuError::UnsupportedLayoutTransition {
        old: current,
        new,
    };
    let (mut src_access, src_stage) = source_masks(current).ok_or_else(unsupported)?;
    let (dst_access, dst_stage) = destination_masks(new).ok_or_else(unsupported)?;

    if new == vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL && src_access.is_empty() {
        src_access = vk::AccessFlags::HOST_WRITE | vk::AccessFlags::TRANSFER_WRITE;
    }

    Ok(Some(LayoutTransition {
        src_access,
        dst_access,
        src_stage,
        dst_stage,
    }))
}

/// Creation parameters for an [`Image`].
#[derive(Debug, Clone, Copy)]
pub struct ImageConfig {
    pub format: vk::Format,
    pub extent: vk::Extent3D,
    pub mip_levels: u32,
    pub array_layers: u32,
    pub usage: vk::ImageUsageFlags,
    pub tiling: vk::ImageTiling,
    pub aspect: vk::ImageAspectFlags,
    /// Host images live in host-visible coherent memory with linear
    /// tiling and get no view.
    pub host_visible: bool,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            format: vk::Format::R8G8B8A8_UNORM,
            extent: vk::Extent3D {
                width: 1,
                height: 1,
                depth: 1,
            },
            mip_levels: 1,
            array_layers: 1,
            usage: vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST,
            tiling: vk::ImageTiling::OPTIMAL,
            aspect: vk::ImageAspectFlags::COLOR,
            host_visible: false,
        }
    }
}

impl ImageConfig {
    /// Sampled 2D color image that can be copied into and blitted from.
    #[must_use]
    pub fn default_2d(width: u32, height: u32) -> Self {
        Self {
            extent: vk::Extent3D {
                width,
                height,
                depth: 1,
            },
            usage: vk::ImageUsageFlags::TRANSFER_SRC
                | vk::ImageUsageFlags::TRANSFER_DST
                | vk::ImageUsageFlags::SAMPLED,
            ..Self::default()
        }
    }

    /// Depth attachment for the given extent.
    #[must_use]
    pub fn depth(width: u32, height: u32, format: vk::Format) -> Self {
        Self {
            format,
            extent: vk::Extent3D {
                width,
                height,
                depth: 1,
            },
            usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            aspect: vk::ImageAspectFlags::DEPTH,
            ..Self::default()
        }
    }

    /// Set an explicit mip level count.
    #[must_use]
    pub fn with_mip_levels(mut self, levels: u32) -> Self {
        self.mip_levels = levels;
        self
    }

    /// Use the full mip chain for the configured extent.
    #[must_use]
    pub fn with_full_mip_chain(mut self) -> Self {
        self.mip_levels = max_mip_levels(self.extent.width, self.extent.height);
        self
    }

    /// Move the image to linearly tiled host-visible memory.
    #[must_use]
    pub fn host_visible(mut self) -> Self {
        self.tiling = vk::ImageTiling::LINEAR;
        self.host_visible = true;
        self
    }
}

/// A Vulkan image with its memory, view and tracked layout.
///
/// The image owns its memory and optional view/sampler and releases
/// them on drop, so it must not outlive the context its device came
/// from.
pub struct Image {
    device: Arc<ash::Device>,
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: Option<vk::ImageView>,
    sampler: Option<vk::Sampler>,
    config: ImageConfig,
    layout: vk::ImageLayout,
}

impl Image {
    /// Create an image per `config`, allocate and bind its memory, and
    /// create a full-range view (host images get none).
    pub fn new(
        device: Arc<ash::Device>,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        config: ImageConfig,
    ) -> Result<Self> {
        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(config.format)
            .extent(config.extent)
            .mip_levels(config.mip_levels)
            .array_layers(config.array_layers)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(config.tiling)
            .usage(config.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        let image = unsafe { device.create_image(&image_info, None)? };

        let memory_flags = if config.host_visible {
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT
        } else {
            vk::MemoryPropertyFlags::DEVICE_LOCAL
        };
        let memory = unsafe {
            memory::allocate_image_memory(&device, memory_properties, image, memory_flags)?
        };

        let view = if config.host_visible {
            None
        } else {
            let view_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(config.format)
                .subresource_range(
                    vk::ImageSubresourceRange::default()
                        .aspect_mask(config.aspect)
                        .base_mip_level(0)
                        .level_count(config.mip_levels)
                        .base_array_layer(0)
                        .layer_count(config.array_layers),
                );
            Some(unsafe { device.create_image_view(&view_info, None)? })
        };

        Ok(Self {
            device,
            image,
            memory,
            view,
            sampler: None,
            config,
            layout: vk::ImageLayout::UNDEFINED,
        })
    }

    /// Get the image handle.
    #[must_use]
    pub fn handle(&self) -> vk::Image {
        self.image
    }

    /// Get the image view, if the image has one.
    #[must_use]
    pub fn view(&self) -> Option<vk::ImageView> {
        self.view
    }

    /// Get the creation config.
    #[must_use]
    pub fn config(&self) -> &ImageConfig {
        &self.config
    }

    /// Layout the image was last transitioned to.
    #[must_use]
    pub fn layout(&self) -> vk::ImageLayout {
        self.layout
    }

    /// Attach a sampler; the image destroys it on drop.
    pub fn set_sampler(&mut self, sampler: vk::Sampler) {
        if let Some(old) = self.sampler.replace(sampler) {
            unsafe { self.device.destroy_sampler(old, None) };
        }
    }

    /// Descriptor info for sampled use. Requires a view; the sampler
    /// handle is null unless one was attached.
    #[must_use]
    pub fn descriptor_info(&self) -> vk::DescriptorImageInfo {
        vk::DescriptorImageInfo::default()
            .sampler(self.sampler.unwrap_or(vk::Sampler::null()))
            .image_view(self.view.unwrap_or(vk::ImageView::null()))
            .image_layout(self.layout)
    }

    fn full_range(&self) -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange::default()
            .aspect_mask(self.config.aspect)
            .base_mip_level(0)
            .level_count(self.config.mip_levels)
            .base_array_layer(0)
            .layer_count(self.config.array_layers)
    }

    fn level_range(&self, level: u32) -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange::default()
            .aspect_mask(self.config.aspect)
            .base_mip_level(level)
            .level_count(1)
            .base_array_layer(0)
            .layer_count(self.config.array_layers)
    }

    /// Record a barrier moving the whole image to `new_layout` and
    /// update the tracked layout. Records nothing when the layout
    /// already matches.
    ///
    /// # Safety
    /// The command buffer must be recording.
    pub unsafe fn set_layout(
        &mut self,
        command_buffer: vk::CommandBuffer,
        new_layout: vk::ImageLayout,
    ) -> Result<()> {
        let Some(plan) = plan_transition(self.layout, new_layout)? else {
            return Ok(());
        };

        unsafe {
            self.record_barrier(command_buffer, &plan, self.layout, new_layout, self.full_range());
        }
        self.layout = new_layout;
        Ok(())
    }

    unsafe fn record_barrier(
        &self,
        command_buffer: vk::CommandBuffer,
        plan: &LayoutTransition,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
        range: vk::ImageSubresourceRange,
    ) {
        let barrier = vk::ImageMemoryBarrier::default()
            .src_access_mask(plan.src_access)
            .dst_access_mask(plan.dst_access)
            .old_layout(old_layout)
            .new_layout(new_layout)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(self.image)
            .subresource_range(range);

        unsafe {
            self.device.cmd_pipeline_barrier(
                command_buffer,
                plan.src_stage,
                plan.dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
        }
    }

    unsafe fn record_level_barrier(
        &self,
        command_buffer: vk::CommandBuffer,
        level: u32,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
    ) -> Result<()> {
        let Some(plan) = plan_transition(old_layout, new_layout)? else {
            return Ok(());
        };
        unsafe {
            self.record_barrier(
                command_buffer,
                &plan,
                old_layout,
                new_layout,
                self.level_range(level),
            );
        }
        Ok(())
    }

    /// Upload raw texel bytes for mip level 0 through a staging buffer,
    /// leaving the whole image in `final_layout`. With `generate_mips`
    /// the remaining levels are blitted from level 0 on the way.
    pub fn upload(
        &mut self,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        command_pool: vk::CommandPool,
        queue: vk::Queue,
        data: &[u8],
        final_layout: vk::ImageLayout,
        generate_mips: bool,
    ) -> Result<()> {
        let mut staging = Buffer::new(
            self.device.clone(),
            memory_properties,
            1,
            data.len() as vk::DeviceSize,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        staging.map()?;
        staging.write_to_buffer(data, 0);
        staging.unmap();

        let device = self.device.clone();
        unsafe {
            command::execute_single_time_commands(&device, command_pool, queue, |cb| unsafe {
                self.set_layout(cb, vk::ImageLayout::TRANSFER_DST_OPTIMAL)?;

                let region = vk::BufferImageCopy::default()
                    .buffer_offset(0)
                    .buffer_row_length(0)
                    .buffer_image_height(0)
                    .image_subresource(
                        vk::ImageSubresourceLayers::default()
                            .aspect_mask(self.config.aspect)
                            .mip_level(0)
                            .base_array_layer(0)
                            .layer_count(self.config.array_layers),
                    )
                    .image_extent(self.config.extent);
                device.cmd_copy_buffer_to_image(
                    cb,
                    staging.handle(),
                    self.image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[region],
                );

                if generate_mips && self.config.mip_levels > 1 {
                    self.generate_mipmaps(cb, final_layout)?;
                } else {
                    self.set_layout(cb, final_layout)?;
                }
                Ok(())
            })
        }
    }

    /// Fill mip levels 1.. by blitting each level from the previous
    /// one, finishing every level in `final_layout`.
    ///
    /// Each source level is moved to `final_layout` right after its
    /// blit; the last level follows once the loop is done.
    ///
    /// # Safety
    /// The command buffer must be recording and the whole image must be
    /// in `TRANSFER_DST_OPTIMAL`.
    pub unsafe fn generate_mipmaps(
        &mut self,
        command_buffer: vk::CommandBuffer,
        final_layout: vk::ImageLayout,
    ) -> Result<()> {
        let base = self.config.extent;

        for level in 1..self.config.mip_levels {
            unsafe {
                self.record_level_barrier(
                    command_buffer,
                    level - 1,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                )?;
            }

            let src_extent = vk::Offset3D {
                x: mip_extent(base.width, level - 1) as i32,
                y: mip_extent(base.height, level - 1) as i32,
                z: 1,
            };
            let dst_extent = vk::Offset3D {
                x: mip_extent(base.width, level) as i32,
                y: mip_extent(base.height, level) as i32,
                z: 1,
            };

            let blit = vk::ImageBlit::default()
                .src_subresource(
                    vk::ImageSubresourceLayers::default()
                        .aspect_mask(self.config.aspect)
                        .mip_level(level - 1)
                        .base_array_layer(0)
                        .layer_count(self.config.array_layers),
                )
                .src_offsets([vk::Offset3D::default(), src_extent])
                .dst_subresource(
                    vk::ImageSubresourceLayers::default()
                        .aspect_mask(self.config.aspect)
                        .mip_level(level)
                        .base_array_layer(0)
                        .layer_count(self.config.array_layers),
                )
                .dst_offsets([vk::Offset3D::default(), dst_extent]);

            unsafe {
                self.device.cmd_blit_image(
                    command_buffer,
                    self.image,
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                    self.image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[blit],
                    vk::Filter::LINEAR,
                );

                self.record_level_barrier(
                    command_buffer,
                    level - 1,
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                    final_layout,
                )?;
            }
        }

        unsafe {
            self.record_level_barrier(
                command_buffer,
                self.config.mip_levels - 1,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                final_layout,
            )?;
        }

        self.layout = final_layout;
        Ok(())
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        unsafe {
            if let Some(sampler) = self.sampler.take() {
                self.device.destroy_sampler(sampler, None);
            }
            if let Some(view) = self.view.take() {
                self.device.destroy_image_view(view, None);
            }
            self.device.free_memory(self.memory, None);
            self.device.destroy_image(self.image, None);
        }
    }
}

/// Sampler creation parameters.
///
/// Defaults to nearest filtering with repeat addressing, matching what
/// pixel-exact debug textures want; [`SamplerConfig::linear`] is the
/// usual choice for scene textures.
#[derive(Debug, Clone, Copy)]
pub struct SamplerConfig {
    pub mag_filter: vk::Filter,
    pub min_filter: vk::Filter,
    pub mipmap_mode: vk::SamplerMipmapMode,
    pub address_mode_u: vk::SamplerAddressMode,
    pub address_mode_v: vk::SamplerAddressMode,
    pub address_mode_w: vk::SamplerAddressMode,
    pub max_lod: f32,
    pub max_anisotropy: Option<f32>,
    pub border_color: vk::BorderColor,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            mag_filter: vk::Filter::NEAREST,
            min_filter: vk::Filter::NEAREST,
            mipmap_mode: vk::SamplerMipmapMode::NEAREST,
            address_mode_u: vk::SamplerAddressMode::REPEAT,
            address_mode_v: vk::SamplerAddressMode::REPEAT,
            address_mode_w: vk::SamplerAddressMode::REPEAT,
            max_lod: 0.0,
            max_anisotropy: None,
            border_color: vk::BorderColor::INT_OPAQUE_BLACK,
        }
    }
}

impl SamplerConfig {
    /// Linear filtering with linear mipmap interpolation.
    #[must_use]
    pub fn linear() -> Self {
        Self {
            mag_filter: vk::Filter::LINEAR,
            min_filter: vk::Filter::LINEAR,
            mipmap_mode: vk::SamplerMipmapMode::LINEAR,
            ..Self::default()
        }
    }

    /// Set the same address mode on all three axes.
    #[must_use]
    pub fn address_mode(mut self, mode: vk::SamplerAddressMode) -> Self {
        self.address_mode_u = mode;
        self.address_mode_v = mode;
        self.address_mode_w = mode;
        self
    }

    /// Set the highest mip level the sampler may read.
    #[must_use]
    pub fn with_max_lod(mut self, max_lod: f32) -> Self {
        self.max_lod = max_lod;
        self
    }

    /// Enable anisotropic filtering. The device must have been built
    /// with the anisotropy feature.
    #[must_use]
    pub fn with_anisotropy(mut self, max_anisotropy: f32) -> Self {
        self.max_anisotropy = Some(max_anisotropy);
        self
    }

    /// Build the sampler.
    pub fn build(&self, device: &ash::Device) -> Result<vk::Sampler> {
        let create_info = vk::SamplerCreateInfo::default()
            .mag_filter(self.mag_filter)
            .min_filter(self.min_filter)
            .mipmap_mode(self.mipmap_mode)
            .address_mode_u(self.address_mode_u)
            .address_mode_v(self.address_mode_v)
            .address_mode_w(self.address_mode_w)
            .mip_lod_bias(0.0)
            .anisotropy_enable(self.max_anisotropy.is_some())
            .max_anisotropy(self.max_anisotropy.unwrap_or(1.0))
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .min_lod(0.0)
            .max_lod(self.max_lod)
            .border_color(self.border_color)
            .unnormalized_coordinates(false);

        let sampler = unsafe { device.create_sampler(&create_info, None)? };
        Ok(sampler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAPPED_SOURCES: [vk::ImageLayout; 9] = [
        vk::ImageLayout::UNDEFINED,
        vk::ImageLayout::PREINITIALIZED,
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        vk::ImageLayout::GENERAL,
        vk::ImageLayout::PRESENT_SRC_KHR,
    ];

    const MAPPED_DESTINATIONS: [vk::ImageLayout; 7] = [
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        vk::ImageLayout::GENERAL,
        vk::ImageLayout::PRESENT_SRC_KHR,
    ];

    #[test]
    fn matching_layouts_plan_no_barrier() {
        for layout in MAPPED_SOURCES {
            assert!(
                plan_transition(layout, layout).unwrap().is_none(),
                "{layout:?} -> {layout:?} planned a barrier"
            );
        }
    }

    #[test]
    fn every_mapped_pair_yields_a_plan() {
        for old in MAPPED_SOURCES {
            for new in MAPPED_DESTINATIONS {
                if old == new {
                    continue;
                }
                let plan = plan_transition(old, new).unwrap();
                let plan = plan.unwrap();
                assert!(!plan.src_stage.is_empty(), "{old:?} -> {new:?}");
                assert!(!plan.dst_stage.is_empty(), "{old:?} -> {new:?}");
            }
        }
    }

    #[test]
    fn upload_transition_masks() {
        let plan = plan_transition(
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        )
        .unwrap()
        .unwrap();

        assert_eq!(plan.src_access, vk::AccessFlags::empty());
        assert_eq!(plan.src_stage, vk::PipelineStageFlags::TOP_OF_PIPE);
        assert_eq!(plan.dst_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(plan.dst_stage, vk::PipelineStageFlags::TRANSFER);
    }

    #[test]
    fn mipmap_chain_transition_masks() {
        let plan = plan_transition(
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        )
        .unwrap()
        .unwrap();

        assert_eq!(plan.src_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(plan.dst_access, vk::AccessFlags::TRANSFER_READ);
        assert_eq!(plan.src_stage, vk::PipelineStageFlags::TRANSFER);
        assert_eq!(plan.dst_stage, vk::PipelineStageFlags::TRANSFER);
    }

    #[test]
    fn shader_read_destination_widens_an_empty_source_access() {
        let plan = plan_transition(
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )
        .unwrap()
        .unwrap();

        assert_eq!(
            plan.src_access,
            vk::AccessFlags::HOST_WRITE | vk::AccessFlags::TRANSFER_WRITE
        );
        assert_eq!(plan.dst_access, vk::AccessFlags::SHADER_READ);
        assert_eq!(plan.dst_stage, vk::PipelineStageFlags::FRAGMENT_SHADER);
    }

    #[test]
    fn shader_read_destination_keeps_a_real_source_access() {
        let plan = plan_transition(
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )
        .unwrap()
        .unwrap();

        assert_eq!(plan.src_access, vk::AccessFlags::TRANSFER_WRITE);
    }

    #[test]
    fn depth_attachment_transition_masks() {
        let plan = plan_transition(
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        )
        .unwrap()
        .unwrap();

        assert_eq!(
            plan.dst_access,
            vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE
        );
        assert_eq!(
            plan.dst_stage,
            vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS
                | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS
        );
    }

    #[test]
    fn unmapped_pairs_are_errors() {
        let bad_destination = plan_transition(
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
        );
        assert!(matches!(
            bad_destination,
            Err(GpuError::UnsupportedLayoutTransition { .. })
        ));

        let bad_source = plan_transition(
            vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        );
        assert!(matches!(
            bad_source,
            Err(GpuError::UnsupportedLayoutTransition { .. })
        ));
    }

    #[test]
    fn mip_level_count_covers_the_longest_axis() {
        assert_eq!(max_mip_levels(1, 1), 1);
        assert_eq!(max_mip_levels(2, 2), 2);
        assert_eq!(max_mip_levels(512, 512), 10);
        assert_eq!(max_mip_levels(1024, 512), 11);
        assert_eq!(max_mip_levels(800, 600), 10);
    }

    #[test]
    fn full_mip_chain_config_matches_the_extent() {
        let config = ImageConfig::default_2d(256, 256).with_full_mip_chain();
        assert_eq!(config.mip_levels, 9);
    }
}
