//! Frame lifecycle over the swapchain.

use std::sync::Arc;

use ash::vk;
use thalassa_gpu::command;
use thalassa_gpu::render_pass::create_framebuffer;
use thalassa_gpu::sync::{create_fence, create_semaphore, reset_fence, wait_for_fence};
use thalassa_gpu::{GpuContext, Image, ImageConfig, RenderPassConfig, Swapchain};
use tracing::{debug, info};

use crate::error::Result;
use crate::schedule::{FrameSchedule, MAX_FRAMES_IN_FLIGHT};

/// Depth attachment format used for every frame target.
pub const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

const CLEAR_COLOR: [f32; 4] = [0.005, 0.005, 0.005, 1.0];

/// Owns the swapchain, per-image frame targets and per-frame sync objects,
/// and drives the wait/acquire/record/submit/present cycle.
///
/// Sync objects and command buffers are indexed by the schedule's
/// `frame_index`; depth images and framebuffers by the acquired
/// `image_index`. The two indices are unrelated.
pub struct Renderer {
    device: Arc<ash::Device>,
    swapchain_loader: ash::khr::swapchain::Device,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    swapchain: Swapchain,
    render_pass: vk::RenderPass,
    depth_images: Vec<Image>,
    framebuffers: Vec<vk::Framebuffer>,
    command_pool: vk::CommandPool,
    command_buffers: Vec<vk::CommandBuffer>,
    image_available: Vec<vk::Semaphore>,
    render_finished: Vec<vk::Semaphore>,
    in_flight: Vec<vk::Fence>,
    schedule: FrameSchedule,
    image_index: u32,
    vsync: bool,
}

impl Renderer {
    /// Create the renderer for the context's surface.
    pub fn new(gpu: &GpuContext, desired_extent: vk::Extent2D, vsync: bool) -> Result<Self> {
        let device = gpu.device_arc();

        let surface_info = gpu.surface_info()?;
        let swapchain = Swapchain::new(
            &device,
            gpu.swapchain_loader(),
            gpu.surface(),
            &surface_info,
            gpu.queue_families(),
            desired_extent,
            vsync,
            None,
        )?;

        let render_pass = RenderPassConfig::new(swapchain.format, DEPTH_FORMAT).build(&device)?;
        let (depth_images, framebuffers) = create_frame_targets(gpu, render_pass, &swapchain)?;

        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(gpu.queue_families().graphics)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let command_pool = unsafe { device.create_command_pool(&pool_info, None)? };
        let command_buffers = unsafe {
            command::allocate_command_buffers(&device, command_pool, MAX_FRAMES_IN_FLIGHT as u32)?
        };

        let mut image_available = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        let mut render_finished = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        let mut in_flight = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            unsafe {
                image_available.push(create_semaphore(&device)?);
                render_finished.push(create_semaphore(&device)?);
                in_flight.push(create_fence(&device, true)?);
            }
        }

        info!(
            "Renderer ready: {}x{}, {} swapchain images, {} frames in flight",
            swapchain.extent.width,
            swapchain.extent.height,
            swapchain.images.len(),
            MAX_FRAMES_IN_FLIGHT,
        );

        Ok(Self {
            device,
            swapchain_loader: gpu.swapchain_loader().clone(),
            graphics_queue: gpu.graphics_queue(),
            present_queue: gpu.present_queue(),
            swapchain,
            render_pass,
            depth_images,
            framebuffers,
            command_pool,
            command_buffers,
            image_available,
            render_finished,
            in_flight,
            schedule: FrameSchedule::new(MAX_FRAMES_IN_FLIGHT),
            image_index: 0,
            vsync,
        })
    }

    /// Wait for this slot's fence, acquire the next image, and begin the
    /// frame's command buffer.
    ///
    /// Returns `Ok(None)` when the swapchain is out of date; no frame is
    /// started and the caller should recreate before trying again.
    ///
    /// # Panics
    /// Panics when a frame is already in progress.
    pub fn begin_frame(&mut self) -> Result<Option<vk::CommandBuffer>> {
        assert!(
            !self.schedule.is_started(),
            "begin_frame called while a frame is already in progress"
        );

        let frame = self.schedule.frame_index();
        unsafe { wait_for_fence(&self.device, self.in_flight[frame])? };

        let Some((image_index, _suboptimal)) = self
            .swapchain
            .acquire(&self.swapchain_loader, self.image_available[frame])?
        else {
            return Ok(None);
        };

        self.image_index = image_index;
        self.schedule.begin();

        let command_buffer = self.command_buffers[frame];
        unsafe {
            self.device
                .reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty())?;
            command::begin_command_buffer(
                &self.device,
                command_buffer,
                vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
            )?;
        }

        Ok(Some(command_buffer))
    }

    /// Begin the render pass on the acquired image's framebuffer and set
    /// the full-extent viewport and scissor.
    ///
    /// # Panics
    /// Panics when no frame is in progress.
    pub fn begin_render_pass(&self, command_buffer: vk::CommandBuffer) {
        assert!(
            self.schedule.is_started(),
            "begin_render_pass called outside a started frame"
        );

        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: CLEAR_COLOR,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        ];

        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(self.render_pass)
            .framebuffer(self.framebuffers[self.image_index as usize])
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: self.swapchain.extent,
            })
            .clear_values(&clear_values);

        let viewport = vk::Viewport::default()
            .width(self.swapchain.extent.width as f32)
            .height(self.swapchain.extent.height as f32)
            .min_depth(0.0)
            .max_depth(1.0);
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: self.swapchain.extent,
        };

        unsafe {
            self.device.cmd_begin_render_pass(
                command_buffer,
                &begin_info,
                vk::SubpassContents::INLINE,
            );
            self.device
                .cmd_set_viewport(command_buffer, 0, std::slice::from_ref(&viewport));
            self.device
                .cmd_set_scissor(command_buffer, 0, std::slice::from_ref(&scissor));
        }
    }

    /// End the render pass.
    ///
    /// # Panics
    /// Panics when no frame is in progress.
    pub fn end_render_pass(&self, command_buffer: vk::CommandBuffer) {
        assert!(
            self.schedule.is_started(),
            "end_render_pass called outside a started frame"
        );
        unsafe { self.device.cmd_end_render_pass(command_buffer) };
    }

    /// End the frame's command buffer, submit it, and queue the image for
    /// presentation.
    ///
    /// An out-of-date or suboptimal swapchain at present is tolerated;
    /// the resize path owns recreation.
    ///
    /// # Panics
    /// Panics when no frame is in progress.
    pub fn end_frame(&mut self) -> Result<()> {
        assert!(
            self.schedule.is_started(),
            "end_frame called without a started frame"
        );

        let frame = self.schedule.frame_index();
        let command_buffer = self.command_buffers[frame];

        unsafe { command::end_command_buffer(&self.device, command_buffer)? };

        let wait_semaphores = [self.image_available[frame]];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [command_buffer];
        let signal_semaphores = [self.render_finished[frame]];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            // The fence must be unsignaled before the submission that
            // will signal it.
            reset_fence(&self.device, self.in_flight[frame])?;
            self.device.queue_submit(
                self.graphics_queue,
                std::slice::from_ref(&submit_info),
                self.in_flight[frame],
            )?;
        }

        let suboptimal = self.swapchain.present(
            &self.swapchain_loader,
            self.present_queue,
            self.render_finished[frame],
            self.image_index,
        )?;
        if suboptimal {
            debug!("Swapchain suboptimal at present");
        }

        self.schedule.end();
        Ok(())
    }

    /// Recreate the swapchain and its frame targets for a new extent.
    ///
    /// The render pass and sync objects are kept; the old swapchain handle
    /// is passed to the new chain before being destroyed.
    pub fn recreate_swapchain(
        &mut self,
        gpu: &GpuContext,
        desired_extent: vk::Extent2D,
    ) -> Result<()> {
        gpu.wait_idle()?;

        unsafe { self.destroy_frame_targets() };

        let surface_info = gpu.surface_info()?;
        let new_swapchain = Swapchain::new(
            &self.device,
            &self.swapchain_loader,
            gpu.surface(),
            &surface_info,
            gpu.queue_families(),
            desired_extent,
            self.vsync,
            Some(self.swapchain.handle),
        )?;
        unsafe { self.swapchain.destroy(&self.device, &self.swapchain_loader) };
        self.swapchain = new_swapchain;

        let (depth_images, framebuffers) =
            create_frame_targets(gpu, self.render_pass, &self.swapchain)?;
        self.depth_images = depth_images;
        self.framebuffers = framebuffers;

        info!(
            "Swapchain recreated: {}x{}",
            self.swapchain.extent.width, self.swapchain.extent.height
        );
        Ok(())
    }

    /// Current swapchain extent.
    #[must_use]
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent
    }

    /// Width over height of the current extent.
    #[must_use]
    pub fn aspect_ratio(&self) -> f32 {
        self.swapchain.extent.width as f32 / self.swapchain.extent.height as f32
    }

    /// Render pass the frame targets are built for.
    #[must_use]
    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    /// Slot index for per-frame resources such as uniform buffer elements.
    #[must_use]
    pub fn frame_index(&self) -> usize {
        self.schedule.frame_index()
    }

    /// Number of frame slots cycling through the schedule.
    #[must_use]
    pub fn frames_in_flight(&self) -> usize {
        self.in_flight.len()
    }

    unsafe fn destroy_frame_targets(&mut self) {
        unsafe {
            for framebuffer in self.framebuffers.drain(..) {
                self.device.destroy_framebuffer(framebuffer, None);
            }
        }
        self.depth_images.clear();
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();

            for frame in 0..self.in_flight.len() {
                self.device.destroy_semaphore(self.image_available[frame], None);
                self.device.destroy_semaphore(self.render_finished[frame], None);
                self.device.destroy_fence(self.in_flight[frame], None);
            }
            self.destroy_frame_targets();
            self.device.destroy_render_pass(self.render_pass, None);
            self.device.destroy_command_pool(self.command_pool, None);
            self.swapchain.destroy(&self.device, &self.swapchain_loader);
        }
        debug!("Renderer destroyed");
    }
}

fn create_frame_targets(
    gpu: &GpuContext,
    render_pass: vk::RenderPass,
    swapchain: &Swapchain,
) -> Result<(Vec<Image>, Vec<vk::Framebuffer>)> {
    let extent = swapchain.extent;
    let mut depth_images = Vec::with_capacity(swapchain.image_views.len());
    let mut framebuffers = Vec::with_capacity(swapchain.image_views.len());

    for &color_view in &swapchain.image_views {
        let depth = Image::new(
            gpu.device_arc(),
            gpu.memory_properties(),
            ImageConfig::depth(extent.width, extent.height, DEPTH_FORMAT),
        )?;
        let depth_view = depth.view().expect("depth images always have a view");

        let framebuffer = unsafe {
            create_framebuffer(gpu.device(), render_pass, &[color_view, depth_view], extent)?
        };

        depth_images.push(depth);
        framebuffers.push(framebuffer);
    }

    Ok((depth_images, framebuffers))
}
