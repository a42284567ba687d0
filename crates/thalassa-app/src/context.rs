//! Shared engine state handed to application callbacks.

use std::sync::Arc;

use ash::vk;
use thalassa_gpu::GpuContext;
use thalassa_render::Renderer;
use winit::window::Window;

/// Engine context owned by the runner for the lifetime of the app.
///
/// Field order doubles as teardown order: the renderer must release its
/// swapchain and frame resources before the GPU context destroys the device.
pub struct AppContext {
    /// Frame renderer over the window's surface.
    pub renderer: Renderer,
    /// Instance, device and queues.
    pub gpu: GpuContext,
    /// The window being rendered to.
    pub window: Arc<Window>,
}

impl AppContext {
    pub(crate) fn new(window: Arc<Window>, gpu: GpuContext, vsync: bool) -> anyhow::Result<Self> {
        let (width, height) = thalassa_platform::drawable_size(&window);
        let extent = vk::Extent2D {
            width: width.max(1),
            height: height.max(1),
        };
        let renderer = Renderer::new(&gpu, extent, vsync)?;

        Ok(Self {
            renderer,
            gpu,
            window,
        })
    }

    /// Current swapchain extent.
    pub fn extent(&self) -> vk::Extent2D {
        self.renderer.extent()
    }

    /// Current swapchain width in pixels.
    pub fn width(&self) -> u32 {
        self.renderer.extent().width
    }

    /// Current swapchain height in pixels.
    pub fn height(&self) -> u32 {
        self.renderer.extent().height
    }

    /// Width over height of the current extent.
    pub fn aspect_ratio(&self) -> f32 {
        self.renderer.aspect_ratio()
    }
}
