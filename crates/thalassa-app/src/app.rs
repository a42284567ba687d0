//! The trait applications implement to run on the engine.

use winit::event::WindowEvent;

use crate::context::AppContext;
use crate::frame::Frame;

/// Callbacks for an application driven by [`run_app`](crate::run_app).
///
/// The framework owns window creation, GPU initialization, the frame
/// lifecycle and the event loop; implementors only fill in simulation and
/// draw commands.
pub trait ThalassaApp: Sized {
    /// Build the application once the window, device and renderer exist.
    fn init(ctx: &mut AppContext) -> anyhow::Result<Self>;

    /// Advance simulation state. Called once per frame before rendering.
    fn update(&mut self, ctx: &AppContext, dt: f32);

    /// Record draw commands for the frame.
    ///
    /// The frame's render pass is active and viewport and scissor already
    /// cover the full extent.
    fn render(&mut self, ctx: &AppContext, frame: &Frame) -> anyhow::Result<()>;

    /// React to a new surface size. The swapchain has already been rebuilt.
    #[allow(unused_variables)]
    fn on_resize(&mut self, ctx: &mut AppContext, width: u32, height: u32) -> anyhow::Result<()> {
        Ok(())
    }

    /// Inspect a window event before the runner does. Return `true` to
    /// consume it.
    #[allow(unused_variables)]
    fn on_event(&mut self, event: &WindowEvent) -> bool {
        false
    }

    /// Release app-owned GPU resources. The device is idle when this runs.
    #[allow(unused_variables)]
    fn cleanup(&mut self, ctx: &mut AppContext) {}
}
