//! Per-frame data handed to the application's render callback.

use ash::vk;

/// Everything an app needs to record one frame.
///
/// `frame_index` cycles through the in-flight slots and selects per-frame
/// resources such as uniform buffer elements and descriptor sets. It is not
/// the swapchain image index, which the renderer keeps to itself.
pub struct Frame {
    /// Command buffer recording this frame. The render pass is already begun.
    pub command_buffer: vk::CommandBuffer,
    /// In-flight slot index in `0..frames_in_flight`.
    pub frame_index: usize,
    /// Seconds elapsed since the previous frame.
    pub dt: f32,
    /// Frames presented since startup.
    pub frame_number: u64,
}

impl Frame {
    pub(crate) fn new(
        command_buffer: vk::CommandBuffer,
        frame_index: usize,
        dt: f32,
        frame_number: u64,
    ) -> Self {
        Self {
            command_buffer,
            frame_index,
            dt,
            frame_number,
        }
    }
}
