//! Command buffer allocation and recording helpers.

use ash::vk;

use crate::error::Result;

/// Allocate primary command buffers from a pool.
///
/// # Safety
/// The device and pool must be valid.
pub unsafe fn allocate_command_buffers(
    device: &ash::Device,
    pool: vk::CommandPool,
    count: u32,
) -> Result<Vec<vk::CommandBuffer>> {
    let alloc_info = vk::CommandBufferAllocateInfo::default()
        .command_pool(pool)
        .level(vk::CommandBufferLevel::PRIMARY)
        .command_buffer_count(count);

    let buffers = unsafe { device.allocate_command_buffers(&alloc_info)? };
    Ok(buffers)
}

/// Begin recording a command buffer.
///
/// # Safety
/// The command buffer must be in the initial state.
pub unsafe fn begin_command_buffer(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    flags: vk::CommandBufferUsageFlags,
) -> Result<()> {
    let begin_info = vk::CommandBufferBeginInfo::default().flags(flags);
    unsafe { device.begin_command_buffer(command_buffer, &begin_info)? };
    Ok(())
}

/// End recording a command buffer.
///
/// # Safety
/// The command buffer must be in the recording state.
pub unsafe fn end_command_buffer(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
) -> Result<()> {
    unsafe { device.end_command_buffer(command_buffer)? };
    Ok(())
}

/// Record commands into a transient buffer, submit it and wait for the
/// queue to drain. Used for uploads and layout transitions outside the
/// frame loop.
///
/// # Safety
/// The device, pool and queue must be valid, and `record` must only
/// record commands legal on that queue.
pub unsafe fn execute_single_time_commands<F>(
    device: &ash::Device,
    pool: vk::CommandPool,
    queue: vk::Queue,
    record: F,
) -> Result<()>
where
    F: FnOnce(vk::CommandBuffer) -> Result<()>,
{
    let command_buffer = unsafe { allocate_command_buffers(device, pool, 1)?[0] };

    unsafe {
        begin_command_buffer(
            device,
            command_buffer,
            vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
        )?;
    }

    if let Err(err) = record(command_buffer) {
        unsafe { device.free_command_buffers(pool, &[command_buffer]) };
        return Err(err);
    }

    unsafe {
        end_command_buffer(device, command_buffer)?;

        let command_buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
        device.queue_submit(queue, &[submit_info], vk::Fence::null())?;
        device.queue_wait_idle(queue)?;

        device.free_command_buffers(pool, &command_buffers);
    }

    Ok(())
}
