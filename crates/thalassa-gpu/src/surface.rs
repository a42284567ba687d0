//! Window surface creation and capability queries.

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::error::{GpuError, Result};

/// Snapshot of what a physical device can do with a surface.
///
/// Queried once during device negotiation and again whenever the
/// swapchain is built, since the capabilities carry the current extent.
pub struct SurfaceInfo {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

/// Create a Vulkan surface from a window.
///
/// # Safety
/// The instance must be valid and outlive the returned surface.
pub unsafe fn create_surface<W>(
    entry: &ash::Entry,
    instance: &ash::Instance,
    window: &W,
) -> Result<vk::SurfaceKHR>
where
    W: HasDisplayHandle + HasWindowHandle,
{
    let display = window
        .display_handle()
        .map_err(|e| GpuError::SurfaceCreation(format!("no display handle: {e}")))?;
    let window_handle = window
        .window_handle()
        .map_err(|e| GpuError::SurfaceCreation(format!("no window handle: {e}")))?;

    let surface = unsafe {
        ash_window::create_surface(
            entry,
            instance,
            display.as_raw(),
            window_handle.as_raw(),
            None,
        )?
    };

    Ok(surface)
}

/// Query surface capabilities, formats and present modes for a device.
///
/// # Safety
/// The surface and physical device must belong to the loader's instance.
pub unsafe fn query_surface_info(
    surface_loader: &ash::khr::surface::Instance,
    physical_device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
) -> Result<SurfaceInfo> {
    let capabilities = unsafe {
        surface_loader.get_physical_device_surface_capabilities(physical_device, surface)?
    };
    let formats =
        unsafe { surface_loader.get_physical_device_surface_formats(physical_device, surface)? };
    let present_modes = unsafe {
        surface_loader.get_physical_device_surface_present_modes(physical_device, surface)?
    };

    Ok(SurfaceInfo {
        capabilities,
        formats,
        present_modes,
    })
}
