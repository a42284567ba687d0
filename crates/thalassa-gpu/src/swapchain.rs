//! Swapchain creation and presentation.

use ash::vk;
use tracing::debug;

use crate::context::QueueSelection;
use crate::error::{GpuError, Result};
use crate::surface::SurfaceInfo;

/// Swapchain with its images and views.
pub struct Swapchain {
    pub handle: vk::SwapchainKHR,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
}

impl Swapchain {
    /// Create a swapchain for the surface.
    ///
    /// `old_swapchain` lets the driver recycle resources across a
    /// recreation; the caller still destroys the old chain afterwards.
    pub fn new(
        device: &ash::Device,
        swapchain_loader: &ash::khr::swapchain::Device,
        surface: vk::SurfaceKHR,
        surface_info: &SurfaceInfo,
        queues: QueueSelection,
        desired_extent: vk::Extent2D,
        vsync: bool,
        old_swapchain: Option<vk::SwapchainKHR>,
    ) -> Result<Self> {
        if surface_info.formats.is_empty() {
            return Err(GpuError::SwapchainCreation(
                "surface reports no formats".into(),
            ));
        }
        if surface_info.present_modes.is_empty() {
            return Err(GpuError::SwapchainCreation(
                "surface reports no present modes".into(),
            ));
        }

        let surface_format = select_surface_format(&surface_info.formats);
        let present_mode = select_present_mode(&surface_info.present_modes, vsync);
        let extent = calculate_extent(&surface_info.capabilities, desired_extent);

        let mut image_count = surface_info.capabilities.min_image_count + 1;
        if surface_info.capabilities.max_image_count > 0 {
            image_count = image_count.min(surface_info.capabilities.max_image_count);
        }

        let family_indices = [queues.graphics, queues.present];
        let mut create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(surface_info.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain.unwrap_or(vk::SwapchainKHR::null()));

        if queues.graphics == queues.present {
            create_info = create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE);
        } else {
            create_info = create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&family_indices);
        }

        let handle = unsafe { swapchain_loader.create_swapchain(&create_info, None)? };
        let images = unsafe { swapchain_loader.get_swapchain_images(handle)? };

        let mut image_views = Vec::with_capacity(images.len());
        for &image in &images {
            let view_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(surface_format.format)
                .subresource_range(
                    vk::ImageSubresourceRange::default()
                        .aspect_mask(vk::ImageAspectFlags::COLOR)
                        .base_mip_level(0)
                        .level_count(1)
                        .base_array_layer(0)
                        .layer_count(1),
                );
            let view = unsafe { device.create_image_view(&view_info, None)? };
            image_views.push(view);
        }

        debug!(
            "Created swapchain: {}x{}, {} images, {:?}, {:?}",
            extent.width,
            extent.height,
            images.len(),
            surface_format.format,
            present_mode,
        );

        Ok(Self {
            handle,
            images,
            image_views,
            format: surface_format.format,
            extent,
        })
    }

    /// Acquire the next image, signaling `semaphore` when it is ready.
    ///
    /// Returns `Ok(None)` when the swapchain is out of date and must be
    /// recreated before any image can be acquired. The boolean flags a
    /// suboptimal (but still usable) swapchain.
    pub fn acquire(
        &self,
        swapchain_loader: &ash::khr::swapchain::Device,
        semaphore: vk::Semaphore,
    ) -> Result<Option<(u32, bool)>> {
        let result = unsafe {
            swapchain_loader.acquire_next_image(
                self.handle,
                u64::MAX,
                semaphore,
                vk::Fence::null(),
            )
        };

        match result {
            Ok((image_index, suboptimal)) => Ok(Some((image_index, suboptimal))),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Queue the image for presentation once `wait_semaphore` signals.
    ///
    /// Returns `Ok(true)` when the swapchain should be recreated, which
    /// covers both an out-of-date and a suboptimal chain.
    pub fn present(
        &self,
        swapchain_loader: &ash::khr::swapchain::Device,
        queue: vk::Queue,
        wait_semaphore: vk::Semaphore,
        image_index: u32,
    ) -> Result<bool> {
        let wait_semaphores = [wait_semaphore];
        let swapchains = [self.handle];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe { swapchain_loader.queue_present(queue, &present_info) };

        match result {
            Ok(suboptimal) => Ok(suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(true),
            Err(err) => Err(err.into()),
        }
    }

    /// Destroy the views and the swapchain.
    ///
    /// # Safety
    /// No frame may be using the swapchain images.
    pub unsafe fn destroy(
        &mut self,
        device: &ash::Device,
        swapchain_loader: &ash::khr::swapchain::Device,
    ) {
        unsafe {
            for view in self.image_views.drain(..) {
                device.destroy_image_view(view, None);
            }
            swapchain_loader.destroy_swapchain(self.handle, None);
        }
        self.handle = vk::SwapchainKHR::null();
    }
}

/// Pick the surface format, preferring non-sRGB BGRA with an sRGB
/// color space so shader output is not gamma encoded twice.
#[must_use]
pub fn select_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    formats
        .iter()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_UNORM
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .copied()
        .unwrap_or(formats[0])
}

/// Pick the present mode. FIFO is the only mode the standard
/// guarantees, so everything else is a preference.
#[must_use]
pub fn select_present_mode(modes: &[vk::PresentModeKHR], vsync: bool) -> vk::PresentModeKHR {
    if vsync {
        return vk::PresentModeKHR::FIFO;
    }

    for preferred in [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE] {
        if modes.contains(&preferred) {
            return preferred;
        }
    }
    vk::PresentModeKHR::FIFO
}

/// Resolve the swapchain extent from the capabilities, clamping the
/// desired size when the surface leaves it up to us.
#[must_use]
pub fn calculate_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    desired: vk::Extent2D,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    vk::Extent2D {
        width: desired.width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: desired.height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    #[test]
    fn surface_format_prefers_bgra_unorm() {
        let formats = [
            format(vk::Format::R8G8B8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        let picked = select_surface_format(&formats);
        assert_eq!(picked.format, vk::Format::B8G8R8A8_UNORM);
    }

    #[test]
    fn surface_format_falls_back_to_the_first_reported() {
        let formats = [
            format(vk::Format::R16G16B16A16_SFLOAT, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        let picked = select_surface_format(&formats);
        assert_eq!(picked.format, vk::Format::R16G16B16A16_SFLOAT);
    }

    #[test]
    fn present_mode_honors_vsync() {
        let modes = [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::FIFO];
        assert_eq!(select_present_mode(&modes, true), vk::PresentModeKHR::FIFO);
        assert_eq!(select_present_mode(&modes, false), vk::PresentModeKHR::MAILBOX);
    }

    #[test]
    fn extent_is_clamped_when_the_surface_allows_a_choice() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 64,
                height: 64,
            },
            max_image_extent: vk::Extent2D {
                width: 2048,
                height: 2048,
            },
            ..Default::default()
        };

        let extent = calculate_extent(
            &capabilities,
            vk::Extent2D {
                width: 4096,
                height: 32,
            },
        );
        assert_eq!(extent.width, 2048);
        assert_eq!(extent.height, 64);
    }

    #[test]
    fn extent_follows_the_surface_when_fixed() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 1280,
                height: 720,
            },
            ..Default::default()
        };

        let extent = calculate_extent(
            &capabilities,
            vk::Extent2D {
                width: 640,
                height: 480,
            },
        );
        assert_eq!(extent.width, 1280);
        assert_eq!(extent.height, 720);
    }
}
