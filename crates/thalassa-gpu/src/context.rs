//! GPU context owning the instance, surface, device and queues.

use std::ffi::CStr;
use std::sync::Arc;

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{debug, info};

use crate::command;
use crate::error::{GpuError, Result};
use crate::instance;
use crate::surface::{self, SurfaceInfo};

/// Required device extensions for presentation.
pub fn required_device_extensions() -> Vec<&'static CStr> {
    vec![
        ash::khr::swapchain::NAME,
        #[cfg(target_os = "macos")]
        ash::khr::portability_subset::NAME,
    ]
}

/// What one queue family of a candidate device offers.
#[derive(Debug, Clone, Copy)]
pub struct QueueFamilySupport {
    pub graphics: bool,
    pub present: bool,
}

/// Queue family indices chosen during negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSelection {
    pub graphics: u32,
    pub present: u32,
}

/// Everything negotiation needs to know about a candidate device,
/// detached from the Vulkan handles so the decision stays testable.
#[derive(Debug, Clone)]
pub struct DeviceSupport {
    /// All required device extensions are present.
    pub extensions: bool,
    /// All requested device features are present.
    pub features: bool,
    /// The surface reports at least one format.
    pub has_formats: bool,
    /// The surface reports at least one present mode.
    pub has_present_modes: bool,
    pub queue_families: Vec<QueueFamilySupport>,
}

impl DeviceSupport {
    /// Accept the device if every capability is present, returning the
    /// queue families to use.
    #[must_use]
    pub fn evaluate(&self) -> Option<QueueSelection> {
        if self.extensions && self.features && self.has_formats && self.has_present_modes {
            select_queue_families(&self.queue_families)
        } else {
            None
        }
    }
}

/// Pick graphics and present queue families from the reported set.
///
/// A family serving both roles is preferred; otherwise the first
/// graphics family and the first present family are paired up.
#[must_use]
pub fn select_queue_families(families: &[QueueFamilySupport]) -> Option<QueueSelection> {
    if let Some(index) = families.iter().position(|f| f.graphics && f.present) {
        let index = index as u32;
        return Some(QueueSelection {
            graphics: index,
            present: index,
        });
    }

    let graphics = families.iter().position(|f| f.graphics)? as u32;
    let present = families.iter().position(|f| f.present)? as u32;
    Some(QueueSelection { graphics, present })
}

/// Configuration for building a [`GpuContext`].
pub struct GpuContextBuilder {
    app_name: String,
    enable_validation: bool,
    require_tessellation: bool,
    require_anisotropy: bool,
    require_fill_mode_non_solid: bool,
}

impl Default for GpuContextBuilder {
    fn default() -> Self {
        Self {
            app_name: String::from("Thalassa App"),
            enable_validation: cfg!(debug_assertions),
            require_tessellation: false,
            require_anisotropy: false,
            require_fill_mode_non_solid: false,
        }
    }
}

impl GpuContextBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the application name reported to the driver.
    #[must_use]
    pub fn app_name(mut self, name: &str) -> Self {
        self.app_name = name.to_string();
        self
    }

    /// Enable or disable validation layers.
    #[must_use]
    pub fn validation(mut self, enable: bool) -> Self {
        self.enable_validation = enable;
        self
    }

    /// Require tessellation shader support.
    #[must_use]
    pub fn tessellation(mut self, require: bool) -> Self {
        self.require_tessellation = require;
        self
    }

    /// Require anisotropic filtering support.
    #[must_use]
    pub fn anisotropy(mut self, require: bool) -> Self {
        self.require_anisotropy = require;
        self
    }

    /// Require non-solid polygon fill modes (wireframe).
    #[must_use]
    pub fn fill_mode_non_solid(mut self, require: bool) -> Self {
        self.require_fill_mode_non_solid = require;
        self
    }

    /// Build the GPU context against a window.
    ///
    /// Walks the physical devices in enumeration order and settles on
    /// the first one that passes negotiation.
    pub fn build<W>(self, window: &W) -> Result<GpuContext>
    where
        W: HasDisplayHandle + HasWindowHandle,
    {
        let entry = unsafe { ash::Entry::load() }
            .map_err(|e| GpuError::LibraryLoad(e.to_string()))?;

        let vk_instance =
            unsafe { instance::create_instance(&entry, &self.app_name, self.enable_validation)? };

        let debug_utils = if self.enable_validation {
            Some(unsafe { instance::create_debug_messenger(&entry, &vk_instance)? })
        } else {
            None
        };

        let surface_loader = ash::khr::surface::Instance::new(&entry, &vk_instance);
        let surface = unsafe { surface::create_surface(&entry, &vk_instance, window)? };

        let (physical_device, queues) =
            unsafe { self.pick_physical_device(&vk_instance, &surface_loader, surface)? };

        let properties = unsafe { vk_instance.get_physical_device_properties(physical_device) };
        let memory_properties =
            unsafe { vk_instance.get_physical_device_memory_properties(physical_device) };

        let device_name = properties
            .device_name_as_c_str()
            .unwrap_or(c"unknown")
            .to_string_lossy()
            .into_owned();
        info!(
            "Selected GPU: {} (Vulkan {}.{}, graphics family {}, present family {})",
            device_name,
            vk::api_version_major(properties.api_version),
            vk::api_version_minor(properties.api_version),
            queues.graphics,
            queues.present,
        );

        let device = unsafe { self.create_device(&vk_instance, physical_device, queues)? };
        let swapchain_loader = ash::khr::swapchain::Device::new(&vk_instance, &device);

        let graphics_queue = unsafe { device.get_device_queue(queues.graphics, 0) };
        let present_queue = unsafe { device.get_device_queue(queues.present, 0) };

        let pool_info = vk::CommandPoolCreateInfo::default()
            .flags(
                vk::CommandPoolCreateFlags::TRANSIENT
                    | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            )
            .queue_family_index(queues.graphics);
        let command_pool = unsafe { device.create_command_pool(&pool_info, None)? };

        let cache_info = vk::PipelineCacheCreateInfo::default();
        let pipeline_cache = unsafe { device.create_pipeline_cache(&cache_info, None)? };

        debug!("GPU context ready");

        Ok(GpuContext {
            entry,
            instance: vk_instance,
            debug_utils,
            surface_loader,
            surface,
            physical_device,
            properties,
            memory_properties,
            device: Arc::new(device),
            swapchain_loader,
            queues,
            graphics_queue,
            present_queue,
            command_pool,
            pipeline_cache,
        })
    }

    unsafe fn pick_physical_device(
        &self,
        vk_instance: &ash::Instance,
        surface_loader: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
    ) -> Result<(vk::PhysicalDevice, QueueSelection)> {
        let devices = unsafe { vk_instance.enumerate_physical_devices()? };

        for device in devices {
            let support =
                unsafe { self.gather_support(vk_instance, surface_loader, surface, device)? };
            if let Some(selection) = support.evaluate() {
                return Ok((device, selection));
            }
            debug!("Skipping physical device: {:?}", support);
        }

        Err(GpuError::NoSuitableDevice)
    }

    unsafe fn gather_support(
        &self,
        vk_instance: &ash::Instance,
        surface_loader: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
        device: vk::PhysicalDevice,
    ) -> Result<DeviceSupport> {
        let available =
            unsafe { vk_instance.enumerate_device_extension_properties(device)? };
        let extensions = required_device_extensions().iter().all(|required| {
            available
                .iter()
                .any(|props| unsafe { CStr::from_ptr(props.extension_name.as_ptr()) } == *required)
        });

        let device_features = unsafe { vk_instance.get_physical_device_features(device) };
        let features = (!self.require_tessellation
            || device_features.tessellation_shader == vk::TRUE)
            && (!self.require_anisotropy || device_features.sampler_anisotropy == vk::TRUE)
            && (!self.require_fill_mode_non_solid
                || device_features.fill_mode_non_solid == vk::TRUE);

        let surface_info =
            unsafe { surface::query_surface_info(surface_loader, device, surface)? };

        let family_properties =
            unsafe { vk_instance.get_physical_device_queue_family_properties(device) };
        let queue_families = family_properties
            .iter()
            .enumerate()
            .map(|(index, props)| {
                let graphics = props.queue_flags.contains(vk::QueueFlags::GRAPHICS);
                let present = unsafe {
                    surface_loader.get_physical_device_surface_support(
                        device,
                        index as u32,
                        surface,
                    )
                }
                .unwrap_or(false);
                QueueFamilySupport { graphics, present }
            })
            .collect();

        Ok(DeviceSupport {
            extensions,
            features,
            has_formats: !surface_info.formats.is_empty(),
            has_present_modes: !surface_info.present_modes.is_empty(),
            queue_families,
        })
    }

    unsafe fn create_device(
        &self,
        vk_instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        queues: QueueSelection,
    ) -> Result<ash::Device> {
        let mut unique_families = vec![queues.graphics];
        if queues.present != queues.graphics {
            unique_families.push(queues.present);
        }

        let priorities = [1.0f32];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
            })
            .collect();

        let extension_names: Vec<*const i8> = required_device_extensions()
            .iter()
            .map(|ext| ext.as_ptr())
            .collect();

        let features = vk::PhysicalDeviceFeatures::default()
            .tessellation_shader(self.require_tessellation)
            .sampler_anisotropy(self.require_anisotropy)
            .fill_mode_non_solid(self.require_fill_mode_non_solid);

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extension_names)
            .enabled_features(&features);

        let device =
            unsafe { vk_instance.create_device(physical_device, &create_info, None)? };
        Ok(device)
    }
}

/// Owner of the core Vulkan objects.
///
/// Every resource created from the context must be dropped before the
/// context itself; the context tears its own objects down in reverse
/// creation order.
pub struct GpuContext {
    // Entry must be kept alive for the lifetime of the instance.
    #[allow(dead_code)]
    entry: ash::Entry,
    instance: ash::Instance,
    debug_utils: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
    surface_loader: ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
    physical_device: vk::PhysicalDevice,
    properties: vk::PhysicalDeviceProperties,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    device: Arc<ash::Device>,
    swapchain_loader: ash::khr::swapchain::Device,
    queues: QueueSelection,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    command_pool: vk::CommandPool,
    pipeline_cache: vk::PipelineCache,
}

impl GpuContext {
    /// Get the logical device.
    #[must_use]
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    /// Get a shared handle to the logical device.
    ///
    /// The handle is only valid while the context lives.
    #[must_use]
    pub fn device_arc(&self) -> Arc<ash::Device> {
        Arc::clone(&self.device)
    }

    /// Get the Vulkan instance.
    #[must_use]
    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    /// Get the physical device.
    #[must_use]
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Get the physical device properties.
    #[must_use]
    pub fn properties(&self) -> &vk::PhysicalDeviceProperties {
        &self.properties
    }

    /// Get the physical device limits.
    #[must_use]
    pub fn limits(&self) -> &vk::PhysicalDeviceLimits {
        &self.properties.limits
    }

    /// Get the physical device memory properties.
    #[must_use]
    pub fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory_properties
    }

    /// Get the window surface.
    #[must_use]
    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// Get the swapchain extension loader.
    #[must_use]
    pub fn swapchain_loader(&self) -> &ash::khr::swapchain::Device {
        &self.swapchain_loader
    }

    /// Get the chosen queue families.
    #[must_use]
    pub fn queue_families(&self) -> QueueSelection {
        self.queues
    }

    /// Get the graphics queue.
    #[must_use]
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Get the present queue.
    #[must_use]
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    /// Get the shared command pool.
    #[must_use]
    pub fn command_pool(&self) -> vk::CommandPool {
        self.command_pool
    }

    /// Get the pipeline cache.
    #[must_use]
    pub fn pipeline_cache(&self) -> vk::PipelineCache {
        self.pipeline_cache
    }

    /// Query the current surface capabilities, formats and present modes.
    pub fn surface_info(&self) -> Result<SurfaceInfo> {
        unsafe {
            surface::query_surface_info(&self.surface_loader, self.physical_device, self.surface)
        }
    }

    /// Block until the device is idle.
    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }

    /// Record and synchronously submit a one-off command buffer on the
    /// graphics queue.
    pub fn execute_single_time_commands<F>(&self, record: F) -> Result<()>
    where
        F: FnOnce(vk::CommandBuffer) -> Result<()>,
    {
        unsafe {
            command::execute_single_time_commands(
                &self.device,
                self.command_pool,
                self.graphics_queue,
                record,
            )
        }
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_pipeline_cache(self.pipeline_cache, None);
            self.device.destroy_command_pool(self.command_pool, None);
            self.device.destroy_device(None);
            if let Some((loader, messenger)) = self.debug_utils.take() {
                loader.destroy_debug_utils_messenger(messenger, None);
            }
            self.surface_loader.destroy_surface(self.surface, None);
            self.instance.destroy_instance(None);
        }
        debug!("GPU context destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(graphics: bool, present: bool) -> QueueFamilySupport {
        QueueFamilySupport { graphics, present }
    }

    fn capable(queue_families: Vec<QueueFamilySupport>) -> DeviceSupport {
        DeviceSupport {
            extensions: true,
            features: true,
            has_formats: true,
            has_present_modes: true,
            queue_families,
        }
    }

    #[test]
    fn prefers_a_combined_graphics_present_family() {
        let families = [family(true, false), family(false, true), family(true, true)];
        let selection = select_queue_families(&families).unwrap();
        assert_eq!(selection.graphics, 2);
        assert_eq!(selection.present, 2);
    }

    #[test]
    fn falls_back_to_separate_families() {
        let families = [family(false, false), family(true, false), family(false, true)];
        let selection = select_queue_families(&families).unwrap();
        assert_eq!(selection.graphics, 1);
        assert_eq!(selection.present, 2);
    }

    #[test]
    fn rejects_devices_without_present_support() {
        let families = [family(true, false), family(true, false)];
        assert!(select_queue_families(&families).is_none());
    }

    #[test]
    fn negotiation_settles_on_the_first_fully_capable_device() {
        let graphics_without_present = capable(vec![family(true, false)]);
        let fully_capable = capable(vec![family(true, false), family(true, true)]);
        let no_surface_output = DeviceSupport {
            has_formats: false,
            has_present_modes: false,
            ..capable(vec![family(true, true)])
        };

        let candidates = [graphics_without_present, fully_capable, no_surface_output];
        let picked = candidates
            .iter()
            .enumerate()
            .find_map(|(index, support)| support.evaluate().map(|queues| (index, queues)));

        let (index, queues) = picked.unwrap();
        assert_eq!(index, 1);
        assert_eq!(queues.graphics, 1);
        assert_eq!(queues.present, 1);
    }

    #[test]
    fn negotiation_rejects_missing_extensions_or_features() {
        let missing_extensions = DeviceSupport {
            extensions: false,
            ..capable(vec![family(true, true)])
        };
        let missing_features = DeviceSupport {
            features: false,
            ..capable(vec![family(true, true)])
        };

        assert!(missing_extensions.evaluate().is_none());
        assert!(missing_features.evaluate().is_none());
    }
}
