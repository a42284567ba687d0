//! Device memory selection and layout helpers.
//!
//! Buffers and images allocate one dedicated `VkDeviceMemory` each and
//! bind it at offset zero. Sub-allocation is left to the caller by
//! sizing buffers with [`aligned_size`].

use ash::vk;

use crate::error::{GpuError, Result};

/// Round `size` up to the next multiple of `alignment`.
///
/// An alignment of zero leaves the size unchanged. Vulkan alignments
/// are powers of two, so the rounding is a mask.
#[must_use]
pub fn aligned_size(size: vk::DeviceSize, alignment: vk::DeviceSize) -> vk::DeviceSize {
    if alignment > 0 {
        (size + alignment - 1) & !(alignment - 1)
    } else {
        size
    }
}

/// Extent of a mip level along one axis, clamped at one texel.
#[must_use]
pub fn mip_extent(base: u32, level: u32) -> u32 {
    (base >> level).max(1)
}

/// Find the first memory type index accepted by `type_bits` whose
/// property flags contain `flags`.
pub fn find_memory_type_index(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    flags: vk::MemoryPropertyFlags,
) -> Result<u32> {
    for index in 0..memory_properties.memory_type_count {
        let accepted = type_bits & (1 << index) != 0;
        let adequate = memory_properties.memory_types[index as usize]
            .property_flags
            .contains(flags);
        if accepted && adequate {
            return Ok(index);
        }
    }
    Err(GpuError::NoCompatibleMemoryType { type_bits, flags })
}

/// Allocate memory for `buffer` and bind it at offset zero.
///
/// # Safety
/// `device` must be a valid device and `buffer` one of its buffers
/// without memory bound yet.
pub unsafe fn allocate_buffer_memory(
    device: &ash::Device,
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    buffer: vk::Buffer,
    flags: vk::MemoryPropertyFlags,
) -> Result<vk::DeviceMemory> {
    let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
    let type_index =
        find_memory_type_index(memory_properties, requirements.memory_type_bits, flags)?;

    let alloc_info = vk::MemoryAllocateInfo::default()
        .allocation_size(requirements.size)
        .memory_type_index(type_index);
    let memory = unsafe { device.allocate_memory(&alloc_info, None)? };
    unsafe { device.bind_buffer_memory(buffer, memory, 0)? };
    Ok(memory)
}

/// Allocate memory for `image` and bind it at offset zero.
///
/// # Safety
/// `device` must be a valid device and `image` one of its images
/// without memory bound yet.
pub unsafe fn allocate_image_memory(
    device: &ash::Device,
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    image: vk::Image,
    flags: vk::MemoryPropertyFlags,
) -> Result<vk::DeviceMemory> {
    let requirements = unsafe { device.get_image_memory_requirements(image) };
    let type_index =
        find_memory_type_index(memory_properties, requirements.memory_type_bits, flags)?;

    let alloc_info = vk::MemoryAllocateInfo::default()
        .allocation_size(requirements.size)
        .memory_type_index(type_index);
    let memory = unsafe { device.allocate_memory(&alloc_info, None)? };
    unsafe { device.bind_image_memory(image, memory, 0)? };
    Ok(memory)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aligned_size_rounds_up() {
        assert_eq!(aligned_size(1, 64), 64);
        assert_eq!(aligned_size(63, 64), 64);
        assert_eq!(aligned_size(65, 64), 128);
        assert_eq!(aligned_size(100, 256), 256);
    }

    #[test]
    fn aligned_size_keeps_aligned_values() {
        assert_eq!(aligned_size(0, 64), 0);
        assert_eq!(aligned_size(64, 64), 64);
        assert_eq!(aligned_size(256, 64), 256);
    }

    #[test]
    fn aligned_size_zero_alignment_is_identity() {
        assert_eq!(aligned_size(37, 0), 37);
        assert_eq!(aligned_size(37, 1), 37);
    }

    #[test]
    fn aligned_size_is_a_multiple_of_the_alignment() {
        for size in [1, 17, 63, 64, 65, 200, 999] {
            for alignment in [1, 2, 16, 64, 256] {
                let rounded = aligned_size(size, alignment);
                assert!(rounded >= size);
                assert_eq!(rounded % alignment, 0);
            }
        }
    }

    #[test]
    fn mip_extent_halves_down_to_one() {
        assert_eq!(mip_extent(512, 0), 512);
        assert_eq!(mip_extent(512, 1), 256);
        assert_eq!(mip_extent(512, 4), 32);
        assert_eq!(mip_extent(512, 9), 1);
        assert_eq!(mip_extent(512, 12), 1);
    }

    #[test]
    fn mip_extent_handles_non_square_chains() {
        // A 512x256 image reaches 1 on the short axis first and stays there.
        let widths: Vec<u32> = (0..10).map(|level| mip_extent(512, level)).collect();
        let heights: Vec<u32> = (0..10).map(|level| mip_extent(256, level)).collect();
        assert_eq!(widths, [512, 256, 128, 64, 32, 16, 8, 4, 2, 1]);
        assert_eq!(heights, [256, 128, 64, 32, 16, 8, 4, 2, 1, 1]);
    }

    fn fake_memory_properties(flags: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut properties = vk::PhysicalDeviceMemoryProperties::default();
        properties.memory_type_count = flags.len() as u32;
        for (index, &property_flags) in flags.iter().enumerate() {
            properties.memory_types[index].property_flags = property_flags;
        }
        properties
    }

    #[test]
    fn memory_type_picks_first_compatible_index() {
        let properties = fake_memory_properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        ]);

        let index = find_memory_type_index(
            &properties,
            0b111,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )
        .unwrap();
        assert_eq!(index, 1);
    }

    #[test]
    fn memory_type_respects_the_resource_type_bits() {
        let properties = fake_memory_properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        ]);

        // Index 0 matches the flags but is rejected by the type bits.
        let index =
            find_memory_type_index(&properties, 0b10, vk::MemoryPropertyFlags::DEVICE_LOCAL)
                .unwrap();
        assert_eq!(index, 1);
    }

    #[test]
    fn memory_type_exhaustion_is_an_error() {
        let properties = fake_memory_properties(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);

        let result = find_memory_type_index(
            &properties,
            0b1,
            vk::MemoryPropertyFlags::HOST_VISIBLE,
        );
        assert!(matches!(
            result,
            Err(GpuError::NoCompatibleMemoryType { .. })
        ));
    }
}
