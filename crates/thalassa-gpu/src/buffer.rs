//! Buffers with aligned per-element addressing.

use std::sync::Arc;

use ash::vk;

use crate::error::Result;
use crate::memory::{self, aligned_size};

/// Size and offset bookkeeping for an aligned element array.
///
/// Each element is padded to the requested offset alignment so it can
/// be bound on its own through a descriptor offset. A plain one-block
/// buffer is a layout with one element and no alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferLayout {
    element_count: vk::DeviceSize,
    element_size: vk::DeviceSize,
    alignment_size: vk::DeviceSize,
}

impl BufferLayout {
    /// Compute the layout for `element_count` elements of
    /// `element_size` bytes, padded to `min_offset_alignment`.
    ///
    /// # Panics
    /// Panics when the count or the size is zero.
    #[must_use]
    pub fn new(
        element_count: vk::DeviceSize,
        element_size: vk::DeviceSize,
        min_offset_alignment: vk::DeviceSize,
    ) -> Self {
        assert!(element_count > 0, "buffer element count must be non-zero");
        assert!(element_size > 0, "buffer element size must be non-zero");

        Self {
            element_count,
            element_size,
            alignment_size: aligned_size(element_size, min_offset_alignment),
        }
    }

    /// Layout of a single unaligned block of `size` bytes.
    #[must_use]
    pub fn single(size: vk::DeviceSize) -> Self {
        Self::new(1, size, 1)
    }

    #[must_use]
    pub fn element_count(&self) -> vk::DeviceSize {
        self.element_count
    }

    #[must_use]
    pub fn element_size(&self) -> vk::DeviceSize {
        self.element_size
    }

    /// Stride between consecutive elements.
    #[must_use]
    pub fn alignment_size(&self) -> vk::DeviceSize {
        self.alignment_size
    }

    /// Total buffer size: element count times the padded element size.
    #[must_use]
    pub fn size(&self) -> vk::DeviceSize {
        self.element_count * self.alignment_size
    }

    /// Byte offset of element `index`.
    ///
    /// # Panics
    /// Panics when `index` is out of bounds.
    #[must_use]
    pub fn element_offset(&self, index: vk::DeviceSize) -> vk::DeviceSize {
        assert!(
            index < self.element_count,
            "element index {index} out of bounds for {} elements",
            self.element_count
        );
        index * self.alignment_size
    }
}

/// A Vulkan buffer with its dedicated memory allocation.
///
/// The buffer owns its memory and releases it on drop, so it must not
/// outlive the context its device came from.
pub struct Buffer {
    device: Arc<ash::Device>,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    layout: BufferLayout,
    mapped: Option<*mut u8>,
}

impl Buffer {
    /// Create a buffer of `element_count` tightly packed elements.
    pub fn new(
        device: Arc<ash::Device>,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        element_count: vk::DeviceSize,
        element_size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> Result<Self> {
        Self::new_aligned(
            device,
            memory_properties,
            element_count,
            element_size,
            1,
            usage,
            properties,
        )
    }

    /// Create a buffer whose elements are padded to
    /// `min_offset_alignment`, as required when elements are bound
    /// individually through descriptor offsets.
    pub fn new_aligned(
        device: Arc<ash::Device>,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        element_count: vk::DeviceSize,
        element_size: vk::DeviceSize,
        min_offset_alignment: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> Result<Self> {
        let layout = BufferLayout::new(element_count, element_size, min_offset_alignment);
        let buffer_info = vk::BufferCreateInfo::default()
            .size(layout.size())
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let buffer = unsafe { device.create_buffer(&buffer_info, None)? };

        let memory = unsafe {
            memory::allocate_buffer_memory(&device, memory_properties, buffer, properties)?
        };

        Ok(Self {
            device,
            buffer,
            memory,
            layout,
            mapped: None,
        })
    }

    /// Get the buffer handle.
    #[must_use]
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Get the buffer layout.
    #[must_use]
    pub fn layout(&self) -> BufferLayout {
        self.layout
    }

    /// Total size in bytes.
    #[must_use]
    pub fn size(&self) -> vk::DeviceSize {
        self.layout.size()
    }

    #[must_use]
    pub fn is_mapped(&self) -> bool {
        self.mapped.is_some()
    }

    /// Map the whole buffer for host writes.
    ///
    /// # Panics
    /// Panics when the buffer is already mapped.
    pub fn map(&mut self) -> Result<()> {
        assert!(self.mapped.is_none(), "buffer is already mapped");

        let pointer = unsafe {
            self.device.map_memory(
                self.memory,
                0,
                vk::WHOLE_SIZE,
                vk::MemoryMapFlags::empty(),
            )?
        };
        self.mapped = Some(pointer.cast());
        Ok(())
    }

    /// Unmap the buffer. Unmapping an unmapped buffer is a no-op.
    pub fn unmap(&mut self) {
        if self.mapped.take().is_some() {
            unsafe { self.device.unmap_memory(self.memory) };
        }
    }

    /// Copy `data` into the mapped region starting at byte `offset`.
    ///
    /// # Panics
    /// Panics when the buffer is not mapped or the write would run past
    /// the end of the buffer.
    pub fn write_to_buffer(&mut self, data: &[u8], offset: vk::DeviceSize) {
        let Some(mapped) = self.mapped else {
            panic!("write to unmapped buffer");
        };

        let end = offset + data.len() as vk::DeviceSize;
        assert!(
            end <= self.layout.size(),
            "write of {} bytes at offset {offset} exceeds buffer size {}",
            data.len(),
            self.layout.size()
        );

        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), mapped.add(offset as usize), data.len());
        }
    }

    /// Copy one element into its aligned slot.
    ///
    /// # Panics
    /// Panics when the buffer is not mapped, `index` is out of bounds
    /// or `data` is larger than one element.
    pub fn write_element(&mut self, data: &[u8], index: vk::DeviceSize) {
        assert!(
            data.len() as vk::DeviceSize <= self.layout.element_size(),
            "element write of {} bytes exceeds element size {}",
            data.len(),
            self.layout.element_size()
        );
        let offset = self.layout.element_offset(index);
        self.write_to_buffer(data, offset);
    }

    /// Flush the whole mapped range. Only needed for memory without
    /// `HOST_COHERENT`.
    pub fn flush(&self) -> Result<()> {
        let range = vk::MappedMemoryRange::default()
            .memory(self.memory)
            .offset(0)
            .size(vk::WHOLE_SIZE);
        unsafe { self.device.flush_mapped_memory_ranges(&[range])? };
        Ok(())
    }

    /// Descriptor info covering the whole buffer.
    #[must_use]
    pub fn descriptor_info(&self) -> vk::DescriptorBufferInfo {
        vk::DescriptorBufferInfo::default()
            .buffer(self.buffer)
            .offset(0)
            .range(vk::WHOLE_SIZE)
    }

    /// Descriptor info covering a single element.
    ///
    /// # Panics
    /// Panics when `index` is out of bounds.
    #[must_use]
    pub fn descriptor_info_for_element(&self, index: vk::DeviceSize) -> vk::DescriptorBufferInfo {
        vk::DescriptorBufferInfo::default()
            .buffer(self.buffer)
            .offset(self.layout.element_offset(index))
            .range(self.layout.element_size())
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        self.unmap();
        unsafe {
            self.device.free_memory(self.memory, None);
            self.device.destroy_buffer(self.buffer, None);
        }
    }
}

/// Record a full copy of `src` into `dst`.
///
/// # Safety
/// The command buffer must be recording and `dst` must be at least as
/// large as `src`.
pub unsafe fn record_buffer_copy(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    src: &Buffer,
    dst: &Buffer,
) {
    let region = vk::BufferCopy::default().size(src.size());
    unsafe {
        device.cmd_copy_buffer(command_buffer, src.handle(), dst.handle(), &[region]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_size_is_count_times_padded_element() {
        let layout = BufferLayout::new(3, 100, 256);
        assert_eq!(layout.alignment_size(), 256);
        assert_eq!(layout.size(), 768);

        let tight = BufferLayout::new(4, 64, 64);
        assert_eq!(tight.alignment_size(), 64);
        assert_eq!(tight.size(), 256);
    }

    #[test]
    fn layout_without_alignment_packs_elements() {
        let layout = BufferLayout::new(5, 24, 1);
        assert_eq!(layout.alignment_size(), 24);
        assert_eq!(layout.size(), 120);
        assert_eq!(layout.element_offset(3), 72);
    }

    #[test]
    fn single_layout_is_one_unpadded_block() {
        let layout = BufferLayout::single(1000);
        assert_eq!(layout.element_count(), 1);
        assert_eq!(layout.size(), 1000);
        assert_eq!(layout.element_offset(0), 0);
    }

    #[test]
    fn element_slots_do_not_overlap() {
        let layout = BufferLayout::new(8, 100, 64);
        for index in 1..8 {
            let previous_end = layout.element_offset(index - 1) + layout.element_size();
            assert!(layout.element_offset(index) >= previous_end);
        }
    }

    #[test]
    #[should_panic(expected = "element count must be non-zero")]
    fn zero_element_count_is_rejected() {
        let _ = BufferLayout::new(0, 64, 64);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn element_offset_is_bounds_checked() {
        let layout = BufferLayout::new(2, 64, 256);
        let _ = layout.element_offset(2);
    }

    /// Mirror of the element write path against plain host memory: two
    /// 64 byte elements padded to 256 bytes land in disjoint slots.
    #[test]
    fn element_writes_land_in_their_aligned_slots() {
        let layout = BufferLayout::new(2, 64, 256);
        let mut backing = vec![0u8; layout.size() as usize];

        let first = [0xAAu8; 64];
        let second = [0xBBu8; 64];
        for (index, element) in [first, second].iter().enumerate() {
            let offset = layout.element_offset(index as vk::DeviceSize) as usize;
            backing[offset..offset + element.len()].copy_from_slice(element);
        }

        assert!(backing[..64].iter().all(|&b| b == 0xAA));
        assert!(backing[64..256].iter().all(|&b| b == 0));
        assert!(backing[256..320].iter().all(|&b| b == 0xBB));
        assert!(backing[320..].iter().all(|&b| b == 0));
    }
}
