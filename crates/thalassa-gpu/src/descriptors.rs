//! Descriptor pool, set layout and set update configuration.

use ash::vk;

use crate::error::Result;

/// Descriptor pool sizing.
#[derive(Debug, Clone)]
pub struct DescriptorPoolConfig {
    pub max_sets: u32,
    pub pool_sizes: Vec<vk::DescriptorPoolSize>,
    pub flags: vk::DescriptorPoolCreateFlags,
}

impl Default for DescriptorPoolConfig {
    fn default() -> Self {
        Self {
            max_sets: 256,
            pool_sizes: Vec::new(),
            flags: vk::DescriptorPoolCreateFlags::empty(),
        }
    }
}

impl DescriptorPoolConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `count` descriptors of `ty`.
    #[must_use]
    pub fn pool_size(mut self, ty: vk::DescriptorType, count: u32) -> Self {
        self.pool_sizes
            .push(vk::DescriptorPoolSize::default().ty(ty).descriptor_count(count));
        self
    }

    /// Cap the number of sets the pool can hand out.
    #[must_use]
    pub fn with_max_sets(mut self, max_sets: u32) -> Self {
        self.max_sets = max_sets;
        self
    }

    /// Build the pool.
    pub fn build(&self, device: &ash::Device) -> Result<vk::DescriptorPool> {
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .flags(self.flags)
            .max_sets(self.max_sets)
            .pool_sizes(&self.pool_sizes);

        let pool = unsafe { device.create_descriptor_pool(&create_info, None)? };
        Ok(pool)
    }
}

/// Bindings of one descriptor set layout, keyed by binding index.
#[derive(Default)]
pub struct DescriptorSetLayoutConfig<'a> {
    bindings: Vec<vk::DescriptorSetLayoutBinding<'a>>,
}

impl<'a> DescriptorSetLayoutConfig<'a> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a binding.
    ///
    /// # Panics
    /// Panics when the binding index was already added.
    #[must_use]
    pub fn binding(
        mut self,
        binding: u32,
        ty: vk::DescriptorType,
        count: u32,
        stages: vk::ShaderStageFlags,
    ) -> Self {
        assert!(
            self.bindings.iter().all(|b| b.binding != binding),
            "duplicate descriptor binding {binding}"
        );
        self.bindings.push(
            vk::DescriptorSetLayoutBinding::default()
                .binding(binding)
                .descriptor_type(ty)
                .descriptor_count(count)
                .stage_flags(stages),
        );
        self
    }

    /// Add a single uniform buffer binding.
    #[must_use]
    pub fn uniform_buffer(self, binding: u32, stages: vk::ShaderStageFlags) -> Self {
        self.binding(binding, vk::DescriptorType::UNIFORM_BUFFER, 1, stages)
    }

    /// Add a single combined image sampler binding.
    #[must_use]
    pub fn combined_image_sampler(self, binding: u32, stages: vk::ShaderStageFlags) -> Self {
        self.binding(
            binding,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            1,
            stages,
        )
    }

    fn sorted_bindings(&self) -> Vec<vk::DescriptorSetLayoutBinding<'a>> {
        let mut bindings = self.bindings.clone();
        bindings.sort_by_key(|b| b.binding);
        bindings
    }

    /// Build the set layout. Bindings are handed over sorted by index.
    pub fn build(&self, device: &ash::Device) -> Result<vk::DescriptorSetLayout> {
        let bindings = self.sorted_bindings();
        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);

        let layout = unsafe { device.create_descriptor_set_layout(&create_info, None)? };
        Ok(layout)
    }
}

/// Allocate one descriptor set per entry in `layouts`.
///
/// # Safety
/// The pool and layouts must be valid.
pub unsafe fn allocate_descriptor_sets(
    device: &ash::Device,
    pool: vk::DescriptorPool,
    layouts: &[vk::DescriptorSetLayout],
) -> Result<Vec<vk::DescriptorSet>> {
    let alloc_info = vk::DescriptorSetAllocateInfo::default()
        .descriptor_pool(pool)
        .set_layouts(layouts);

    let sets = unsafe { device.allocate_descriptor_sets(&alloc_info)? };
    Ok(sets)
}

enum WriteSource {
    Buffer(vk::DescriptorBufferInfo),
    Image(vk::DescriptorImageInfo),
}

/// Accumulated writes for one descriptor set, applied in a single
/// `vkUpdateDescriptorSets` call.
pub struct DescriptorSetUpdate {
    set: vk::DescriptorSet,
    writes: Vec<(u32, vk::DescriptorType, WriteSource)>,
}

impl DescriptorSetUpdate {
    #[must_use]
    pub fn new(set: vk::DescriptorSet) -> Self {
        Self {
            set,
            writes: Vec::new(),
        }
    }

    /// Write a buffer descriptor at `binding`.
    #[must_use]
    pub fn buffer(
        mut self,
        binding: u32,
        ty: vk::DescriptorType,
        info: vk::DescriptorBufferInfo,
    ) -> Self {
        self.writes.push((binding, ty, WriteSource::Buffer(info)));
        self
    }

    /// Write a uniform buffer descriptor at `binding`.
    #[must_use]
    pub fn uniform_buffer(self, binding: u32, info: vk::DescriptorBufferInfo) -> Self {
        self.buffer(binding, vk::DescriptorType::UNIFORM_BUFFER, info)
    }

    /// Write an image descriptor at `binding`.
    #[must_use]
    pub fn image(
        mut self,
        binding: u32,
        ty: vk::DescriptorType,
        info: vk::DescriptorImageInfo,
    ) -> Self {
        self.writes.push((binding, ty, WriteSource::Image(info)));
        self
    }

    /// Write a combined image sampler descriptor at `binding`.
    #[must_use]
    pub fn combined_image_sampler(self, binding: u32, info: vk::DescriptorImageInfo) -> Self {
        self.image(binding, vk::DescriptorType::COMBINED_IMAGE_SAMPLER, info)
    }

    /// Apply every accumulated write.
    pub fn update(self, device: &ash::Device) {
        let writes: Vec<vk::WriteDescriptorSet> = self
            .writes
            .iter()
            .map(|(binding, ty, source)| {
                let write = vk::WriteDescriptorSet::default()
                    .dst_set(self.set)
                    .dst_binding(*binding)
                    .dst_array_element(0)
                    .descriptor_type(*ty);
                match source {
                    WriteSource::Buffer(info) => write.buffer_info(std::slice::from_ref(info)),
                    WriteSource::Image(info) => write.image_info(std::slice::from_ref(info)),
                }
            })
            .collect();

        unsafe { device.update_descriptor_sets(&writes, &[]) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bindings_are_sorted_by_index_at_build() {
        let config = DescriptorSetLayoutConfig::new()
            .uniform_buffer(2, vk::ShaderStageFlags::VERTEX)
            .combined_image_sampler(0, vk::ShaderStageFlags::FRAGMENT)
            .uniform_buffer(1, vk::ShaderStageFlags::FRAGMENT);

        let indices: Vec<u32> = config.sorted_bindings().iter().map(|b| b.binding).collect();
        assert_eq!(indices, [0, 1, 2]);
    }

    #[test]
    #[should_panic(expected = "duplicate descriptor binding 1")]
    fn duplicate_binding_index_panics() {
        let _ = DescriptorSetLayoutConfig::new()
            .uniform_buffer(1, vk::ShaderStageFlags::VERTEX)
            .combined_image_sampler(1, vk::ShaderStageFlags::FRAGMENT);
    }

    #[test]
    fn pool_config_accumulates_sizes() {
        let config = DescriptorPoolConfig::new()
            .pool_size(vk::DescriptorType::UNIFORM_BUFFER, 8)
            .pool_size(vk::DescriptorType::COMBINED_IMAGE_SAMPLER, 4)
            .with_max_sets(16);

        assert_eq!(config.max_sets, 16);
        assert_eq!(config.pool_sizes.len(), 2);
        assert_eq!(config.pool_sizes[0].descriptor_count, 8);
    }
}
