use ash::vk;
use std::rc::Rc;

use crate::{buffer::Buffer, device::LogicalDevice, VulkanError};

#[derive(thiserror::Error, Debug)]
pub enum DescriptorError {
    #[error("Failed to create a descriptor set layout: {0}")]
    CantCreateLayout(VulkanError),
    #[error("Failed to create a descriptor pool: {0}")]
    CantCreatePool(VulkanError),
    #[error("Failed to allocate {count} descriptor sets: {source}")]
    CantAllocate { count: usize, source: VulkanError },
}

/// One binding of a descriptor set layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorSetBinding {
    pub binding: u32,
    pub ty: vk::DescriptorType,
    pub count: u32,
    pub stages: vk::ShaderStageFlags,
}

impl DescriptorSetBinding {
    /// Single uniform buffer read by `stages`
    pub fn uniform_buffer(binding: u32, stages: vk::ShaderStageFlags) -> DescriptorSetBinding {
        DescriptorSetBinding {
            binding,
            ty: vk::DescriptorType::UNIFORM_BUFFER,
            count: 1,
            stages,
        }
    }
}

impl From<DescriptorSetBinding> for vk::DescriptorSetLayoutBinding {
    fn from(binding: DescriptorSetBinding) -> vk::DescriptorSetLayoutBinding {
        vk::DescriptorSetLayoutBinding::builder()
            .binding(binding.binding)
            .descriptor_type(binding.ty)
            .descriptor_count(binding.count)
            .stage_flags(binding.stages)
            .build()
    }
}

/// Pool sizes that fit `set_count` sets of a layout made of `bindings`, one entry per type
pub fn pool_sizes(bindings: &[DescriptorSetBinding], set_count: u32) -> Vec<vk::DescriptorPoolSize> {
    let mut sizes: Vec<vk::DescriptorPoolSize> = Vec::new();

    for binding in bindings {
        let count = binding.count.saturating_mul(set_count);
        match sizes.iter_mut().find(|size| size.ty == binding.ty) {
            Some(size) => size.descriptor_count = size.descriptor_count.saturating_add(count),
            None => sizes.push(vk::DescriptorPoolSize {
                ty: binding.ty,
                descriptor_count: count,
            }),
        }
    }

    sizes
}

pub struct DescriptorSetLayout {
    bindings: Vec<DescriptorSetBinding>,
    handle: vk::DescriptorSetLayout,
    device: Rc<LogicalDevice>,
}

impl DescriptorSetLayout {
    pub fn new(
        device: Rc<LogicalDevice>,
        bindings: &[DescriptorSetBinding],
    ) -> Result<DescriptorSetLayout, DescriptorError> {
        let vk_bindings: Vec<vk::DescriptorSetLayoutBinding> =
            bindings.iter().map(|&binding| binding.into()).collect();

        let create_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&vk_bindings);

        let handle = unsafe {
            device
                .vk_handle()
                .create_descriptor_set_layout(&create_info, None)
                .map_err(|err| DescriptorError::CantCreateLayout(err.into()))?
        };

        Ok(DescriptorSetLayout {
            bindings: bindings.to_vec(),
            handle,
            device,
        })
    }
}

impl DescriptorSetLayout {
    pub fn bindings(&self) -> &[DescriptorSetBinding] {
        &self.bindings
    }

    pub(crate) fn vk_handle(&self) -> vk::DescriptorSetLayout {
        self.handle
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .vk_handle()
                .destroy_descriptor_set_layout(self.handle, None);
        };
    }
}

/// Pool the descriptor sets of a renderer come from.
///
/// Destroying the pool frees every set allocated from it.
pub struct DescriptorPool {
    handle: vk::DescriptorPool,
    device: Rc<LogicalDevice>,
}

impl DescriptorPool {
    /// Creates a pool that fits `set_count` sets of `layout`
    pub fn for_layout(
        device: Rc<LogicalDevice>,
        layout: &DescriptorSetLayout,
        set_count: u32,
    ) -> Result<DescriptorPool, DescriptorError> {
        let sizes = pool_sizes(layout.bindings(), set_count);

        let create_info = vk::DescriptorPoolCreateInfo::builder()
            .pool_sizes(&sizes)
            .max_sets(set_count);

        let handle = unsafe {
            device
                .vk_handle()
                .create_descriptor_pool(&create_info, None)
                .map_err(|err| DescriptorError::CantCreatePool(err.into()))?
        };

        Ok(DescriptorPool { handle, device })
    }

    /// Allocates `count` sets of `layout`
    pub fn allocate(
        &self,
        layout: &DescriptorSetLayout,
        count: usize,
    ) -> Result<Vec<vk::DescriptorSet>, DescriptorError> {
        let layouts = vec![layout.vk_handle(); count];
        let allocate_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.handle)
            .set_layouts(&layouts);

        unsafe {
            self.device
                .vk_handle()
                .allocate_descriptor_sets(&allocate_info)
                .map_err(|err| DescriptorError::CantAllocate {
                    count,
                    source: err.into(),
                })
        }
    }

    /// Points `binding` of `set` at the whole of `buffer`
    pub fn write_uniform_buffer<T: Copy>(
        &self,
        set: vk::DescriptorSet,
        binding: u32,
        buffer: &Buffer<T>,
    ) {
        let buffer_infos = [buffer.descriptor()];
        let writes = [vk::WriteDescriptorSet::builder()
            .dst_set(set)
            .dst_binding(binding)
            .dst_array_element(0)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .buffer_info(&buffer_infos)
            .build()];

        unsafe {
            self.device.vk_handle().update_descriptor_sets(&writes, &[]);
        };
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device
                .vk_handle()
                .destroy_descriptor_pool(self.handle, None);
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_uniform_per_frame_in_flight() {
        let bindings = [DescriptorSetBinding::uniform_buffer(
            0,
            vk::ShaderStageFlags::VERTEX,
        )];

        let sizes = pool_sizes(&bindings, 2);

        assert_eq!(sizes.len(), 1);
        assert_eq!(sizes[0].ty, vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(sizes[0].descriptor_count, 2);
    }

    #[test]
    fn bindings_of_the_same_type_share_a_pool_size() {
        let bindings = [
            DescriptorSetBinding::uniform_buffer(0, vk::ShaderStageFlags::VERTEX),
            DescriptorSetBinding {
                binding: 1,
                ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                count: 2,
                stages: vk::ShaderStageFlags::FRAGMENT,
            },
            DescriptorSetBinding::uniform_buffer(2, vk::ShaderStageFlags::FRAGMENT),
        ];

        let sizes: Vec<(vk::DescriptorType, u32)> = pool_sizes(&bindings, 3)
            .iter()
            .map(|size| (size.ty, size.descriptor_count))
            .collect();

        assert_eq!(
            sizes,
            vec![
                (vk::DescriptorType::UNIFORM_BUFFER, 6),
                (vk::DescriptorType::COMBINED_IMAGE_SAMPLER, 6),
            ]
        );
    }

    #[test]
    fn uniform_binding_converts_to_a_layout_binding() {
        let binding: vk::DescriptorSetLayoutBinding =
            DescriptorSetBinding::uniform_buffer(0, vk::ShaderStageFlags::VERTEX).into();

        assert_eq!(binding.binding, 0);
        assert_eq!(binding.descriptor_type, vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(binding.descriptor_count, 1);
        assert_eq!(binding.stage_flags, vk::ShaderStageFlags::VERTEX);
    }
}
