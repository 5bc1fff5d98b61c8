use std::rc::Rc;

use ash::vk;
use itertools::Itertools;

use crate::error::{GfxResult, VkResultExt};
use crate::foundation::device::GfxDevice;

/// 所有 descriptor set 都从同一个 pool 中分配，随 pool 一起释放
pub struct GfxDescriptorPool {
    handle: vk::DescriptorPool,
    gfx_device: Rc<GfxDevice>,
}

// 创建与销毁
impl GfxDescriptorPool {
    /// 每种 descriptor type 的数量以及 max sets 都是 `8 * factor`
    pub fn new(gfx_device: Rc<GfxDevice>, factor: u32) -> GfxResult<Self> {
        let pool_sizes = Self::pool_sizes(factor);
        let pool_ci = vk::DescriptorPoolCreateInfo::default().pool_sizes(&pool_sizes).max_sets(8 * factor);

        let handle =
            unsafe { gfx_device.create_descriptor_pool(&pool_ci, None) }.vk_op("vkCreateDescriptorPool")?;
        gfx_device.set_object_debug_name(handle, "GfxDescriptorPool");
        log::debug!("descriptor pool created, factor {}", factor);

        Ok(Self { handle, gfx_device })
    }

    pub fn destroy(self) {
        unsafe {
            self.gfx_device.destroy_descriptor_pool(self.handle, None);
        }
    }
}

// getter
impl GfxDescriptorPool {
    #[inline]
    pub fn handle(&self) -> vk::DescriptorPool {
        self.handle
    }
}

// tools
impl GfxDescriptorPool {
    pub fn allocate(&self, layout: vk::DescriptorSetLayout, debug_name: &str) -> GfxResult<vk::DescriptorSet> {
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.handle)
            .set_layouts(std::slice::from_ref(&layout));
        let sets =
            unsafe { self.gfx_device.allocate_descriptor_sets(&alloc_info) }.vk_op("vkAllocateDescriptorSets")?;
        let set = sets[0];
        self.gfx_device.set_object_debug_name(set, format!("DescriptorSet::{}", debug_name));
        Ok(set)
    }

    fn pool_sizes(factor: u32) -> Vec<vk::DescriptorPoolSize> {
        [
            vk::DescriptorType::SAMPLER,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            vk::DescriptorType::SAMPLED_IMAGE,
            vk::DescriptorType::STORAGE_IMAGE,
            vk::DescriptorType::UNIFORM_TEXEL_BUFFER,
            vk::DescriptorType::STORAGE_TEXEL_BUFFER,
            vk::DescriptorType::UNIFORM_BUFFER,
            vk::DescriptorType::STORAGE_BUFFER,
            vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
            vk::DescriptorType::STORAGE_BUFFER_DYNAMIC,
        ]
        .into_iter()
        .map(|ty| vk::DescriptorPoolSize {
            ty,
            descriptor_count: 8 * factor,
        })
        .collect_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_sizes_scale_with_factor() {
        let sizes = GfxDescriptorPool::pool_sizes(3);
        assert_eq!(sizes.len(), 10);
        assert!(sizes.iter().all(|s| s.descriptor_count == 24));
        assert!(sizes.iter().any(|s| s.ty == vk::DescriptorType::COMBINED_IMAGE_SAMPLER));
        assert!(sizes.iter().any(|s| s.ty == vk::DescriptorType::STORAGE_BUFFER_DYNAMIC));
    }
}
