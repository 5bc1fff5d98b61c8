use ash::vk;

use crate::error::{GfxResult, VkResultExt};
use crate::foundation::device::GfxDevice;

/// # Destroy
/// 需要手动 destroy
pub struct GfxFence {
    fence: vk::Fence,
}

// 创建与销毁
impl GfxFence {
    /// # param
    /// * signaled - 是否创建时就 signaled
    pub fn new(gfx_device: &GfxDevice, signaled: bool, debug_name: &str) -> GfxResult<Self> {
        let fence_flags = if signaled { vk::FenceCreateFlags::SIGNALED } else { vk::FenceCreateFlags::empty() };
        let fence = unsafe { gfx_device.create_fence(&vk::FenceCreateInfo::default().flags(fence_flags), None) }
            .vk_op("vkCreateFence")?;

        gfx_device.set_object_debug_name(fence, format!("GfxFence::{}", debug_name));
        Ok(Self { fence })
    }

    #[inline]
    pub fn destroy(self, gfx_device: &GfxDevice) {
        unsafe {
            gfx_device.destroy_fence(self.fence, None);
        }
    }
}

// getters
impl GfxFence {
    #[inline]
    pub fn vk_handle(&self) -> vk::Fence {
        self.fence
    }
}

// tools
impl GfxFence {
    /// 阻塞等待 fence，不设超时
    #[inline]
    pub fn wait(&self, gfx_device: &GfxDevice) -> GfxResult<()> {
        unsafe { gfx_device.wait_for_fences(std::slice::from_ref(&self.fence), true, u64::MAX) }
            .vk_op("vkWaitForFences")
    }
}
