use std::rc::Rc;

use ash::vk;
use itertools::Itertools;

use crate::commands::{fence::GfxFence, submit_info::GfxSubmitInfo};
use crate::error::{GfxResult, VkResultExt};
use crate::foundation::device::GfxDevice;

#[derive(Clone, Debug)]
pub struct GfxQueueFamily {
    pub name: String,
    pub queue_family_index: u32,
    pub queue_flags: vk::QueueFlags,
    pub queue_count: u32,
}

/// # destroy
///
/// queue 在 device 销毁时会被销毁
pub struct GfxCommandQueue {
    pub(crate) vk_queue: vk::Queue,
    pub(crate) queue_family: GfxQueueFamily,
    pub(crate) gfx_device: Rc<GfxDevice>,
}

// getter
impl GfxCommandQueue {
    #[inline]
    pub fn queue_family(&self) -> &GfxQueueFamily {
        &self.queue_family
    }

    #[inline]
    pub fn vk_handle(&self) -> vk::Queue {
        self.vk_queue
    }
}

// tools
impl GfxCommandQueue {
    pub fn submit(&self, batches: &[GfxSubmitInfo], fence: Option<&GfxFence>) -> GfxResult<()> {
        // batches 的存在是有必要的，submit_infos 引用的 batches 的内存
        let submit_infos = batches.iter().map(|b| b.submit_info()).collect_vec();
        unsafe {
            self.gfx_device.queue_submit2(
                self.vk_queue,
                &submit_infos,
                fence.map_or(vk::Fence::null(), |f| f.vk_handle()),
            )
        }
        .vk_op("vkQueueSubmit2")
    }

    /// 根据 specification，vkQueueWaitIdle 应该和 Fence 效率相同
    #[inline]
    pub fn wait_idle(&self) -> GfxResult<()> {
        unsafe { self.gfx_device.queue_wait_idle(self.vk_queue) }.vk_op("vkQueueWaitIdle")
    }
}
