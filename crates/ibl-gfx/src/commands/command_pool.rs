use std::cell::Cell;
use std::rc::Rc;

use ash::vk;

use crate::commands::{command_buffer::GfxCommandBuffer, command_queue::GfxQueueFamily};
use crate::error::{GfxResult, VkResultExt};
use crate::foundation::device::GfxDevice;

/// command pool 是和 queue family 绑定的，而不是和 queue 绑定的
pub struct GfxCommandPool {
    handle: vk::CommandPool,
    gfx_device: Rc<GfxDevice>,

    debug_name: String,
    #[cfg(debug_assertions)]
    destroyed: Cell<bool>,
}

// init & destory
impl GfxCommandPool {
    pub fn new(
        gfx_device: Rc<GfxDevice>,
        queue_family: &GfxQueueFamily,
        flags: vk::CommandPoolCreateFlags,
        debug_name: &str,
    ) -> GfxResult<Self> {
        let pool = unsafe {
            gfx_device.create_command_pool(
                &vk::CommandPoolCreateInfo::default()
                    .queue_family_index(queue_family.queue_family_index)
                    .flags(flags),
                None,
            )
        }
        .vk_op("vkCreateCommandPool")?;
        gfx_device.set_object_debug_name(pool, format!("GfxCommandPool::{}", debug_name));

        Ok(Self {
            handle: pool,
            gfx_device,
            debug_name: debug_name.to_string(),
            #[cfg(debug_assertions)]
            destroyed: Cell::new(false),
        })
    }

    pub fn destroy(self) {
        log::info!("destroying command pool: {}", self.debug_name);
        unsafe {
            self.gfx_device.destroy_command_pool(self.handle, None);
        }
        #[cfg(debug_assertions)]
        self.destroyed.set(true);
    }
}

// getters
impl GfxCommandPool {
    #[inline]
    pub fn handle(&self) -> vk::CommandPool {
        self.handle
    }
}

// tools
impl GfxCommandPool {
    /// 分配一个 primary command buffer
    pub fn alloc_command_buffer(&self, debug_name: &str) -> GfxResult<GfxCommandBuffer> {
        GfxCommandBuffer::new(self.gfx_device.clone(), self.handle, debug_name)
    }

    /// 释放 command buffer
    ///
    /// 释放之后，command buffer 不能再被使用
    pub fn free_command_buffer(&self, command_buffer: GfxCommandBuffer) {
        unsafe {
            self.gfx_device.free_command_buffers(self.handle, std::slice::from_ref(&command_buffer.vk_handle()));
        }
    }
}

impl Drop for GfxCommandPool {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        debug_assert!(self.destroyed.get(), "GfxCommandPool must be destroyed manually.");
    }
}
