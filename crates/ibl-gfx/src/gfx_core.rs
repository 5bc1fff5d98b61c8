use std::rc::Rc;

use ash::vk;
use scopeguard::ScopeGuard;

use crate::commands::{
    command_buffer::GfxCommandBuffer, command_queue::GfxCommandQueue, fence::GfxFence, submit_info::GfxSubmitInfo,
};
use crate::error::GfxResult;
use crate::foundation::{
    debug_messenger::GfxDebugMsger, device::GfxDevice, instance::GfxInstance, physical_device::GfxPhysicalDevice,
};
use crate::gfx::rollback_on_error;

/// instance、physical device、device 以及唯一的 queue
pub struct GfxCore {
    /// vk 基础函数的接口
    ///
    /// 在 drop 之后，会卸载 dll，因此需要确保该字段最后 drop
    pub(crate) vk_entry: ash::Entry,

    pub(crate) instance: GfxInstance,
    pub(crate) physical_device: GfxPhysicalDevice,

    /// 多个组件需要共享相同的设备函数指针（queue、command pool、command buffer 等）
    pub(crate) gfx_device: Rc<GfxDevice>,

    /// 只有开启了 debug utils 才会创建
    pub(crate) debug_msger: Option<GfxDebugMsger>,

    pub(crate) gfx_queue: GfxCommandQueue,
}

// 创建与销毁
impl GfxCore {
    pub fn new(app_name: &str, engine_name: &str, debug: bool, device_index: Option<usize>) -> GfxResult<Self> {
        let _span = tracy_client::span!("GfxCore::new");

        let vk_entry = unsafe { ash::Entry::load() }?;
        let instance = rollback_on_error(GfxInstance::new(&vk_entry, app_name, engine_name, debug)?, GfxInstance::destroy);

        let debug_msger = if instance.debug_utils_enabled() {
            Some(rollback_on_error(GfxDebugMsger::new(&vk_entry, instance.ash_instance())?, GfxDebugMsger::destroy))
        } else {
            None
        };

        let physical_device = GfxPhysicalDevice::select(instance.ash_instance(), device_index)?;

        // 离线流程只需要一个同时支持 graphics 与 transfer 的 queue
        let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
            .queue_family_index(physical_device.gfx_queue_family.queue_family_index)
            .queue_priorities(&[1.0])];

        let gfx_device = Rc::new(GfxDevice::new(
            instance.ash_instance(),
            physical_device.vk_handle,
            &queue_create_infos,
            instance.debug_utils_enabled(),
        )?);
        let gfx_queue = GfxCommandQueue {
            vk_queue: unsafe { gfx_device.get_device_queue(physical_device.gfx_queue_family.queue_family_index, 0) },
            queue_family: physical_device.gfx_queue_family.clone(),
            gfx_device: gfx_device.clone(),
        };

        log::debug!("gfx queue's queue family:\n{:#?}", gfx_queue.queue_family);

        // 在 device 之前创建的 vk::Handle
        {
            gfx_device.set_object_debug_name(instance.vk_instance(), "GfxInstance");
            gfx_device.set_object_debug_name(physical_device.vk_handle, "GfxPhysicalDevice");

            gfx_device.set_object_debug_name(gfx_device.vk_handle(), "GfxDevice");
            gfx_device.set_object_debug_name(gfx_queue.vk_queue, "GfxCommandQueue-gfx");
        }

        Ok(Self {
            vk_entry,
            instance: ScopeGuard::into_inner(instance),
            physical_device,
            gfx_device,
            debug_msger: debug_msger.map(ScopeGuard::into_inner),
            gfx_queue,
        })
    }

    /// 其他持有 device 的对象需要在此之前销毁
    pub fn destroy(self) {
        let Self {
            vk_entry,
            instance,
            physical_device: _,
            gfx_device,
            debug_msger,
            gfx_queue,
        } = self;

        drop(gfx_queue);
        gfx_device.destroy();
        drop(gfx_device);
        if let Some(debug_msger) = debug_msger {
            debug_msger.destroy();
        }
        instance.destroy();
        drop(vk_entry);
    }
}

// getter
impl GfxCore {
    #[inline]
    pub fn gfx_device(&self) -> &Rc<GfxDevice> {
        &self.gfx_device
    }

    #[inline]
    pub fn physical_device(&self) -> &GfxPhysicalDevice {
        &self.physical_device
    }

    #[inline]
    pub fn gfx_queue(&self) -> &GfxCommandQueue {
        &self.gfx_queue
    }
}

// tools
impl GfxCore {
    /// 提交 command buffer 并阻塞等待执行完成
    ///
    /// fence 无论等待是否成功都会被销毁
    pub fn execute(&self, cmd: &GfxCommandBuffer) -> GfxResult<()> {
        let _span = tracy_client::span!("GfxCore::execute");
        let fence = GfxFence::new(&self.gfx_device, false, "execute")?;

        let result = self
            .gfx_queue
            .submit(&[GfxSubmitInfo::new(&[cmd])], Some(&fence))
            .and_then(|()| fence.wait(&self.gfx_device));

        fence.destroy(&self.gfx_device);
        result
    }
}
