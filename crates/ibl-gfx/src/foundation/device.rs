use std::cell::Cell;
use std::ffi::CString;
use std::ops::Deref;

use ash::vk;

use crate::error::{GfxResult, VkResultExt};

/// Vulkan 逻辑设备封装
///
/// 离线工具只需要核心 API 与 synchronization2，不开启任何 device extension。
/// debug utils 是 instance 扩展，只有 instance 开启了它，才会加载对应的函数指针
pub struct GfxDevice {
    /// 核心 Vulkan 设备 API
    pub(crate) device: ash::Device,

    /// 调试工具扩展 API
    pub(crate) debug_utils: Option<ash::ext::debug_utils::Device>,

    #[cfg(debug_assertions)]
    destroyed: Cell<bool>,
}

// 构造与销毁
impl GfxDevice {
    pub fn new(
        instance: &ash::Instance,
        pdevice: vk::PhysicalDevice,
        queue_create_info: &[vk::DeviceQueueCreateInfo],
        debug_utils_enabled: bool,
    ) -> GfxResult<Self> {
        let _span = tracy_client::span!("GfxDevice::new");

        let mut vk13_features = Self::physical_device_vk13_features();
        let mut all_features = vk::PhysicalDeviceFeatures2::default()
            .features(Self::physical_device_basic_features())
            .push_next(&mut vk13_features);

        let device_create_info =
            vk::DeviceCreateInfo::default().queue_create_infos(queue_create_info).push_next(&mut all_features);

        let device =
            unsafe { instance.create_device(pdevice, &device_create_info, None) }.vk_op("vkCreateDevice")?;

        let debug_utils = debug_utils_enabled.then(|| ash::ext::debug_utils::Device::new(instance, &device));

        Ok(Self {
            device,
            debug_utils,

            #[cfg(debug_assertions)]
            destroyed: Cell::new(false),
        })
    }

    pub fn destroy(&self) {
        log::info!("destroying device");

        #[cfg(debug_assertions)]
        self.destroyed.set(true);

        unsafe {
            self.device.destroy_device(None);
        }
    }
}

// 创建过程的辅助函数
impl GfxDevice {
    /// 必要的 physical device core features
    fn physical_device_basic_features() -> vk::PhysicalDeviceFeatures {
        // 6 个 color attachment 使用相同的 blend state，不需要 independent_blend
        vk::PhysicalDeviceFeatures::default()
    }

    /// 1.3 提升到 core 的 features
    fn physical_device_vk13_features() -> vk::PhysicalDeviceVulkan13Features<'static> {
        vk::PhysicalDeviceVulkan13Features::default().synchronization2(true)
    }
}

// getters
impl GfxDevice {
    #[inline]
    pub fn vk_handle(&self) -> vk::Device {
        self.device.handle()
    }

    #[inline]
    pub fn debug_utils(&self) -> Option<&ash::ext::debug_utils::Device> {
        self.debug_utils.as_ref()
    }
}

// tools
impl GfxDevice {
    /// 为 vulkan object 设置 debug name；未开启 debug utils 时什么也不做
    ///
    /// 设置失败只会输出警告
    pub fn set_object_debug_name<T: vk::Handle + Copy>(&self, handle: T, name: impl AsRef<str>) {
        let Some(debug_utils) = &self.debug_utils else {
            return;
        };
        let Ok(name) = CString::new(name.as_ref()) else {
            log::warn!("debug name contains nul byte: {:?}", name.as_ref());
            return;
        };
        let result = unsafe {
            debug_utils.set_debug_utils_object_name(
                &vk::DebugUtilsObjectNameInfoEXT::default().object_name(name.as_c_str()).object_handle(handle),
            )
        };
        if let Err(e) = result {
            log::warn!("failed to set debug name {:?}: {}", name, e);
        }
    }

    #[inline]
    pub fn wait_idle(&self) -> GfxResult<()> {
        unsafe { self.device.device_wait_idle() }.vk_op("vkDeviceWaitIdle")
    }
}

impl Deref for GfxDevice {
    type Target = ash::Device;
    fn deref(&self) -> &Self::Target {
        &self.device
    }
}
impl Drop for GfxDevice {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        debug_assert!(self.destroyed.get(), "GfxDevice must be destroyed before being dropped.");
    }
}
