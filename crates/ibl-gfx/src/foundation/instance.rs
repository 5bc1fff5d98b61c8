use std::ffi::{CStr, CString, c_char};

use ash::vk;
use itertools::Itertools;

use crate::error::{GfxError, GfxResult, VkResultExt};
use crate::foundation::debug_messenger::GfxDebugMsger;

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

pub struct GfxInstance {
    /// 仅仅是函数指针，以及一个裸的 handle
    ///
    /// 生命周期由 [`crate::gfx_core::GfxCore`] 手动控制
    pub(crate) ash_instance: ash::Instance,

    /// 是否开启了 debug utils 扩展（debug messenger 与 object name 依赖它）
    pub(crate) debug_utils_enabled: bool,
}

impl GfxInstance {
    /// 设置所需的 layers 和 extensions，创建 vk instance
    ///
    /// # param
    /// * debug - 开启 validation layer 以及 debug utils；不可用时仅输出警告
    pub fn new(vk_entry: &ash::Entry, app_name: &str, engine_name: &str, debug: bool) -> GfxResult<Self> {
        let app_name = CString::new(app_name).map_err(|e| GfxError::InvalidArgument(e.to_string()))?;
        let engine_name = CString::new(engine_name).map_err(|e| GfxError::InvalidArgument(e.to_string()))?;
        let app_info = vk::ApplicationInfo::default()
            .api_version(vk::API_VERSION_1_3) // 需要 synchronization2
            .application_name(app_name.as_ref())
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(engine_name.as_ref())
            .engine_version(vk::make_api_version(0, 1, 0, 0));

        let enabled_extensions = Self::get_extensions(vk_entry, debug)?;
        let debug_utils_enabled = enabled_extensions.contains(&vk::EXT_DEBUG_UTILS_NAME);
        log::info!("instance extensions: {}", Self::join_names(&enabled_extensions));

        let enabled_layers = Self::get_layers(vk_entry, debug)?;
        log::info!("instance layers: {}", Self::join_names(&enabled_layers));

        let ext_ptrs = enabled_extensions.iter().map(|ext| ext.as_ptr()).collect_vec();
        let layer_ptrs: Vec<*const c_char> = enabled_layers.iter().map(|layer| layer.as_ptr()).collect_vec();

        let mut instance_ci = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&ext_ptrs)
            .enabled_layer_names(&layer_ptrs);

        // 让 instance 创建与销毁过程中的消息也能被捕获
        let mut debug_utils_messenger_ci = GfxDebugMsger::debug_utils_messenger_ci();
        if debug_utils_enabled {
            instance_ci = instance_ci.push_next(&mut debug_utils_messenger_ci);
        }

        let handle = unsafe { vk_entry.create_instance(&instance_ci, None) }.vk_op("vkCreateInstance")?;

        Ok(Self {
            ash_instance: handle,
            debug_utils_enabled,
        })
    }

    pub fn destroy(self) {
        log::info!("destroying instance");
        unsafe {
            self.ash_instance.destroy_instance(None);
        }
    }
}

/// getter
impl GfxInstance {
    #[inline]
    pub fn ash_instance(&self) -> &ash::Instance {
        &self.ash_instance
    }

    #[inline]
    pub fn vk_instance(&self) -> vk::Instance {
        self.ash_instance.handle()
    }

    #[inline]
    pub fn debug_utils_enabled(&self) -> bool {
        self.debug_utils_enabled
    }
}

/// 构造过程
impl GfxInstance {
    fn join_names(names: &[&CStr]) -> String {
        names.iter().map(|name| format!("\n\t{:?}", name)).join("")
    }

    /// instance 所需的，且受支持的 extension
    ///
    /// 离线工具不需要任何 surface 扩展；debug utils 只在 debug 模式下开启
    fn get_extensions(vk_entry: &ash::Entry, debug: bool) -> GfxResult<Vec<&'static CStr>> {
        let all_ext_props =
            unsafe { vk_entry.enumerate_instance_extension_properties(None) }.vk_op("enumerate_instance_extensions")?;
        let is_supported = |ext: &CStr| {
            all_ext_props.iter().any(|props| props.extension_name_as_c_str().is_ok_and(|name| name == ext))
        };

        let mut enabled_extensions = Vec::new();
        if debug {
            // 这个 extension 可以单独使用，提供以下功能：
            // 1. debug messenger
            // 2. 为 vulkan object 设置 debug name
            // 3. 使用 label 标记 command buffer 中的一个一个 section
            if is_supported(vk::EXT_DEBUG_UTILS_NAME) {
                enabled_extensions.push(vk::EXT_DEBUG_UTILS_NAME);
            } else {
                log::warn!("{:?} is not available, debug messages are disabled", vk::EXT_DEBUG_UTILS_NAME);
            }
        }

        Ok(enabled_extensions)
    }

    /// instance 所需的所有 layers
    fn get_layers(vk_entry: &ash::Entry, debug: bool) -> GfxResult<Vec<&'static CStr>> {
        if !debug {
            return Ok(Vec::new());
        }

        let all_layer_props =
            unsafe { vk_entry.enumerate_instance_layer_properties() }.vk_op("enumerate_instance_layers")?;
        let is_layer_supported = all_layer_props
            .iter()
            .any(|props| props.layer_name_as_c_str().is_ok_and(|name| name == VALIDATION_LAYER));

        if is_layer_supported {
            Ok(vec![VALIDATION_LAYER])
        } else {
            log::warn!("{:?} is not installed, continuing without validation", VALIDATION_LAYER);
            Ok(Vec::new())
        }
    }
}
