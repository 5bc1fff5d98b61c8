use std::ffi::CStr;

use ash::vk;

use crate::error::{GfxResult, VkResultExt};

/// validation layer 消息的接收者，把消息转发到 `log`
pub struct GfxDebugMsger {
    vk_debug_utils_instance: ash::ext::debug_utils::Instance,
    vk_debug_utils_messenger: vk::DebugUtilsMessengerEXT,
}

impl GfxDebugMsger {
    pub fn new(vk_pf: &ash::Entry, instance: &ash::Instance) -> GfxResult<Self> {
        let loader = ash::ext::debug_utils::Instance::new(vk_pf, instance);

        let create_info = Self::debug_utils_messenger_ci();
        let debug_messenger = unsafe { loader.create_debug_utils_messenger(&create_info, None) }
            .vk_op("vkCreateDebugUtilsMessengerEXT")?;

        Ok(Self {
            vk_debug_utils_instance: loader,
            vk_debug_utils_messenger: debug_messenger,
        })
    }

    pub fn destroy(self) {
        log::info!("destroying debug messenger");
        unsafe {
            self.vk_debug_utils_instance.destroy_debug_utils_messenger(self.vk_debug_utils_messenger, None);
        }
    }
}

/// debug messenger 的回调函数
/// # Safety
unsafe extern "system" fn vk_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() {
        return vk::FALSE;
    }
    let callback_data = unsafe { *p_callback_data };

    let msg = if callback_data.p_message.is_null() {
        std::borrow::Cow::from("")
    } else {
        unsafe { CStr::from_ptr(callback_data.p_message).to_string_lossy() }
    };

    let format_msg = format!("[{:?}]\n{}\n", message_type, pretty_message(&msg));

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => log::error!("{}", format_msg),
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => log::warn!("{}", format_msg),
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => log::debug!("{}", format_msg),
        _ => log::trace!("{}", format_msg),
    };

    // 只有 layer developer 才需要返回 True
    vk::FALSE
}

/// 部分 layer 会以 json 输出消息，其中 MainMessage 字段带有换行符，需要单独输出
fn pretty_message(msg: &str) -> String {
    let Ok(serde_json::Value::Object(mut obj)) = serde_json::from_str::<serde_json::Value>(msg) else {
        return msg.to_string();
    };
    let main_msg = obj.remove("MainMessage").and_then(|v| v.as_str().map(str::to_string)).unwrap_or_default();
    let rest = serde_json::to_string_pretty(&obj).unwrap_or_default();
    format!("{}\n{}", rest, main_msg)
}

// 构造过程辅助函数
impl GfxDebugMsger {
    /// 用于创建 debug messenger 的结构体
    ///
    /// 也会被挂到 instance create info 上，用于捕获 instance 创建过程中的消息
    pub fn debug_utils_messenger_ci() -> vk::DebugUtilsMessengerCreateInfoEXT<'static> {
        vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(vk_debug_callback))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pretty_message_plain_text() {
        assert_eq!(pretty_message("Validation Error: foo"), "Validation Error: foo");
    }

    #[test]
    fn test_pretty_message_json_main_message_last() {
        let msg = r#"{"MainMessage":"line1\nline2","VUID":"VUID-x"}"#;
        let pretty = pretty_message(msg);
        assert!(pretty.contains("VUID-x"));
        assert!(pretty.ends_with("line1\nline2"));
        assert!(!pretty.contains("MainMessage"));
    }
}
