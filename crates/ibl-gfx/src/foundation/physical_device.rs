use ash::vk;
use itertools::Itertools;

use crate::commands::command_queue::GfxQueueFamily;
use crate::error::{GfxError, GfxResult, VkResultExt};

/// 表示一张物理显卡
pub struct GfxPhysicalDevice {
    pub(crate) vk_handle: vk::PhysicalDevice,

    pub(crate) mem_props: vk::PhysicalDeviceMemoryProperties,

    /// 同时支持 graphics 与 transfer 的 queue family
    pub(crate) gfx_queue_family: GfxQueueFamily,
}

impl GfxPhysicalDevice {
    /// 选择物理显卡
    ///
    /// # param
    /// * index - 指定显卡的序号；为 None 时优先选择独立显卡，否则选择第一个
    pub fn select(instance: &ash::Instance, index: Option<usize>) -> GfxResult<Self> {
        let _span = tracy_client::span!("GfxPhysicalDevice::select");

        let pdevices = unsafe { instance.enumerate_physical_devices() }.vk_op("vkEnumeratePhysicalDevices")?;
        if pdevices.is_empty() {
            return Err(GfxError::NoSuitableDevice("no vulkan capable gpu found".to_string()));
        }

        let pdevice = match index {
            Some(index) => *pdevices.get(index).ok_or_else(|| {
                GfxError::NoSuitableDevice(format!("device index {} out of range ({} devices)", index, pdevices.len()))
            })?,
            // 优先使用独立显卡
            None => *pdevices
                .iter()
                .find_or_first(|pdevice| {
                    let props = unsafe { instance.get_physical_device_properties(**pdevice) };
                    props.device_type == vk::PhysicalDeviceType::DISCRETE_GPU
                })
                .ok_or_else(|| GfxError::NoSuitableDevice("no vulkan capable gpu found".to_string()))?,
        };

        Self::new(pdevice, instance)
    }

    fn new(pdevice: vk::PhysicalDevice, instance: &ash::Instance) -> GfxResult<Self> {
        let basic_props = unsafe { instance.get_physical_device_properties(pdevice) };
        let device_name = basic_props.device_name_as_c_str().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        log::info!(
            "selected gpu: {} ({:?}), api {}.{}.{}",
            device_name,
            basic_props.device_type,
            vk::api_version_major(basic_props.api_version),
            vk::api_version_minor(basic_props.api_version),
            vk::api_version_patch(basic_props.api_version),
        );

        // synchronization2 需要 1.3
        if basic_props.api_version < vk::API_VERSION_1_3 {
            return Err(GfxError::NoSuitableDevice(format!("{} does not support vulkan 1.3", device_name)));
        }

        let queue_family_props = unsafe { instance.get_physical_device_queue_family_properties(pdevice) };
        log::debug!("physical device: queue family props:\n{:#?}", queue_family_props);

        let gfx_queue_family = Self::find_queue_family(&queue_family_props).ok_or(GfxError::NoSuitableQueue)?;

        Ok(Self {
            vk_handle: pdevice,
            mem_props: unsafe { instance.get_physical_device_memory_properties(pdevice) },
            gfx_queue_family,
        })
    }

    /// 找到第一个同时支持 graphics 与 transfer 的 queue family
    fn find_queue_family(props: &[vk::QueueFamilyProperties]) -> Option<GfxQueueFamily> {
        let required = vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER;
        props.iter().enumerate().find(|(_, props)| props.queue_flags.contains(required)).map(|(family_idx, props)| {
            GfxQueueFamily {
                name: "gfx".to_string(),
                queue_family_index: family_idx as u32,
                queue_flags: props.queue_flags,
                queue_count: props.queue_count,
            }
        })
    }
}

// getter
impl GfxPhysicalDevice {
    #[inline]
    pub fn vk_handle(&self) -> vk::PhysicalDevice {
        self.vk_handle
    }

    #[inline]
    pub fn gfx_queue_family(&self) -> &GfxQueueFamily {
        &self.gfx_queue_family
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_queue_family_requires_graphics_and_transfer() {
        let props = [
            vk::QueueFamilyProperties::default().queue_flags(vk::QueueFlags::TRANSFER).queue_count(2),
            vk::QueueFamilyProperties::default().queue_flags(vk::QueueFlags::COMPUTE).queue_count(4),
            vk::QueueFamilyProperties::default()
                .queue_flags(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER)
                .queue_count(16),
        ];
        let family = GfxPhysicalDevice::find_queue_family(&props).unwrap();
        assert_eq!(family.queue_family_index, 2);
        assert_eq!(family.queue_count, 16);
    }

    #[test]
    fn test_find_queue_family_none() {
        let props = [vk::QueueFamilyProperties::default().queue_flags(vk::QueueFlags::GRAPHICS)];
        assert!(GfxPhysicalDevice::find_queue_family(&props).is_none());
    }
}
