use ash::vk;
use vk_mem::Allocation;

use crate::resources::image_state::ImageState;

// --- Buffer Resource ---

/// Buffer 资源结构体
///
/// 所有 buffer 都是 host visible 的 staging buffer，创建后一直保持映射
pub struct BufferResource {
    /// Vulkan Buffer 句柄
    pub buffer: vk::Buffer,
    /// VMA 内存分配信息
    pub allocation: Allocation,

    /// Buffer 大小（字节）
    pub size: vk::DeviceSize,

    /// 映射的主机内存指针
    pub mapped_ptr: *mut u8,

    pub debug_name: String,
}

// --- Image Resource ---

/// Image 创建时的参数快照，创建之后不再改变
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageCreateDesc {
    pub image_type: vk::ImageType,
    pub format: vk::Format,
    pub extent: vk::Extent3D,
    pub mip_levels: u32,
    pub array_layers: u32,
    pub usage: vk::ImageUsageFlags,
    pub flags: vk::ImageCreateFlags,
}

impl ImageCreateDesc {
    /// 创建时是否声明了 `usage` 中的全部用途
    #[inline]
    pub fn supports(&self, usage: vk::ImageUsageFlags) -> bool {
        self.usage.contains(usage)
    }

    #[inline]
    pub fn is_cube_compatible(&self) -> bool {
        self.flags.contains(vk::ImageCreateFlags::CUBE_COMPATIBLE)
    }

    /// 第 mip 级的边长
    #[inline]
    pub fn mip_extent(&self, mip: u32) -> vk::Extent2D {
        vk::Extent2D {
            width: (self.extent.width >> mip).max(1),
            height: (self.extent.height >> mip).max(1),
        }
    }
}

impl From<&vk::ImageCreateInfo<'_>> for ImageCreateDesc {
    fn from(info: &vk::ImageCreateInfo<'_>) -> Self {
        Self {
            image_type: info.image_type,
            format: info.format,
            extent: info.extent,
            mip_levels: info.mip_levels,
            array_layers: info.array_layers,
            usage: info.usage,
            flags: info.flags,
        }
    }
}

/// Image 资源结构体
///
/// image 拥有从它派生出的所有 view，销毁 image 时一并销毁
pub struct ImageResource {
    /// Vulkan Image 句柄
    pub image: vk::Image,
    /// VMA 内存分配信息
    pub allocation: Allocation,

    pub desc: ImageCreateDesc,

    /// 从该 image 派生出的 view
    pub views: Vec<vk::ImageView>,

    /// 每个 mip level 当前的状态，所有 layer 共享
    pub mip_states: Vec<ImageState>,

    pub debug_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_create_desc_from_info() {
        let info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(vk::Format::R32G32B32A32_SFLOAT)
            .extent(vk::Extent3D {
                width: 256,
                height: 256,
                depth: 1,
            })
            .mip_levels(9)
            .array_layers(6)
            .usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_SRC)
            .flags(vk::ImageCreateFlags::CUBE_COMPATIBLE);
        let desc = ImageCreateDesc::from(&info);
        assert!(desc.is_cube_compatible());
        assert_eq!(desc.mip_levels, 9);
        assert_eq!(desc.array_layers, 6);
        assert_eq!(desc.mip_extent(3).width, 32);
        assert_eq!(desc.mip_extent(8).height, 1);
        assert_eq!(desc.mip_extent(12).height, 1);
    }

    #[test]
    fn test_image_usage_support() {
        let info = vk::ImageCreateInfo::default()
            .usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_SRC);
        let desc = ImageCreateDesc::from(&info);
        assert!(desc.supports(vk::ImageUsageFlags::TRANSFER_SRC));
        assert!(desc.supports(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_SRC));
        assert!(!desc.supports(vk::ImageUsageFlags::TRANSFER_SRC | vk::ImageUsageFlags::SAMPLED));
        assert!(desc.supports(vk::ImageUsageFlags::empty()));
    }
}
