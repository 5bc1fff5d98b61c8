use ash::vk;
use serde::Deserialize;

/// 中间计算使用的格式，所有滤波都在 32 位浮点上完成
pub const WORKING_FORMAT: vk::Format = vk::Format::R32G32B32A32_SFLOAT;

/// 输出贴图支持的格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum TargetFormat {
    #[serde(rename = "R8G8B8A8_UNORM")]
    R8G8B8A8Unorm,
    #[serde(rename = "R16G16B16A16_SFLOAT")]
    R16G16B16A16Sfloat,
    #[serde(rename = "R32G32B32A32_SFLOAT")]
    R32G32B32A32Sfloat,
}

impl TargetFormat {
    #[inline]
    pub fn vk_format(self) -> vk::Format {
        match self {
            Self::R8G8B8A8Unorm => vk::Format::R8G8B8A8_UNORM,
            Self::R16G16B16A16Sfloat => vk::Format::R16G16B16A16_SFLOAT,
            Self::R32G32B32A32Sfloat => vk::Format::R32G32B32A32_SFLOAT,
        }
    }

    pub fn from_vk_format(format: vk::Format) -> Option<Self> {
        match format {
            vk::Format::R8G8B8A8_UNORM => Some(Self::R8G8B8A8Unorm),
            vk::Format::R16G16B16A16_SFLOAT => Some(Self::R16G16B16A16Sfloat),
            vk::Format::R32G32B32A32_SFLOAT => Some(Self::R32G32B32A32Sfloat),
            _ => None,
        }
    }
}

/// 格式相关的常量表
pub struct FormatInfo;

impl FormatInfo {
    #[inline]
    pub fn is_supported(format: vk::Format) -> bool {
        TargetFormat::from_vk_format(format).is_some()
    }

    /// 单个像素的字节数，不支持的格式返回 0
    pub fn pixel_size(format: vk::Format) -> u32 {
        match format {
            vk::Format::R8G8B8A8_UNORM => 4,
            vk::Format::R16G16B16A16_SFLOAT => 8,
            vk::Format::R32G32B32A32_SFLOAT => 16,
            _ => 0,
        }
    }

    /// 单个通道的字节数，对应 KTX2 header 中的 typeSize
    pub fn type_size(format: vk::Format) -> u32 {
        match format {
            vk::Format::R8G8B8A8_UNORM => 1,
            vk::Format::R16G16B16A16_SFLOAT => 2,
            vk::Format::R32G32B32A32_SFLOAT => 4,
            _ => 0,
        }
    }

    #[inline]
    pub fn is_float(format: vk::Format) -> bool {
        matches!(format, vk::Format::R16G16B16A16_SFLOAT | vk::Format::R32G32B32A32_SFLOAT)
    }
}
