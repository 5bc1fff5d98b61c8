use bytemuck::{Pod, Zeroable};
use serde::Deserialize;

/// 重要性采样使用的分布
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distribution {
    /// 漫反射 irradiance，只输出一层
    Lambertian,
    #[default]
    #[serde(alias = "GGX")]
    Ggx,
    /// sheen
    Charlie,
}

impl Distribution {
    /// shader 中使用的编号
    #[inline]
    pub fn shader_id(self) -> u32 {
        match self {
            Self::Lambertian => 0,
            Self::Ggx => 1,
            Self::Charlie => 2,
        }
    }

    /// 输出的 mip 层数，Lambertian 固定为 1
    #[inline]
    pub fn output_mip_count(self, requested: u32) -> u32 {
        match self {
            Self::Lambertian => 1,
            Self::Ggx | Self::Charlie => requested,
        }
    }

    #[inline]
    pub fn name(self) -> &'static str {
        match self {
            Self::Lambertian => "lambertian",
            Self::Ggx => "ggx",
            Self::Charlie => "charlie",
        }
    }
}

/// 滤波 pass 的 push constant，与 `filter.frag` 中的 block 布局一致
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct FilterPushConstant {
    pub roughness: f32,
    pub sample_count: u32,
    pub mip_level: u32,
    /// mip 0 的边长
    pub width: u32,
    pub lod_bias: f32,
    pub distribution: u32,
}

impl FilterPushConstant {
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_is_24_bytes() {
        assert_eq!(std::mem::size_of::<FilterPushConstant>(), 24);
        assert_eq!(std::mem::align_of::<FilterPushConstant>(), 4);
    }

    #[test]
    fn test_field_order_in_bytes() {
        let pc = FilterPushConstant {
            roughness: 0.5,
            sample_count: 1024,
            mip_level: 3,
            width: 256,
            lod_bias: 1.0,
            distribution: Distribution::Charlie.shader_id(),
        };
        let bytes = pc.as_bytes();
        assert_eq!(&bytes[0..4], &0.5f32.to_ne_bytes());
        assert_eq!(&bytes[4..8], &1024u32.to_ne_bytes());
        assert_eq!(&bytes[8..12], &3u32.to_ne_bytes());
        assert_eq!(&bytes[12..16], &256u32.to_ne_bytes());
        assert_eq!(&bytes[20..24], &2u32.to_ne_bytes());
    }

    #[test]
    fn test_lambertian_has_single_level() {
        assert_eq!(Distribution::Lambertian.output_mip_count(8), 1);
        assert_eq!(Distribution::Ggx.output_mip_count(8), 8);
        assert_eq!(Distribution::Charlie.output_mip_count(3), 3);
    }
}
