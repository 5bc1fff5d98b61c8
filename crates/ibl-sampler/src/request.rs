use std::path::PathBuf;

use ibl_crate_tools::resource::IblPath;
use ibl_gfx::gfx::GfxCreateInfo;

use crate::error::{IblError, IblResult};
use crate::format::TargetFormat;
use crate::ktx::ContainerFormat;
use crate::mip::validate_mip_levels;
use crate::push_constant::Distribution;

/// 设备相关的选项
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceOptions {
    /// 为 None 时优先选择独立显卡
    pub device_index: Option<usize>,
    pub descriptor_pool_factor: u32,
    pub pipeline_cache_path: PathBuf,
}

impl Default for DeviceOptions {
    fn default() -> Self {
        Self {
            device_index: None,
            descriptor_pool_factor: 1,
            pipeline_cache_path: PathBuf::from("pipeline.cache"),
        }
    }
}

/// 一次采样的全部参数
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRequest {
    /// 全景图，或者 `input_is_cube_map` 时的 KTX1/KTX2 cubemap
    pub input_path: PathBuf,
    /// `distribution` 对应的滤波结果
    pub output_cubemap: PathBuf,
    /// 额外输出的 Lambertian 结果
    pub output_diffuse: Option<PathBuf>,
    /// BRDF LUT，为 None 时不生成
    pub output_lut: Option<PathBuf>,

    pub distribution: Distribution,
    pub cube_map_resolution: u32,
    pub mip_level_count: u32,
    pub sample_count: u32,
    pub target_format: TargetFormat,
    /// cubemap 输出使用的容器版本
    pub container: ContainerFormat,
    pub lod_bias: f32,
    pub input_is_cube_map: bool,
    /// 开启 validation layer
    pub debug_output: bool,

    pub device: DeviceOptions,
    /// `primitive.vert` 与 `filter.frag` 所在的目录
    pub shader_dir: PathBuf,
}

impl Default for SampleRequest {
    fn default() -> Self {
        let container = ContainerFormat::default();
        let (output_cubemap, output_diffuse) = Self::default_outputs(container);
        Self {
            input_path: PathBuf::from("panorama.hdr"),
            output_cubemap,
            output_diffuse: Some(output_diffuse),
            output_lut: None,
            distribution: Distribution::Ggx,
            cube_map_resolution: 1024,
            mip_level_count: 10,
            sample_count: 1024,
            target_format: TargetFormat::R16G16B16A16Sfloat,
            container,
            lod_bias: 1.0,
            input_is_cube_map: false,
            debug_output: false,
            device: DeviceOptions::default(),
            shader_dir: IblPath::shader_root_path(),
        }
    }
}

impl SampleRequest {
    /// 未指定输出路径时使用的 specular 与 diffuse 文件名，扩展名随容器版本变化
    pub fn default_outputs(container: ContainerFormat) -> (PathBuf, PathBuf) {
        let ext = container.extension();
        (
            PathBuf::from(format!("outputSpecular.{}", ext)),
            PathBuf::from(format!("outputDiffuse.{}", ext)),
        )
    }

    /// 不依赖设备的检查，在初始化 vulkan 之前完成
    pub fn validate(&self) -> IblResult<()> {
        if self.sample_count == 0 {
            return Err(IblError::InvalidArgument("sample count must be greater than 0".to_string()));
        }
        if !self.lod_bias.is_finite() {
            return Err(IblError::InvalidArgument(format!("lod bias {} is not finite", self.lod_bias)));
        }
        validate_mip_levels(self.cube_map_resolution, self.output_mip_count())
    }

    /// 主输出的 mip 层数
    #[inline]
    pub fn output_mip_count(&self) -> u32 {
        self.distribution.output_mip_count(self.mip_level_count)
    }

    /// 是否需要额外的 Lambertian pass
    #[inline]
    pub fn needs_diffuse_pass(&self) -> bool {
        self.output_diffuse.is_some() && self.distribution != Distribution::Lambertian
    }

    pub fn gfx_create_info(&self) -> GfxCreateInfo {
        GfxCreateInfo {
            debug: self.debug_output,
            device_index: self.device.device_index,
            descriptor_pool_factor: self.device.descriptor_pool_factor,
            pipeline_cache_path: self.device.pipeline_cache_path.clone(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let request = SampleRequest::default();
        assert!(request.validate().is_ok());
        assert_eq!(request.output_mip_count(), 10);
        assert!(request.needs_diffuse_pass());
        assert_eq!(request.container, ContainerFormat::Ktx2);
        assert_eq!(request.output_cubemap, PathBuf::from("outputSpecular.ktx2"));
    }

    #[test]
    fn test_default_outputs_follow_container() {
        let (specular, diffuse) = SampleRequest::default_outputs(ContainerFormat::Ktx1);
        assert_eq!(specular, PathBuf::from("outputSpecular.ktx"));
        assert_eq!(diffuse, PathBuf::from("outputDiffuse.ktx"));
    }

    #[test]
    fn test_mip_boundary_at_256() {
        let mut request = SampleRequest {
            cube_map_resolution: 256,
            mip_level_count: 9,
            ..Default::default()
        };
        assert!(request.validate().is_ok());

        request.mip_level_count = 10;
        assert!(matches!(request.validate(), Err(IblError::InvalidArgument(_))));
    }

    #[test]
    fn test_lambertian_ignores_requested_mips() {
        let request = SampleRequest {
            distribution: Distribution::Lambertian,
            cube_map_resolution: 256,
            mip_level_count: 10,
            ..Default::default()
        };
        assert_eq!(request.output_mip_count(), 1);
        assert!(request.validate().is_ok());
        assert!(!request.needs_diffuse_pass());
    }

    #[test]
    fn test_zero_samples_rejected() {
        let request = SampleRequest {
            sample_count: 0,
            ..Default::default()
        };
        assert!(matches!(request.validate(), Err(IblError::InvalidArgument(_))));
    }

    #[test]
    fn test_gfx_create_info_carries_device_options() {
        let request = SampleRequest {
            debug_output: true,
            device: DeviceOptions {
                device_index: Some(1),
                descriptor_pool_factor: 4,
                pipeline_cache_path: PathBuf::from("cache.bin"),
            },
            ..Default::default()
        };
        let ci = request.gfx_create_info();
        assert!(ci.debug);
        assert_eq!(ci.device_index, Some(1));
        assert_eq!(ci.descriptor_pool_factor, 4);
        assert_eq!(ci.pipeline_cache_path, PathBuf::from("cache.bin"));
    }
}
