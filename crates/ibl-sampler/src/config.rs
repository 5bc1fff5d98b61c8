use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{IblError, IblResult};
use crate::format::TargetFormat;
use crate::ktx::ContainerFormat;
use crate::push_constant::Distribution;
use crate::request::{DeviceOptions, SampleRequest};

/// TOML 配置文件
///
/// 所有字段都是可选的；命令行参数以同样的结构表示，
/// 通过 [`SamplerConfig::merge`] 叠加：命令行 > 配置文件 > 默认值
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SamplerConfig {
    pub input_path: Option<PathBuf>,
    pub output_cubemap: Option<PathBuf>,
    pub output_diffuse: Option<PathBuf>,
    pub output_lut: Option<PathBuf>,

    pub distribution: Option<Distribution>,
    pub cube_map_resolution: Option<u32>,
    pub mip_level_count: Option<u32>,
    pub sample_count: Option<u32>,
    pub target_format: Option<TargetFormat>,
    pub container: Option<ContainerFormat>,
    pub lod_bias: Option<f32>,
    pub input_is_cube_map: Option<bool>,
    pub debug_output: Option<bool>,

    pub device_index: Option<usize>,
    pub descriptor_pool_factor: Option<u32>,
    pub pipeline_cache_path: Option<PathBuf>,
    pub shader_dir: Option<PathBuf>,
}

impl SamplerConfig {
    /// 从 TOML 文件加载
    pub fn from_file(path: impl AsRef<Path>) -> IblResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            log::error!("failed to read config {}: {}", path.display(), e);
            IblError::FileNotFound(path.to_path_buf())
        })?;
        Self::from_toml(&content).map_err(|e| match e {
            IblError::InvalidArgument(msg) => IblError::InvalidArgument(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    pub fn from_toml(content: &str) -> IblResult<Self> {
        toml::from_str(content).map_err(|e| IblError::InvalidArgument(format!("invalid config: {}", e)))
    }

    /// 用 `over` 中设置了的字段覆盖自身
    pub fn merge(self, over: SamplerConfig) -> SamplerConfig {
        SamplerConfig {
            input_path: over.input_path.or(self.input_path),
            output_cubemap: over.output_cubemap.or(self.output_cubemap),
            output_diffuse: over.output_diffuse.or(self.output_diffuse),
            output_lut: over.output_lut.or(self.output_lut),
            distribution: over.distribution.or(self.distribution),
            cube_map_resolution: over.cube_map_resolution.or(self.cube_map_resolution),
            mip_level_count: over.mip_level_count.or(self.mip_level_count),
            sample_count: over.sample_count.or(self.sample_count),
            target_format: over.target_format.or(self.target_format),
            container: over.container.or(self.container),
            lod_bias: over.lod_bias.or(self.lod_bias),
            input_is_cube_map: over.input_is_cube_map.or(self.input_is_cube_map),
            debug_output: over.debug_output.or(self.debug_output),
            device_index: over.device_index.or(self.device_index),
            descriptor_pool_factor: over.descriptor_pool_factor.or(self.descriptor_pool_factor),
            pipeline_cache_path: over.pipeline_cache_path.or(self.pipeline_cache_path),
            shader_dir: over.shader_dir.or(self.shader_dir),
        }
    }

    /// 未设置的字段使用默认值，默认输出文件的扩展名跟随容器版本
    pub fn into_request(self) -> SampleRequest {
        let defaults = SampleRequest::default();
        let device_defaults = DeviceOptions::default();
        let container = self.container.unwrap_or(defaults.container);
        let (default_cubemap, default_diffuse) = SampleRequest::default_outputs(container);
        SampleRequest {
            input_path: self.input_path.unwrap_or(defaults.input_path),
            output_cubemap: self.output_cubemap.unwrap_or(default_cubemap),
            output_diffuse: self.output_diffuse.or(Some(default_diffuse)),
            output_lut: self.output_lut,
            distribution: self.distribution.unwrap_or(defaults.distribution),
            cube_map_resolution: self.cube_map_resolution.unwrap_or(defaults.cube_map_resolution),
            mip_level_count: self.mip_level_count.unwrap_or(defaults.mip_level_count),
            sample_count: self.sample_count.unwrap_or(defaults.sample_count),
            target_format: self.target_format.unwrap_or(defaults.target_format),
            container,
            lod_bias: self.lod_bias.unwrap_or(defaults.lod_bias),
            input_is_cube_map: self.input_is_cube_map.unwrap_or(defaults.input_is_cube_map),
            debug_output: self.debug_output.unwrap_or(defaults.debug_output),
            device: DeviceOptions {
                device_index: self.device_index.or(device_defaults.device_index),
                descriptor_pool_factor: self.descriptor_pool_factor.unwrap_or(device_defaults.descriptor_pool_factor),
                pipeline_cache_path: self.pipeline_cache_path.unwrap_or(device_defaults.pipeline_cache_path),
            },
            shader_dir: self.shader_dir.unwrap_or(defaults.shader_dir),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
input_path = "studio.hdr"
distribution = "charlie"
cube_map_resolution = 512
mip_level_count = 6
target_format = "R32G32B32A32_SFLOAT"
lod_bias = 0.5
descriptor_pool_factor = 2
"#;

    #[test]
    fn test_parse_toml() {
        let config = SamplerConfig::from_toml(CONFIG).unwrap();
        assert_eq!(config.input_path, Some(PathBuf::from("studio.hdr")));
        assert_eq!(config.distribution, Some(Distribution::Charlie));
        assert_eq!(config.target_format, Some(TargetFormat::R32G32B32A32Sfloat));
        assert_eq!(config.sample_count, None);
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(matches!(SamplerConfig::from_toml("samples = 3"), Err(IblError::InvalidArgument(_))));
    }

    #[test]
    fn test_cli_overrides_file_overrides_defaults() {
        let file = SamplerConfig::from_toml(CONFIG).unwrap();
        let cli = SamplerConfig {
            cube_map_resolution: Some(128),
            distribution: Some(Distribution::Ggx),
            ..Default::default()
        };

        let request = file.merge(cli).into_request();
        // 命令行
        assert_eq!(request.cube_map_resolution, 128);
        assert_eq!(request.distribution, Distribution::Ggx);
        // 配置文件
        assert_eq!(request.mip_level_count, 6);
        assert_eq!(request.lod_bias, 0.5);
        assert_eq!(request.device.descriptor_pool_factor, 2);
        // 默认值
        assert_eq!(request.sample_count, 1024);
        assert_eq!(request.output_cubemap, PathBuf::from("outputSpecular.ktx2"));
        assert_eq!(request.output_diffuse, Some(PathBuf::from("outputDiffuse.ktx2")));
        assert_eq!(request.output_lut, None);
    }

    #[test]
    fn test_container_changes_default_outputs() {
        let config = SamplerConfig::from_toml("container = \"ktx1\"\noutput_diffuse = \"irradiance.ktx\"").unwrap();
        let request = config.into_request();
        assert_eq!(request.container, ContainerFormat::Ktx1);
        assert_eq!(request.output_cubemap, PathBuf::from("outputSpecular.ktx"));
        assert_eq!(request.output_diffuse, Some(PathBuf::from("irradiance.ktx")));

        assert!(matches!(SamplerConfig::from_toml("container = \"ktx3\""), Err(IblError::InvalidArgument(_))));
    }

    #[test]
    fn test_empty_config_gives_defaults() {
        let request = SamplerConfig::default().into_request();
        assert_eq!(request, SampleRequest::default());
    }

    #[test]
    fn test_missing_file() {
        let result = SamplerConfig::from_file("/nonexistent/ibl.toml");
        assert!(matches!(result, Err(IblError::FileNotFound(_))));
    }
}
