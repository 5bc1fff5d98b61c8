//! IBL Sampler 命令行工具
//!
//! ```bash
//! ibl-sampler --input-path panorama.hdr --distribution ggx --mip-level-count 8 --cube-map-resolution 256
//! ```
//!
//! 参数优先级：命令行 > `--config` 指定的 TOML 文件 > 默认值

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use ibl_crate_tools::init_log::init_log;
use ibl_sampler::{ContainerFormat, Distribution, GlslcCompiler, SamplerConfig, TargetFormat};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    R8g8b8a8Unorm,
    R16g16b16a16Sfloat,
    R32g32b32a32Sfloat,
}

impl From<FormatArg> for TargetFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::R8g8b8a8Unorm => TargetFormat::R8G8B8A8Unorm,
            FormatArg::R16g16b16a16Sfloat => TargetFormat::R16G16B16A16Sfloat,
            FormatArg::R32g32b32a32Sfloat => TargetFormat::R32G32B32A32Sfloat,
        }
    }
}

/// 输出容器的版本，`1` / `2` 与 `ktx1` / `ktx2` 等价
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ContainerArg {
    #[value(name = "ktx1", alias = "1")]
    Ktx1,
    #[value(name = "ktx2", alias = "2")]
    Ktx2,
}

impl From<ContainerArg> for ContainerFormat {
    fn from(arg: ContainerArg) -> Self {
        match arg {
            ContainerArg::Ktx1 => ContainerFormat::Ktx1,
            ContainerArg::Ktx2 => ContainerFormat::Ktx2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DistributionArg {
    Lambertian,
    Ggx,
    Charlie,
}

impl From<DistributionArg> for Distribution {
    fn from(arg: DistributionArg) -> Self {
        match arg {
            DistributionArg::Lambertian => Distribution::Lambertian,
            DistributionArg::Ggx => Distribution::Ggx,
            DistributionArg::Charlie => Distribution::Charlie,
        }
    }
}

/// 把 HDR 全景图或 cubemap 预滤波为 IBL 贴图
#[derive(Debug, Parser)]
#[command(name = "ibl-sampler", version, about)]
struct Args {
    /// 全景图，或者设置了 --input-is-cube-map 时的 KTX1/KTX2 cubemap
    #[arg(long, alias = "inputPath")]
    input_path: Option<PathBuf>,

    /// distribution 对应的滤波结果
    #[arg(long, alias = "specularOutput")]
    output_cubemap: Option<PathBuf>,

    /// Lambertian 滤波结果
    #[arg(long, alias = "diffuseOutput")]
    output_diffuse: Option<PathBuf>,

    /// 不输出 Lambertian 滤波结果
    #[arg(long, conflicts_with = "output_diffuse")]
    no_diffuse: bool,

    /// BRDF LUT，扩展名为 .png / .hdr 时保存为图片，否则按 --container 保存
    #[arg(long, alias = "lutOutput")]
    output_lut: Option<PathBuf>,

    #[arg(long, value_enum)]
    distribution: Option<DistributionArg>,

    /// 每个像素的采样数 [default: 1024]
    #[arg(long, alias = "sampleCount")]
    sample_count: Option<u32>,

    /// 输出的 mip 层数 [default: 10]
    #[arg(long, alias = "mipLevelCount")]
    mip_level_count: Option<u32>,

    /// cubemap 的边长 [default: 1024]
    #[arg(long, alias = "cubeMapResolution")]
    cube_map_resolution: Option<u32>,

    /// 输出格式 [default: r16g16b16a16-sfloat]
    #[arg(long, value_enum, alias = "targetFormat")]
    target_format: Option<FormatArg>,

    /// cubemap 输出的容器版本，同时决定默认输出文件的扩展名 [default: ktx2]
    #[arg(long, value_enum, alias = "ktxVersion")]
    container: Option<ContainerArg>,

    /// 采样时的 lod bias [default: 1.0]
    #[arg(long, alias = "lodBias")]
    lod_bias: Option<f32>,

    #[arg(long, alias = "inputIsCubeMap")]
    input_is_cube_map: bool,

    /// 开启 validation layer，日志级别提升到 debug
    #[arg(long)]
    debug: bool,

    /// 物理设备的序号，默认优先选择独立显卡
    #[arg(long)]
    device_index: Option<usize>,

    /// descriptor pool 的规模系数 [default: 1]
    #[arg(long)]
    descriptor_pool_factor: Option<u32>,

    /// pipeline cache 文件 [default: pipeline.cache]
    #[arg(long)]
    pipeline_cache: Option<PathBuf>,

    /// GLSL 源码目录
    #[arg(long)]
    shader_dir: Option<PathBuf>,

    /// glslc 可执行文件
    #[arg(long, default_value = "glslc")]
    glslc: PathBuf,

    /// TOML 配置文件
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Args {
    /// 命令行中显式给出的参数
    fn to_config(&self) -> SamplerConfig {
        SamplerConfig {
            input_path: self.input_path.clone(),
            output_cubemap: self.output_cubemap.clone(),
            output_diffuse: self.output_diffuse.clone(),
            output_lut: self.output_lut.clone(),
            distribution: self.distribution.map(Into::into),
            cube_map_resolution: self.cube_map_resolution,
            mip_level_count: self.mip_level_count,
            sample_count: self.sample_count,
            target_format: self.target_format.map(Into::into),
            container: self.container.map(Into::into),
            lod_bias: self.lod_bias,
            input_is_cube_map: self.input_is_cube_map.then_some(true),
            debug_output: self.debug.then_some(true),
            device_index: self.device_index,
            descriptor_pool_factor: self.descriptor_pool_factor,
            pipeline_cache_path: self.pipeline_cache.clone(),
            shader_dir: self.shader_dir.clone(),
        }
    }
}

fn run(args: &Args) -> anyhow::Result<()> {
    let file_config = match &args.config {
        Some(path) => SamplerConfig::from_file(path).with_context(|| format!("failed to load config {:?}", path))?,
        None => SamplerConfig::default(),
    };

    let mut request = file_config.merge(args.to_config()).into_request();
    if args.no_diffuse {
        request.output_diffuse = None;
    }
    log::debug!("{:#?}", request);

    let compiler = GlslcCompiler::new(&args.glslc);
    ibl_sampler::sample(&request, &compiler)
        .with_context(|| format!("failed to sample {}", request.input_path.display()))?;
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_log(if args.debug { log::LevelFilter::Debug } else { log::LevelFilter::Info });

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_command_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_kebab_case_flags() {
        let args = Args::try_parse_from([
            "ibl-sampler",
            "--input-path",
            "studio.hdr",
            "--distribution",
            "charlie",
            "--target-format",
            "r8g8b8a8-unorm",
            "--mip-level-count",
            "5",
            "--input-is-cube-map",
        ])
        .unwrap();
        let config = args.to_config();

        assert_eq!(config.input_path, Some(PathBuf::from("studio.hdr")));
        assert_eq!(config.distribution, Some(Distribution::Charlie));
        assert_eq!(config.target_format, Some(TargetFormat::R8G8B8A8Unorm));
        assert_eq!(config.mip_level_count, Some(5));
        assert_eq!(config.input_is_cube_map, Some(true));
        assert_eq!(config.sample_count, None);
        assert_eq!(config.debug_output, None);
    }

    #[test]
    fn test_camel_case_aliases() {
        let args = Args::try_parse_from([
            "ibl-sampler",
            "--inputPath",
            "in.hdr",
            "--specularOutput",
            "specular.ktx2",
            "--sampleCount",
            "64",
            "--lodBias",
            "0.5",
        ])
        .unwrap();
        assert_eq!(args.output_cubemap, Some(PathBuf::from("specular.ktx2")));
        assert_eq!(args.sample_count, Some(64));
        assert_eq!(args.lod_bias, Some(0.5));
    }

    #[test]
    fn test_cli_overrides_defaults() {
        let args = Args::try_parse_from(["ibl-sampler", "--cube-map-resolution", "256", "--no-diffuse"]).unwrap();
        let request = SamplerConfig::default().merge(args.to_config()).into_request();
        assert_eq!(request.cube_map_resolution, 256);
        assert_eq!(request.mip_level_count, 10);
        assert!(args.no_diffuse);
    }

    #[test]
    fn test_container_selects_ktx1_outputs() {
        let args = Args::try_parse_from(["ibl-sampler", "--ktxVersion", "1"]).unwrap();
        assert_eq!(args.container, Some(ContainerArg::Ktx1));

        let request = SamplerConfig::default().merge(args.to_config()).into_request();
        assert_eq!(request.container, ContainerFormat::Ktx1);
        assert_eq!(request.output_cubemap, PathBuf::from("outputSpecular.ktx"));
        assert_eq!(request.output_diffuse, Some(PathBuf::from("outputDiffuse.ktx")));

        let args = Args::try_parse_from(["ibl-sampler", "--container", "ktx2"]).unwrap();
        assert_eq!(args.to_config().container, Some(ContainerFormat::Ktx2));
        assert!(Args::try_parse_from(["ibl-sampler", "--container", "3"]).is_err());
    }

    #[test]
    fn test_invalid_distribution_rejected() {
        assert!(Args::try_parse_from(["ibl-sampler", "--distribution", "phong"]).is_err());
    }
}
