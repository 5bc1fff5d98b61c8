//! 采样流程依赖的外部协作者：图像编解码与 shader 编译
//!
//! 两者都以 trait 的形式注入，测试时可以替换为不依赖外部环境的实现

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use ash::vk;

use crate::error::{IblError, IblResult};

// --- Image codec ---

/// RGBA 32 位浮点图像，行优先
#[derive(Debug, Clone, PartialEq)]
pub struct HdrImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<f32>,
}

impl HdrImage {
    pub fn new(width: u32, height: u32, pixels: Vec<f32>) -> IblResult<Self> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(IblError::ImageCodecError(format!(
                "{}x{} image needs {} floats, got {}",
                width,
                height,
                expected,
                pixels.len()
            )));
        }
        Ok(Self { width, height, pixels })
    }

    /// 从 R32G32B32A32_SFLOAT 的原始字节构造
    pub fn from_rgba32f_bytes(width: u32, height: u32, bytes: &[u8]) -> IblResult<Self> {
        Self::new(width, height, bytemuck::pod_collect_to_vec(bytes))
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }
}

/// 图像解码与编码
pub trait ImageCodec {
    /// 解码为 RGBA32F
    fn load_hdr(&self, path: &Path) -> IblResult<HdrImage>;

    /// 以 Radiance HDR 格式保存，丢弃 alpha
    fn save_hdr(&self, path: &Path, image: &HdrImage) -> IblResult<()>;

    /// 截断到 [0, 1] 后以 8 位 PNG 保存
    fn save_png(&self, path: &Path, image: &HdrImage) -> IblResult<()>;
}

/// 基于 `image` crate 的实现
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageCrateCodec;

impl ImageCrateCodec {
    fn rgba_buffer(image: &HdrImage) -> IblResult<image::Rgba32FImage> {
        image::Rgba32FImage::from_raw(image.width, image.height, image.pixels.clone())
            .ok_or_else(|| IblError::ImageCodecError(format!("invalid {}x{} image", image.width, image.height)))
    }
}

impl ImageCodec for ImageCrateCodec {
    fn load_hdr(&self, path: &Path) -> IblResult<HdrImage> {
        let decoded = image::open(path)
            .map_err(|e| IblError::ImageCodecError(format!("failed to decode {}: {}", path.display(), e)))?
            .into_rgba32f();
        let (width, height) = decoded.dimensions();
        HdrImage::new(width, height, decoded.into_raw())
    }

    fn save_hdr(&self, path: &Path, image: &HdrImage) -> IblResult<()> {
        let rgb = image::DynamicImage::ImageRgba32F(Self::rgba_buffer(image)?).into_rgb32f();
        image::DynamicImage::ImageRgb32F(rgb)
            .save_with_format(path, image::ImageFormat::Hdr)
            .map_err(|e| IblError::ImageCodecError(format!("failed to write {}: {}", path.display(), e)))
    }

    fn save_png(&self, path: &Path, image: &HdrImage) -> IblResult<()> {
        let rgba8 = image::DynamicImage::ImageRgba32F(Self::rgba_buffer(image)?).into_rgba8();
        rgba8
            .save_with_format(path, image::ImageFormat::Png)
            .map_err(|e| IblError::ImageCodecError(format!("failed to write {}: {}", path.display(), e)))
    }
}

// --- Shader compiler ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    #[inline]
    pub fn vk_stage(self) -> vk::ShaderStageFlags {
        match self {
            Self::Vertex => vk::ShaderStageFlags::VERTEX,
            Self::Fragment => vk::ShaderStageFlags::FRAGMENT,
        }
    }

    #[inline]
    fn glslc_name(self) -> &'static str {
        match self {
            Self::Vertex => "vert",
            Self::Fragment => "frag",
        }
    }
}

/// GLSL 到 SPIR-V 的编译
///
/// 编译结果的入口函数总是名为 `main`
pub trait ShaderCompiler {
    fn compile(&self, source: &str, source_name: &str, entry_point: &str, stage: ShaderStage) -> IblResult<Vec<u32>>;
}

/// 调用 Vulkan SDK 中的 `glslc`
///
/// 通过 `-D<entry>=main` 将 `entry_point` 重命名为 `main`，
/// 同一个源文件可以编译出多个入口
#[derive(Debug, Clone)]
pub struct GlslcCompiler {
    executable: PathBuf,
}

impl Default for GlslcCompiler {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("glslc"),
        }
    }
}

impl GlslcCompiler {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    fn failed(source_name: &str, message: impl Into<String>) -> IblError {
        IblError::ShaderCompilationFailed {
            name: source_name.to_string(),
            message: message.into(),
        }
    }
}

impl ShaderCompiler for GlslcCompiler {
    fn compile(&self, source: &str, source_name: &str, entry_point: &str, stage: ShaderStage) -> IblResult<Vec<u32>> {
        let mut cmd = Command::new(&self.executable);
        cmd.arg(format!("-fshader-stage={}", stage.glslc_name())).arg("--target-env=vulkan1.3");
        if entry_point != "main" {
            cmd.arg(format!("-D{}=main", entry_point));
        }
        cmd.args(["-o", "-", "-"]).stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::piped());

        log::debug!("compiling {} ({}) with {:?}", source_name, entry_point, cmd);
        let mut child = cmd
            .spawn()
            .map_err(|e| Self::failed(source_name, format!("failed to launch {}: {}", self.executable.display(), e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(source.as_bytes())
                .map_err(|e| Self::failed(source_name, format!("failed to write source: {}", e)))?;
        }

        let output = child.wait_with_output().map_err(|e| Self::failed(source_name, e.to_string()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            log::error!("{} ({}) failed to compile:\n{}", source_name, entry_point, stderr);
            return Err(Self::failed(source_name, stderr.trim().to_string()));
        }

        ash::util::read_spv(&mut Cursor::new(&output.stdout))
            .map_err(|e| Self::failed(source_name, format!("invalid spir-v output: {}", e)))
    }
}

/// 从 shader 目录读取源码并编译
pub fn compile_shader_file(
    compiler: &dyn ShaderCompiler,
    shader_dir: &Path,
    file_name: &str,
    entry_point: &str,
    stage: ShaderStage,
) -> IblResult<Vec<u32>> {
    let path = shader_dir.join(file_name);
    let source = std::fs::read_to_string(&path).map_err(|e| {
        log::error!("failed to read shader {}: {}", path.display(), e);
        IblError::ShaderFileNotFound(path.clone())
    })?;
    compiler.compile(&source, file_name, entry_point, stage)
}
