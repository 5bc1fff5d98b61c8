//! KTX 容器的读写
//!
//! 支持 KTX1 与 KTX2 两个版本，只覆盖本工具会用到的子集：无压缩、非数组、
//! 2D 或 cubemap，格式为 R8G8B8A8_UNORM / R16G16B16A16_SFLOAT / R32G32B32A32_SFLOAT。
//!
//! 文件头中的尺寸在 [`Layout::new`] 中统一检查，之后计算的字节数不会溢出。

mod ktx1;
mod ktx2;

use std::path::Path;

use ash::vk;
use serde::Deserialize;

use crate::format::FormatInfo;
use crate::mip::{full_mip_count, mip_side};

const WRITER_KEY: &str = "KTXwriter";
const WRITER_VALUE: &str = concat!("ibl-sampler ", env!("CARGO_PKG_VERSION"));

#[derive(thiserror::Error, Debug)]
pub enum KtxError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a ktx file")]
    InvalidIdentifier,

    #[error("file truncated while reading {0}")]
    Truncated(&'static str),

    #[error("unsupported vkFormat {0}")]
    UnsupportedFormat(i32),

    #[error("unsupported glInternalFormat {0:#x}")]
    UnsupportedGlFormat(u32),

    #[error("supercompression scheme {0} is not supported")]
    Supercompressed(u32),

    #[error("unsupported layout: {0}")]
    UnsupportedLayout(String),

    #[error("face {face} of level {level} is out of range")]
    FaceOutOfRange { face: u32, level: u32 },

    #[error("expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },
}

pub type KtxResult<T> = Result<T, KtxError>;

/// 容器的版本
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerFormat {
    Ktx1,
    #[default]
    Ktx2,
}

impl ContainerFormat {
    /// 默认输出文件使用的扩展名
    #[inline]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Ktx1 => "ktx",
            Self::Ktx2 => "ktx2",
        }
    }

    #[inline]
    pub fn name(self) -> &'static str {
        match self {
            Self::Ktx1 => "KTX1",
            Self::Ktx2 => "KTX2",
        }
    }
}

/// 所有 level 共享的几何描述
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Layout {
    width: u32,
    height: u32,
    format: vk::Format,
    face_count: u32,
    level_count: u32,
}

impl Layout {
    /// level 0 最大，只要它的字节数不溢出，其余 level 也不会溢出
    fn new(width: u32, height: u32, format: vk::Format, face_count: u32, level_count: u32) -> KtxResult<Self> {
        if !FormatInfo::is_supported(format) {
            return Err(KtxError::UnsupportedFormat(format.as_raw()));
        }
        if width == 0 || height == 0 || level_count == 0 {
            return Err(KtxError::UnsupportedLayout(format!("{}x{} with {} levels", width, height, level_count)));
        }
        if face_count != 1 && face_count != 6 {
            return Err(KtxError::UnsupportedLayout(format!("{} faces", face_count)));
        }
        if face_count == 6 && width != height {
            return Err(KtxError::UnsupportedLayout(format!("cubemap faces must be square, got {}x{}", width, height)));
        }

        let max_levels = full_mip_count(width.max(height));
        if level_count > max_levels {
            return Err(KtxError::UnsupportedLayout(format!(
                "{} levels requested but {}x{} only has {}",
                level_count, width, height, max_levels
            )));
        }

        (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(FormatInfo::pixel_size(format) as usize))
            .and_then(|face_size| face_size.checked_mul(face_count as usize))
            .ok_or_else(|| KtxError::UnsupportedLayout(format!("{}x{} is too large", width, height)))?;

        Ok(Self {
            width,
            height,
            format,
            face_count,
            level_count,
        })
    }

    #[inline]
    fn face_size(&self, level: u32) -> usize {
        mip_side(self.width, level) as usize
            * mip_side(self.height, level) as usize
            * FormatInfo::pixel_size(self.format) as usize
    }

    #[inline]
    fn level_size(&self, level: u32) -> usize {
        self.face_size(level) * self.face_count as usize
    }

    fn check_face(&self, face: u32, level: u32) -> KtxResult<()> {
        if face >= self.face_count || level >= self.level_count {
            return Err(KtxError::FaceOutOfRange { face, level });
        }
        Ok(())
    }
}

/// 一个 level 的数据在文件中的范围，face 连续存放
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LevelRange {
    offset: usize,
    length: usize,
}

impl LevelRange {
    /// 检查长度与 layout 一致，并且范围在文件之内
    fn checked(offset: u64, length: u64, expected: usize, file_len: usize) -> KtxResult<Self> {
        if length != expected as u64 {
            return Err(KtxError::SizeMismatch {
                expected,
                actual: usize::try_from(length).unwrap_or(usize::MAX),
            });
        }
        let end = offset.checked_add(length).ok_or(KtxError::Truncated("level data"))?;
        if end > file_len as u64 {
            return Err(KtxError::Truncated("level data"));
        }
        Ok(Self {
            offset: offset as usize,
            length: expected,
        })
    }
}

// --- Writer ---

/// KTX 写入器，持有所有 level 的数据，保存时再按版本编码
pub struct KtxWriter {
    container: ContainerFormat,
    layout: Layout,
    /// 每个 level 一个 buffer，face 连续存放
    levels: Vec<Vec<u8>>,
}

// 创建
impl KtxWriter {
    pub fn new(
        container: ContainerFormat,
        width: u32,
        height: u32,
        format: vk::Format,
        levels: u32,
        is_cubemap: bool,
    ) -> KtxResult<Self> {
        let layout = Layout::new(width, height, format, if is_cubemap { 6 } else { 1 }, levels)?;
        let levels = (0..levels).map(|level| vec![0u8; layout.level_size(level)]).collect();
        Ok(Self {
            container,
            layout,
            levels,
        })
    }
}

// getter
impl KtxWriter {
    #[inline]
    pub fn container(&self) -> ContainerFormat {
        self.container
    }

    /// 某个 face 需要的字节数
    #[inline]
    pub fn face_size(&self, level: u32) -> usize {
        self.layout.face_size(level)
    }

    #[inline]
    pub fn level_count(&self) -> u32 {
        self.layout.level_count
    }

    #[inline]
    pub fn face_count(&self) -> u32 {
        self.layout.face_count
    }
}

impl KtxWriter {
    /// 写入一个 face 的数据，长度必须与该 level 的 face 大小一致
    pub fn write_face(&mut self, data: &[u8], face: u32, level: u32) -> KtxResult<()> {
        self.layout.check_face(face, level)?;
        let face_size = self.layout.face_size(level);
        if data.len() != face_size {
            return Err(KtxError::SizeMismatch {
                expected: face_size,
                actual: data.len(),
            });
        }

        let offset = face as usize * face_size;
        self.levels[level as usize][offset..offset + face_size].copy_from_slice(data);
        Ok(())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> KtxResult<()> {
        std::fs::write(path.as_ref(), self.to_bytes())?;
        log::info!(
            "saved {} ({}, {}x{}, {} faces, {} levels)",
            path.as_ref().display(),
            self.container.name(),
            self.layout.width,
            self.layout.height,
            self.layout.face_count,
            self.layout.level_count
        );
        Ok(())
    }

    /// 序列化为完整的文件内容
    pub fn to_bytes(&self) -> Vec<u8> {
        match self.container {
            ContainerFormat::Ktx1 => ktx1::encode(&self.layout, &self.levels),
            ContainerFormat::Ktx2 => ktx2::encode(&self.layout, &self.levels),
        }
    }
}

// --- Reader ---

/// 从文件读入的贴图，版本由 identifier 决定
pub struct KtxTexture {
    container: ContainerFormat,
    layout: Layout,
    levels: Vec<LevelRange>,
    bytes: Vec<u8>,
}

// 创建
impl KtxTexture {
    pub fn load(path: impl AsRef<Path>) -> KtxResult<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::from_bytes(bytes)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> KtxResult<Self> {
        let (container, (layout, levels)) = if bytes.starts_with(&ktx2::IDENTIFIER) {
            (ContainerFormat::Ktx2, ktx2::parse(&bytes)?)
        } else if bytes.starts_with(&ktx1::IDENTIFIER) {
            (ContainerFormat::Ktx1, ktx1::parse(&bytes)?)
        } else {
            return Err(KtxError::InvalidIdentifier);
        };

        Ok(Self {
            container,
            layout,
            levels,
            bytes,
        })
    }
}

// getter
impl KtxTexture {
    #[inline]
    pub fn container(&self) -> ContainerFormat {
        self.container
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.layout.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.layout.height
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.layout.format
    }

    #[inline]
    pub fn face_count(&self) -> u32 {
        self.layout.face_count
    }

    #[inline]
    pub fn level_count(&self) -> u32 {
        self.layout.level_count
    }

    #[inline]
    pub fn is_cubemap(&self) -> bool {
        self.layout.face_count == 6
    }

    /// 某个 level 的全部数据，face 连续存放
    pub fn level_data(&self, level: u32) -> KtxResult<&[u8]> {
        let range = self.levels.get(level as usize).ok_or(KtxError::FaceOutOfRange { face: 0, level })?;
        Ok(&self.bytes[range.offset..range.offset + range.length])
    }

    pub fn face_data(&self, face: u32, level: u32) -> KtxResult<&[u8]> {
        self.layout.check_face(face, level)?;
        let face_size = self.layout.face_size(level);
        let start = face as usize * face_size;
        Ok(&self.level_data(level)?[start..start + face_size])
    }
}

// tools

/// `KTXwriter` 键值对的内容：key 与 value 各自以 NUL 结尾
fn writer_key_value() -> Vec<u8> {
    let mut pair = Vec::with_capacity(WRITER_KEY.len() + WRITER_VALUE.len() + 2);
    pair.extend_from_slice(WRITER_KEY.as_bytes());
    pair.push(0);
    pair.extend_from_slice(WRITER_VALUE.as_bytes());
    pair.push(0);
    pair
}

struct ByteCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    fn new(bytes: &'a [u8], pos: usize) -> Self {
        Self { bytes, pos }
    }

    #[inline]
    fn pos(&self) -> usize {
        self.pos
    }

    fn take<const N: usize>(&mut self, what: &'static str) -> KtxResult<[u8; N]> {
        let end = self.pos.checked_add(N).ok_or(KtxError::Truncated(what))?;
        let chunk = self.bytes.get(self.pos..end).ok_or(KtxError::Truncated(what))?;
        self.pos = end;
        let mut out = [0u8; N];
        out.copy_from_slice(chunk);
        Ok(out)
    }

    fn read_u32(&mut self, what: &'static str) -> KtxResult<u32> {
        self.take::<4>(what).map(u32::from_le_bytes)
    }

    fn read_u64(&mut self, what: &'static str) -> KtxResult<u64> {
        self.take::<8>(what).map(u64::from_le_bytes)
    }

    /// 跳过 `len` 个字节，越界时返回错误
    fn skip(&mut self, len: usize, what: &'static str) -> KtxResult<()> {
        let end = self.pos.checked_add(len).filter(|end| *end <= self.bytes.len()).ok_or(KtxError::Truncated(what))?;
        self.pos = end;
        Ok(())
    }
}

#[inline]
fn align_up(value: usize, alignment: usize) -> usize {
    value.div_ceil(alignment) * alignment
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(super) fn face_pattern(len: usize, face: u32, level: u32) -> Vec<u8> {
        (0..len).map(|i| (i as u32 + face * 31 + level * 7) as u8).collect()
    }

    pub(super) fn filled_cubemap(container: ContainerFormat, side: u32, format: vk::Format, levels: u32) -> KtxWriter {
        let mut writer = KtxWriter::new(container, side, side, format, levels, true).unwrap();
        for level in 0..levels {
            for face in 0..6 {
                let data = face_pattern(writer.face_size(level), face, level);
                writer.write_face(&data, face, level).unwrap();
            }
        }
        writer
    }

    #[test]
    fn test_round_trip_both_versions() {
        for container in [ContainerFormat::Ktx1, ContainerFormat::Ktx2] {
            let writer = filled_cubemap(container, 16, vk::Format::R16G16B16A16_SFLOAT, 5);
            let texture = KtxTexture::from_bytes(writer.to_bytes()).unwrap();

            assert_eq!(texture.container(), container);
            assert!(texture.is_cubemap());
            assert_eq!(texture.width(), 16);
            assert_eq!(texture.level_count(), 5);
            assert_eq!(texture.format(), vk::Format::R16G16B16A16_SFLOAT);
            for level in 0..5 {
                for face in 0..6 {
                    let expected = face_pattern(writer.face_size(level), face, level);
                    assert_eq!(texture.face_data(face, level).unwrap(), expected.as_slice());
                }
            }
        }
    }

    #[test]
    fn test_layout_limits() {
        assert!(Layout::new(4, 4, vk::Format::R8G8B8A8_UNORM, 6, 3).is_ok());
        // 4px 只有 3 级
        assert!(matches!(
            Layout::new(4, 4, vk::Format::R8G8B8A8_UNORM, 6, 4),
            Err(KtxError::UnsupportedLayout(_))
        ));
        assert!(matches!(
            Layout::new(u32::MAX, u32::MAX, vk::Format::R32G32B32A32_SFLOAT, 6, 1),
            Err(KtxError::UnsupportedLayout(_))
        ));
        assert!(matches!(
            Layout::new(4, 4, vk::Format::R8G8B8A8_UNORM, 2, 1),
            Err(KtxError::UnsupportedLayout(_))
        ));
        assert!(matches!(
            Layout::new(4, 4, vk::Format::R8G8B8_UNORM, 1, 1),
            Err(KtxError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_write_face_errors() {
        let mut writer = KtxWriter::new(ContainerFormat::Ktx2, 4, 4, vk::Format::R8G8B8A8_UNORM, 1, true).unwrap();
        assert!(matches!(
            writer.write_face(&[0u8; 3], 0, 0),
            Err(KtxError::SizeMismatch { expected: 64, actual: 3 })
        ));
        assert!(matches!(
            writer.write_face(&[0u8; 64], 6, 0),
            Err(KtxError::FaceOutOfRange { face: 6, level: 0 })
        ));
        assert!(matches!(
            writer.write_face(&[0u8; 64], 0, 1),
            Err(KtxError::FaceOutOfRange { face: 0, level: 1 })
        ));
    }

    #[test]
    fn test_writer_rejects_bad_layout() {
        assert!(matches!(
            KtxWriter::new(ContainerFormat::Ktx2, 4, 4, vk::Format::R8G8B8_UNORM, 1, false),
            Err(KtxError::UnsupportedFormat(_))
        ));
        assert!(KtxWriter::new(ContainerFormat::Ktx1, 4, 2, vk::Format::R8G8B8A8_UNORM, 1, true).is_err());
        assert!(KtxWriter::new(ContainerFormat::Ktx1, 4, 2, vk::Format::R8G8B8A8_UNORM, 1, false).is_ok());
    }

    #[test]
    fn test_unknown_identifier() {
        assert!(matches!(KtxTexture::from_bytes(b"not a ktx".to_vec()), Err(KtxError::InvalidIdentifier)));
        assert!(matches!(KtxTexture::from_bytes(Vec::new()), Err(KtxError::InvalidIdentifier)));
    }

    #[test]
    fn test_2d_texture() {
        let mut writer = KtxWriter::new(ContainerFormat::Ktx2, 4, 2, vk::Format::R32G32B32A32_SFLOAT, 1, false).unwrap();
        let data = face_pattern(writer.face_size(0), 0, 0);
        writer.write_face(&data, 0, 0).unwrap();

        let texture = KtxTexture::from_bytes(writer.to_bytes()).unwrap();
        assert!(!texture.is_cubemap());
        assert_eq!(texture.height(), 2);
        assert_eq!(texture.level_data(0).unwrap(), data.as_slice());
    }

    #[test]
    fn test_save_and_load_file() {
        let path = std::env::temp_dir().join(format!("ibl-sampler-ktx-{}.ktx", std::process::id()));
        let writer = filled_cubemap(ContainerFormat::Ktx1, 2, vk::Format::R8G8B8A8_UNORM, 2);
        writer.save(&path).unwrap();

        let texture = KtxTexture::load(&path).unwrap();
        assert_eq!(texture.container(), ContainerFormat::Ktx1);
        assert_eq!(texture.face_data(5, 1).unwrap(), face_pattern(4, 5, 1).as_slice());
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_container_from_toml_names() {
        #[derive(Deserialize)]
        struct Wrapper {
            container: ContainerFormat,
        }
        let parsed: Wrapper = toml::from_str("container = \"ktx1\"").unwrap();
        assert_eq!(parsed.container, ContainerFormat::Ktx1);
        assert_eq!(ContainerFormat::default().extension(), "ktx2");
    }
}
