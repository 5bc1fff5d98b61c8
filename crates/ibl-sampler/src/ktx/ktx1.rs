//! KTX1 编解码
//!
//! 文件布局：
//! ```text
//! identifier | header(13 x u32) | KVD | { imageSize | face 0 .. face N-1 } level 0 .. level N-1
//! ```
//! 所有支持的像素大小都是 4 的倍数，因此 cube padding 与 mip padding 总是为 0。

use ash::vk;

use super::{ByteCursor, KtxError, KtxResult, Layout, LevelRange, align_up, writer_key_value};

pub(super) const IDENTIFIER: [u8; 12] = [0xAB, b'K', b'T', b'X', b' ', b'1', b'1', 0xBB, b'\r', b'\n', 0x1A, b'\n'];

const ENDIANNESS: u32 = 0x0403_0201;

const GL_UNSIGNED_BYTE: u32 = 0x1401;
const GL_HALF_FLOAT: u32 = 0x140B;
const GL_FLOAT: u32 = 0x1406;
const GL_RGBA: u32 = 0x1908;
const GL_RGBA8: u32 = 0x8058;
const GL_RGBA16F: u32 = 0x881A;
const GL_RGBA32F: u32 = 0x8814;

/// vk format 对应的 (glType, glTypeSize, glInternalFormat)
fn gl_format(format: vk::Format) -> (u32, u32, u32) {
    match format {
        vk::Format::R16G16B16A16_SFLOAT => (GL_HALF_FLOAT, 2, GL_RGBA16F),
        vk::Format::R32G32B32A32_SFLOAT => (GL_FLOAT, 4, GL_RGBA32F),
        _ => (GL_UNSIGNED_BYTE, 1, GL_RGBA8),
    }
}

fn vk_format(gl_internal_format: u32) -> KtxResult<vk::Format> {
    match gl_internal_format {
        GL_RGBA8 => Ok(vk::Format::R8G8B8A8_UNORM),
        GL_RGBA16F => Ok(vk::Format::R16G16B16A16_SFLOAT),
        GL_RGBA32F => Ok(vk::Format::R32G32B32A32_SFLOAT),
        other => Err(KtxError::UnsupportedGlFormat(other)),
    }
}

/// 非数组 cubemap 的 imageSize 是单个 face 的大小，其余情况是整个 level
#[inline]
fn image_size(layout: &Layout, level: u32) -> usize {
    if layout.face_count == 6 { layout.face_size(level) } else { layout.level_size(level) }
}

pub(super) fn encode(layout: &Layout, levels: &[Vec<u8>]) -> Vec<u8> {
    let (gl_type, gl_type_size, gl_internal_format) = gl_format(layout.format);

    let pair = writer_key_value();
    let mut kvd = Vec::with_capacity(4 + pair.len() + 3);
    kvd.extend_from_slice(&(pair.len() as u32).to_le_bytes());
    kvd.extend_from_slice(&pair);
    kvd.resize(align_up(kvd.len(), 4), 0);

    let data_size: usize = levels.iter().map(|level| 4 + level.len()).sum();
    let mut out = Vec::with_capacity(IDENTIFIER.len() + 13 * 4 + kvd.len() + data_size);
    out.extend_from_slice(&IDENTIFIER);

    for value in [
        ENDIANNESS,
        gl_type,
        gl_type_size,
        GL_RGBA, // glFormat
        gl_internal_format,
        GL_RGBA, // glBaseInternalFormat
        layout.width,
        layout.height,
        0, // pixelDepth
        0, // numberOfArrayElements
        layout.face_count,
        layout.level_count,
        kvd.len() as u32,
    ] {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out.extend_from_slice(&kvd);

    // 最大的 level 存放在最前面
    for (level, data) in levels.iter().enumerate() {
        out.extend_from_slice(&(image_size(layout, level as u32) as u32).to_le_bytes());
        out.extend_from_slice(data);
    }
    out
}

pub(super) fn parse(bytes: &[u8]) -> KtxResult<(Layout, Vec<LevelRange>)> {
    let mut cursor = ByteCursor::new(bytes, IDENTIFIER.len());
    let endianness = cursor.read_u32("header")?;
    let _gl_type = cursor.read_u32("header")?;
    let _gl_type_size = cursor.read_u32("header")?;
    let _gl_format = cursor.read_u32("header")?;
    let gl_internal_format = cursor.read_u32("header")?;
    let _gl_base_internal_format = cursor.read_u32("header")?;
    let width = cursor.read_u32("header")?;
    let height = cursor.read_u32("header")?;
    let depth = cursor.read_u32("header")?;
    let array_elements = cursor.read_u32("header")?;
    let face_count = cursor.read_u32("header")?;
    let level_count = cursor.read_u32("header")?;
    let kvd_size = cursor.read_u32("header")?;

    if endianness != ENDIANNESS {
        return Err(KtxError::UnsupportedLayout(format!("endianness marker {:#010x}", endianness)));
    }
    let format = vk_format(gl_internal_format)?;
    if depth != 0 || array_elements != 0 {
        return Err(KtxError::UnsupportedLayout(format!("depth {} with {} array elements", depth, array_elements)));
    }

    // 0 表示只有 base level
    let layout = Layout::new(width, height, format, face_count, level_count.max(1))?;

    cursor.skip(kvd_size as usize, "key/value data")?;

    let mut levels = Vec::with_capacity(layout.level_count as usize);
    for level in 0..layout.level_count {
        let declared = cursor.read_u32("image size")?;
        let expected = image_size(&layout, level);
        if declared as usize != expected {
            return Err(KtxError::SizeMismatch {
                expected,
                actual: declared as usize,
            });
        }

        let level_size = layout.level_size(level);
        levels.push(LevelRange::checked(cursor.pos() as u64, level_size as u64, level_size, bytes.len())?);
        cursor.skip(level_size, "level data")?;
    }

    Ok((layout, levels))
}

#[cfg(test)]
mod tests {
    use super::super::tests::filled_cubemap;
    use super::super::{ContainerFormat, KtxTexture};
    use super::*;

    fn cubemap_bytes(side: u32, format: vk::Format, levels: u32) -> Vec<u8> {
        filled_cubemap(ContainerFormat::Ktx1, side, format, levels).to_bytes()
    }

    fn word(bytes: &[u8], i: usize) -> u32 {
        u32::from_le_bytes(bytes[12 + i * 4..16 + i * 4].try_into().unwrap())
    }

    fn patch_u32(bytes: &mut [u8], i: usize, value: u32) {
        bytes[12 + i * 4..16 + i * 4].copy_from_slice(&value.to_le_bytes());
    }

    #[test]
    fn test_header_fields() {
        let bytes = cubemap_bytes(8, vk::Format::R16G16B16A16_SFLOAT, 2);
        assert_eq!(&bytes[..12], &IDENTIFIER);
        assert_eq!(word(&bytes, 0), 0x0403_0201);
        assert_eq!(word(&bytes, 1), GL_HALF_FLOAT);
        assert_eq!(word(&bytes, 2), 2);
        assert_eq!(word(&bytes, 3), GL_RGBA);
        assert_eq!(word(&bytes, 4), GL_RGBA16F);
        assert_eq!(word(&bytes, 5), GL_RGBA);
        assert_eq!(word(&bytes, 6), 8);
        assert_eq!(word(&bytes, 7), 8);
        assert_eq!(word(&bytes, 8), 0);
        assert_eq!(word(&bytes, 9), 0);
        assert_eq!(word(&bytes, 10), 6);
        assert_eq!(word(&bytes, 11), 2);
        assert_eq!(word(&bytes, 12) % 4, 0);
    }

    #[test]
    fn test_largest_level_first() {
        let bytes = cubemap_bytes(8, vk::Format::R8G8B8A8_UNORM, 2);
        let kvd_size = word(&bytes, 12) as usize;
        let level0_at = 12 + 13 * 4 + kvd_size;
        // cubemap 的 imageSize 只算一个 face
        let image_size = u32::from_le_bytes(bytes[level0_at..level0_at + 4].try_into().unwrap());
        assert_eq!(image_size, 8 * 8 * 4);

        let level1_at = level0_at + 4 + 6 * 8 * 8 * 4;
        let image_size = u32::from_le_bytes(bytes[level1_at..level1_at + 4].try_into().unwrap());
        assert_eq!(image_size, 4 * 4 * 4);
        assert_eq!(bytes.len(), level1_at + 4 + 6 * 4 * 4 * 4);
    }

    #[test]
    fn test_2d_image_size_covers_level() {
        let writer = super::super::KtxWriter::new(ContainerFormat::Ktx1, 4, 2, vk::Format::R32G32B32A32_SFLOAT, 1, false)
            .unwrap();
        let bytes = writer.to_bytes();
        let level0_at = 12 + 13 * 4 + word(&bytes, 12) as usize;
        let image_size = u32::from_le_bytes(bytes[level0_at..level0_at + 4].try_into().unwrap());
        assert_eq!(image_size, 4 * 2 * 16);
        assert_eq!(word(&bytes, 1), GL_FLOAT);
        assert_eq!(word(&bytes, 4), GL_RGBA32F);
    }

    #[test]
    fn test_reader_rejects_invalid_files() {
        let mut bytes = cubemap_bytes(4, vk::Format::R8G8B8A8_UNORM, 1);
        patch_u32(&mut bytes, 0, 0x0102_0304);
        assert!(matches!(KtxTexture::from_bytes(bytes), Err(KtxError::UnsupportedLayout(_))));

        let mut bytes = cubemap_bytes(4, vk::Format::R8G8B8A8_UNORM, 1);
        patch_u32(&mut bytes, 4, 0x8051);
        assert!(matches!(KtxTexture::from_bytes(bytes), Err(KtxError::UnsupportedGlFormat(0x8051))));

        let bytes = cubemap_bytes(4, vk::Format::R8G8B8A8_UNORM, 1);
        let truncated = bytes[..bytes.len() - 1].to_vec();
        assert!(matches!(KtxTexture::from_bytes(truncated), Err(KtxError::Truncated(_))));

        let mut bytes = cubemap_bytes(4, vk::Format::R8G8B8A8_UNORM, 1);
        patch_u32(&mut bytes, 12, u32::MAX);
        assert!(matches!(KtxTexture::from_bytes(bytes), Err(KtxError::Truncated("key/value data"))));
    }

    #[test]
    fn test_oversized_header_is_rejected() {
        let mut bytes = cubemap_bytes(4, vk::Format::R8G8B8A8_UNORM, 1);
        patch_u32(&mut bytes, 6, u32::MAX);
        patch_u32(&mut bytes, 7, u32::MAX);
        assert!(matches!(KtxTexture::from_bytes(bytes), Err(KtxError::UnsupportedLayout(_))));

        let mut bytes = cubemap_bytes(4, vk::Format::R8G8B8A8_UNORM, 1);
        patch_u32(&mut bytes, 11, u32::MAX);
        assert!(matches!(KtxTexture::from_bytes(bytes), Err(KtxError::UnsupportedLayout(_))));
    }

    #[test]
    fn test_image_size_mismatch() {
        let mut bytes = cubemap_bytes(4, vk::Format::R8G8B8A8_UNORM, 1);
        let level0_at = 12 + 13 * 4 + word(&bytes, 12) as usize;
        bytes[level0_at..level0_at + 4].copy_from_slice(&(6u32 * 64).to_le_bytes());
        assert!(matches!(
            KtxTexture::from_bytes(bytes),
            Err(KtxError::SizeMismatch { expected: 64, actual: 384 })
        ));
    }
}
