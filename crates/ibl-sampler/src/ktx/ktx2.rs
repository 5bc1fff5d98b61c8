//! KTX2 编解码
//!
//! 文件布局：
//! ```text
//! identifier | header | index | level index | DFD | KVD | (padding) | level N-1 .. level 0
//! ```

use ash::vk;

use super::{ByteCursor, KtxError, KtxResult, Layout, LevelRange, align_up, writer_key_value};
use crate::format::FormatInfo;

pub(super) const IDENTIFIER: [u8; 12] = [0xAB, b'K', b'T', b'X', b' ', b'2', b'0', 0xBB, b'\r', b'\n', 0x1A, b'\n'];

/// identifier + header(9 x u32) + index(4 x u32 + 2 x u64)
const LEVEL_INDEX_OFFSET: usize = 12 + 9 * 4 + 4 * 4 + 2 * 8;
const LEVEL_INDEX_ENTRY_SIZE: usize = 3 * 8;

/// 一个 level 在文件中的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LevelIndex {
    byte_offset: u64,
    byte_length: u64,
    uncompressed_byte_length: u64,
}

/// level 数据的对齐：`lcm(pixel size, 4)`
#[inline]
fn level_alignment(format: vk::Format) -> usize {
    let pixel_size = FormatInfo::pixel_size(format) as usize;
    pixel_size * 4 / gcd(pixel_size, 4)
}

pub(super) fn encode(layout: &Layout, levels: &[Vec<u8>]) -> Vec<u8> {
    let level_count = layout.level_count as usize;
    let alignment = level_alignment(layout.format);

    let dfd = build_dfd(layout.format);
    let kvd = build_kvd();

    let dfd_offset = LEVEL_INDEX_OFFSET + level_count * LEVEL_INDEX_ENTRY_SIZE;
    let kvd_offset = dfd_offset + dfd.len();
    let mut data_offset = align_up(kvd_offset + kvd.len(), alignment);

    // 最小的 level 存放在最前面
    let mut level_index = vec![
        LevelIndex {
            byte_offset: 0,
            byte_length: 0,
            uncompressed_byte_length: 0
        };
        level_count
    ];
    for level in (0..level_count).rev() {
        let length = levels[level].len();
        level_index[level] = LevelIndex {
            byte_offset: data_offset as u64,
            byte_length: length as u64,
            uncompressed_byte_length: length as u64,
        };
        data_offset = align_up(data_offset + length, alignment);
    }

    let mut out = Vec::with_capacity(data_offset);
    out.extend_from_slice(&IDENTIFIER);

    // header
    for value in [
        layout.format.as_raw() as u32,
        FormatInfo::type_size(layout.format),
        layout.width,
        layout.height,
        0, // pixelDepth
        0, // layerCount
        layout.face_count,
        layout.level_count,
        0, // supercompressionScheme
    ] {
        out.extend_from_slice(&value.to_le_bytes());
    }

    // index
    out.extend_from_slice(&(dfd_offset as u32).to_le_bytes());
    out.extend_from_slice(&(dfd.len() as u32).to_le_bytes());
    out.extend_from_slice(&(kvd_offset as u32).to_le_bytes());
    out.extend_from_slice(&(kvd.len() as u32).to_le_bytes());
    out.extend_from_slice(&0u64.to_le_bytes());
    out.extend_from_slice(&0u64.to_le_bytes());

    for entry in &level_index {
        out.extend_from_slice(&entry.byte_offset.to_le_bytes());
        out.extend_from_slice(&entry.byte_length.to_le_bytes());
        out.extend_from_slice(&entry.uncompressed_byte_length.to_le_bytes());
    }

    out.extend_from_slice(&dfd);
    out.extend_from_slice(&kvd);

    for level in (0..level_count).rev() {
        out.resize(level_index[level].byte_offset as usize, 0);
        out.extend_from_slice(&levels[level]);
    }
    out
}

pub(super) fn parse(bytes: &[u8]) -> KtxResult<(Layout, Vec<LevelRange>)> {
    let mut cursor = ByteCursor::new(bytes, IDENTIFIER.len());
    let vk_format = cursor.read_u32("header")?;
    let _type_size = cursor.read_u32("header")?;
    let width = cursor.read_u32("header")?;
    let height = cursor.read_u32("header")?;
    let depth = cursor.read_u32("header")?;
    let layer_count = cursor.read_u32("header")?;
    let face_count = cursor.read_u32("header")?;
    let level_count = cursor.read_u32("header")?;
    let supercompression = cursor.read_u32("header")?;

    let format = vk::Format::from_raw(vk_format as i32);
    if !FormatInfo::is_supported(format) {
        return Err(KtxError::UnsupportedFormat(vk_format as i32));
    }
    if supercompression != 0 {
        return Err(KtxError::Supercompressed(supercompression));
    }
    if depth != 0 || layer_count > 1 {
        return Err(KtxError::UnsupportedLayout(format!("depth {} with {} layers", depth, layer_count)));
    }

    // 0 表示只有 base level
    let layout = Layout::new(width, height, format, face_count, level_count.max(1))?;

    // level index 必须完整地落在文件里，之后才按 level 数分配
    let level_count = layout.level_count as usize;
    let index_end = LEVEL_INDEX_OFFSET + level_count * LEVEL_INDEX_ENTRY_SIZE;
    if index_end > bytes.len() {
        return Err(KtxError::Truncated("level index"));
    }

    // 跳过 dfd / kvd / sgd 的 index
    let mut cursor = ByteCursor::new(bytes, LEVEL_INDEX_OFFSET);
    let mut levels = Vec::with_capacity(level_count);
    for level in 0..layout.level_count {
        let entry = LevelIndex {
            byte_offset: cursor.read_u64("level index")?,
            byte_length: cursor.read_u64("level index")?,
            uncompressed_byte_length: cursor.read_u64("level index")?,
        };
        levels.push(LevelRange::checked(
            entry.byte_offset,
            entry.byte_length,
            layout.level_size(level),
            bytes.len(),
        )?);
    }

    Ok((layout, levels))
}

/// Khronos basic data format descriptor，RGBA 四个通道
fn build_dfd(format: vk::Format) -> Vec<u8> {
    const CHANNEL_IDS: [u32; 4] = [0, 1, 2, 15];
    let pixel_size = FormatInfo::pixel_size(format);
    let bits_per_channel = FormatInfo::type_size(format) * 8;
    let is_float = FormatInfo::is_float(format);

    let block_size = 24 + 16 * CHANNEL_IDS.len() as u32;
    let mut words: Vec<u32> = vec![
        block_size + 4, // dfdTotalSize
        0,              // vendorId = KHRONOS, descriptorType = basic
        2 | (block_size << 16),
        // colorModel RGBSDA, colorPrimaries BT709, transferFunction linear, flags 0
        1 | (1 << 8) | (1 << 16),
        0,          // texelBlockDimension
        pixel_size, // bytesPlane0
        0,
    ];

    for (i, channel) in CHANNEL_IDS.iter().enumerate() {
        let qualifiers = if is_float { 0xC0 } else { 0 };
        let bit_offset = i as u32 * bits_per_channel;
        words.push(bit_offset | ((bits_per_channel - 1) << 16) | ((channel | qualifiers) << 24));
        words.push(0); // samplePosition
        if is_float {
            words.push(0xBF80_0000); // -1.0
            words.push(0x3F80_0000); // 1.0
        } else {
            words.push(0);
            words.push((1u32 << bits_per_channel) - 1);
        }
    }

    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

fn build_kvd() -> Vec<u8> {
    let pair = writer_key_value();
    let mut kvd = Vec::with_capacity(4 + pair.len() + 3);
    kvd.extend_from_slice(&(pair.len() as u32).to_le_bytes());
    kvd.extend_from_slice(&pair);
    kvd.resize(align_up(kvd.len(), 4), 0);
    kvd
}

fn gcd(a: usize, b: usize) -> usize {
    if b == 0 { a } else { gcd(b, a % b) }
}
