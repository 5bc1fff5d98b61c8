use crate::error::{IblError, IblResult};

/// 完整 mip 链的层数：`floor(log2(side)) + 1`
///
/// 滤波时的采样源使用完整的 mip 链，输出只保留请求的层数
#[inline]
pub fn full_mip_count(side: u32) -> u32 {
    if side == 0 { 0 } else { u32::BITS - side.leading_zeros() }
}

/// 第 mip 级的边长，最小为 1
#[inline]
pub fn mip_side(side: u32, mip: u32) -> u32 {
    side.checked_shr(mip).unwrap_or(0).max(1)
}

/// 检查分辨率与输出 mip 层数的组合是否合法
///
/// 最后一级的边长 `side >> (mip_count - 1)` 必须至少为 1
pub fn validate_mip_levels(side: u32, mip_count: u32) -> IblResult<()> {
    if side == 0 {
        return Err(IblError::InvalidArgument("cube map resolution must be greater than 0".to_string()));
    }
    if mip_count == 0 {
        return Err(IblError::InvalidArgument("mip level count must be greater than 0".to_string()));
    }
    if side.checked_shr(mip_count - 1).unwrap_or(0) < 1 {
        return Err(IblError::InvalidArgument(format!(
            "{} mip levels requested but resolution {} only supports {}",
            mip_count,
            side,
            full_mip_count(side)
        )));
    }
    Ok(())
}

/// 第 mip 级对应的 roughness，只有一层时为 0
#[inline]
pub fn roughness_for_mip(mip: u32, mip_count: u32) -> f32 {
    if mip_count <= 1 { 0.0 } else { mip as f32 / (mip_count - 1) as f32 }
}
