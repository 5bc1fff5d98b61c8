//! 图像状态定义
//!
//! 封装 Vulkan 的 pipeline stage、access mask 和 image layout，
//! 提供预定义的常用状态组合，以及按 mip 计算 barrier 的辅助函数。

use std::ops::Range;

use ash::vk;

/// 图像资源状态
///
/// 资源管理器为每个 image 的每个 mip level 记录一份当前状态，
/// 状态转换时由记录的旧状态与目标状态生成 barrier。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ImageState {
    pub stage: vk::PipelineStageFlags2,
    pub access: vk::AccessFlags2,
    pub layout: vk::ImageLayout,
}

impl Default for ImageState {
    fn default() -> Self {
        Self::UNDEFINED
    }
}

// new & 常量定义
impl ImageState {
    #[inline]
    pub const fn new(stage: vk::PipelineStageFlags2, access: vk::AccessFlags2, layout: vk::ImageLayout) -> Self {
        Self { stage, access, layout }
    }

    /// 未定义状态（初始状态或不关心内容）
    pub const UNDEFINED: Self =
        Self::new(vk::PipelineStageFlags2::TOP_OF_PIPE, vk::AccessFlags2::NONE, vk::ImageLayout::UNDEFINED);

    /// blit / copy 的源
    pub const TRANSFER_SRC: Self = Self::new(
        vk::PipelineStageFlags2::TRANSFER,
        vk::AccessFlags2::TRANSFER_READ,
        vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
    );

    /// blit / copy 的目标
    pub const TRANSFER_DST: Self = Self::new(
        vk::PipelineStageFlags2::TRANSFER,
        vk::AccessFlags2::TRANSFER_WRITE,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
    );

    /// 着色器只读采样（片段着色器）
    pub const SHADER_READ_FRAGMENT: Self = Self::new(
        vk::PipelineStageFlags2::FRAGMENT_SHADER,
        vk::AccessFlags2::SHADER_SAMPLED_READ,
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    );

    /// 颜色附件输出（图形管线写入）
    pub const COLOR_ATTACHMENT_WRITE: Self = Self::new(
        vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
        vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    );
}

// 辅助函数
impl ImageState {
    #[inline]
    pub fn is_write(&self) -> bool {
        self.access.intersects(
            vk::AccessFlags2::TRANSFER_WRITE
                | vk::AccessFlags2::COLOR_ATTACHMENT_WRITE
                | vk::AccessFlags2::SHADER_WRITE
                | vk::AccessFlags2::SHADER_STORAGE_WRITE
                | vk::AccessFlags2::MEMORY_WRITE,
        )
    }
}

/// 一段共享同一个旧状态的连续 mip
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MipTransition {
    pub base_mip: u32,
    pub level_count: u32,
    pub old_state: ImageState,
}

/// 将 `mips` 范围按旧状态分组，每组生成一个 barrier
///
/// 已经处于 `new_state` 且旧状态没有写入的 level 无需 barrier，会被跳过
pub fn plan_transitions(states: &[ImageState], mips: Range<u32>, new_state: ImageState) -> Vec<MipTransition> {
    let mut transitions: Vec<MipTransition> = Vec::new();
    for mip in mips {
        let old_state = states[mip as usize];
        if old_state == new_state && !old_state.is_write() {
            continue;
        }
        match transitions.last_mut() {
            Some(last) if last.old_state == old_state && last.base_mip + last.level_count == mip => {
                last.level_count += 1;
            }
            _ => transitions.push(MipTransition {
                base_mip: mip,
                level_count: 1,
                old_state,
            }),
        }
    }
    transitions
}
