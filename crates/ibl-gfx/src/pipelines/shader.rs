use std::ffi::{CStr, CString};

use ash::vk;

/// pipeline 的一个 shader stage
///
/// module 由 [`crate::gfx::Gfx::create_shader_module`] 创建并持有
#[derive(Clone, Debug)]
pub struct ShaderStageInfo {
    pub module: vk::ShaderModule,
    pub stage: vk::ShaderStageFlags,
    pub entry_point: CString,
}

impl ShaderStageInfo {
    #[inline]
    pub fn new(module: vk::ShaderModule, stage: vk::ShaderStageFlags, entry_point: &CStr) -> Self {
        Self {
            module,
            stage,
            entry_point: entry_point.to_owned(),
        }
    }

    #[inline]
    pub fn stage_create_info(&self) -> vk::PipelineShaderStageCreateInfo<'_> {
        vk::PipelineShaderStageCreateInfo::default().stage(self.stage).module(self.module).name(&self.entry_point)
    }
}
