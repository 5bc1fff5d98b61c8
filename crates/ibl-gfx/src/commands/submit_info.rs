use ash::vk;
use itertools::Itertools;

use crate::commands::command_buffer::GfxCommandBuffer;

/// Gfx 关于 submitInfo 的封装
///
/// 离线流程中每次提交都会阻塞等待，不需要 semaphore
pub struct GfxSubmitInfo {
    command_buffers: Vec<vk::CommandBufferSubmitInfo<'static>>,
}

impl GfxSubmitInfo {
    pub fn new(commands: &[&GfxCommandBuffer]) -> Self {
        let command_buffers = commands
            .iter()
            .map(|cmd| vk::CommandBufferSubmitInfo::default().command_buffer(cmd.vk_handle()))
            .collect_vec();

        Self { command_buffers }
    }

    #[inline]
    pub fn submit_info(&self) -> vk::SubmitInfo2<'_> {
        vk::SubmitInfo2::default().command_buffer_infos(&self.command_buffers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_submit_info() {
        let info = GfxSubmitInfo::new(&[]);
        let submit = info.submit_info();
        assert_eq!(submit.command_buffer_info_count, 0);
        assert_eq!(submit.wait_semaphore_info_count, 0);
    }
}
