use std::ffi::CString;
use std::rc::Rc;

use ash::vk;
use itertools::Itertools;

use crate::commands::barrier::GfxImageBarrier;
use crate::error::{GfxResult, VkResultExt};
use crate::foundation::device::GfxDevice;

/// debug label 的颜色
pub struct LabelColor;
impl LabelColor {
    pub const COLOR_PASS: [f32; 4] = [0.0, 0.0, 1.0, 1.0];
    pub const COLOR_STAGE: [f32; 4] = [1.0, 1.0, 0.0, 1.0];
    pub const COLOR_CMD: [f32; 4] = [0.0, 1.0, 0.0, 1.0];
}

/// 命令缓冲封装
///
/// 封装 Vulkan CommandBuffer，提供命令录制接口。
///
/// # 使用示例
/// ```ignore
/// let cmd = command_pool.alloc_command_buffer("my-pass")?;
/// cmd.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, "my-pass")?;
/// cmd.cmd_bind_pipeline(vk::PipelineBindPoint::GRAPHICS, pipeline);
/// // 绘制命令...
/// cmd.end()?;
/// ```
pub struct GfxCommandBuffer {
    vk_handle: vk::CommandBuffer,
    gfx_device: Rc<GfxDevice>,
}

// new & init
impl GfxCommandBuffer {
    pub(crate) fn new(gfx_device: Rc<GfxDevice>, command_pool: vk::CommandPool, debug_name: &str) -> GfxResult<Self> {
        let info = vk::CommandBufferAllocateInfo::default()
            .command_pool(command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let command_buffers =
            unsafe { gfx_device.allocate_command_buffers(&info) }.vk_op("vkAllocateCommandBuffers")?;
        let vk_handle = command_buffers[0];
        gfx_device.set_object_debug_name(vk_handle, format!("GfxCommandBuffer::{}", debug_name));

        Ok(Self { vk_handle, gfx_device })
    }
}

// Basic 命令
impl GfxCommandBuffer {
    /// 开始录制 command
    ///
    /// 自动设置 debug label
    #[inline]
    pub fn begin(&self, usage_flag: vk::CommandBufferUsageFlags, debug_label_name: &str) -> GfxResult<()> {
        unsafe {
            self.gfx_device
                .begin_command_buffer(self.vk_handle, &vk::CommandBufferBeginInfo::default().flags(usage_flag))
        }
        .vk_op("vkBeginCommandBuffer")?;
        self.begin_label(debug_label_name, LabelColor::COLOR_CMD);
        Ok(())
    }

    /// 结束录制 command
    ///
    /// 结束 debug label
    #[inline]
    pub fn end(&self) -> GfxResult<()> {
        self.end_label();
        unsafe { self.gfx_device.end_command_buffer(self.vk_handle) }.vk_op("vkEndCommandBuffer")
    }
}

// getters
impl GfxCommandBuffer {
    #[inline]
    pub fn vk_handle(&self) -> vk::CommandBuffer {
        self.vk_handle
    }
}

// 数据传输类型
impl GfxCommandBuffer {
    /// - command type: action
    /// - 支持的 queue：transfer，graphics，compute
    #[inline]
    pub fn cmd_copy_buffer_to_image(&self, copy_info: &vk::CopyBufferToImageInfo2) {
        unsafe { self.gfx_device.cmd_copy_buffer_to_image2(self.vk_handle, copy_info) }
    }

    /// - command type: action
    /// - 支持的 queue：transfer，graphics，compute
    #[inline]
    pub fn cmd_copy_image_to_buffer(&self, copy_info: &vk::CopyImageToBufferInfo2) {
        unsafe { self.gfx_device.cmd_copy_image_to_buffer2(self.vk_handle, copy_info) }
    }

    /// - command type: action
    /// - 支持的 queue：graphics
    #[inline]
    pub fn cmd_blit_image(&self, blit_info: &vk::BlitImageInfo2) {
        unsafe { self.gfx_device.cmd_blit_image2(self.vk_handle, blit_info) }
    }

    /// - command type: state
    /// - 支持的 queue: graphics, compute
    #[inline]
    pub fn cmd_push_constants(
        &self,
        pipeline_layout: vk::PipelineLayout,
        stage: vk::ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) {
        unsafe {
            self.gfx_device.cmd_push_constants(self.vk_handle, pipeline_layout, stage, offset, data);
        }
    }
}

// 绘制类型的命令
impl GfxCommandBuffer {
    /// - command type: action, state
    /// - supported queue types: graphics
    #[inline]
    pub fn cmd_begin_render_pass(&self, begin_info: &vk::RenderPassBeginInfo) {
        unsafe {
            self.gfx_device.cmd_begin_render_pass(self.vk_handle, begin_info, vk::SubpassContents::INLINE);
        }
    }

    /// - command type: action, state
    /// - supported queue types: graphics
    #[inline]
    pub fn cmd_end_render_pass(&self) {
        unsafe {
            self.gfx_device.cmd_end_render_pass(self.vk_handle);
        }
    }

    /// - command type: action
    /// - supported queue types: graphics
    ///
    /// 不使用 index buffer 的绘制
    #[inline]
    pub fn cmd_draw(&self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) {
        unsafe {
            self.gfx_device.cmd_draw(self.vk_handle, vertex_count, instance_count, first_vertex, first_instance);
        }
    }

    /// - command type: state
    /// - supported queue types: graphics, compute
    #[inline]
    pub fn bind_descriptor_sets(
        &self,
        bind_point: vk::PipelineBindPoint,
        pipeline_layout: vk::PipelineLayout,
        first_set: u32,
        descriptor_sets: &[vk::DescriptorSet],
    ) {
        unsafe {
            self.gfx_device.cmd_bind_descriptor_sets(
                self.vk_handle,
                bind_point,
                pipeline_layout,
                first_set,
                descriptor_sets,
                &[],
            );
        }
    }

    /// - command type: state
    /// - supported queue types: graphics, compute
    #[inline]
    pub fn cmd_bind_pipeline(&self, bind_point: vk::PipelineBindPoint, pipeline: vk::Pipeline) {
        unsafe {
            self.gfx_device.cmd_bind_pipeline(self.vk_handle, bind_point, pipeline);
        }
    }
}

// 同步相关命令
impl GfxCommandBuffer {
    /// - command type: synchronize
    /// - supported queue types: graphics, compute, transfer
    #[inline]
    pub fn memory_barrier(&self, barriers: &[vk::MemoryBarrier2]) {
        let dependency_info = vk::DependencyInfo::default().memory_barriers(barriers);
        unsafe {
            self.gfx_device.cmd_pipeline_barrier2(self.vk_handle, &dependency_info);
        }
    }

    /// - command type: synchronize
    /// - supported queue types: graphics, compute, transfer
    #[inline]
    pub fn image_memory_barrier(&self, dependency_flags: vk::DependencyFlags, barriers: &[GfxImageBarrier]) {
        let barriers = barriers.iter().map(|b| *b.inner()).collect_vec();
        let dependency_info =
            vk::DependencyInfo::default().image_memory_barriers(&barriers).dependency_flags(dependency_flags);
        unsafe {
            self.gfx_device.cmd_pipeline_barrier2(self.vk_handle, &dependency_info);
        }
    }
}

// debug 相关命令
impl GfxCommandBuffer {
    /// 未开启 debug utils 时什么也不做
    ///
    /// - command type: state, action
    /// - supported queue type: graphics, compute
    #[inline]
    pub fn begin_label(&self, label_name: &str, label_color: [f32; 4]) {
        let Some(debug_utils) = self.gfx_device.debug_utils() else {
            return;
        };
        let Ok(name) = CString::new(label_name) else {
            return;
        };
        unsafe {
            debug_utils.cmd_begin_debug_utils_label(
                self.vk_handle,
                &vk::DebugUtilsLabelEXT::default().label_name(name.as_c_str()).color(label_color),
            );
        }
    }

    /// - command type: state, action
    /// - supported queue type: graphics, compute
    #[inline]
    pub fn end_label(&self) {
        if let Some(debug_utils) = self.gfx_device.debug_utils() {
            unsafe {
                debug_utils.cmd_end_debug_utils_label(self.vk_handle);
            }
        }
    }
}
