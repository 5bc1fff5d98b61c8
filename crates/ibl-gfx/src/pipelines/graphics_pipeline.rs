use std::ffi::CStr;

use ash::vk;
use itertools::Itertools;

use crate::pipelines::shader::ShaderStageInfo;

/// 声明式描述一条 graphics pipeline
///
/// 没有顶点输入，也没有 dynamic state：viewport 与 scissor 在创建时固定为 `viewport_extent`
pub struct GraphicsPipelineDesc {
    shader_stages: Vec<ShaderStageInfo>,

    primitive_topology: vk::PrimitiveTopology,
    viewport_extent: vk::Extent2D,

    rasterize_state_info: vk::PipelineRasterizationStateCreateInfo<'static>,
    msaa_sample: vk::SampleCountFlags,

    color_attach_blend_states: Vec<vk::PipelineColorBlendAttachmentState>,

    render_pass: vk::RenderPass,
    pipeline_layout: vk::PipelineLayout,
}

impl Default for GraphicsPipelineDesc {
    fn default() -> Self {
        Self {
            shader_stages: vec![],
            primitive_topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            viewport_extent: vk::Extent2D::default(),
            rasterize_state_info: vk::PipelineRasterizationStateCreateInfo::default()
                .depth_clamp_enable(false)
                .rasterizer_discard_enable(false)
                .polygon_mode(vk::PolygonMode::FILL)
                .line_width(1.0)
                // 全屏三角形，不做剔除
                .cull_mode(vk::CullModeFlags::NONE)
                .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
                .depth_bias_enable(false),
            msaa_sample: vk::SampleCountFlags::TYPE_1,
            color_attach_blend_states: vec![],
            render_pass: vk::RenderPass::null(),
            pipeline_layout: vk::PipelineLayout::null(),
        }
    }
}

// builder
impl GraphicsPipelineDesc {
    pub fn new() -> Self {
        Self::default()
    }

    /// builder
    #[inline]
    pub fn add_shader_stage(
        &mut self,
        module: vk::ShaderModule,
        stage: vk::ShaderStageFlags,
        entry_point: &CStr,
    ) -> &mut Self {
        self.shader_stages.push(ShaderStageInfo::new(module, stage, entry_point));
        self
    }

    /// builder
    ///
    /// 为 `count` 个 color attachment 使用同一个 blend state
    #[inline]
    pub fn add_color_blend_attachment(&mut self, state: vk::PipelineColorBlendAttachmentState, count: u32) -> &mut Self {
        self.color_attach_blend_states.extend(std::iter::repeat_n(state, count as usize));
        self
    }

    /// builder
    #[inline]
    pub fn set_render_pass(&mut self, render_pass: vk::RenderPass) -> &mut Self {
        self.render_pass = render_pass;
        self
    }

    /// builder
    #[inline]
    pub fn set_pipeline_layout(&mut self, pipeline_layout: vk::PipelineLayout) -> &mut Self {
        self.pipeline_layout = pipeline_layout;
        self
    }

    /// builder
    #[inline]
    pub fn set_viewport_extent(&mut self, extent: vk::Extent2D) -> &mut Self {
        self.viewport_extent = extent;
        self
    }

    /// builder
    #[inline]
    pub fn set_primitive_topology(&mut self, topology: vk::PrimitiveTopology) -> &mut Self {
        self.primitive_topology = topology;
        self
    }
}

// getter
impl GraphicsPipelineDesc {
    #[inline]
    pub fn shader_stages(&self) -> &[ShaderStageInfo] {
        &self.shader_stages
    }

    #[inline]
    pub fn color_attachment_count(&self) -> usize {
        self.color_attach_blend_states.len()
    }

    /// 不写入任何混合，直接覆盖
    pub fn opaque_blend_state() -> vk::PipelineColorBlendAttachmentState {
        vk::PipelineColorBlendAttachmentState::default()
            .blend_enable(false)
            .color_write_mask(vk::ColorComponentFlags::RGBA)
    }
}

// tools
impl GraphicsPipelineDesc {
    /// 组装 `vk::GraphicsPipelineCreateInfo`
    ///
    /// create info 引用的子结构只在回调内有效
    pub fn with_info<R>(&self, f: impl FnOnce(&vk::GraphicsPipelineCreateInfo) -> R) -> R {
        let shader_stages_info = self.shader_stages.iter().map(|stage| stage.stage_create_info()).collect_vec();

        let vertex_input_state_info = vk::PipelineVertexInputStateCreateInfo::default();

        let input_assembly_info = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(self.primitive_topology)
            .primitive_restart_enable(false);

        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: self.viewport_extent.width as f32,
            height: self.viewport_extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D::default(),
            extent: self.viewport_extent,
        };
        let viewport_info = vk::PipelineViewportStateCreateInfo::default()
            .viewports(std::slice::from_ref(&viewport))
            .scissors(std::slice::from_ref(&scissor));

        let msaa_info = vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(false)
            .rasterization_samples(self.msaa_sample);

        // 混合设置：需要为每个 color attachment 分别指定
        let color_blend_info = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(&self.color_attach_blend_states)
            .blend_constants([0.0, 0.0, 0.0, 0.0]);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages_info)
            .vertex_input_state(&vertex_input_state_info)
            .input_assembly_state(&input_assembly_info)
            .viewport_state(&viewport_info)
            .rasterization_state(&self.rasterize_state_info)
            .multisample_state(&msaa_info)
            .color_blend_state(&color_blend_info)
            .layout(self.pipeline_layout)
            .render_pass(self.render_pass)
            .subpass(0);

        f(&pipeline_info)
    }
}

#[cfg(test)]
mod tests {
    use ash::vk::Handle;

    use super::*;

    #[test]
    fn test_desc_accumulates_state() {
        let mut desc = GraphicsPipelineDesc::new();
        desc.add_shader_stage(vk::ShaderModule::from_raw(1), vk::ShaderStageFlags::VERTEX, c"main")
            .add_shader_stage(vk::ShaderModule::from_raw(2), vk::ShaderStageFlags::FRAGMENT, c"filterCubeMap")
            .add_color_blend_attachment(GraphicsPipelineDesc::opaque_blend_state(), 6)
            .set_render_pass(vk::RenderPass::from_raw(3))
            .set_pipeline_layout(vk::PipelineLayout::from_raw(4))
            .set_viewport_extent(vk::Extent2D {
                width: 256,
                height: 256,
            });

        assert_eq!(desc.shader_stages().len(), 2);
        assert_eq!(desc.color_attachment_count(), 6);

        desc.with_info(|info| {
            assert_eq!(info.stage_count, 2);
            assert_eq!(info.render_pass.as_raw(), 3);
            assert_eq!(info.layout.as_raw(), 4);
            assert!(info.p_dynamic_state.is_null());

            let blend = unsafe { &*info.p_color_blend_state };
            assert_eq!(blend.attachment_count, 6);

            let viewport_state = unsafe { &*info.p_viewport_state };
            let viewport = unsafe { &*viewport_state.p_viewports };
            assert_eq!(viewport.width, 256.0);

            let raster = unsafe { &*info.p_rasterization_state };
            assert_eq!(raster.cull_mode, vk::CullModeFlags::NONE);

            let stages = unsafe { std::slice::from_raw_parts(info.p_stages, 2) };
            assert_eq!(unsafe { CStr::from_ptr(stages[1].p_name) }, c"filterCubeMap");
        });
    }

    #[test]
    fn test_topology_default_and_override() {
        let mut desc = GraphicsPipelineDesc::new();
        desc.with_info(|info| {
            let ia = unsafe { &*info.p_input_assembly_state };
            assert_eq!(ia.topology, vk::PrimitiveTopology::TRIANGLE_LIST);
        });
        desc.set_primitive_topology(vk::PrimitiveTopology::TRIANGLE_STRIP);
        desc.with_info(|info| {
            let ia = unsafe { &*info.p_input_assembly_state };
            assert_eq!(ia.topology, vk::PrimitiveTopology::TRIANGLE_STRIP);
        });
    }
}
