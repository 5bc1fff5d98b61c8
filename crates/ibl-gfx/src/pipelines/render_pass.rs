use ash::vk;
use itertools::Itertools;

/// 声明式描述只有一个 graphics subpass 的 render pass
///
/// 每个 attachment 都是 color attachment，reference 的序号就是添加的顺序
#[derive(Default)]
pub struct RenderPassDesc {
    attachments: Vec<vk::AttachmentDescription>,
}

// builder
impl RenderPassDesc {
    pub fn new() -> Self {
        Self::default()
    }

    /// 不关心旧内容，结束后保持 COLOR_ATTACHMENT_OPTIMAL
    pub fn add_attachment(&mut self, format: vk::Format) -> &mut Self {
        self.attachments.push(
            vk::AttachmentDescription::default()
                .format(format)
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::DONT_CARE)
                .store_op(vk::AttachmentStoreOp::STORE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL),
        );
        self
    }
}

// getter
impl RenderPassDesc {
    #[inline]
    pub fn attachments(&self) -> &[vk::AttachmentDescription] {
        &self.attachments
    }
}

// tools
impl RenderPassDesc {
    /// 组装 `vk::RenderPassCreateInfo`
    ///
    /// create info 引用的子结构只在回调内有效
    pub fn with_info<R>(&self, f: impl FnOnce(&vk::RenderPassCreateInfo) -> R) -> R {
        let color_refs = (0..self.attachments.len() as u32)
            .map(|attachment| vk::AttachmentReference {
                attachment,
                layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            })
            .collect_vec();

        let subpass = vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs);

        // 上一阶段的 transfer / 采样结束之后才能写入 attachment
        let dependency = vk::SubpassDependency::default()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(vk::PipelineStageFlags::TRANSFER | vk::PipelineStageFlags::FRAGMENT_SHADER)
            .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE);

        let render_pass_info = vk::RenderPassCreateInfo::default()
            .attachments(&self.attachments)
            .subpasses(std::slice::from_ref(&subpass))
            .dependencies(std::slice::from_ref(&dependency));

        f(&render_pass_info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_defaults() {
        let mut desc = RenderPassDesc::new();
        desc.add_attachment(vk::Format::R32G32B32A32_SFLOAT);
        let attach = desc.attachments()[0];
        assert_eq!(attach.load_op, vk::AttachmentLoadOp::DONT_CARE);
        assert_eq!(attach.store_op, vk::AttachmentStoreOp::STORE);
        assert_eq!(attach.samples, vk::SampleCountFlags::TYPE_1);
        assert_eq!(attach.initial_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(attach.final_layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
    }

    #[test]
    fn test_references_follow_append_order() {
        let mut desc = RenderPassDesc::new();
        for _ in 0..7 {
            desc.add_attachment(vk::Format::R32G32B32A32_SFLOAT);
        }
        desc.with_info(|info| {
            assert_eq!(info.attachment_count, 7);
            assert_eq!(info.subpass_count, 1);
            let subpass = unsafe { &*info.p_subpasses };
            assert_eq!(subpass.pipeline_bind_point, vk::PipelineBindPoint::GRAPHICS);
            let refs = unsafe { std::slice::from_raw_parts(subpass.p_color_attachments, 7) };
            for (i, r) in refs.iter().enumerate() {
                assert_eq!(r.attachment, i as u32);
                assert_eq!(r.layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
            }
        });
    }
}
