use ash::vk;
use itertools::Itertools;

/// descriptor 绑定的资源
#[derive(Clone, Copy, Debug)]
pub enum BindingResource {
    Buffer(vk::DescriptorBufferInfo),
    Image(vk::DescriptorImageInfo),
}

/// descriptor set 中的一个 binding
#[derive(Clone, Copy, Debug)]
pub struct DescriptorBinding {
    pub binding: u32,
    pub descriptor_type: vk::DescriptorType,
    pub stages: vk::ShaderStageFlags,
    pub resource: BindingResource,
}

/// 声明式地描述一个 descriptor set
///
/// 未指定 binding 时，使用其在列表中的位置作为 binding
#[derive(Default)]
pub struct DescriptorSetInfo {
    bindings: Vec<DescriptorBinding>,
}

// builder
impl DescriptorSetInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_combined_image_sampler(
        &mut self,
        sampler: vk::Sampler,
        image_view: vk::ImageView,
        image_layout: vk::ImageLayout,
        binding: Option<u32>,
        stages: vk::ShaderStageFlags,
    ) -> &mut Self {
        self.push(
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            binding,
            stages,
            BindingResource::Image(vk::DescriptorImageInfo {
                sampler,
                image_view,
                image_layout,
            }),
        )
    }

    pub fn add_uniform(
        &mut self,
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        range: vk::DeviceSize,
        binding: Option<u32>,
        stages: vk::ShaderStageFlags,
    ) -> &mut Self {
        self.push(
            vk::DescriptorType::UNIFORM_BUFFER,
            binding,
            stages,
            BindingResource::Buffer(vk::DescriptorBufferInfo { buffer, offset, range }),
        )
    }

    fn push(
        &mut self,
        descriptor_type: vk::DescriptorType,
        binding: Option<u32>,
        stages: vk::ShaderStageFlags,
        resource: BindingResource,
    ) -> &mut Self {
        let binding = binding.unwrap_or(self.bindings.len() as u32);
        self.bindings.push(DescriptorBinding {
            binding,
            descriptor_type,
            stages,
            resource,
        });
        self
    }
}

// getter
impl DescriptorSetInfo {
    #[inline]
    pub fn bindings(&self) -> &[DescriptorBinding] {
        &self.bindings
    }

    /// 用于创建 descriptor set layout
    pub fn layout_bindings(&self) -> Vec<vk::DescriptorSetLayoutBinding<'static>> {
        self.bindings
            .iter()
            .map(|b| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(b.binding)
                    .descriptor_type(b.descriptor_type)
                    .descriptor_count(1)
                    .stage_flags(b.stages)
            })
            .collect_vec()
    }

    /// 将资源写入 `set` 的 write 操作，引用的资源信息由 self 持有
    pub fn writes(&self, set: vk::DescriptorSet) -> Vec<vk::WriteDescriptorSet<'_>> {
        self.bindings
            .iter()
            .map(|b| {
                let write = vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(b.binding)
                    .dst_array_element(0)
                    .descriptor_type(b.descriptor_type);
                // 选择 buffer ptr 还是 image ptr，是由 descriptor type 控制的
                match &b.resource {
                    BindingResource::Buffer(info) => write.buffer_info(std::slice::from_ref(info)),
                    BindingResource::Image(info) => write.image_info(std::slice::from_ref(info)),
                }
            })
            .collect_vec()
    }
}

#[cfg(test)]
mod tests {
    use ash::vk::Handle;

    use super::*;

    #[test]
    fn test_binding_defaults_to_position() {
        let mut info = DescriptorSetInfo::new();
        info.add_combined_image_sampler(
            vk::Sampler::null(),
            vk::ImageView::null(),
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            None,
            vk::ShaderStageFlags::FRAGMENT,
        )
        .add_uniform(vk::Buffer::null(), 0, 64, None, vk::ShaderStageFlags::VERTEX);

        let bindings = info.bindings();
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[0].binding, 0);
        assert_eq!(bindings[1].binding, 1);
        assert_eq!(bindings[1].descriptor_type, vk::DescriptorType::UNIFORM_BUFFER);
    }

    #[test]
    fn test_binding_override() {
        let mut info = DescriptorSetInfo::new();
        info.add_combined_image_sampler(
            vk::Sampler::null(),
            vk::ImageView::null(),
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            Some(1),
            vk::ShaderStageFlags::FRAGMENT,
        );
        let layout_bindings = info.layout_bindings();
        assert_eq!(layout_bindings[0].binding, 1);
        assert_eq!(layout_bindings[0].descriptor_count, 1);
        assert_eq!(layout_bindings[0].stage_flags, vk::ShaderStageFlags::FRAGMENT);
    }

    #[test]
    fn test_writes_point_at_resources() {
        let mut info = DescriptorSetInfo::new();
        info.add_uniform(vk::Buffer::from_raw(7), 16, 32, None, vk::ShaderStageFlags::FRAGMENT)
            .add_combined_image_sampler(
                vk::Sampler::from_raw(3),
                vk::ImageView::from_raw(5),
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                None,
                vk::ShaderStageFlags::FRAGMENT,
            );

        let set = vk::DescriptorSet::from_raw(11);
        let writes = info.writes(set);
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].dst_set, set);
        assert_eq!(writes[0].descriptor_count, 1);
        let buffer_info = unsafe { &*writes[0].p_buffer_info };
        assert_eq!(buffer_info.buffer.as_raw(), 7);
        assert_eq!(buffer_info.offset, 16);
        let image_info = unsafe { &*writes[1].p_image_info };
        assert_eq!(image_info.image_view.as_raw(), 5);
        assert_eq!(writes[1].dst_binding, 1);
    }
}
