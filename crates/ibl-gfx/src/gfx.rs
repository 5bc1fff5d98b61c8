use std::path::PathBuf;
use std::rc::Rc;

use ash::vk;
use scopeguard::ScopeGuard;

use crate::commands::{command_buffer::GfxCommandBuffer, command_pool::GfxCommandPool};
use crate::descriptors::{
    descriptor_pool::GfxDescriptorPool, descriptor_set_info::DescriptorSetInfo, sampler::GfxSamplerCreateInfo,
};
use crate::error::{GfxResult, VkResultExt};
use crate::foundation::{device::GfxDevice, mem_allocator::GfxMemAllocator};
use crate::gfx_core::GfxCore;
use crate::pipelines::{
    graphics_pipeline::GraphicsPipelineDesc, pipeline_cache::GfxPipelineCache, render_pass::RenderPassDesc,
};
use crate::resources::manager::ResourceManager;

/// 创建 [`Gfx`] 所需的参数
#[derive(Debug, Clone)]
pub struct GfxCreateInfo {
    pub app_name: String,
    /// 开启 validation layer、debug messenger 以及 object debug name
    pub debug: bool,
    /// 为 None 时优先选择独立显卡
    pub device_index: Option<usize>,
    /// descriptor pool 的规模系数
    pub descriptor_pool_factor: u32,
    pub pipeline_cache_path: PathBuf,
}

impl Default for GfxCreateInfo {
    fn default() -> Self {
        Self {
            app_name: "ibl-sampler".to_string(),
            debug: false,
            device_index: None,
            descriptor_pool_factor: 1,
            pipeline_cache_path: PathBuf::from("pipeline.cache"),
        }
    }
}

/// 初始化过程中已经创建的对象，出错时随 guard 的 drop 销毁
pub(crate) type Rollback<T> = ScopeGuard<T, fn(T)>;

/// 初始化成功后用 [`ScopeGuard::into_inner`] 取出，否则按创建的逆序调用 `destroy`
#[inline]
pub(crate) fn rollback_on_error<T>(value: T, destroy: fn(T)) -> Rollback<T> {
    scopeguard::guard(value, destroy)
}

/// 由 [`Gfx`] 创建并持有的 vulkan 对象，在 [`Gfx::destroy`] 中统一销毁
#[derive(Default)]
struct GfxObjects {
    framebuffers: Vec<vk::Framebuffer>,
    samplers: Vec<vk::Sampler>,
    pipelines: Vec<vk::Pipeline>,
    pipeline_layouts: Vec<vk::PipelineLayout>,
    descriptor_set_layouts: Vec<vk::DescriptorSetLayout>,
    render_passes: Vec<vk::RenderPass>,
    shader_modules: Vec<vk::ShaderModule>,
}

/// 离线计算的 Vulkan 上下文
///
/// 持有 device、queue、command pool、descriptor pool、pipeline cache 以及资源管理器。
/// 通过 [`Gfx::destroy`] 消耗自身，按创建的逆序销毁所有对象
pub struct Gfx {
    core: GfxCore,

    command_pool: GfxCommandPool,
    descriptor_pool: GfxDescriptorPool,
    pipeline_cache: GfxPipelineCache,

    resources: ResourceManager,
    objects: GfxObjects,
}

// 创建与销毁
impl Gfx {
    pub fn new(create_info: &GfxCreateInfo) -> GfxResult<Self> {
        let _span = tracy_client::span!("Gfx::new");
        log::info!("initializing vulkan: {:?}", create_info);

        let core = rollback_on_error(
            GfxCore::new(&create_info.app_name, "ibl-gfx", create_info.debug, create_info.device_index)?,
            GfxCore::destroy,
        );
        let gfx_device = core.gfx_device().clone();

        let command_pool = rollback_on_error(
            GfxCommandPool::new(
                gfx_device.clone(),
                &core.physical_device().gfx_queue_family,
                vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
                "gfx",
            )?,
            GfxCommandPool::destroy,
        );
        let descriptor_pool = rollback_on_error(
            GfxDescriptorPool::new(gfx_device.clone(), create_info.descriptor_pool_factor.max(1))?,
            GfxDescriptorPool::destroy,
        );
        let pipeline_cache = rollback_on_error(
            GfxPipelineCache::new(gfx_device.clone(), &create_info.pipeline_cache_path)?,
            GfxPipelineCache::destroy,
        );

        // allocator 是最后一个可能失败的步骤
        let allocator = GfxMemAllocator::new(
            core.instance.ash_instance(),
            core.physical_device().vk_handle(),
            &gfx_device,
        )?;
        let memory_types = core
            .physical_device()
            .mem_props
            .memory_types_as_slice()
            .iter()
            .map(|t| t.property_flags)
            .collect();
        let resources = ResourceManager::new(gfx_device, allocator, memory_types);

        Ok(Self {
            core: ScopeGuard::into_inner(core),
            command_pool: ScopeGuard::into_inner(command_pool),
            descriptor_pool: ScopeGuard::into_inner(descriptor_pool),
            pipeline_cache: ScopeGuard::into_inner(pipeline_cache),
            resources,
            objects: GfxObjects::default(),
        })
    }

    /// 等待 GPU 空闲后，按创建的逆序销毁所有对象
    pub fn destroy(self) {
        let _span = tracy_client::span!("Gfx::destroy");
        let Self {
            core,
            command_pool,
            descriptor_pool,
            pipeline_cache,
            mut resources,
            objects,
        } = self;

        if let Err(e) = core.gfx_device().wait_idle() {
            log::warn!("device wait idle failed before teardown: {}", e);
        }

        let device = core.gfx_device().clone();
        unsafe {
            objects.framebuffers.iter().for_each(|fb| device.destroy_framebuffer(*fb, None));
            objects.samplers.iter().for_each(|sampler| device.destroy_sampler(*sampler, None));
        }
        resources.destroy_all();
        unsafe {
            objects.pipelines.iter().for_each(|pipeline| device.destroy_pipeline(*pipeline, None));
            objects.pipeline_layouts.iter().for_each(|layout| device.destroy_pipeline_layout(*layout, None));
            objects.descriptor_set_layouts.iter().for_each(|layout| device.destroy_descriptor_set_layout(*layout, None));
        }
        descriptor_pool.destroy();
        pipeline_cache.destroy();
        unsafe {
            objects.render_passes.iter().for_each(|render_pass| device.destroy_render_pass(*render_pass, None));
            objects.shader_modules.iter().for_each(|module| device.destroy_shader_module(*module, None));
        }
        command_pool.destroy();
        resources.destroy();
        drop(device);

        core.destroy();
    }
}

// getter
impl Gfx {
    #[inline]
    pub fn gfx_device(&self) -> &Rc<GfxDevice> {
        self.core.gfx_device()
    }

    #[inline]
    pub fn resources(&self) -> &ResourceManager {
        &self.resources
    }

    #[inline]
    pub fn resources_mut(&mut self) -> &mut ResourceManager {
        &mut self.resources
    }
}

// 创建 vulkan 对象，均由 Gfx 持有
impl Gfx {
    /// spirv 由调用者编译
    pub fn create_shader_module(&mut self, spirv: &[u32], name: &str) -> GfxResult<vk::ShaderModule> {
        let ci = vk::ShaderModuleCreateInfo::default().code(spirv);
        let module = unsafe { self.gfx_device().create_shader_module(&ci, None) }.vk_op("vkCreateShaderModule")?;
        self.gfx_device().set_object_debug_name(module, format!("ShaderModule::{}", name));
        self.objects.shader_modules.push(module);
        Ok(module)
    }

    pub fn create_sampler(&mut self, info: &GfxSamplerCreateInfo, name: &str) -> GfxResult<vk::Sampler> {
        let sampler = unsafe { self.gfx_device().create_sampler(info.inner(), None) }.vk_op("vkCreateSampler")?;
        self.gfx_device().set_object_debug_name(sampler, format!("Sampler::{}", name));
        self.objects.samplers.push(sampler);
        Ok(sampler)
    }

    pub fn create_render_pass(&mut self, desc: &RenderPassDesc, name: &str) -> GfxResult<vk::RenderPass> {
        let render_pass = desc
            .with_info(|info| unsafe { self.gfx_device().create_render_pass(info, None) })
            .vk_op("vkCreateRenderPass")?;
        self.gfx_device().set_object_debug_name(render_pass, format!("RenderPass::{}", name));
        self.objects.render_passes.push(render_pass);
        Ok(render_pass)
    }

    pub fn create_framebuffer(
        &mut self,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
        name: &str,
    ) -> GfxResult<vk::Framebuffer> {
        let ci = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass)
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);
        let framebuffer = unsafe { self.gfx_device().create_framebuffer(&ci, None) }.vk_op("vkCreateFramebuffer")?;
        self.gfx_device().set_object_debug_name(framebuffer, format!("Framebuffer::{}", name));
        self.objects.framebuffers.push(framebuffer);
        Ok(framebuffer)
    }

    pub fn create_pipeline_layout(
        &mut self,
        descriptor_set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
        name: &str,
    ) -> GfxResult<vk::PipelineLayout> {
        let ci = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(descriptor_set_layouts)
            .push_constant_ranges(push_constant_ranges);
        let layout = unsafe { self.gfx_device().create_pipeline_layout(&ci, None) }.vk_op("vkCreatePipelineLayout")?;
        self.gfx_device().set_object_debug_name(layout, format!("PipelineLayout::{}", name));
        self.objects.pipeline_layouts.push(layout);
        Ok(layout)
    }

    /// 使用持久化的 pipeline cache 创建
    pub fn create_graphics_pipeline(&mut self, desc: &GraphicsPipelineDesc, name: &str) -> GfxResult<vk::Pipeline> {
        let _span = tracy_client::span!("Gfx::create_graphics_pipeline");
        let pipeline_cache = self.pipeline_cache.handle();
        let pipelines = desc
            .with_info(|info| unsafe {
                self.gfx_device().create_graphics_pipelines(pipeline_cache, std::slice::from_ref(info), None)
            })
            .vk_op("vkCreateGraphicsPipelines")?;
        let pipeline = pipelines[0];
        self.gfx_device().set_object_debug_name(pipeline, format!("GraphicsPipeline::{}", name));
        self.objects.pipelines.push(pipeline);
        Ok(pipeline)
    }

    /// 根据 `info` 创建 layout 并分配一个 set，资源需要通过 [`Gfx::write_descriptor_set`] 写入
    pub fn create_descriptor_set(
        &mut self,
        info: &DescriptorSetInfo,
        name: &str,
    ) -> GfxResult<(vk::DescriptorSetLayout, vk::DescriptorSet)> {
        let bindings = info.layout_bindings();
        let ci = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
        let layout =
            unsafe { self.gfx_device().create_descriptor_set_layout(&ci, None) }.vk_op("vkCreateDescriptorSetLayout")?;
        self.gfx_device().set_object_debug_name(layout, format!("DescriptorSetLayout::{}", name));
        self.objects.descriptor_set_layouts.push(layout);

        let set = self.descriptor_pool.allocate(layout, name)?;
        Ok((layout, set))
    }

    pub fn write_descriptor_set(&self, info: &DescriptorSetInfo, set: vk::DescriptorSet) {
        let writes = info.writes(set);
        unsafe {
            self.gfx_device().update_descriptor_sets(&writes, &[]);
        }
    }
}

// 命令执行
impl Gfx {
    /// 提交 command buffer 并阻塞等待执行完成
    #[inline]
    pub fn execute(&self, cmd: &GfxCommandBuffer) -> GfxResult<()> {
        self.core.execute(cmd)
    }

    /// 分配一个 command buffer，录制、提交并等待完成，最后释放
    ///
    /// 录制回调可以访问资源管理器，以便追踪 image 的状态
    pub fn one_time_exec<R>(
        &mut self,
        name: &str,
        f: impl FnOnce(&GfxCommandBuffer, &mut ResourceManager) -> GfxResult<R>,
    ) -> GfxResult<R> {
        let _span = tracy_client::span!("Gfx::one_time_exec");
        let cmd = self.command_pool.alloc_command_buffer(name)?;

        let result = Self::record_and_execute(&self.core, &mut self.resources, &cmd, name, f);

        self.command_pool.free_command_buffer(cmd);
        result
    }

    fn record_and_execute<R>(
        core: &GfxCore,
        resources: &mut ResourceManager,
        cmd: &GfxCommandBuffer,
        name: &str,
        f: impl FnOnce(&GfxCommandBuffer, &mut ResourceManager) -> GfxResult<R>,
    ) -> GfxResult<R> {
        cmd.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, name)?;
        let output = f(cmd, resources)?;
        cmd.end()?;
        core.execute(cmd)?;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    #[test]
    fn test_create_info_defaults() {
        let ci = GfxCreateInfo::default();
        assert!(!ci.debug);
        assert_eq!(ci.descriptor_pool_factor, 1);
        assert_eq!(ci.device_index, None);
        assert_eq!(ci.pipeline_cache_path, PathBuf::from("pipeline.cache"));
    }

    struct Part {
        name: &'static str,
        destroyed: Rc<RefCell<Vec<&'static str>>>,
    }

    impl Part {
        fn destroy(self) {
            self.destroyed.borrow_mut().push(self.name);
        }
    }

    /// 与 `Gfx::new` 相同的结构：依次创建，`fail_at` 处返回错误
    fn init_parts(destroyed: &Rc<RefCell<Vec<&'static str>>>, fail_at: Option<usize>) -> Result<Vec<Part>, usize> {
        let make = |index: usize, name: &'static str| {
            if fail_at == Some(index) {
                return Err(index);
            }
            Ok(rollback_on_error(
                Part {
                    name,
                    destroyed: destroyed.clone(),
                },
                Part::destroy,
            ))
        };

        let core = make(0, "core")?;
        let command_pool = make(1, "command-pool")?;
        let descriptor_pool = make(2, "descriptor-pool")?;
        let pipeline_cache = make(3, "pipeline-cache")?;
        Ok(vec![
            ScopeGuard::into_inner(core),
            ScopeGuard::into_inner(command_pool),
            ScopeGuard::into_inner(descriptor_pool),
            ScopeGuard::into_inner(pipeline_cache),
        ])
    }

    #[test]
    fn test_partial_init_rolls_back_in_reverse_order() {
        let destroyed = Rc::new(RefCell::new(Vec::new()));
        assert_eq!(init_parts(&destroyed, Some(3)).err(), Some(3));
        assert_eq!(*destroyed.borrow(), vec!["descriptor-pool", "command-pool", "core"]);

        destroyed.borrow_mut().clear();
        assert_eq!(init_parts(&destroyed, Some(0)).err(), Some(0));
        assert!(destroyed.borrow().is_empty());
    }

    #[test]
    fn test_successful_init_keeps_everything() {
        let destroyed = Rc::new(RefCell::new(Vec::new()));
        let parts = init_parts(&destroyed, None).unwrap();
        assert_eq!(parts.len(), 4);
        assert!(destroyed.borrow().is_empty());

        parts.into_iter().rev().for_each(Part::destroy);
        assert_eq!(*destroyed.borrow(), vec!["pipeline-cache", "descriptor-pool", "command-pool", "core"]);
    }
}
