//! 采样流程
//!
//! ```text
//! Upload -> Project -> Mip-Generate -> Filter -> Convert -> Download
//! ```
//!
//! 每个阶段录制一个 command buffer，提交后阻塞等待完成。
//! 所有 GPU 资源由 [`ResourceManager`] 持有，这里只保存 handle。

use std::path::Path;

use ash::vk;
use ibl_gfx::commands::command_buffer::LabelColor;
use ibl_gfx::descriptors::{descriptor_set_info::DescriptorSetInfo, sampler::GfxSamplerCreateInfo};
use ibl_gfx::gfx::Gfx;
use ibl_gfx::pipelines::{graphics_pipeline::GraphicsPipelineDesc, render_pass::RenderPassDesc};
use ibl_gfx::resources::{
    handles::ImageHandle,
    image_state::ImageState,
    manager::ResourceManager,
    resource_data::ImageCreateDesc,
};

use crate::collaborators::{HdrImage, ImageCodec, ImageCrateCodec, ShaderCompiler, ShaderStage, compile_shader_file};
use crate::error::{IblError, IblResult};
use crate::format::{FormatInfo, WORKING_FORMAT};
use crate::ktx::{ContainerFormat, KtxTexture, KtxWriter};
use crate::mip::{full_mip_count, mip_side, roughness_for_mip};
use crate::push_constant::{Distribution, FilterPushConstant};
use crate::request::SampleRequest;

const VERTEX_SHADER: &str = "primitive.vert";
const FRAGMENT_SHADER: &str = "filter.frag";

const ENTRY_PANORAMA_TO_CUBE: &str = "panoramaToCubeMap";
const ENTRY_FILTER: &str = "filterCubeMap";
const ENTRY_FILTER_WITH_LUT: &str = "filterCubeMapWithLut";

const CUBE_FACES: u32 = 6;

/// 使用 `image` crate 作为图像编解码器执行一次采样
pub fn sample(request: &SampleRequest, compiler: &dyn ShaderCompiler) -> IblResult<()> {
    sample_with_codec(request, compiler, &ImageCrateCodec)
}

pub fn sample_with_codec(
    request: &SampleRequest,
    compiler: &dyn ShaderCompiler,
    codec: &dyn ImageCodec,
) -> IblResult<()> {
    tracy_client::Client::start();
    let _span = tracy_client::span!("sample");

    // 所有与设备无关的检查都在初始化 vulkan 之前完成
    let (request, source) = prepare(request, codec)?;

    let mut gfx = Gfx::new(&request.gfx_create_info()).map_err(|e| {
        log::error!("failed to initialize vulkan: {}", e);
        IblError::VulkanInitializationFailed(e)
    })?;

    let result = IblSampler::new(&mut gfx, &request, compiler, codec).and_then(|sampler| sampler.run(source));
    if let Err(e) = &result {
        log::error!("sampling failed: {}", e);
    }

    gfx.destroy();
    result
}

/// 采样的输入
enum SourceImage {
    Panorama(HdrImage),
    CubeMap(KtxTexture),
}

/// 读取输入并确定最终的分辨率
fn prepare(request: &SampleRequest, codec: &dyn ImageCodec) -> IblResult<(SampleRequest, SourceImage)> {
    let mut request = request.clone();

    if request.output_lut.is_some() && request.distribution == Distribution::Lambertian {
        log::warn!("the brdf lut is not generated for the lambertian distribution");
        request.output_lut = None;
    }

    let source = if request.input_is_cube_map {
        if !request.input_path.exists() {
            log::error!("input cube map {} not found", request.input_path.display());
            return Err(IblError::FileNotFound(request.input_path.clone()));
        }
        let texture = KtxTexture::load(&request.input_path)?;
        validate_cube_input(&texture)?;

        if texture.width() != request.cube_map_resolution {
            log::warn!(
                "cube map resolution {} is replaced by the input side length {}",
                request.cube_map_resolution,
                texture.width()
            );
            request.cube_map_resolution = texture.width();
        }
        request.validate()?;
        SourceImage::CubeMap(texture)
    } else {
        request.validate()?;
        if !request.input_path.exists() {
            log::error!("input panorama {} not found", request.input_path.display());
            return Err(IblError::InputPanoramaFileNotFound(request.input_path.clone()));
        }
        SourceImage::Panorama(codec.load_hdr(&request.input_path)?)
    };

    Ok((request, source))
}

/// 作为输入的 cubemap：6 个面、只有一层、正方形，数据大小与格式一致
pub fn validate_cube_input(texture: &KtxTexture) -> IblResult<()> {
    if texture.face_count() != CUBE_FACES {
        return Err(IblError::InvalidArgument(format!(
            "input cube map must have {} faces, found {}",
            CUBE_FACES,
            texture.face_count()
        )));
    }
    if texture.level_count() != 1 {
        return Err(IblError::InvalidArgument(format!(
            "input cube map must have exactly one level, found {}",
            texture.level_count()
        )));
    }
    if !FormatInfo::is_supported(texture.format()) {
        return Err(IblError::InvalidArgument(format!("input cube map format {:?} is not supported", texture.format())));
    }
    if texture.width() != texture.height() {
        return Err(IblError::InvalidArgument(format!(
            "input cube map faces must be square, found {}x{}",
            texture.width(),
            texture.height()
        )));
    }

    let side = texture.width() as usize;
    let expected = side * side * CUBE_FACES as usize * FormatInfo::pixel_size(texture.format()) as usize;
    let actual = texture.level_data(0)?.len();
    if actual != expected {
        return Err(IblError::InvalidArgument(format!(
            "input cube map holds {} bytes, expected {}",
            actual, expected
        )));
    }
    Ok(())
}

// --- 滤波任务 ---

/// 滤波结果写入的图像
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FilterTarget {
    /// `distribution` 对应的输出
    Main,
    /// 额外的 Lambertian 输出
    Diffuse,
}

/// 一次全屏绘制
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct FilterJob {
    pub target: FilterTarget,
    pub mip: u32,
    /// render area 与 framebuffer 的边长
    pub side: u32,
    /// 是否同时写入 BRDF LUT
    pub with_lut: bool,
    pub push_constant: FilterPushConstant,
}

/// 根据请求展开所有的滤波 pass
pub(crate) fn plan_filter_jobs(request: &SampleRequest) -> Vec<FilterJob> {
    let side = request.cube_map_resolution;
    let job = |target, distribution: Distribution, mip, mip_count, with_lut| FilterJob {
        target,
        mip,
        side: mip_side(side, mip),
        with_lut,
        push_constant: FilterPushConstant {
            roughness: roughness_for_mip(mip, mip_count),
            sample_count: request.sample_count,
            mip_level: mip,
            width: side,
            lod_bias: request.lod_bias,
            distribution: distribution.shader_id(),
        },
    };

    let output_mips = request.output_mip_count();
    let mut jobs = (0..output_mips)
        .map(|mip| {
            job(
                FilterTarget::Main,
                request.distribution,
                mip,
                output_mips,
                mip == 0 && request.output_lut.is_some(),
            )
        })
        .collect::<Vec<_>>();

    if request.needs_diffuse_pass() {
        jobs.push(job(FilterTarget::Diffuse, Distribution::Lambertian, 0, 1, false));
    }
    jobs
}

/// 录制阶段需要的 vulkan 对象
struct FilterPass {
    name: String,
    render_pass: vk::RenderPass,
    framebuffer: vk::Framebuffer,
    pipeline: vk::Pipeline,
    extent: vk::Extent2D,
    push_constant: FilterPushConstant,
    target: ImageHandle,
    mip: u32,
    lut: Option<ImageHandle>,
}

/// 滤波阶段的输出
struct FilterOutputs {
    main: ImageHandle,
    diffuse: Option<ImageHandle>,
    lut: Option<ImageHandle>,
}

/// LUT 的输出方式，由扩展名决定，其余扩展名使用请求的容器版本
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LutOutput {
    Png,
    Hdr,
    Container(ContainerFormat),
}

impl LutOutput {
    pub fn from_path(path: &Path, container: ContainerFormat) -> Self {
        match path.extension().and_then(|ext| ext.to_str()).map(|ext| ext.to_ascii_lowercase()).as_deref() {
            Some("png") => Self::Png,
            Some("hdr") => Self::Hdr,
            _ => Self::Container(container),
        }
    }
}

// --- 转换与回读 ---

/// 只有目标格式与工作格式不同时才需要转换
#[inline]
pub(crate) fn needs_conversion(target: vk::Format) -> bool {
    target != WORKING_FORMAT
}

/// 转换目标：与源 image 相同的 extent、mip 数、layer 数与 flags，只替换格式
pub(crate) fn conversion_create_info(desc: &ImageCreateDesc, format: vk::Format) -> vk::ImageCreateInfo<'static> {
    vk::ImageCreateInfo::default()
        .image_type(desc.image_type)
        .format(format)
        .extent(desc.extent)
        .mip_levels(desc.mip_levels)
        .array_layers(desc.array_layers)
        .flags(desc.flags)
        .samples(vk::SampleCountFlags::TYPE_1)
        .tiling(vk::ImageTiling::OPTIMAL)
        .usage(vk::ImageUsageFlags::TRANSFER_SRC | vk::ImageUsageFlags::TRANSFER_DST)
        .sharing_mode(vk::SharingMode::EXCLUSIVE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
}

/// 回读时一个 staging buffer 对应的区域
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ReadbackRegion {
    pub level: u32,
    pub face: u32,
    pub extent: vk::Extent2D,
    /// staging buffer 的字节数，恰好容纳一个 face
    pub size: vk::DeviceSize,
}

/// 每个 (level, face) 一个区域，level 优先
pub(crate) fn download_plan(desc: &ImageCreateDesc) -> Vec<ReadbackRegion> {
    let pixel_size = FormatInfo::pixel_size(desc.format) as vk::DeviceSize;
    (0..desc.mip_levels)
        .flat_map(|level| {
            let extent = desc.mip_extent(level);
            (0..desc.array_layers).map(move |face| ReadbackRegion {
                level,
                face,
                extent,
                size: extent.width as vk::DeviceSize * extent.height as vk::DeviceSize * pixel_size,
            })
        })
        .collect()
}

fn require_transfer_src(desc: &ImageCreateDesc, stage: &str) -> IblResult<()> {
    if !desc.supports(vk::ImageUsageFlags::TRANSFER_SRC) {
        return Err(IblError::InvalidArgument(format!(
            "{} needs an image created with TRANSFER_SRC, got {:?}",
            stage, desc.usage
        )));
    }
    Ok(())
}

// --- Orchestrator ---

struct IblSampler<'a> {
    gfx: &'a mut Gfx,
    request: &'a SampleRequest,
    compiler: &'a dyn ShaderCompiler,
    codec: &'a dyn ImageCodec,

    /// mip 0 的边长
    side: u32,
    /// 采样源使用完整的 mip 链
    source_mip_count: u32,

    vertex_module: vk::ShaderModule,
    sampler: vk::Sampler,
    /// 6 个 face 作为 color attachment
    render_pass: vk::RenderPass,
}

// 创建
impl<'a> IblSampler<'a> {
    fn new(
        gfx: &'a mut Gfx,
        request: &'a SampleRequest,
        compiler: &'a dyn ShaderCompiler,
        codec: &'a dyn ImageCodec,
    ) -> IblResult<Self> {
        let side = request.cube_map_resolution;
        let source_mip_count = full_mip_count(side);

        let vertex_spirv = compile_shader_file(compiler, &request.shader_dir, VERTEX_SHADER, "main", ShaderStage::Vertex)?;
        let vertex_module = gfx.create_shader_module(&vertex_spirv, "fullscreen")?;

        let sampler = gfx.create_sampler(
            &GfxSamplerCreateInfo::new()
                .address_mode(vk::SamplerAddressMode::MIRRORED_REPEAT)
                .max_lod(source_mip_count as f32 + 1.0),
            "ibl",
        )?;
        let render_pass = Self::create_render_pass(gfx, CUBE_FACES, "cube-faces")?;

        Ok(Self {
            gfx,
            request,
            compiler,
            codec,
            side,
            source_mip_count,
            vertex_module,
            sampler,
            render_pass,
        })
    }
}

// 各个阶段
impl IblSampler<'_> {
    fn run(mut self, source: SourceImage) -> IblResult<()> {
        let request = self.request;
        log::info!(
            "sampling {} ({}px, {} output mips, {} samples, {})",
            request.input_path.display(),
            self.side,
            request.output_mip_count(),
            request.sample_count,
            request.distribution.name()
        );

        let source_cube = self.create_image(
            "source-cube",
            WORKING_FORMAT,
            self.source_mip_count,
            vk::ImageUsageFlags::SAMPLED
                | vk::ImageUsageFlags::TRANSFER_SRC
                | vk::ImageUsageFlags::TRANSFER_DST
                | vk::ImageUsageFlags::COLOR_ATTACHMENT,
            true,
        )?;

        match source {
            SourceImage::Panorama(panorama) => {
                let panorama = self.upload_panorama(&panorama)?;
                self.project(panorama, source_cube)?;
                self.gfx.resources_mut().destroy_image(panorama)?;
            }
            SourceImage::CubeMap(texture) => self.upload_cube_map(&texture, source_cube)?,
        }

        self.generate_mipmaps(source_cube)?;
        let outputs = self.filter(source_cube)?;
        self.gfx.resources_mut().destroy_image(source_cube)?;

        let main = self.convert(outputs.main)?;
        self.save_container(main, &request.output_cubemap, request.container)?;

        if let Some(path) = &request.output_diffuse {
            match outputs.diffuse {
                Some(diffuse) => {
                    let diffuse = self.convert(diffuse)?;
                    self.save_container(diffuse, path, request.container)?;
                }
                // 主输出本身就是 Lambertian
                None => self.save_container(main, path, request.container)?,
            }
        }

        if let (Some(lut), Some(path)) = (outputs.lut, &request.output_lut) {
            self.save_lut(lut, path)?;
        }

        log::info!("sampling finished");
        Ok(())
    }

    /// 全景图上传为 RGBA32F 的 2D 贴图
    fn upload_panorama(&mut self, panorama: &HdrImage) -> IblResult<ImageHandle> {
        let _span = tracy_client::span!("IblSampler::upload_panorama");
        log::info!("uploading panorama {}x{}", panorama.width, panorama.height);

        let ci = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(WORKING_FORMAT)
            .extent(vk::Extent3D {
                width: panorama.width,
                height: panorama.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        let handle = self.gfx.resources_mut().create_image(&ci, "panorama")?;

        self.upload_level0(handle, panorama.as_bytes(), ImageState::SHADER_READ_FRAGMENT)?;
        Ok(handle)
    }

    /// 一次全屏绘制，把全景图投影到 cubemap 的 6 个面
    fn project(&mut self, panorama: ImageHandle, cube: ImageHandle) -> IblResult<()> {
        let _span = tracy_client::span!("IblSampler::project");
        log::info!("projecting panorama to cube map");

        let fragment = self.compile_fragment(ENTRY_PANORAMA_TO_CUBE)?;
        let panorama_view = self.gfx.resources_mut().create_image_view(
            panorama,
            vk::ImageViewType::TYPE_2D,
            WORKING_FORMAT,
            color_range(0, 1, 0, 1),
        )?;

        let mut set_info = DescriptorSetInfo::new();
        set_info.add_combined_image_sampler(
            self.sampler,
            panorama_view,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            None,
            vk::ShaderStageFlags::FRAGMENT,
        );
        let (set_layout, set) = self.gfx.create_descriptor_set(&set_info, "panorama")?;
        self.gfx.write_descriptor_set(&set_info, set);

        let layout = self.gfx.create_pipeline_layout(&[set_layout], &[], "panorama-to-cube")?;
        let pipeline = self.create_pipeline(fragment, self.render_pass, layout, CUBE_FACES, "panorama-to-cube")?;
        let framebuffer = self.create_face_framebuffer(cube, 0, self.render_pass, None, "panorama-to-cube")?;

        let render_pass = self.render_pass;
        let extent = square_extent(self.side);
        self.gfx.one_time_exec("panorama-to-cube", |cmd, resources| {
            cmd.cmd_bind_pipeline(vk::PipelineBindPoint::GRAPHICS, pipeline);
            cmd.bind_descriptor_sets(vk::PipelineBindPoint::GRAPHICS, layout, 0, &[set]);
            cmd.cmd_begin_render_pass(&render_pass_begin_info(render_pass, framebuffer, extent));
            cmd.cmd_draw(3, 1, 0, 0);
            cmd.cmd_end_render_pass();
            resources.mark_image_state(cube, 0..1, ImageState::COLOR_ATTACHMENT_WRITE)
        })?;
        Ok(())
    }

    /// KTX cubemap 先上传到原格式的 image，再 blit 到工作格式的 mip 0
    fn upload_cube_map(&mut self, texture: &KtxTexture, cube: ImageHandle) -> IblResult<()> {
        let _span = tracy_client::span!("IblSampler::upload_cube_map");
        log::info!("uploading cube map {}px ({:?})", texture.width(), texture.format());

        let container = self.create_image(
            "input-cube",
            texture.format(),
            1,
            vk::ImageUsageFlags::TRANSFER_SRC | vk::ImageUsageFlags::TRANSFER_DST,
            true,
        )?;
        self.upload_level0(container, texture.level_data(0)?, ImageState::TRANSFER_SRC)?;

        let side = self.side;
        self.gfx.one_time_exec("cube-to-working-format", |cmd, resources| {
            let src = resources.image(container)?.image;
            let dst = resources.image(cube)?.image;
            resources.transition_image(cmd, cube, 0..1, ImageState::TRANSFER_DST)?;

            let region = mip_blit(0, 0, square_extent(side), CUBE_FACES);
            cmd.cmd_blit_image(&blit_image_info(src, dst, &region, vk::Filter::NEAREST));
            Ok(())
        })?;

        self.gfx.resources_mut().destroy_image(container)?;
        Ok(())
    }

    /// 逐级 blit 生成完整的 mip 链，最后全部转换为 fragment shader 可读
    fn generate_mipmaps(&mut self, cube: ImageHandle) -> IblResult<()> {
        let _span = tracy_client::span!("IblSampler::generate_mipmaps");
        log::info!("generating {} mip levels", self.source_mip_count);

        let mip_count = self.source_mip_count;
        let extent = square_extent(self.side);
        self.gfx.one_time_exec("mipmap", |cmd, resources| {
            let image = resources.image(cube)?.image;
            resources.transition_image(cmd, cube, 0..1, ImageState::TRANSFER_SRC)?;

            for mip in 1..mip_count {
                resources.transition_image(cmd, cube, mip..mip + 1, ImageState::TRANSFER_DST)?;
                let region = mip_blit(mip - 1, mip, extent, CUBE_FACES);
                cmd.cmd_blit_image(&blit_image_info(image, image, &region, vk::Filter::LINEAR));
                resources.transition_image(cmd, cube, mip..mip + 1, ImageState::TRANSFER_SRC)?;
            }

            resources.transition_image(cmd, cube, 0..mip_count, ImageState::SHADER_READ_FRAGMENT)
        })?;
        Ok(())
    }

    /// 对每个输出 mip 做重要性采样
    fn filter(&mut self, source_cube: ImageHandle) -> IblResult<FilterOutputs> {
        let _span = tracy_client::span!("IblSampler::filter");
        let jobs = plan_filter_jobs(self.request);

        let cube_view = self.gfx.resources_mut().create_image_view(
            source_cube,
            vk::ImageViewType::CUBE,
            WORKING_FORMAT,
            color_range(0, self.source_mip_count, 0, CUBE_FACES),
        )?;

        let mut set_info = DescriptorSetInfo::new();
        set_info.add_combined_image_sampler(
            self.sampler,
            cube_view,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            Some(1),
            vk::ShaderStageFlags::FRAGMENT,
        );
        let (set_layout, set) = self.gfx.create_descriptor_set(&set_info, "filter")?;
        self.gfx.write_descriptor_set(&set_info, set);

        let push_constant_range = vk::PushConstantRange {
            stage_flags: vk::ShaderStageFlags::FRAGMENT,
            offset: 0,
            size: size_of::<FilterPushConstant>() as u32,
        };
        let layout = self.gfx.create_pipeline_layout(&[set_layout], &[push_constant_range], "filter")?;

        let fragment = self.compile_fragment(ENTRY_FILTER)?;
        let pipeline = self.create_pipeline(fragment, self.render_pass, layout, CUBE_FACES, "filter")?;

        let attachment_usage = vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_SRC;
        let main = self.create_image(
            self.request.distribution.name(),
            WORKING_FORMAT,
            self.request.output_mip_count(),
            attachment_usage,
            true,
        )?;
        let diffuse = if self.request.needs_diffuse_pass() {
            Some(self.create_image("diffuse", WORKING_FORMAT, 1, attachment_usage, true)?)
        } else {
            None
        };

        // LUT 作为第 7 个 attachment，只出现在 mip 0 的 pass 中
        let lut = match self.request.output_lut {
            Some(_) => {
                let lut = self.create_image("brdf-lut", WORKING_FORMAT, 1, attachment_usage, false)?;
                let lut_view = self.gfx.resources_mut().create_image_view(
                    lut,
                    vk::ImageViewType::TYPE_2D,
                    WORKING_FORMAT,
                    color_range(0, 1, 0, 1),
                )?;
                let render_pass = Self::create_render_pass(self.gfx, CUBE_FACES + 1, "cube-faces-with-lut")?;
                let fragment = self.compile_fragment(ENTRY_FILTER_WITH_LUT)?;
                let pipeline = self.create_pipeline(fragment, render_pass, layout, CUBE_FACES + 1, "filter-with-lut")?;
                Some((lut, lut_view, render_pass, pipeline))
            }
            None => None,
        };

        let mut passes = Vec::with_capacity(jobs.len());
        for job in &jobs {
            let target = match job.target {
                FilterTarget::Main => main,
                FilterTarget::Diffuse => diffuse.ok_or_else(|| {
                    IblError::InvalidArgument("diffuse pass planned without a diffuse target".to_string())
                })?,
            };
            let name = format!("{:?}-mip{}", job.target, job.mip).to_lowercase();

            let (render_pass, pipeline, lut_attachment) = match (&lut, job.with_lut) {
                (Some((lut, lut_view, render_pass, pipeline)), true) => (*render_pass, *pipeline, Some((*lut, *lut_view))),
                _ => (self.render_pass, pipeline, None),
            };
            let framebuffer = self.create_face_framebuffer(
                target,
                job.mip,
                render_pass,
                lut_attachment.map(|(_, view)| view),
                &name,
            )?;

            passes.push(FilterPass {
                name,
                render_pass,
                framebuffer,
                pipeline,
                extent: square_extent(job.side),
                push_constant: job.push_constant,
                target,
                mip: job.mip,
                lut: lut_attachment.map(|(lut, _)| lut),
            });
        }

        log::info!("filtering {} passes", passes.len());
        self.gfx.one_time_exec("filter", |cmd, resources| {
            for pass in &passes {
                log::debug!("{}: {:?}", pass.name, pass.push_constant);
                cmd.begin_label(&pass.name, LabelColor::COLOR_PASS);

                cmd.cmd_bind_pipeline(vk::PipelineBindPoint::GRAPHICS, pass.pipeline);
                cmd.bind_descriptor_sets(vk::PipelineBindPoint::GRAPHICS, layout, 0, &[set]);
                cmd.cmd_push_constants(layout, vk::ShaderStageFlags::FRAGMENT, 0, pass.push_constant.as_bytes());

                cmd.cmd_begin_render_pass(&render_pass_begin_info(pass.render_pass, pass.framebuffer, pass.extent));
                cmd.cmd_draw(3, 1, 0, 0);
                cmd.cmd_end_render_pass();
                cmd.end_label();

                resources.mark_image_state(pass.target, pass.mip..pass.mip + 1, ImageState::COLOR_ATTACHMENT_WRITE)?;
                if let Some(lut) = pass.lut {
                    resources.mark_image_state(lut, 0..1, ImageState::COLOR_ATTACHMENT_WRITE)?;
                }
            }
            Ok(())
        })?;

        Ok(FilterOutputs {
            main,
            diffuse,
            lut: lut.map(|(lut, ..)| lut),
        })
    }

    /// 转换到目标格式；目标格式就是工作格式时直接返回原 image
    fn convert(&mut self, handle: ImageHandle) -> IblResult<ImageHandle> {
        let target_format = self.request.target_format.vk_format();
        if !needs_conversion(target_format) {
            return Ok(handle);
        }

        let _span = tracy_client::span!("IblSampler::convert");
        log::info!("converting to {:?}", target_format);

        let desc = *self.gfx.resources().image_create_info(handle)?;
        require_transfer_src(&desc, "convert")?;
        let ci = conversion_create_info(&desc, target_format);
        let converted = self.gfx.resources_mut().create_image(&ci, format!("converted-{:?}", target_format))?;

        self.gfx.one_time_exec("convert", |cmd, resources| {
            let src = resources.image(handle)?.image;
            let dst = resources.image(converted)?.image;
            resources.transition_image(cmd, handle, 0..desc.mip_levels, ImageState::TRANSFER_SRC)?;
            resources.transition_image(cmd, converted, 0..desc.mip_levels, ImageState::TRANSFER_DST)?;

            let extent = vk::Extent2D {
                width: desc.extent.width,
                height: desc.extent.height,
            };
            for mip in 0..desc.mip_levels {
                let region = mip_blit(mip, mip, extent, desc.array_layers);
                cmd.cmd_blit_image(&blit_image_info(src, dst, &region, vk::Filter::NEAREST));
            }
            Ok(())
        })?;

        self.gfx.resources_mut().destroy_image(handle)?;
        Ok(converted)
    }

    /// 每个 (level, face) 一个 staging buffer，回读后交给 `sink`，随后立即销毁
    fn download(&mut self, handle: ImageHandle, mut sink: impl FnMut(u32, u32, &[u8]) -> IblResult<()>) -> IblResult<()> {
        let _span = tracy_client::span!("IblSampler::download");
        let desc = *self.gfx.resources().image_create_info(handle)?;
        require_transfer_src(&desc, "download")?;

        let plan = download_plan(&desc);
        let mut staging = Vec::with_capacity(plan.len());
        for region in plan {
            let buffer = self.gfx.resources_mut().create_buffer(
                region.size,
                vk::BufferUsageFlags::TRANSFER_DST,
                format!("readback-mip{}-face{}", region.level, region.face),
            )?;
            staging.push((region.level, region.face, region.extent, buffer));
        }

        self.gfx.one_time_exec("download", |cmd, resources| {
            let image = resources.image(handle)?.image;
            resources.transition_image(cmd, handle, 0..desc.mip_levels, ImageState::TRANSFER_SRC)?;

            for (level, face, extent, buffer) in &staging {
                let region = vk::BufferImageCopy2::default()
                    .image_subresource(color_layers(*level, *face, 1))
                    .image_extent(vk::Extent3D {
                        width: extent.width,
                        height: extent.height,
                        depth: 1,
                    });
                let copy_info = vk::CopyImageToBufferInfo2::default()
                    .src_image(image)
                    .src_image_layout(vk::ImageLayout::TRANSFER_SRC_OPTIMAL)
                    .dst_buffer(resources.buffer(*buffer)?.buffer)
                    .regions(std::slice::from_ref(&region));
                cmd.cmd_copy_image_to_buffer(&copy_info);
            }

            // 写入对 host 可见
            cmd.memory_barrier(&[vk::MemoryBarrier2::default()
                .src_stage_mask(vk::PipelineStageFlags2::TRANSFER)
                .src_access_mask(vk::AccessFlags2::TRANSFER_WRITE)
                .dst_stage_mask(vk::PipelineStageFlags2::HOST)
                .dst_access_mask(vk::AccessFlags2::HOST_READ)]);
            Ok(())
        })?;

        for (level, face, _, buffer) in staging {
            let data = self.gfx.resources().read_buffer(buffer)?;
            sink(level, face, &data)?;
            self.gfx.resources_mut().destroy_buffer(buffer)?;
        }
        Ok(())
    }

    /// 回读所有 level 与 face，写入 KTX 文件
    fn save_container(&mut self, handle: ImageHandle, path: &Path, container: ContainerFormat) -> IblResult<()> {
        let desc = *self.gfx.resources().image_create_info(handle)?;
        let mut writer = KtxWriter::new(
            container,
            desc.extent.width,
            desc.extent.height,
            desc.format,
            desc.mip_levels,
            desc.is_cube_compatible(),
        )?;

        self.download(handle, |level, face, data| Ok(writer.write_face(data, face, level)?))?;
        writer.save(path)?;
        Ok(())
    }

    fn save_lut(&mut self, handle: ImageHandle, path: &Path) -> IblResult<()> {
        let output = LutOutput::from_path(path, self.request.container);
        if let LutOutput::Container(container) = output {
            return self.save_container(handle, path, container);
        }

        let mut pixels = Vec::new();
        self.download(handle, |_, _, data| {
            pixels = data.to_vec();
            Ok(())
        })?;

        let image = HdrImage::from_rgba32f_bytes(self.side, self.side, &pixels)?;
        match output {
            LutOutput::Png => self.codec.save_png(path, &image)?,
            _ => self.codec.save_hdr(path, &image)?,
        }
        log::info!("saved {}", path.display());
        Ok(())
    }
}

// tools
impl IblSampler<'_> {
    fn compile_fragment(&mut self, entry_point: &str) -> IblResult<vk::ShaderModule> {
        let spirv = compile_shader_file(
            self.compiler,
            &self.request.shader_dir,
            FRAGMENT_SHADER,
            entry_point,
            ShaderStage::Fragment,
        )?;
        Ok(self.gfx.create_shader_module(&spirv, entry_point)?)
    }

    fn create_render_pass(gfx: &mut Gfx, attachment_count: u32, name: &str) -> IblResult<vk::RenderPass> {
        let mut desc = RenderPassDesc::new();
        for _ in 0..attachment_count {
            desc.add_attachment(WORKING_FORMAT);
        }
        Ok(gfx.create_render_pass(&desc, name)?)
    }

    /// viewport 固定为 mip 0 的大小，shader 根据 mip level 缩放 uv
    fn create_pipeline(
        &mut self,
        fragment: vk::ShaderModule,
        render_pass: vk::RenderPass,
        layout: vk::PipelineLayout,
        attachment_count: u32,
        name: &str,
    ) -> IblResult<vk::Pipeline> {
        // 入口函数在编译时已经重命名为 main
        let mut desc = GraphicsPipelineDesc::new();
        desc.add_shader_stage(self.vertex_module, ShaderStage::Vertex.vk_stage(), c"main")
            .add_shader_stage(fragment, ShaderStage::Fragment.vk_stage(), c"main")
            .add_color_blend_attachment(GraphicsPipelineDesc::opaque_blend_state(), attachment_count)
            .set_render_pass(render_pass)
            .set_pipeline_layout(layout)
            .set_viewport_extent(square_extent(self.side));
        Ok(self.gfx.create_graphics_pipeline(&desc, name)?)
    }

    /// 边长为 `self.side` 的正方形 image，`is_cube` 时为 6 层的 cubemap
    fn create_image(
        &mut self,
        name: &str,
        format: vk::Format,
        mip_levels: u32,
        usage: vk::ImageUsageFlags,
        is_cube: bool,
    ) -> IblResult<ImageHandle> {
        let ci = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width: self.side,
                height: self.side,
                depth: 1,
            })
            .mip_levels(mip_levels)
            .array_layers(if is_cube { CUBE_FACES } else { 1 })
            .flags(if is_cube { vk::ImageCreateFlags::CUBE_COMPATIBLE } else { vk::ImageCreateFlags::empty() })
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        Ok(self.gfx.resources_mut().create_image(&ci, name)?)
    }

    /// `mip` 级的 6 个 face view，可以追加一个额外的 attachment
    fn create_face_framebuffer(
        &mut self,
        handle: ImageHandle,
        mip: u32,
        render_pass: vk::RenderPass,
        extra_attachment: Option<vk::ImageView>,
        name: &str,
    ) -> IblResult<vk::Framebuffer> {
        let resources: &mut ResourceManager = self.gfx.resources_mut();
        let desc = *resources.image_create_info(handle)?;

        let mut attachments = Vec::with_capacity(CUBE_FACES as usize + 1);
        for face in 0..CUBE_FACES {
            attachments.push(resources.create_image_view(
                handle,
                vk::ImageViewType::TYPE_2D,
                desc.format,
                color_range(mip, 1, face, 1),
            )?);
        }
        attachments.extend(extra_attachment);

        Ok(self.gfx.create_framebuffer(render_pass, &attachments, desc.mip_extent(mip), name)?)
    }

    /// 通过 staging buffer 上传 mip 0 的全部 layer
    fn upload_level0(&mut self, handle: ImageHandle, data: &[u8], final_state: ImageState) -> IblResult<()> {
        let desc = *self.gfx.resources().image_create_info(handle)?;
        let staging = self.gfx.resources_mut().create_buffer(
            data.len() as vk::DeviceSize,
            vk::BufferUsageFlags::TRANSFER_SRC,
            "upload",
        )?;
        self.gfx.resources_mut().write_buffer(staging, data)?;

        self.gfx.one_time_exec("upload", |cmd, resources| {
            let image = resources.image(handle)?.image;
            let buffer = resources.buffer(staging)?.buffer;
            resources.transition_image(cmd, handle, 0..1, ImageState::TRANSFER_DST)?;

            let region = vk::BufferImageCopy2::default()
                .image_subresource(color_layers(0, 0, desc.array_layers))
                .image_extent(desc.extent);
            let copy_info = vk::CopyBufferToImageInfo2::default()
                .src_buffer(buffer)
                .dst_image(image)
                .dst_image_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .regions(std::slice::from_ref(&region));
            cmd.cmd_copy_buffer_to_image(&copy_info);

            resources.transition_image(cmd, handle, 0..1, final_state)
        })?;

        self.gfx.resources_mut().destroy_buffer(staging)?;
        Ok(())
    }
}

#[inline]
fn square_extent(side: u32) -> vk::Extent2D {
    vk::Extent2D {
        width: side,
        height: side,
    }
}

#[inline]
fn color_range(base_mip: u32, mip_count: u32, base_layer: u32, layer_count: u32) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        base_mip_level: base_mip,
        level_count: mip_count,
        base_array_layer: base_layer,
        layer_count,
    }
}

#[inline]
fn color_layers(mip: u32, base_layer: u32, layer_count: u32) -> vk::ImageSubresourceLayers {
    vk::ImageSubresourceLayers {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        mip_level: mip,
        base_array_layer: base_layer,
        layer_count,
    }
}

/// 从 `src_mip` 到 `dst_mip` 的整幅 blit，`extent` 为 mip 0 的大小
fn mip_blit(src_mip: u32, dst_mip: u32, extent: vk::Extent2D, layer_count: u32) -> vk::ImageBlit2<'static> {
    let corner = |mip: u32| vk::Offset3D {
        x: mip_side(extent.width, mip) as i32,
        y: mip_side(extent.height, mip) as i32,
        z: 1,
    };
    vk::ImageBlit2::default()
        .src_subresource(color_layers(src_mip, 0, layer_count))
        .src_offsets([vk::Offset3D::default(), corner(src_mip)])
        .dst_subresource(color_layers(dst_mip, 0, layer_count))
        .dst_offsets([vk::Offset3D::default(), corner(dst_mip)])
}

fn blit_image_info<'a>(
    src: vk::Image,
    dst: vk::Image,
    region: &'a vk::ImageBlit2<'static>,
    filter: vk::Filter,
) -> vk::BlitImageInfo2<'a> {
    vk::BlitImageInfo2::default()
        .src_image(src)
        .src_image_layout(vk::ImageLayout::TRANSFER_SRC_OPTIMAL)
        .dst_image(dst)
        .dst_image_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
        .regions(std::slice::from_ref(region))
        .filter(filter)
}

/// load op 为 DONT_CARE，不需要 clear value
#[inline]
fn render_pass_begin_info(
    render_pass: vk::RenderPass,
    framebuffer: vk::Framebuffer,
    extent: vk::Extent2D,
) -> vk::RenderPassBeginInfo<'static> {
    vk::RenderPassBeginInfo::default()
        .render_pass(render_pass)
        .framebuffer(framebuffer)
        .render_area(vk::Rect2D {
            offset: vk::Offset2D::default(),
            extent,
        })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::format::TargetFormat;

    fn request_256() -> SampleRequest {
        SampleRequest {
            cube_map_resolution: 256,
            mip_level_count: 8,
            distribution: Distribution::Ggx,
            target_format: TargetFormat::R16G16B16A16Sfloat,
            ..Default::default()
        }
    }

    #[test]
    fn test_ggx_jobs_with_diffuse() {
        let jobs = plan_filter_jobs(&request_256());
        assert_eq!(jobs.len(), 9);

        let main = jobs.iter().filter(|job| job.target == FilterTarget::Main).collect::<Vec<_>>();
        assert_eq!(main.len(), 8);
        assert_eq!(main.iter().map(|job| job.side).collect::<Vec<_>>(), vec![256, 128, 64, 32, 16, 8, 4, 2]);
        assert_eq!(main[0].push_constant.roughness, 0.0);
        assert_eq!(main[7].push_constant.roughness, 1.0);
        assert!(main.iter().all(|job| job.push_constant.width == 256));
        assert!(main.iter().all(|job| job.push_constant.distribution == 1));
        assert!(main.iter().all(|job| !job.with_lut));

        let diffuse = jobs.last().unwrap();
        assert_eq!(diffuse.target, FilterTarget::Diffuse);
        assert_eq!(diffuse.side, 256);
        assert_eq!(diffuse.push_constant.roughness, 0.0);
        assert_eq!(diffuse.push_constant.distribution, Distribution::Lambertian.shader_id());
    }

    #[test]
    fn test_lut_only_on_first_main_pass() {
        let request = SampleRequest {
            output_lut: Some(PathBuf::from("lut.png")),
            distribution: Distribution::Charlie,
            ..request_256()
        };
        let jobs = plan_filter_jobs(&request);
        assert!(jobs[0].with_lut);
        assert_eq!(jobs.iter().filter(|job| job.with_lut).count(), 1);
        assert_eq!(jobs[0].push_constant.distribution, 2);
    }

    #[test]
    fn test_lambertian_single_pass() {
        let request = SampleRequest {
            distribution: Distribution::Lambertian,
            ..request_256()
        };
        let jobs = plan_filter_jobs(&request);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].target, FilterTarget::Main);
        assert_eq!(jobs[0].push_constant.roughness, 0.0);
    }

    #[test]
    fn test_no_diffuse_output() {
        let request = SampleRequest {
            output_diffuse: None,
            ..request_256()
        };
        assert!(plan_filter_jobs(&request).iter().all(|job| job.target == FilterTarget::Main));
    }

    #[test]
    fn test_mip_blit_offsets() {
        let region = mip_blit(2, 3, square_extent(256), CUBE_FACES);
        assert_eq!(region.src_offsets[1], vk::Offset3D { x: 64, y: 64, z: 1 });
        assert_eq!(region.dst_offsets[1], vk::Offset3D { x: 32, y: 32, z: 1 });
        assert_eq!(region.src_subresource.mip_level, 2);
        assert_eq!(region.dst_subresource.layer_count, 6);

        let same = mip_blit(1, 1, square_extent(8), 1);
        assert_eq!(same.src_offsets, same.dst_offsets);
    }

    #[test]
    fn test_lut_output_kind() {
        let ktx2 = ContainerFormat::Ktx2;
        assert_eq!(LutOutput::from_path(Path::new("lut.png"), ktx2), LutOutput::Png);
        assert_eq!(LutOutput::from_path(Path::new("lut.HDR"), ktx2), LutOutput::Hdr);
        assert_eq!(LutOutput::from_path(Path::new("lut.ktx2"), ktx2), LutOutput::Container(ktx2));
        assert_eq!(LutOutput::from_path(Path::new("lut"), ktx2), LutOutput::Container(ktx2));
        assert_eq!(
            LutOutput::from_path(Path::new("lut.ktx"), ContainerFormat::Ktx1),
            LutOutput::Container(ContainerFormat::Ktx1)
        );
    }

    fn output_desc(side: u32, mip_levels: u32, format: vk::Format) -> ImageCreateDesc {
        let info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width: side,
                height: side,
                depth: 1,
            })
            .mip_levels(mip_levels)
            .array_layers(CUBE_FACES)
            .usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_SRC)
            .flags(vk::ImageCreateFlags::CUBE_COMPATIBLE);
        ImageCreateDesc::from(&info)
    }

    #[test]
    fn test_conversion_skipped_for_working_format() {
        assert!(!needs_conversion(WORKING_FORMAT));
        assert!(!needs_conversion(TargetFormat::R32G32B32A32Sfloat.vk_format()));
        assert!(needs_conversion(TargetFormat::R16G16B16A16Sfloat.vk_format()));
        assert!(needs_conversion(TargetFormat::R8G8B8A8Unorm.vk_format()));
    }

    #[test]
    fn test_conversion_keeps_mips_and_faces() {
        let source = output_desc(256, 8, WORKING_FORMAT);
        let ci = conversion_create_info(&source, vk::Format::R16G16B16A16_SFLOAT);
        let converted = ImageCreateDesc::from(&ci);

        assert_eq!(converted.format, vk::Format::R16G16B16A16_SFLOAT);
        assert_eq!(converted.mip_levels, 8);
        assert_eq!(converted.array_layers, 6);
        assert_eq!(converted.extent, source.extent);
        assert!(converted.is_cube_compatible());
        assert!(converted.supports(vk::ImageUsageFlags::TRANSFER_SRC | vk::ImageUsageFlags::TRANSFER_DST));
    }

    #[test]
    fn test_download_plan_one_buffer_per_face() {
        let desc = output_desc(256, 8, vk::Format::R16G16B16A16_SFLOAT);
        let plan = download_plan(&desc);
        assert_eq!(plan.len(), 8 * 6);

        let writer = KtxWriter::new(ContainerFormat::Ktx2, 256, 256, desc.format, desc.mip_levels, true).unwrap();
        assert_eq!(writer.level_count(), 8);
        assert_eq!(writer.face_count(), 6);

        for level in 0..8 {
            let regions = plan.iter().filter(|region| region.level == level).collect::<Vec<_>>();
            assert_eq!(regions.iter().map(|region| region.face).collect::<Vec<_>>(), vec![0, 1, 2, 3, 4, 5]);

            let side = 256 >> level;
            for region in regions {
                assert_eq!(region.extent, square_extent(side));
                assert_eq!(region.size, (side * side * 8) as vk::DeviceSize);
                assert_eq!(region.size as usize, writer.face_size(level));
            }
        }
        assert_eq!(plan.last().map(|region| region.size), Some(2 * 2 * 8));
    }

    #[test]
    fn test_download_requires_transfer_src() {
        let info = vk::ImageCreateInfo::default().usage(vk::ImageUsageFlags::SAMPLED);
        let sampled_only = ImageCreateDesc::from(&info);
        assert!(matches!(require_transfer_src(&sampled_only, "download"), Err(IblError::InvalidArgument(_))));
        assert!(require_transfer_src(&output_desc(4, 1, WORKING_FORMAT), "download").is_ok());
    }

    fn cube_texture(side: u32, faces: bool, levels: u32) -> KtxTexture {
        let mut writer =
            KtxWriter::new(ContainerFormat::Ktx2, side, side, vk::Format::R8G8B8A8_UNORM, levels, faces).unwrap();
        for level in 0..levels {
            for face in 0..writer.face_count() {
                let data = vec![face as u8; writer.face_size(level)];
                writer.write_face(&data, face, level).unwrap();
            }
        }
        KtxTexture::from_bytes(writer.to_bytes()).unwrap()
    }

    #[test]
    fn test_cube_input_validation() {
        assert!(validate_cube_input(&cube_texture(16, true, 1)).is_ok());
        assert!(matches!(validate_cube_input(&cube_texture(16, false, 1)), Err(IblError::InvalidArgument(_))));
        assert!(matches!(validate_cube_input(&cube_texture(16, true, 2)), Err(IblError::InvalidArgument(_))));
    }

    #[test]
    fn test_ktx1_cube_input_is_accepted() {
        let mut writer = KtxWriter::new(ContainerFormat::Ktx1, 8, 8, vk::Format::R16G16B16A16_SFLOAT, 1, true).unwrap();
        for face in 0..6 {
            writer.write_face(&vec![face as u8; writer.face_size(0)], face, 0).unwrap();
        }
        let texture = KtxTexture::from_bytes(writer.to_bytes()).unwrap();
        assert_eq!(texture.container(), ContainerFormat::Ktx1);
        assert!(validate_cube_input(&texture).is_ok());
        assert_eq!(texture.face_data(3, 0).unwrap()[0], 3);
    }

    #[test]
    fn test_prepare_cube_input_uses_container_side() {
        let path = std::env::temp_dir().join(format!("ibl-sampler-cube-{}.ktx2", std::process::id()));
        let mut writer = KtxWriter::new(ContainerFormat::Ktx2, 32, 32, vk::Format::R16G16B16A16_SFLOAT, 1, true).unwrap();
        for face in 0..6 {
            writer.write_face(&vec![0u8; writer.face_size(0)], face, 0).unwrap();
        }
        writer.save(&path).unwrap();

        let request = SampleRequest {
            input_path: path.clone(),
            input_is_cube_map: true,
            cube_map_resolution: 1024,
            mip_level_count: 6,
            ..Default::default()
        };
        let (resolved, source) = prepare(&request, &ImageCrateCodec).unwrap();
        assert_eq!(resolved.cube_map_resolution, 32);
        assert!(matches!(source, SourceImage::CubeMap(_)));

        // 32px 最多 6 层
        let too_many = SampleRequest {
            mip_level_count: 7,
            ..request
        };
        assert!(matches!(prepare(&too_many, &ImageCrateCodec), Err(IblError::InvalidArgument(_))));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_prepare_rejects_before_device_work() {
        let invalid_mips = SampleRequest {
            cube_map_resolution: 256,
            mip_level_count: 10,
            input_path: PathBuf::from("/nonexistent/panorama.hdr"),
            ..Default::default()
        };
        assert!(matches!(prepare(&invalid_mips, &ImageCrateCodec), Err(IblError::InvalidArgument(_))));

        let missing_input = SampleRequest {
            input_path: PathBuf::from("/nonexistent/panorama.hdr"),
            ..Default::default()
        };
        assert!(matches!(
            prepare(&missing_input, &ImageCrateCodec),
            Err(IblError::InputPanoramaFileNotFound(_))
        ));

        let missing_cube = SampleRequest {
            input_is_cube_map: true,
            ..missing_input
        };
        assert!(matches!(prepare(&missing_cube, &ImageCrateCodec), Err(IblError::FileNotFound(_))));
    }

    #[test]
    fn test_prepare_drops_lut_for_lambertian() {
        let dir = std::env::temp_dir().join(format!("ibl-sampler-prepare-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let panorama = dir.join("panorama.hdr");
        ImageCrateCodec
            .save_hdr(&panorama, &HdrImage::new(2, 1, vec![1.0; 8]).unwrap())
            .unwrap();

        let request = SampleRequest {
            input_path: panorama,
            distribution: Distribution::Lambertian,
            output_lut: Some(dir.join("lut.png")),
            ..Default::default()
        };
        let (resolved, source) = prepare(&request, &ImageCrateCodec).unwrap();
        assert_eq!(resolved.output_lut, None);
        assert!(matches!(source, SourceImage::Panorama(HdrImage { width: 2, height: 1, .. })));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
