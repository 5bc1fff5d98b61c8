use std::ops::Range;
use std::rc::Rc;

use ash::vk;
use slotmap::SlotMap;
use vk_mem::Alloc;

use crate::commands::{barrier::GfxImageBarrier, command_buffer::GfxCommandBuffer};
use crate::error::{GfxError, GfxResult, VkResultExt};
use crate::foundation::{device::GfxDevice, mem_allocator::GfxMemAllocator};
use crate::resources::{
    handles::{BufferHandle, ImageHandle, InnerBufferHandle, InnerImageHandle},
    image_state::{ImageState, plan_transitions},
    resource_data::{BufferResource, ImageCreateDesc, ImageResource},
};

/// 资源管理器
///
/// 负责管理所有的 GPU 资源，包括 Buffer、Image 以及 Image 派生出的 ImageView。
/// 使用 SlotMap 存储资源，对外提供轻量级的 Handle。
/// 离线流程没有 frames in flight，所有销毁都是立即执行的。
pub struct ResourceManager {
    /// 存储所有的 Buffer 资源
    buffers: SlotMap<InnerBufferHandle, BufferResource>,
    /// 存储所有的 Image 资源
    images: SlotMap<InnerImageHandle, ImageResource>,

    gfx_device: Rc<GfxDevice>,
    allocator: GfxMemAllocator,

    /// physical device 的 memory type 表，用于输出分配结果
    memory_types: Vec<vk::MemoryPropertyFlags>,
}

// 创建与销毁
impl ResourceManager {
    pub fn new(gfx_device: Rc<GfxDevice>, allocator: GfxMemAllocator, memory_types: Vec<vk::MemoryPropertyFlags>) -> Self {
        Self {
            buffers: SlotMap::with_key(),
            images: SlotMap::with_key(),
            gfx_device,
            allocator,
            memory_types,
        }
    }

    /// 销毁所有资源
    pub fn destroy_all(&mut self) {
        let _span = tracy_client::span!("ResourceManager::destroy_all");
        if !self.images.is_empty() || !self.buffers.is_empty() {
            log::debug!("destroying {} images and {} buffers", self.images.len(), self.buffers.len());
        }

        let images = std::mem::take(&mut self.images);
        for (_, resource) in images {
            self.destroy_image_resource(resource);
        }
        let buffers = std::mem::take(&mut self.buffers);
        for (_, resource) in buffers {
            self.destroy_buffer_resource(resource);
        }
    }

    /// 销毁所有资源，然后销毁 allocator
    pub fn destroy(mut self) {
        self.destroy_all();
        self.allocator.destroy();
    }
}

// --- Buffer API ---
impl ResourceManager {
    /// 创建一个 host visible + host coherent 的 Buffer，用于上传与回读
    ///
    /// Buffer 会被持久映射，直到销毁
    pub fn create_buffer(
        &mut self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        name: impl AsRef<str>,
    ) -> GfxResult<BufferHandle> {
        let _span = tracy_client::span!("ResourceManager::create_buffer");
        let buffer_ci = vk::BufferCreateInfo::default().size(size).usage(usage);
        let alloc_ci = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::AutoPreferHost,
            flags: vk_mem::AllocationCreateFlags::HOST_ACCESS_RANDOM,
            required_flags: vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            ..Default::default()
        };

        let (buffer, mut allocation) =
            unsafe { self.allocator.create_buffer(&buffer_ci, &alloc_ci) }.vk_op("vmaCreateBuffer")?;

        let mapped_ptr = match unsafe { self.allocator.map_memory(&mut allocation) } {
            Ok(ptr) => ptr,
            Err(e) => {
                unsafe { self.allocator.destroy_buffer(buffer, &mut allocation) };
                return Err(GfxError::Vk {
                    op: "vmaMapMemory",
                    result: e,
                });
            }
        };

        self.gfx_device.set_object_debug_name(buffer, format!("Buffer::{}", name.as_ref()));
        log::debug!(
            "buffer {}: {} bytes, memory {:?}",
            name.as_ref(),
            size,
            self.allocation_memory_flags(&allocation)
        );

        let inner = self.buffers.insert(BufferResource {
            buffer,
            allocation,
            size,
            mapped_ptr,
            debug_name: name.as_ref().to_string(),
        });
        Ok(BufferHandle { inner })
    }

    /// 获取 Buffer 资源引用
    pub fn buffer(&self, handle: BufferHandle) -> GfxResult<&BufferResource> {
        self.buffers.get(handle.inner).ok_or(GfxError::ResourceNotFound { kind: "buffer" })
    }

    /// 通过映射指针将 data 写入 buffer 开头
    pub fn write_buffer(&mut self, handle: BufferHandle, data: &[u8]) -> GfxResult<()> {
        let resource = self.buffer(handle)?;
        let ptr = resource.mapped_ptr;
        if data.len() as vk::DeviceSize > resource.size {
            return Err(GfxError::InvalidArgument(format!(
                "writing {} bytes into buffer {} of {} bytes",
                data.len(),
                resource.debug_name,
                resource.size
            )));
        }
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), ptr, data.len());
        }
        Ok(())
    }

    /// 通过映射指针读出 buffer 的全部内容
    pub fn read_buffer(&self, handle: BufferHandle) -> GfxResult<Vec<u8>> {
        let resource = self.buffer(handle)?;
        let ptr = resource.mapped_ptr;
        let mut data = vec![0_u8; resource.size as usize];
        unsafe {
            std::ptr::copy_nonoverlapping(ptr, data.as_mut_ptr(), data.len());
        }
        Ok(data)
    }

    /// 立即销毁 Buffer
    ///
    /// 调用者需要确保 GPU 不再使用该 Buffer
    pub fn destroy_buffer(&mut self, handle: BufferHandle) -> GfxResult<()> {
        let resource = self.buffers.remove(handle.inner).ok_or(GfxError::ResourceNotFound { kind: "buffer" })?;
        self.destroy_buffer_resource(resource);
        Ok(())
    }

    /// 内部方法：执行 Buffer 资源的实际销毁
    fn destroy_buffer_resource(&self, mut resource: BufferResource) {
        unsafe {
            self.allocator.unmap_memory(&mut resource.allocation);
            self.allocator.destroy_buffer(resource.buffer, &mut resource.allocation);
        }
    }
}

// --- Image API ---
impl ResourceManager {
    /// 创建一个 Image，所有 mip 的初始状态为 UNDEFINED
    pub fn create_image(&mut self, create_info: &vk::ImageCreateInfo, name: impl AsRef<str>) -> GfxResult<ImageHandle> {
        let _span = tracy_client::span!("ResourceManager::create_image");
        let alloc_ci = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::AutoPreferDevice,
            ..Default::default()
        };
        let (image, allocation) =
            unsafe { self.allocator.create_image(create_info, &alloc_ci) }.vk_op("vmaCreateImage")?;

        self.gfx_device.set_object_debug_name(image, format!("Image::{}", name.as_ref()));
        let desc = ImageCreateDesc::from(create_info);
        log::debug!(
            "image {}: {}x{} {:?}, {} mips, {} layers, memory {:?}",
            name.as_ref(),
            desc.extent.width,
            desc.extent.height,
            desc.format,
            desc.mip_levels,
            desc.array_layers,
            self.allocation_memory_flags(&allocation)
        );

        let inner = self.images.insert(ImageResource {
            image,
            allocation,
            desc,
            views: Vec::new(),
            mip_states: vec![ImageState::UNDEFINED; desc.mip_levels as usize],
            debug_name: name.as_ref().to_string(),
        });
        Ok(ImageHandle { inner })
    }

    /// 获取 Image 资源引用
    pub fn image(&self, handle: ImageHandle) -> GfxResult<&ImageResource> {
        self.images.get(handle.inner).ok_or(GfxError::ResourceNotFound { kind: "image" })
    }

    /// Image 创建时的参数
    #[inline]
    pub fn image_create_info(&self, handle: ImageHandle) -> GfxResult<&ImageCreateDesc> {
        self.image(handle).map(|image| &image.desc)
    }

    /// 创建一个 ImageView，view 由 image 持有，随 image 一起销毁
    pub fn create_image_view(
        &mut self,
        handle: ImageHandle,
        view_type: vk::ImageViewType,
        format: vk::Format,
        subresource_range: vk::ImageSubresourceRange,
    ) -> GfxResult<vk::ImageView> {
        let _span = tracy_client::span!("ResourceManager::create_image_view");
        let resource = self.images.get_mut(handle.inner).ok_or(GfxError::ResourceNotFound { kind: "image" })?;

        let view_info = vk::ImageViewCreateInfo::default()
            .image(resource.image)
            .view_type(view_type)
            .format(format)
            .subresource_range(subresource_range);
        let view = unsafe { self.gfx_device.create_image_view(&view_info, None) }.vk_op("vkCreateImageView")?;

        self.gfx_device.set_object_debug_name(
            view,
            format!(
                "ImageView::{}::mip{}-layer{}",
                resource.debug_name, subresource_range.base_mip_level, subresource_range.base_array_layer
            ),
        );
        resource.views.push(view);
        Ok(view)
    }

    /// 立即销毁 Image 以及它的所有 view
    ///
    /// 调用者需要确保 GPU 不再使用该 Image
    pub fn destroy_image(&mut self, handle: ImageHandle) -> GfxResult<()> {
        let resource = self.images.remove(handle.inner).ok_or(GfxError::ResourceNotFound { kind: "image" })?;
        self.destroy_image_resource(resource);
        Ok(())
    }

    /// 内部方法：执行 Image 资源的实际销毁
    fn destroy_image_resource(&self, mut resource: ImageResource) {
        unsafe {
            for view in resource.views.drain(..) {
                self.gfx_device.destroy_image_view(view, None);
            }
            self.allocator.destroy_image(resource.image, &mut resource.allocation);
        }
    }
}

// --- Image State API ---
impl ResourceManager {
    /// 将 image 的 `mips` 范围转换到 `new_state`
    ///
    /// 旧状态从记录中读取，连续且旧状态相同的 mip 合并为一个 barrier；
    /// 覆盖所有 array layer
    pub fn transition_image(
        &mut self,
        cmd: &GfxCommandBuffer,
        handle: ImageHandle,
        mips: Range<u32>,
        new_state: ImageState,
    ) -> GfxResult<()> {
        let resource = self.images.get_mut(handle.inner).ok_or(GfxError::ResourceNotFound { kind: "image" })?;
        Self::check_mip_range(resource, &mips)?;

        let barriers = plan_transitions(&resource.mip_states, mips.clone(), new_state)
            .into_iter()
            .map(|transition| {
                GfxImageBarrier::new()
                    .image(resource.image)
                    .src_mask(transition.old_state.stage, transition.old_state.access)
                    .dst_mask(new_state.stage, new_state.access)
                    .layout_transfer(transition.old_state.layout, new_state.layout)
                    .mip_range(transition.base_mip, transition.level_count)
            })
            .collect::<Vec<_>>();
        if !barriers.is_empty() {
            cmd.image_memory_barrier(vk::DependencyFlags::empty(), &barriers);
        }

        resource.mip_states[mips.start as usize..mips.end as usize].fill(new_state);
        Ok(())
    }

    /// 记录 render pass 等隐式完成的状态变化，不产生 barrier
    pub fn mark_image_state(&mut self, handle: ImageHandle, mips: Range<u32>, state: ImageState) -> GfxResult<()> {
        let resource = self.images.get_mut(handle.inner).ok_or(GfxError::ResourceNotFound { kind: "image" })?;
        Self::check_mip_range(resource, &mips)?;
        resource.mip_states[mips.start as usize..mips.end as usize].fill(state);
        Ok(())
    }

    fn check_mip_range(resource: &ImageResource, mips: &Range<u32>) -> GfxResult<()> {
        if mips.start >= mips.end || mips.end > resource.desc.mip_levels {
            return Err(GfxError::InvalidArgument(format!(
                "mip range {:?} invalid for image {} with {} mips",
                mips, resource.debug_name, resource.desc.mip_levels
            )));
        }
        Ok(())
    }
}

// tools
impl ResourceManager {
    fn allocation_memory_flags(&self, allocation: &vk_mem::Allocation) -> vk::MemoryPropertyFlags {
        let info = self.allocator.get_allocation_info(allocation);
        self.memory_types.get(info.memory_type as usize).copied().unwrap_or_default()
    }
}
