use std::path::{Path, PathBuf};
use std::rc::Rc;

use ash::vk;

use crate::error::{GfxResult, VkResultExt};
use crate::foundation::device::GfxDevice;

/// 持久化的 pipeline cache
///
/// 创建时尝试从文件中读取初始数据，销毁前写回文件；
/// 读写失败都只会输出警告
pub struct GfxPipelineCache {
    handle: vk::PipelineCache,
    path: PathBuf,
    gfx_device: Rc<GfxDevice>,
}

// 创建与销毁
impl GfxPipelineCache {
    pub fn new(gfx_device: Rc<GfxDevice>, path: &Path) -> GfxResult<Self> {
        let _span = tracy_client::span!("GfxPipelineCache::new");

        if let Some(initial_data) = Self::read_initial_data(path) {
            let ci = vk::PipelineCacheCreateInfo::default().initial_data(&initial_data);
            match unsafe { gfx_device.create_pipeline_cache(&ci, None) } {
                Ok(handle) => {
                    log::info!("pipeline cache loaded from {}: {} bytes", path.display(), initial_data.len());
                    return Ok(Self::wrap(gfx_device, handle, path));
                }
                Err(e) => {
                    log::warn!("pipeline cache {} rejected ({}), starting with an empty cache", path.display(), e);
                }
            }
        }

        let handle = unsafe { gfx_device.create_pipeline_cache(&vk::PipelineCacheCreateInfo::default(), None) }
            .vk_op("vkCreatePipelineCache")?;
        Ok(Self::wrap(gfx_device, handle, path))
    }

    fn wrap(gfx_device: Rc<GfxDevice>, handle: vk::PipelineCache, path: &Path) -> Self {
        gfx_device.set_object_debug_name(handle, "GfxPipelineCache");
        Self {
            handle,
            path: path.to_path_buf(),
            gfx_device,
        }
    }

    /// 写回文件后销毁
    pub fn destroy(self) {
        self.persist();
        unsafe {
            self.gfx_device.destroy_pipeline_cache(self.handle, None);
        }
    }
}

// getter
impl GfxPipelineCache {
    #[inline]
    pub fn handle(&self) -> vk::PipelineCache {
        self.handle
    }
}

// tools
impl GfxPipelineCache {
    /// 文件不存在或者为空时返回 None
    fn read_initial_data(path: &Path) -> Option<Vec<u8>> {
        match std::fs::read(path) {
            Ok(data) if !data.is_empty() => Some(data),
            Ok(_) => {
                log::warn!("pipeline cache {} is empty", path.display());
                None
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("no pipeline cache at {}", path.display());
                None
            }
            Err(e) => {
                log::warn!("failed to read pipeline cache {}: {}", path.display(), e);
                None
            }
        }
    }

    fn persist(&self) {
        let data = match unsafe { self.gfx_device.get_pipeline_cache_data(self.handle) } {
            Ok(data) => data,
            Err(e) => {
                log::warn!("failed to get pipeline cache data: {}", e);
                return;
            }
        };
        match std::fs::write(&self.path, &data) {
            Ok(()) => log::info!("pipeline cache saved to {}: {} bytes", self.path.display(), data.len()),
            Err(e) => log::warn!("failed to write pipeline cache {}: {}", self.path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_initial_data_missing_file() {
        let path = std::env::temp_dir().join("ibl-gfx-missing-pipeline.cache");
        let _ = std::fs::remove_file(&path);
        assert!(GfxPipelineCache::read_initial_data(&path).is_none());
    }

    #[test]
    fn test_read_initial_data_empty_and_present() {
        let path = std::env::temp_dir().join(format!("ibl-gfx-pipeline-{}.cache", std::process::id()));

        std::fs::write(&path, b"").unwrap();
        assert!(GfxPipelineCache::read_initial_data(&path).is_none());

        std::fs::write(&path, [1_u8, 2, 3]).unwrap();
        assert_eq!(GfxPipelineCache::read_initial_data(&path), Some(vec![1, 2, 3]));

        std::fs::remove_file(&path).unwrap();
    }
}
