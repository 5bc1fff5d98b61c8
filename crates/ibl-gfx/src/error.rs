use ash::vk;

/// GFX 层的错误
#[derive(thiserror::Error, Debug)]
pub enum GfxError {
    #[error("failed to load vulkan entry: {0}")]
    EntryLoading(#[from] ash::LoadingError),

    #[error("{op} failed: {result}")]
    Vk { op: &'static str, result: vk::Result },

    #[error("no suitable physical device: {0}")]
    NoSuitableDevice(String),

    #[error("no queue family supports graphics and transfer")]
    NoSuitableQueue,

    #[error("{kind} handle is not tracked by the resource manager")]
    ResourceNotFound { kind: &'static str },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type GfxResult<T> = Result<T, GfxError>;

/// 为 `VkResult` 附加操作名称
pub trait VkResultExt<T> {
    fn vk_op(self, op: &'static str) -> GfxResult<T>;
}

impl<T> VkResultExt<T> for ash::prelude::VkResult<T> {
    #[inline]
    fn vk_op(self, op: &'static str) -> GfxResult<T> {
        self.map_err(|result| GfxError::Vk { op, result })
    }
}

/// `create_graphics_pipelines` 一类的接口在失败时会同时返回部分结果
impl<T> VkResultExt<T> for Result<T, (T, vk::Result)> {
    #[inline]
    fn vk_op(self, op: &'static str) -> GfxResult<T> {
        self.map_err(|(_, result)| GfxError::Vk { op, result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vk_op_keeps_result_code() {
        let res: ash::prelude::VkResult<()> = Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        match res.vk_op("vkAllocateMemory") {
            Err(GfxError::Vk { op, result }) => {
                assert_eq!(op, "vkAllocateMemory");
                assert_eq!(result, vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
            }
            _ => panic!("expected GfxError::Vk"),
        }
    }

    #[test]
    fn test_vk_op_pipeline_partial_result() {
        let res: Result<Vec<vk::Pipeline>, (Vec<vk::Pipeline>, vk::Result)> =
            Err((vec![vk::Pipeline::null()], vk::Result::ERROR_INITIALIZATION_FAILED));
        assert!(matches!(
            res.vk_op("vkCreateGraphicsPipelines"),
            Err(GfxError::Vk { result: vk::Result::ERROR_INITIALIZATION_FAILED, .. })
        ));
    }
}
