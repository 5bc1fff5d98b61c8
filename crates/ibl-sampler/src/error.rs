use std::path::PathBuf;

use ibl_gfx::GfxError;

use crate::ktx::KtxError;

/// 采样流程的错误，第一个错误会中止后续所有阶段
#[derive(thiserror::Error, Debug)]
pub enum IblError {
    #[error("vulkan initialization failed: {0}")]
    VulkanInitializationFailed(GfxError),

    #[error("vulkan error: {0}")]
    VulkanError(GfxError),

    #[error("input panorama not found: {}", .0.display())]
    InputPanoramaFileNotFound(PathBuf),

    #[error("shader source not found: {}", .0.display())]
    ShaderFileNotFound(PathBuf),

    #[error("shader compilation failed for {name}: {message}")]
    ShaderCompilationFailed { name: String, message: String },

    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("ktx error: {0}")]
    KtxError(#[from] KtxError),

    #[error("image codec error: {0}")]
    ImageCodecError(String),
}

/// 初始化之后的 vulkan 错误
///
/// 初始化阶段的错误需要显式映射为 [`IblError::VulkanInitializationFailed`]
impl From<GfxError> for IblError {
    fn from(e: GfxError) -> Self {
        Self::VulkanError(e)
    }
}

pub type IblResult<T> = Result<T, IblError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gfx_error_maps_to_vulkan_error() {
        let err: IblError = GfxError::NoSuitableQueue.into();
        assert!(matches!(err, IblError::VulkanError(GfxError::NoSuitableQueue)));
    }

    #[test]
    fn test_display_contains_path() {
        let err = IblError::InputPanoramaFileNotFound(PathBuf::from("missing.hdr"));
        assert!(err.to_string().contains("missing.hdr"));
    }
}
