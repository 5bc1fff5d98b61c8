use std::path::{Path, PathBuf};

/// 统一资源路径管理
///
/// 所有路径基于工作区根目录（通过 `CARGO_MANIFEST_DIR` 推导）。
///
/// # 使用示例
/// ```ignore
/// let frag = IblPath::shader_path("filter.frag"); // shader/filter.frag
/// ```
pub struct IblPath {}
// 核心路径
impl IblPath {
    /// 获取工作区根目录
    ///
    /// 当前 crate 位于 `crates/ibl-crate-tools`，因此向上两级
    pub fn workspace_path() -> PathBuf {
        let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
        manifest_dir.ancestors().nth(2).unwrap_or(manifest_dir).to_path_buf()
    }
}
// 根目录下
impl IblPath {
    /// GLSL 源码所在的目录
    pub fn shader_root_path() -> PathBuf {
        Self::workspace_path().join("shader")
    }

    /// 获取 `shader/` 目录下的文件路径
    pub fn shader_path(filename: &str) -> PathBuf {
        Self::shader_root_path().join(filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_contains_crates_dir() {
        let root = IblPath::workspace_path();
        assert!(root.join("crates").join("ibl-crate-tools").exists());
    }

    #[test]
    fn test_shader_path_under_shader_root() {
        let path = IblPath::shader_path("filter.frag");
        assert!(path.starts_with(IblPath::shader_root_path()));
        assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("filter.frag"));
    }
}
