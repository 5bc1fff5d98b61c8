//! Vulkan GFX 抽象层
//!
//! 面向离线批处理的 Vulkan 封装：设备初始化、资源追踪、单次命令执行、
//! 描述符与管线的声明式构建。所有 Vulkan 对象由 [`gfx::Gfx`] 持有，
//! 并在 [`gfx::Gfx::destroy`] 中按创建的逆序统一销毁。

pub mod commands;
pub mod descriptors;
pub mod error;
pub mod foundation;
pub mod gfx;
pub mod gfx_core;
pub mod pipelines;
pub mod resources;

pub use ash;
pub use ash::vk;
pub use error::{GfxError, GfxResult};
