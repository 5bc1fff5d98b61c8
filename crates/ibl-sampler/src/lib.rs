//! 基于图像的光照（IBL）预滤波
//!
//! 把 HDR 全景图或 KTX cubemap 转换为：
//! - 按 roughness 预滤波的 specular mip 链（GGX / Charlie）
//! - Lambertian 漫反射 irradiance
//! - 可选的 BRDF LUT
//!
//! 入口为 [`sample`]，shader 编译器以 trait object 的形式注入

pub mod collaborators;
pub mod config;
pub mod error;
pub mod format;
pub mod ktx;
pub mod mip;
pub mod push_constant;
pub mod request;
pub mod sampler;

pub use collaborators::{GlslcCompiler, ImageCodec, ImageCrateCodec, ShaderCompiler};
pub use config::SamplerConfig;
pub use error::{IblError, IblResult};
pub use format::TargetFormat;
pub use ktx::ContainerFormat;
pub use push_constant::Distribution;
pub use request::{DeviceOptions, SampleRequest};
pub use sampler::{sample, sample_with_codec};
