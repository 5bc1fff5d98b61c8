use ash::vk;

/// sampler 的创建参数
///
/// sampler 本身由 [`crate::gfx::Gfx::create_sampler`] 创建并持有
#[derive(Clone, Copy)]
pub struct GfxSamplerCreateInfo {
    inner: vk::SamplerCreateInfo<'static>,
}

impl Default for GfxSamplerCreateInfo {
    fn default() -> Self {
        let sampler_info = vk::SamplerCreateInfo::default()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .anisotropy_enable(false)
            .max_anisotropy(1.0)
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false)
            .compare_enable(false)
            .compare_op(vk::CompareOp::NEVER)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .mip_lod_bias(0.0)
            .min_lod(0.0)
            .max_lod(1.0);

        Self { inner: sampler_info }
    }
}

impl GfxSamplerCreateInfo {
    /// 默认配置：linear，repeat
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// builder
    #[inline]
    pub fn address_mode(mut self, mode: vk::SamplerAddressMode) -> Self {
        self.inner.address_mode_u = mode;
        self.inner.address_mode_v = mode;
        self.inner.address_mode_w = mode;
        self
    }

    /// builder
    #[inline]
    pub fn max_lod(mut self, max_lod: f32) -> Self {
        self.inner.max_lod = max_lod;
        self
    }

    #[inline]
    pub fn inner(&self) -> &vk::SamplerCreateInfo<'static> {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sampler_builder() {
        let info = GfxSamplerCreateInfo::new().address_mode(vk::SamplerAddressMode::MIRRORED_REPEAT).max_lod(12.0);
        let inner = info.inner();
        assert_eq!(inner.address_mode_u, vk::SamplerAddressMode::MIRRORED_REPEAT);
        assert_eq!(inner.address_mode_w, vk::SamplerAddressMode::MIRRORED_REPEAT);
        assert_eq!(inner.min_filter, vk::Filter::LINEAR);
        assert_eq!(inner.mipmap_mode, vk::SamplerMipmapMode::LINEAR);
        assert_eq!(inner.max_lod, 12.0);
    }
}
