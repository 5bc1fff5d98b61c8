use slotmap::new_key_type;

// 内部 Key，不直接暴露给外部
new_key_type! {
    /// 内部 Image Handle Key
    pub struct InnerImageHandle;
    /// 内部 Buffer Handle Key
    pub struct InnerBufferHandle;
}

/// Image Handle
///
/// 指向资源管理器中的一个 GPU Image 资源，不拥有该资源
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ImageHandle {
    pub(crate) inner: InnerImageHandle,
}

/// Buffer Handle
///
/// 指向资源管理器中的一个 GPU Buffer 资源，不拥有该资源
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferHandle {
    pub(crate) inner: InnerBufferHandle,
}
