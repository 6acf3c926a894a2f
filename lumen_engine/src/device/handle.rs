/// Opaque GPU object handles
///
/// Every handle is a `Copy` newtype over the backend's raw 64-bit handle.
/// Zero is the null handle on every backend.

macro_rules! define_handle {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
            pub struct $name(u64);

            impl $name {
                /// The null handle
                pub const NULL: Self = Self(0);

                /// Wrap a raw backend handle
                pub const fn from_raw(raw: u64) -> Self {
                    Self(raw)
                }

                /// Raw backend handle
                pub const fn as_raw(self) -> u64 {
                    self.0
                }

                pub const fn is_null(self) -> bool {
                    self.0 == 0
                }
            }

            impl std::fmt::Display for $name {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    write!(f, "{}({:#x})", stringify!($name), self.0)
                }
            }
        )*
    };
}

define_handle! {
    /// GPU buffer
    BufferHandle,
    /// GPU image
    ImageHandle,
    /// View over an image
    ImageViewHandle,
    SamplerHandle,
    /// Graphics or compute pipeline
    PipelineHandle,
    PipelineLayoutHandle,
    DescriptorSetLayoutHandle,
    DescriptorPoolHandle,
    /// Descriptor set (owned by its pool)
    DescriptorSetHandle,
    CommandPoolHandle,
    /// Command buffer (owned by its pool)
    CommandBufferHandle,
    FenceHandle,
    SemaphoreHandle,
    ShaderModuleHandle,
}
