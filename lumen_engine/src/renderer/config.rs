/// Renderer configuration

use crate::descriptor::MAX_SETS_PER_POOL;
use crate::device::{DescriptorType, Format, PoolSizeRatio};

/// Frames recorded while the GPU is still working on earlier ones
pub const FRAME_OVERLAP: usize = 2;

/// Bounded wait on a frame slot fence (1 second)
pub const DEFAULT_FENCE_TIMEOUT_NS: u64 = 1_000_000_000;

/// Renderer configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RendererConfig {
    /// Number of frame slots
    pub frame_overlap: usize,

    /// Frame slot fence and acquire timeout in nanoseconds
    pub fence_timeout_ns: u64,

    /// Sets in the first pool of every descriptor allocator
    pub descriptor_capacity_hint: u32,

    /// Pool composition of the per-frame descriptor allocators
    pub frame_descriptor_ratios: Vec<PoolSizeRatio>,

    /// Pool composition of the global descriptor allocator
    pub global_descriptor_ratios: Vec<PoolSizeRatio>,

    /// Upper bound on sets per descriptor pool
    pub max_sets_per_pool: u32,

    /// Format of the offscreen draw image
    pub draw_image_format: Format,

    /// Format of the depth image
    pub depth_format: Format,

    /// Color the draw image is cleared to every frame
    pub clear_color: [f32; 4],
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            frame_overlap: FRAME_OVERLAP,
            fence_timeout_ns: DEFAULT_FENCE_TIMEOUT_NS,
            descriptor_capacity_hint: 1000,
            frame_descriptor_ratios: vec![
                PoolSizeRatio::new(DescriptorType::StorageImage, 3.0),
                PoolSizeRatio::new(DescriptorType::StorageBuffer, 3.0),
                PoolSizeRatio::new(DescriptorType::UniformBuffer, 3.0),
                PoolSizeRatio::new(DescriptorType::CombinedImageSampler, 4.0),
            ],
            global_descriptor_ratios: vec![
                PoolSizeRatio::new(DescriptorType::StorageImage, 1.0),
                PoolSizeRatio::new(DescriptorType::UniformBuffer, 1.0),
                PoolSizeRatio::new(DescriptorType::CombinedImageSampler, 1.0),
            ],
            max_sets_per_pool: MAX_SETS_PER_POOL,
            draw_image_format: Format::R16G16B16A16_SFLOAT,
            depth_format: Format::D32_SFLOAT,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}
