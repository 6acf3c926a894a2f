/// Plain data types shared by the device capability traits

use bitflags::bitflags;
use crate::device::handle::*;

// ===== EXTENTS =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent2D {
    pub width: u32,
    pub height: u32,
}

impl Extent2D {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Whether either dimension is zero (minimized window)
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent3D {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl Extent3D {
    pub const fn new(width: u32, height: u32, depth: u32) -> Self {
        Self { width, height, depth }
    }

    pub fn to_2d(&self) -> Extent2D {
        Extent2D::new(self.width, self.height)
    }

    /// Number of texels
    pub fn texel_count(&self) -> u64 {
        self.width as u64 * self.height as u64 * self.depth as u64
    }

    /// Full mip chain length for this extent
    pub fn mip_levels(&self) -> u32 {
        let largest = self.width.max(self.height).max(1);
        32 - largest.leading_zeros()
    }
}

// ===== FORMATS AND LAYOUTS =====

/// Image formats used by the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum Format {
    Undefined,
    R8G8B8A8_UNORM,
    R8G8B8A8_SRGB,
    B8G8R8A8_UNORM,
    B8G8R8A8_SRGB,
    R16G16B16A16_SFLOAT,
    R32G32B32A32_SFLOAT,
    D32_SFLOAT,
}

impl Format {
    /// Size of one texel in bytes
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            Format::Undefined => 0,
            Format::R8G8B8A8_UNORM
            | Format::R8G8B8A8_SRGB
            | Format::B8G8R8A8_UNORM
            | Format::B8G8R8A8_SRGB
            | Format::D32_SFLOAT => 4,
            Format::R16G16B16A16_SFLOAT => 8,
            Format::R32G32B32A32_SFLOAT => 16,
        }
    }

    pub fn is_depth(&self) -> bool {
        matches!(self, Format::D32_SFLOAT)
    }
}

/// Image layouts the renderer transitions between
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageLayout {
    Undefined,
    General,
    ColorAttachmentOptimal,
    DepthAttachmentOptimal,
    ShaderReadOnlyOptimal,
    TransferSrcOptimal,
    TransferDstOptimal,
    PresentSrc,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const TRANSFER_SRC = 1 << 0;
        const TRANSFER_DST = 1 << 1;
        const UNIFORM = 1 << 2;
        const STORAGE = 1 << 3;
        const INDEX = 1 << 4;
        const VERTEX = 1 << 5;
        const SHADER_DEVICE_ADDRESS = 1 << 6;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImageUsage: u32 {
        const TRANSFER_SRC = 1 << 0;
        const TRANSFER_DST = 1 << 1;
        const SAMPLED = 1 << 2;
        const STORAGE = 1 << 3;
        const COLOR_ATTACHMENT = 1 << 4;
        const DEPTH_STENCIL_ATTACHMENT = 1 << 5;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStages: u32 {
        const VERTEX = 1 << 0;
        const FRAGMENT = 1 << 1;
        const COMPUTE = 1 << 2;
    }
}

/// Where an allocation lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryLocation {
    /// Device-local, not host visible
    GpuOnly,
    /// Host visible, persistently mapped, for uploads and per-frame uniforms
    CpuToGpu,
    /// Host visible, for readback
    GpuToCpu,
}

// ===== DESCRIPTORS =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DescriptorType {
    Sampler,
    CombinedImageSampler,
    SampledImage,
    StorageImage,
    UniformBuffer,
    StorageBuffer,
    UniformBufferDynamic,
    StorageBufferDynamic,
}

/// Descriptors of one type requested per set, used to size pools
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoolSizeRatio {
    pub descriptor_type: DescriptorType,
    pub ratio: f32,
}

impl PoolSizeRatio {
    pub const fn new(descriptor_type: DescriptorType, ratio: f32) -> Self {
        Self { descriptor_type, ratio }
    }
}

/// Absolute descriptor count of one type in a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorPoolSize {
    pub descriptor_type: DescriptorType,
    pub count: u32,
}

/// One binding of a descriptor set layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorBinding {
    pub binding: u32,
    pub descriptor_type: DescriptorType,
    pub count: u32,
    pub stages: ShaderStages,
}

/// One pending descriptor update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorWrite {
    Image {
        binding: u32,
        descriptor_type: DescriptorType,
        view: ImageViewHandle,
        sampler: SamplerHandle,
        layout: ImageLayout,
    },
    Buffer {
        binding: u32,
        descriptor_type: DescriptorType,
        buffer: BufferHandle,
        offset: u64,
        size: u64,
    },
}

impl DescriptorWrite {
    pub fn binding(&self) -> u32 {
        match self {
            DescriptorWrite::Image { binding, .. } | DescriptorWrite::Buffer { binding, .. } => *binding,
        }
    }
}

// ===== RESOURCES =====

/// Buffer together with its creation parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocatedBuffer {
    pub buffer: BufferHandle,
    pub size: u64,
    pub usage: BufferUsage,
    pub location: MemoryLocation,
}

/// GPU buffers backing one uploaded mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuMeshBuffers {
    pub index_buffer: AllocatedBuffer,
    pub vertex_buffer: AllocatedBuffer,
    /// Device address of `vertex_buffer`, read by the vertex shader
    pub vertex_buffer_address: u64,
}

/// Image creation parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDesc {
    pub extent: Extent3D,
    pub format: Format,
    pub usage: ImageUsage,
    pub mip_levels: u32,
}

/// Image with its default view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocatedImage {
    pub image: ImageHandle,
    pub view: ImageViewHandle,
    pub extent: Extent3D,
    pub format: Format,
    pub mip_levels: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerDesc {
    pub mag_filter: Filter,
    pub min_filter: Filter,
}

impl SamplerDesc {
    pub const fn uniform(filter: Filter) -> Self {
        Self { mag_filter: filter, min_filter: filter }
    }
}

// ===== PIPELINES =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushConstantRange {
    pub stages: ShaderStages,
    pub offset: u32,
    pub size: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineLayoutDesc {
    pub set_layouts: Vec<DescriptorSetLayoutHandle>,
    pub push_constants: Vec<PushConstantRange>,
}

/// Color blending of a graphics pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendMode {
    Disabled,
    Additive,
    AlphaBlend,
}

/// Pipeline type a bind or dispatch targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PipelineBindPoint {
    #[default]
    Graphics,
    Compute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    LineStrip,
    #[default]
    TriangleList,
    TriangleStrip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PolygonMode {
    #[default]
    Fill,
    Line,
    Point,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    #[default]
    None,
    Front,
    Back,
    FrontAndBack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrontFace {
    CounterClockwise,
    #[default]
    Clockwise,
}

/// Dynamic-rendering graphics pipeline description
///
/// Vertices are pulled from a buffer device address, so there is no vertex
/// input state. Viewport and scissor are dynamic. Depth tests use reverse-Z
/// (`GreaterOrEqual`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphicsPipelineDesc {
    pub layout: PipelineLayoutHandle,
    pub vertex_shader: ShaderModuleHandle,
    pub fragment_shader: ShaderModuleHandle,
    pub topology: PrimitiveTopology,
    pub polygon_mode: PolygonMode,
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    pub color_format: Format,
    pub depth_format: Option<Format>,
    pub blend: BlendMode,
    pub depth_test: bool,
    pub depth_write: bool,
}

impl GraphicsPipelineDesc {
    /// Filled triangle lists, no culling, no blending, no depth attachment
    pub fn new(
        layout: PipelineLayoutHandle,
        vertex_shader: ShaderModuleHandle,
        fragment_shader: ShaderModuleHandle,
        color_format: Format,
    ) -> Self {
        Self {
            layout,
            vertex_shader,
            fragment_shader,
            topology: PrimitiveTopology::TriangleList,
            polygon_mode: PolygonMode::Fill,
            cull_mode: CullMode::None,
            front_face: FrontFace::Clockwise,
            color_format,
            depth_format: None,
            blend: BlendMode::Disabled,
            depth_test: false,
            depth_write: false,
        }
    }

    pub fn with_topology(mut self, topology: PrimitiveTopology) -> Self {
        self.topology = topology;
        self
    }

    pub fn with_polygon_mode(mut self, mode: PolygonMode) -> Self {
        self.polygon_mode = mode;
        self
    }

    pub fn with_cull_mode(mut self, cull_mode: CullMode, front_face: FrontFace) -> Self {
        self.cull_mode = cull_mode;
        self.front_face = front_face;
        self
    }

    pub fn with_blend(mut self, blend: BlendMode) -> Self {
        self.blend = blend;
        self
    }

    /// Attach a depth buffer of `format` and test against it
    pub fn with_depth_test(mut self, format: Format, write: bool) -> Self {
        self.depth_format = Some(format);
        self.depth_test = true;
        self.depth_write = write;
        self
    }

    /// Keep the depth attachment format but neither test nor write
    pub fn with_depth_attachment_only(mut self, format: Format) -> Self {
        self.depth_format = Some(format);
        self.depth_test = false;
        self.depth_write = false;
        self
    }
}

/// Single-stage compute pipeline description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComputePipelineDesc {
    pub layout: PipelineLayoutHandle,
    pub shader: ShaderModuleHandle,
}

// ===== RECORDING =====

/// Attachments of a dynamic rendering scope
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderingInfo {
    pub extent: Extent2D,
    pub color_view: ImageViewHandle,
    /// Clear value, `None` to load existing contents
    pub color_clear: Option<[f32; 4]>,
    pub depth_view: Option<ImageViewHandle>,
    pub depth_clear: Option<f32>,
}

/// Result of a successful swapchain acquire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquiredImage {
    pub index: u32,
    /// The swapchain still works but no longer matches the surface
    pub suboptimal: bool,
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
