/// Conversions between engine device types and Vulkan types
///
/// Pure functions, testable without a GPU.

use ash::vk;
use lumen_engine::lumen::device::{
    BlendMode, BufferUsage, CullMode, DescriptorType, Filter, Format, FrontFace, ImageLayout,
    ImageUsage, MemoryLocation, PipelineBindPoint, PolygonMode, PrimitiveTopology, ShaderStages,
};
use lumen_engine::lumen::Error;

/// Convert an engine Format to a Vulkan format
pub fn format_to_vk(format: Format) -> vk::Format {
    match format {
        Format::Undefined => vk::Format::UNDEFINED,
        Format::R8G8B8A8_UNORM => vk::Format::R8G8B8A8_UNORM,
        Format::R8G8B8A8_SRGB => vk::Format::R8G8B8A8_SRGB,
        Format::B8G8R8A8_UNORM => vk::Format::B8G8R8A8_UNORM,
        Format::B8G8R8A8_SRGB => vk::Format::B8G8R8A8_SRGB,
        Format::R16G16B16A16_SFLOAT => vk::Format::R16G16B16A16_SFLOAT,
        Format::R32G32B32A32_SFLOAT => vk::Format::R32G32B32A32_SFLOAT,
        Format::D32_SFLOAT => vk::Format::D32_SFLOAT,
    }
}

/// Convert a Vulkan format back to an engine Format
///
/// Formats the engine does not model map to `Format::Undefined`.
pub fn format_from_vk(format: vk::Format) -> Format {
    match format {
        vk::Format::R8G8B8A8_UNORM => Format::R8G8B8A8_UNORM,
        vk::Format::R8G8B8A8_SRGB => Format::R8G8B8A8_SRGB,
        vk::Format::B8G8R8A8_UNORM => Format::B8G8R8A8_UNORM,
        vk::Format::B8G8R8A8_SRGB => Format::B8G8R8A8_SRGB,
        vk::Format::R16G16B16A16_SFLOAT => Format::R16G16B16A16_SFLOAT,
        vk::Format::R32G32B32A32_SFLOAT => Format::R32G32B32A32_SFLOAT,
        vk::Format::D32_SFLOAT => Format::D32_SFLOAT,
        _ => Format::Undefined,
    }
}

pub fn aspect_for_format(format: Format) -> vk::ImageAspectFlags {
    if format.is_depth() {
        vk::ImageAspectFlags::DEPTH
    } else {
        vk::ImageAspectFlags::COLOR
    }
}

pub fn image_layout_to_vk(layout: ImageLayout) -> vk::ImageLayout {
    match layout {
        ImageLayout::Undefined => vk::ImageLayout::UNDEFINED,
        ImageLayout::General => vk::ImageLayout::GENERAL,
        ImageLayout::ColorAttachmentOptimal => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        ImageLayout::DepthAttachmentOptimal => vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
        ImageLayout::ShaderReadOnlyOptimal => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        ImageLayout::TransferSrcOptimal => vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        ImageLayout::TransferDstOptimal => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        ImageLayout::PresentSrc => vk::ImageLayout::PRESENT_SRC_KHR,
    }
}

pub fn buffer_usage_to_vk(usage: BufferUsage) -> vk::BufferUsageFlags {
    let mut flags = vk::BufferUsageFlags::empty();
    if usage.contains(BufferUsage::TRANSFER_SRC) {
        flags |= vk::BufferUsageFlags::TRANSFER_SRC;
    }
    if usage.contains(BufferUsage::TRANSFER_DST) {
        flags |= vk::BufferUsageFlags::TRANSFER_DST;
    }
    if usage.contains(BufferUsage::UNIFORM) {
        flags |= vk::BufferUsageFlags::UNIFORM_BUFFER;
    }
    if usage.contains(BufferUsage::STORAGE) {
        flags |= vk::BufferUsageFlags::STORAGE_BUFFER;
    }
    if usage.contains(BufferUsage::INDEX) {
        flags |= vk::BufferUsageFlags::INDEX_BUFFER;
    }
    if usage.contains(BufferUsage::VERTEX) {
        flags |= vk::BufferUsageFlags::VERTEX_BUFFER;
    }
    if usage.contains(BufferUsage::SHADER_DEVICE_ADDRESS) {
        flags |= vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS;
    }
    flags
}

pub fn image_usage_to_vk(usage: ImageUsage) -> vk::ImageUsageFlags {
    let mut flags = vk::ImageUsageFlags::empty();
    if usage.contains(ImageUsage::TRANSFER_SRC) {
        flags |= vk::ImageUsageFlags::TRANSFER_SRC;
    }
    if usage.contains(ImageUsage::TRANSFER_DST) {
        flags |= vk::ImageUsageFlags::TRANSFER_DST;
    }
    if usage.contains(ImageUsage::SAMPLED) {
        flags |= vk::ImageUsageFlags::SAMPLED;
    }
    if usage.contains(ImageUsage::STORAGE) {
        flags |= vk::ImageUsageFlags::STORAGE;
    }
    if usage.contains(ImageUsage::COLOR_ATTACHMENT) {
        flags |= vk::ImageUsageFlags::COLOR_ATTACHMENT;
    }
    if usage.contains(ImageUsage::DEPTH_STENCIL_ATTACHMENT) {
        flags |= vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT;
    }
    flags
}

pub fn shader_stages_to_vk(stages: ShaderStages) -> vk::ShaderStageFlags {
    let mut flags = vk::ShaderStageFlags::empty();
    if stages.contains(ShaderStages::VERTEX) {
        flags |= vk::ShaderStageFlags::VERTEX;
    }
    if stages.contains(ShaderStages::FRAGMENT) {
        flags |= vk::ShaderStageFlags::FRAGMENT;
    }
    if stages.contains(ShaderStages::COMPUTE) {
        flags |= vk::ShaderStageFlags::COMPUTE;
    }
    flags
}

pub fn descriptor_type_to_vk(descriptor_type: DescriptorType) -> vk::DescriptorType {
    match descriptor_type {
        DescriptorType::Sampler => vk::DescriptorType::SAMPLER,
        DescriptorType::CombinedImageSampler => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        DescriptorType::SampledImage => vk::DescriptorType::SAMPLED_IMAGE,
        DescriptorType::StorageImage => vk::DescriptorType::STORAGE_IMAGE,
        DescriptorType::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
        DescriptorType::StorageBuffer => vk::DescriptorType::STORAGE_BUFFER,
        DescriptorType::UniformBufferDynamic => vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
        DescriptorType::StorageBufferDynamic => vk::DescriptorType::STORAGE_BUFFER_DYNAMIC,
    }
}

pub fn filter_to_vk(filter: Filter) -> vk::Filter {
    match filter {
        Filter::Nearest => vk::Filter::NEAREST,
        Filter::Linear => vk::Filter::LINEAR,
    }
}

pub fn memory_location_to_allocator(location: MemoryLocation) -> gpu_allocator::MemoryLocation {
    match location {
        MemoryLocation::GpuOnly => gpu_allocator::MemoryLocation::GpuOnly,
        MemoryLocation::CpuToGpu => gpu_allocator::MemoryLocation::CpuToGpu,
        MemoryLocation::GpuToCpu => gpu_allocator::MemoryLocation::GpuToCpu,
    }
}

pub fn bind_point_to_vk(bind_point: PipelineBindPoint) -> vk::PipelineBindPoint {
    match bind_point {
        PipelineBindPoint::Graphics => vk::PipelineBindPoint::GRAPHICS,
        PipelineBindPoint::Compute => vk::PipelineBindPoint::COMPUTE,
    }
}

// ===== RASTERIZATION =====

pub fn topology_to_vk(topology: PrimitiveTopology) -> vk::PrimitiveTopology {
    match topology {
        PrimitiveTopology::PointList => vk::PrimitiveTopology::POINT_LIST,
        PrimitiveTopology::LineList => vk::PrimitiveTopology::LINE_LIST,
        PrimitiveTopology::LineStrip => vk::PrimitiveTopology::LINE_STRIP,
        PrimitiveTopology::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
        PrimitiveTopology::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
    }
}

pub fn polygon_mode_to_vk(mode: PolygonMode) -> vk::PolygonMode {
    match mode {
        PolygonMode::Fill => vk::PolygonMode::FILL,
        PolygonMode::Line => vk::PolygonMode::LINE,
        PolygonMode::Point => vk::PolygonMode::POINT,
    }
}

pub fn cull_mode_to_vk(mode: CullMode) -> vk::CullModeFlags {
    match mode {
        CullMode::None => vk::CullModeFlags::NONE,
        CullMode::Front => vk::CullModeFlags::FRONT,
        CullMode::Back => vk::CullModeFlags::BACK,
        CullMode::FrontAndBack => vk::CullModeFlags::FRONT_AND_BACK,
    }
}

pub fn front_face_to_vk(face: FrontFace) -> vk::FrontFace {
    match face {
        FrontFace::CounterClockwise => vk::FrontFace::COUNTER_CLOCKWISE,
        FrontFace::Clockwise => vk::FrontFace::CLOCKWISE,
    }
}

/// Depth state of a pipeline
///
/// Reverse-Z: depth is cleared to 0 and nearer fragments are greater. With
/// the test off nothing is compared or written, even if a depth attachment
/// is bound.
pub fn depth_stencil_state(depth_test: bool, depth_write: bool) -> vk::PipelineDepthStencilStateCreateInfo<'static> {
    let state = vk::PipelineDepthStencilStateCreateInfo::default()
        .stencil_test_enable(false)
        .depth_bounds_test_enable(false)
        .min_depth_bounds(0.0)
        .max_depth_bounds(1.0);
    if depth_test {
        state
            .depth_test_enable(true)
            .depth_write_enable(depth_write)
            .depth_compare_op(vk::CompareOp::GREATER_OR_EQUAL)
    } else {
        state
            .depth_test_enable(false)
            .depth_write_enable(false)
            .depth_compare_op(vk::CompareOp::NEVER)
    }
}

/// Color attachment blend state for a blend mode
pub fn blend_attachment(mode: BlendMode) -> vk::PipelineColorBlendAttachmentState {
    let state = vk::PipelineColorBlendAttachmentState::default()
        .color_write_mask(vk::ColorComponentFlags::RGBA);

    match mode {
        BlendMode::Disabled => state.blend_enable(false),
        BlendMode::Additive => state
            .blend_enable(true)
            .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
            .dst_color_blend_factor(vk::BlendFactor::ONE)
            .color_blend_op(vk::BlendOp::ADD)
            .src_alpha_blend_factor(vk::BlendFactor::ONE)
            .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
            .alpha_blend_op(vk::BlendOp::ADD),
        BlendMode::AlphaBlend => state
            .blend_enable(true)
            .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
            .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
            .color_blend_op(vk::BlendOp::ADD)
            .src_alpha_blend_factor(vk::BlendFactor::ONE)
            .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
            .alpha_blend_op(vk::BlendOp::ADD),
    }
}

/// Map a failed Vulkan call to an engine error
///
/// Conditions the engine reacts to get their own variant; everything else is
/// logged and becomes `Error::BackendError`.
pub fn vk_error(context: &str, result: vk::Result) -> Error {
    match result {
        vk::Result::ERROR_OUT_OF_HOST_MEMORY | vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => {
            lumen_engine::engine_error!("lumen::vulkan", "{}: out of memory ({:?})", context, result);
            Error::OutOfMemory
        }
        vk::Result::ERROR_DEVICE_LOST => {
            lumen_engine::engine_error!("lumen::vulkan", "{}: device lost", context);
            Error::DeviceLost
        }
        vk::Result::TIMEOUT => Error::Timeout,
        vk::Result::ERROR_OUT_OF_POOL_MEMORY => Error::OutOfPoolMemory,
        vk::Result::ERROR_FRAGMENTED_POOL => Error::FragmentedPool,
        vk::Result::ERROR_OUT_OF_DATE_KHR => Error::SurfaceOutOfDate,
        other => lumen_engine::engine_err!("lumen::vulkan", "{}: {:?}", context, other),
    }
}

/// Map a gpu-allocator failure to an engine error
pub fn allocation_error(context: &str, error: gpu_allocator::AllocationError) -> Error {
    match error {
        gpu_allocator::AllocationError::OutOfMemory => {
            lumen_engine::engine_error!("lumen::vulkan", "{}: allocator out of memory", context);
            Error::OutOfMemory
        }
        other => lumen_engine::engine_err!("lumen::vulkan", "{}: {}", context, other),
    }
}

#[cfg(test)]
#[path = "vulkan_conversions_tests.rs"]
mod tests;
