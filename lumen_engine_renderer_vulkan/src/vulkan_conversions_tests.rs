//! Unit tests for vulkan_conversions.rs
//!
//! Pure mapping checks, no GPU required.

use ash::vk;
use lumen_engine::lumen::device::*;
use lumen_engine::lumen::Error;
use super::*;

// ============================================================================
// FORMATS
// ============================================================================

#[test]
fn test_format_round_trips_for_modeled_formats() {
    for format in [
        Format::R8G8B8A8_UNORM,
        Format::R8G8B8A8_SRGB,
        Format::B8G8R8A8_UNORM,
        Format::B8G8R8A8_SRGB,
        Format::R16G16B16A16_SFLOAT,
        Format::R32G32B32A32_SFLOAT,
        Format::D32_SFLOAT,
    ] {
        assert_eq!(format_from_vk(format_to_vk(format)), format);
    }
}

#[test]
fn test_unknown_vk_format_is_undefined() {
    assert_eq!(format_from_vk(vk::Format::A2B10G10R10_UNORM_PACK32), Format::Undefined);
    assert_eq!(format_to_vk(Format::Undefined), vk::Format::UNDEFINED);
}

#[test]
fn test_depth_aspect() {
    assert_eq!(aspect_for_format(Format::D32_SFLOAT), vk::ImageAspectFlags::DEPTH);
    assert_eq!(aspect_for_format(Format::R16G16B16A16_SFLOAT), vk::ImageAspectFlags::COLOR);
}

#[test]
fn test_layouts() {
    assert_eq!(image_layout_to_vk(ImageLayout::PresentSrc), vk::ImageLayout::PRESENT_SRC_KHR);
    assert_eq!(
        image_layout_to_vk(ImageLayout::DepthAttachmentOptimal),
        vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL
    );
    assert_eq!(image_layout_to_vk(ImageLayout::General), vk::ImageLayout::GENERAL);
}

// ============================================================================
// FLAGS
// ============================================================================

#[test]
fn test_mesh_vertex_buffer_usage() {
    let flags = buffer_usage_to_vk(
        BufferUsage::STORAGE | BufferUsage::TRANSFER_DST | BufferUsage::SHADER_DEVICE_ADDRESS,
    );
    assert_eq!(
        flags,
        vk::BufferUsageFlags::STORAGE_BUFFER
            | vk::BufferUsageFlags::TRANSFER_DST
            | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS
    );
    assert_eq!(buffer_usage_to_vk(BufferUsage::empty()), vk::BufferUsageFlags::empty());
}

#[test]
fn test_draw_image_usage() {
    let flags = image_usage_to_vk(
        ImageUsage::TRANSFER_SRC | ImageUsage::TRANSFER_DST | ImageUsage::STORAGE | ImageUsage::COLOR_ATTACHMENT,
    );
    assert!(flags.contains(vk::ImageUsageFlags::COLOR_ATTACHMENT));
    assert!(flags.contains(vk::ImageUsageFlags::STORAGE));
    assert!(!flags.contains(vk::ImageUsageFlags::SAMPLED));
}

#[test]
fn test_shader_stages() {
    assert_eq!(
        shader_stages_to_vk(ShaderStages::VERTEX | ShaderStages::FRAGMENT),
        vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT
    );
}

#[test]
fn test_descriptor_types() {
    assert_eq!(
        descriptor_type_to_vk(DescriptorType::CombinedImageSampler),
        vk::DescriptorType::COMBINED_IMAGE_SAMPLER
    );
    assert_eq!(descriptor_type_to_vk(DescriptorType::UniformBuffer), vk::DescriptorType::UNIFORM_BUFFER);
}

#[test]
fn test_blend_modes() {
    assert_eq!(blend_attachment(BlendMode::Disabled).blend_enable, vk::FALSE);

    let additive = blend_attachment(BlendMode::Additive);
    assert_eq!(additive.blend_enable, vk::TRUE);
    assert_eq!(additive.dst_color_blend_factor, vk::BlendFactor::ONE);

    let alpha = blend_attachment(BlendMode::AlphaBlend);
    assert_eq!(alpha.dst_color_blend_factor, vk::BlendFactor::ONE_MINUS_SRC_ALPHA);
}

#[test]
fn test_bind_points() {
    assert_eq!(bind_point_to_vk(PipelineBindPoint::Graphics), vk::PipelineBindPoint::GRAPHICS);
    assert_eq!(bind_point_to_vk(PipelineBindPoint::Compute), vk::PipelineBindPoint::COMPUTE);
}

// ============================================================================
// RASTERIZATION
// ============================================================================

#[test]
fn test_rasterizer_defaults_match_mesh_pipelines() {
    assert_eq!(topology_to_vk(PrimitiveTopology::default()), vk::PrimitiveTopology::TRIANGLE_LIST);
    assert_eq!(polygon_mode_to_vk(PolygonMode::default()), vk::PolygonMode::FILL);
    assert_eq!(cull_mode_to_vk(CullMode::default()), vk::CullModeFlags::NONE);
    assert_eq!(front_face_to_vk(FrontFace::default()), vk::FrontFace::CLOCKWISE);
}

#[test]
fn test_rasterizer_variants() {
    assert_eq!(topology_to_vk(PrimitiveTopology::LineStrip), vk::PrimitiveTopology::LINE_STRIP);
    assert_eq!(polygon_mode_to_vk(PolygonMode::Line), vk::PolygonMode::LINE);
    assert_eq!(cull_mode_to_vk(CullMode::Back), vk::CullModeFlags::BACK);
    assert_eq!(front_face_to_vk(FrontFace::CounterClockwise), vk::FrontFace::COUNTER_CLOCKWISE);
}

#[test]
fn test_depth_state_follows_toggles() {
    let opaque = depth_stencil_state(true, true);
    assert_eq!(opaque.depth_test_enable, vk::TRUE);
    assert_eq!(opaque.depth_write_enable, vk::TRUE);
    assert_eq!(opaque.depth_compare_op, vk::CompareOp::GREATER_OR_EQUAL);

    let transparent = depth_stencil_state(true, false);
    assert_eq!(transparent.depth_test_enable, vk::TRUE);
    assert_eq!(transparent.depth_write_enable, vk::FALSE);

    // Write without test is ignored
    let off = depth_stencil_state(false, true);
    assert_eq!(off.depth_test_enable, vk::FALSE);
    assert_eq!(off.depth_write_enable, vk::FALSE);
    assert_eq!(off.depth_compare_op, vk::CompareOp::NEVER);
}

// ============================================================================
// ERRORS
// ============================================================================

#[test]
fn test_recoverable_results_keep_their_kind() {
    assert!(matches!(vk_error("test", vk::Result::ERROR_OUT_OF_POOL_MEMORY), Error::OutOfPoolMemory));
    assert!(matches!(vk_error("test", vk::Result::ERROR_FRAGMENTED_POOL), Error::FragmentedPool));
    assert!(matches!(vk_error("test", vk::Result::ERROR_OUT_OF_DATE_KHR), Error::SurfaceOutOfDate));
    assert!(matches!(vk_error("test", vk::Result::TIMEOUT), Error::Timeout));
}

#[test]
fn test_fatal_results() {
    assert!(matches!(vk_error("test", vk::Result::ERROR_DEVICE_LOST), Error::DeviceLost));
    assert!(matches!(vk_error("test", vk::Result::ERROR_OUT_OF_DEVICE_MEMORY), Error::OutOfMemory));
    assert!(matches!(
        vk_error("test", vk::Result::ERROR_INITIALIZATION_FAILED),
        Error::BackendError(_)
    ));
}
