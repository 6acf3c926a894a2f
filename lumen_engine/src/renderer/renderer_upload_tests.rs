//! Unit tests for renderer_upload.rs

use std::sync::Arc;
use glam::{Vec3, Vec4};
use serial_test::serial;
use crate::device::mock_device::{MockDevice, MockObject, MockSurface};
use crate::device::*;
use crate::error::Error;
use crate::renderer::{Renderer, RendererConfig};
use crate::scene::Vertex;

fn setup() -> (Arc<MockDevice>, Renderer) {
    let device = MockDevice::shared();
    let config = RendererConfig {
        descriptor_capacity_hint: 4,
        ..Default::default()
    };
    let renderer = Renderer::new(device.clone(), Box::new(MockSurface::new(64, 64, 2)), config).unwrap();
    (device, renderer)
}

fn triangle() -> (Vec<u32>, Vec<Vertex>) {
    let vertices = vec![
        Vertex::new(Vec3::new(0.0, 0.0, 0.0), Vec3::Z, [0.0, 0.0], Vec4::ONE),
        Vertex::new(Vec3::new(1.0, 0.0, 0.0), Vec3::Z, [1.0, 0.0], Vec4::ONE),
        Vertex::new(Vec3::new(0.0, 1.0, 0.0), Vec3::Z, [0.0, 1.0], Vec4::ONE),
    ];
    (vec![0, 1, 2], vertices)
}

// ============================================================================
// Meshes
// ============================================================================

#[test]
#[serial]
fn test_upload_mesh_copies_through_staging() {
    let (device, mut renderer) = setup();
    let (indices, vertices) = triangle();
    let buffers_before = device.live_count_of(MockObject::Buffer);

    let mesh = renderer.upload_mesh(&indices, &vertices).unwrap();

    assert_eq!(
        device.buffer_contents(mesh.vertex_buffer.buffer).unwrap(),
        bytemuck::cast_slice::<Vertex, u8>(&vertices).to_vec()
    );
    assert_eq!(
        device.buffer_contents(mesh.index_buffer.buffer).unwrap(),
        bytemuck::cast_slice::<u32, u8>(&indices).to_vec()
    );
    assert_eq!(mesh.vertex_buffer_address, device.buffer_device_address(mesh.vertex_buffer.buffer));
    assert!(mesh.vertex_buffer.usage.contains(BufferUsage::SHADER_DEVICE_ADDRESS));
    assert_eq!(mesh.index_buffer.location, MemoryLocation::GpuOnly);

    // Staging buffer already gone
    assert_eq!(device.live_count_of(MockObject::Buffer), buffers_before + 2);
}

#[test]
#[serial]
fn test_upload_empty_mesh_rejected() {
    let (device, mut renderer) = setup();
    let (_, vertices) = triangle();
    let before = device.live_count();

    assert!(matches!(renderer.upload_mesh(&[], &vertices), Err(Error::InvalidResource(_))));
    assert!(matches!(renderer.upload_mesh(&[0, 1, 2], &[]), Err(Error::InvalidResource(_))));
    assert_eq!(device.live_count(), before);
}

#[test]
#[serial]
fn test_destroy_mesh() {
    let (device, mut renderer) = setup();
    let (indices, vertices) = triangle();
    let mesh = renderer.upload_mesh(&indices, &vertices).unwrap();

    renderer.destroy_mesh(mesh);

    assert!(!device.is_alive(mesh.index_buffer.buffer.as_raw()));
    assert!(!device.is_alive(mesh.vertex_buffer.buffer.as_raw()));
    assert!(device.misuse().is_empty());
}

// ============================================================================
// Images
// ============================================================================

#[test]
#[serial]
fn test_create_image_uploads_and_transitions() {
    let (device, mut renderer) = setup();
    let pixels = vec![7u8; 4 * 4 * 4];
    device.clear_calls();

    let image = renderer
        .create_image(&pixels, Extent3D::new(4, 4, 1), Format::R8G8B8A8_UNORM, ImageUsage::SAMPLED, false)
        .unwrap();

    assert_eq!(image.mip_levels, 1);
    let raw = image.image.as_raw();
    let to_dst = device.call_index(&format!("transition:{}:Undefined->TransferDstOptimal", raw)).unwrap();
    let copy = device.calls().iter().position(|c| c.starts_with("copy_buffer_to_image")).unwrap();
    let to_read = device
        .call_index(&format!("transition:{}:TransferDstOptimal->ShaderReadOnlyOptimal", raw))
        .unwrap();
    assert!(to_dst < copy && copy < to_read);
    assert!(device.submission_count() > 0);
    assert_eq!(device.calls_matching("destroy_buffer").len(), 1);
}

#[test]
#[serial]
fn test_create_mipmapped_image() {
    let (device, mut renderer) = setup();
    let pixels = vec![0u8; 64 * 32 * 4];

    let image = renderer
        .create_image(&pixels, Extent3D::new(64, 32, 1), Format::R8G8B8A8_UNORM, ImageUsage::SAMPLED, true)
        .unwrap();

    assert_eq!(image.mip_levels, 7);
    assert!(device
        .call_index(&format!("generate_mipmaps:{}:7", image.image.as_raw()))
        .is_some());
}

#[test]
#[serial]
fn test_create_image_with_short_data_fails() {
    let (device, mut renderer) = setup();
    let before = device.live_count();

    let result = renderer.create_image(&[0u8; 15], Extent3D::new(2, 2, 1), Format::R8G8B8A8_UNORM, ImageUsage::SAMPLED, false);

    assert!(matches!(result, Err(Error::InvalidResource(_))));
    assert_eq!(device.live_count(), before);
}

#[test]
#[serial]
fn test_create_empty_image_and_destroy() {
    let (device, renderer) = setup();

    let image = renderer
        .create_empty_image(Extent3D::new(32, 32, 1), Format::D32_SFLOAT, ImageUsage::DEPTH_STENCIL_ATTACHMENT, false)
        .unwrap();
    assert!(device.is_alive(image.view.as_raw()));

    renderer.destroy_image(image);
    assert!(!device.is_alive(image.image.as_raw()));
    assert!(!device.is_alive(image.view.as_raw()));
}
