//! Unit tests for mesh.rs

use crate::scene::mesh::*;
use glam::{Vec3, Vec4};

#[test]
fn test_gpu_layout_sizes() {
    assert_eq!(std::mem::size_of::<Vertex>(), 48);
    assert_eq!(std::mem::size_of::<SceneData>(), 3 * 64 + 3 * 16);
    assert_eq!(std::mem::size_of::<MaterialConstants>(), 256);
    assert_eq!(std::mem::size_of::<GpuDrawPushConstants>(), 80);
}

#[test]
fn test_vertex_uv_split() {
    let v = Vertex::new(Vec3::X, Vec3::Y, [0.25, 0.75], Vec4::ONE);
    assert_eq!(v.uv_x, 0.25);
    assert_eq!(v.uv_y, 0.75);

    let bytes: &[u8] = bytemuck::bytes_of(&v);
    assert_eq!(&bytes[12..16], &0.25f32.to_le_bytes());
    assert_eq!(&bytes[28..32], &0.75f32.to_le_bytes());
}

#[test]
fn test_bounds_from_vertices() {
    let vertices = vec![
        Vertex::new(Vec3::new(-1.0, 0.0, 0.0), Vec3::Z, [0.0, 0.0], Vec4::ONE),
        Vertex::new(Vec3::new(3.0, 2.0, 0.0), Vec3::Z, [0.0, 0.0], Vec4::ONE),
    ];
    let bounds = Bounds::from_vertices(&vertices);

    assert_eq!(bounds.origin, Vec3::new(1.0, 1.0, 0.0));
    assert_eq!(bounds.extents, Vec3::new(2.0, 1.0, 0.0));
    assert!((bounds.sphere_radius - 5.0f32.sqrt()).abs() < 1e-6);
}

#[test]
fn test_bounds_of_nothing() {
    assert_eq!(Bounds::from_vertices(&[]), Bounds::default());
}

#[test]
fn test_default_material_pipeline_is_null() {
    assert!(MaterialPipeline::default().is_null());
    assert_eq!(MaterialPass::default(), MaterialPass::MainColor);
}
