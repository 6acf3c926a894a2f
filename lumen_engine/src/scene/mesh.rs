/// Mesh, material and GPU-facing data layouts

use std::sync::Arc;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};
use crate::device::{DescriptorSetHandle, GpuMeshBuffers, PipelineHandle, PipelineLayoutHandle};

// ===== GPU LAYOUTS =====

/// Vertex as read by the mesh vertex shader through the buffer device address
///
/// UVs are split across the padding slots of position and normal.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub uv_x: f32,
    pub normal: Vec3,
    pub uv_y: f32,
    pub color: Vec4,
}

impl Vertex {
    pub fn new(position: Vec3, normal: Vec3, uv: [f32; 2], color: Vec4) -> Self {
        Self {
            position,
            uv_x: uv[0],
            normal,
            uv_y: uv[1],
            color,
        }
    }
}

/// Per-frame scene uniform block (set 0, binding 0)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SceneData {
    pub view: Mat4,
    pub proj: Mat4,
    pub view_proj: Mat4,
    pub ambient_color: Vec4,
    /// xyz direction, w intensity
    pub sunlight_direction: Vec4,
    pub sunlight_color: Vec4,
}

impl Default for SceneData {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            proj: Mat4::IDENTITY,
            view_proj: Mat4::IDENTITY,
            ambient_color: Vec4::splat(0.1),
            sunlight_direction: Vec4::new(0.0, 1.0, 0.5, 1.0),
            sunlight_color: Vec4::ONE,
        }
    }
}

/// Push constants of every mesh draw
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuDrawPushConstants {
    pub world_matrix: Mat4,
    pub vertex_buffer_address: u64,
    pub _padding: u64,
}

/// Material uniform block (set 1, binding 0), padded to 256 bytes
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MaterialConstants {
    pub color_factors: Vec4,
    pub metal_rough_factors: Vec4,
    pub extra: [Vec4; 14],
}

impl Default for MaterialConstants {
    fn default() -> Self {
        Self {
            color_factors: Vec4::ONE,
            metal_rough_factors: Vec4::new(1.0, 0.5, 0.0, 0.0),
            extra: [Vec4::ZERO; 14],
        }
    }
}

// ===== BOUNDS =====

/// Bounding volume in mesh space
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds {
    pub origin: Vec3,
    pub sphere_radius: f32,
    pub extents: Vec3,
}

impl Bounds {
    /// Tight box and enclosing sphere of a set of vertices
    pub fn from_vertices(vertices: &[Vertex]) -> Self {
        let Some(first) = vertices.first() else {
            return Self::default();
        };
        let (min, max) = vertices.iter().fold((first.position, first.position), |(min, max), v| {
            (min.min(v.position), max.max(v.position))
        });
        let extents = (max - min) / 2.0;
        Self {
            origin: (max + min) / 2.0,
            sphere_radius: extents.length(),
            extents,
        }
    }
}

// ===== MATERIALS =====

/// Render pass a material belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MaterialPass {
    #[default]
    MainColor,
    Transparent,
    Other,
}

/// Pipeline and layout shared by every instance of a material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MaterialPipeline {
    pub pipeline: PipelineHandle,
    pub layout: PipelineLayoutHandle,
}

impl MaterialPipeline {
    /// No pipeline built yet; draws using it are skipped
    pub fn is_null(&self) -> bool {
        self.pipeline.is_null() || self.layout.is_null()
    }
}

/// One material: pipeline plus its bound resources
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialInstance {
    pub pipeline: MaterialPipeline,
    pub material_set: DescriptorSetHandle,
    pub pass_type: MaterialPass,
}

// ===== MESHES =====

/// Index range of a mesh drawn with one material
#[derive(Debug, Clone)]
pub struct GeoSurface {
    pub start_index: u32,
    pub count: u32,
    pub bounds: Bounds,
    pub material: Arc<MaterialInstance>,
}

/// Uploaded mesh and its surfaces
#[derive(Debug, Clone)]
pub struct MeshAsset {
    pub name: String,
    pub surfaces: Vec<GeoSurface>,
    pub mesh_buffers: GpuMeshBuffers,
}

#[cfg(test)]
#[path = "mesh_tests.rs"]
mod tests;
