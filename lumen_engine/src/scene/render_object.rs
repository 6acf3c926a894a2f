/// Flattened draw records and the per-frame draw context

use std::sync::Arc;
use glam::Mat4;
use crate::device::BufferHandle;
use crate::scene::mesh::{Bounds, MaterialInstance, MaterialPass};

/// One indexed draw, fully resolved
#[derive(Debug, Clone)]
pub struct RenderObject {
    pub index_count: u32,
    pub first_index: u32,
    pub index_buffer: BufferHandle,
    pub vertex_buffer_address: u64,
    pub material: Arc<MaterialInstance>,
    pub transform: Mat4,
    pub bounds: Bounds,
}

/// Draws collected from a scene for one frame
///
/// Transparent surfaces are kept in traversal order (no depth sort).
#[derive(Debug, Default)]
pub struct DrawContext {
    pub opaque_surfaces: Vec<RenderObject>,
    pub transparent_surfaces: Vec<RenderObject>,
}

impl DrawContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route a draw by its material pass
    pub fn push(&mut self, object: RenderObject) {
        if object.material.pass_type == MaterialPass::Transparent {
            self.transparent_surfaces.push(object);
        } else {
            self.opaque_surfaces.push(object);
        }
    }

    /// Empty both lists, keeping their capacity
    pub fn clear(&mut self) {
        self.opaque_surfaces.clear();
        self.transparent_surfaces.clear();
    }

    pub fn len(&self) -> usize {
        self.opaque_surfaces.len() + self.transparent_surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.opaque_surfaces.is_empty() && self.transparent_surfaces.is_empty()
    }
}

/// Anything that can emit draws into a [`DrawContext`]
pub trait Drawable {
    /// Emit draws with `top` applied on the left of every world transform
    fn draw(&self, top: &Mat4, ctx: &mut DrawContext);
}
