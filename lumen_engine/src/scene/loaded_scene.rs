/// Loaded scene: the GPU resources of one imported scene plus its node graph
///
/// Asset parsing happens outside the engine; the loader registers what it
/// uploaded here by name. Missing images and materials resolve to the
/// renderer's defaults so a broken asset renders visibly wrong instead of
/// failing.

use std::sync::Arc;
use glam::Mat4;
use rustc_hash::{FxHashMap, FxHashSet};
use crate::descriptor::DescriptorAllocator;
use crate::device::*;
use crate::error::Result;
use crate::ledger::Releasable;
use crate::renderer::DefaultResources;
use crate::scene::graph::{NodeKey, NodeKind, SceneGraph};
use crate::scene::mesh::{MaterialInstance, MeshAsset};
use crate::scene::render_object::{DrawContext, Drawable};

pub struct LoadedScene {
    meshes: FxHashMap<String, Arc<MeshAsset>>,
    nodes: FxHashMap<String, NodeKey>,
    images: FxHashMap<String, AllocatedImage>,
    materials: FxHashMap<String, Arc<MaterialInstance>>,
    samplers: Vec<SamplerHandle>,
    graph: SceneGraph,
    descriptors: DescriptorAllocator,
    material_data_buffer: Option<AllocatedBuffer>,
    /// Replaced registrations, released with everything else
    orphaned: Vec<Releasable>,
}

impl LoadedScene {
    /// Pool ratios of the scene's material descriptor sets
    pub fn material_pool_ratios() -> [PoolSizeRatio; 3] {
        [
            PoolSizeRatio::new(DescriptorType::CombinedImageSampler, 3.0),
            PoolSizeRatio::new(DescriptorType::UniformBuffer, 3.0),
            PoolSizeRatio::new(DescriptorType::StorageBuffer, 1.0),
        ]
    }

    /// Empty scene whose descriptor allocator starts with room for
    /// `material_capacity` material sets
    pub fn new(device: &dyn GraphicsDevice, material_capacity: u32) -> Result<Self> {
        let descriptors = DescriptorAllocator::new(
            device,
            material_capacity.max(1),
            &Self::material_pool_ratios(),
        )?;
        Ok(Self {
            meshes: FxHashMap::default(),
            nodes: FxHashMap::default(),
            images: FxHashMap::default(),
            materials: FxHashMap::default(),
            samplers: Vec::new(),
            graph: SceneGraph::new(),
            descriptors,
            material_data_buffer: None,
            orphaned: Vec::new(),
        })
    }

    // ===== REGISTRATION =====

    /// Take ownership of an uploaded mesh
    ///
    /// The same `Arc` may be registered under several names; its buffers are
    /// released once.
    pub fn add_mesh(&mut self, name: &str, mesh: Arc<MeshAsset>) {
        let replaced = self.meshes.insert(name.to_string(), mesh.clone());
        if let Some(previous) = replaced {
            if !Arc::ptr_eq(&previous, &mesh) {
                crate::engine_warn!("lumen::LoadedScene", "Mesh '{}' registered twice, keeping the newer one", name);
                self.orphaned.push(Releasable::MeshBuffers(previous.mesh_buffers));
            }
        }
    }

    /// Add a named node to the graph
    pub fn add_node(&mut self, name: &str, parent: Option<NodeKey>, local: Mat4, kind: NodeKind) -> Result<NodeKey> {
        let key = self.graph.add_node(parent, local, kind)?;
        self.nodes.insert(name.to_string(), key);
        Ok(key)
    }

    /// Take ownership of an uploaded image
    pub fn add_image(&mut self, name: &str, image: AllocatedImage) {
        if let Some(previous) = self.images.insert(name.to_string(), image) {
            crate::engine_warn!("lumen::LoadedScene", "Image '{}' registered twice, keeping the newer one", name);
            self.orphaned.push(Releasable::Image(previous));
        }
    }

    pub fn add_material(&mut self, name: &str, material: Arc<MaterialInstance>) {
        self.materials.insert(name.to_string(), material);
    }

    /// Take ownership of a sampler
    pub fn add_sampler(&mut self, sampler: SamplerHandle) {
        self.samplers.push(sampler);
    }

    /// Take ownership of the buffer holding every material's constants
    pub fn set_material_data_buffer(&mut self, buffer: AllocatedBuffer) {
        if let Some(previous) = self.material_data_buffer.replace(buffer) {
            self.orphaned.push(Releasable::Buffer(previous.buffer));
        }
    }

    /// Allocate a material set from the scene's own pools
    pub fn allocate_material_set(
        &mut self,
        device: &dyn GraphicsDevice,
        layout: DescriptorSetLayoutHandle,
    ) -> Result<DescriptorSetHandle> {
        self.descriptors.allocate(device, layout)
    }

    // ===== LOOKUP =====

    pub fn mesh(&self, name: &str) -> Option<&Arc<MeshAsset>> {
        self.meshes.get(name)
    }

    pub fn node(&self, name: &str) -> Option<NodeKey> {
        self.nodes.get(name).copied()
    }

    pub fn image(&self, name: &str) -> Option<&AllocatedImage> {
        self.images.get(name)
    }

    pub fn material(&self, name: &str) -> Option<&Arc<MaterialInstance>> {
        self.materials.get(name)
    }

    /// The named image, or the error checkerboard if it was never loaded
    pub fn image_or_placeholder(&self, name: &str, defaults: &DefaultResources) -> AllocatedImage {
        match self.images.get(name) {
            Some(image) => *image,
            None => {
                crate::engine_warn!("lumen::LoadedScene", "Image '{}' not loaded, using placeholder", name);
                defaults.error_checkerboard_image
            }
        }
    }

    /// The named material, or the default material if it was never loaded
    pub fn material_or_default(&self, name: &str, defaults: &DefaultResources) -> Arc<MaterialInstance> {
        match self.materials.get(name) {
            Some(material) => material.clone(),
            None => {
                crate::engine_warn!("lumen::LoadedScene", "Material '{}' not loaded, using default", name);
                defaults.default_material.clone()
            }
        }
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut SceneGraph {
        &mut self.graph
    }

    // ===== TEARDOWN =====

    /// Release every GPU object the scene owns
    ///
    /// The device must be idle. Meshes still referenced elsewhere through
    /// their `Arc` lose their buffers too. Mesh buffers shared between
    /// registrations are destroyed once.
    pub fn clear_all(&mut self, device: &dyn GraphicsDevice) {
        let mut released = 0usize;
        let mut released_meshes: FxHashSet<BufferHandle> = FxHashSet::default();
        let meshes = self.meshes.drain().map(|(_, mesh)| Releasable::MeshBuffers(mesh.mesh_buffers));
        for record in self.orphaned.drain(..).chain(meshes) {
            if let Releasable::MeshBuffers(buffers) = &record {
                if !released_meshes.insert(buffers.index_buffer.buffer) {
                    continue;
                }
            }
            record.release(device);
            released += 1;
        }
        for (_, image) in self.images.drain() {
            Releasable::Image(image).release(device);
            released += 1;
        }
        for sampler in self.samplers.drain(..) {
            Releasable::Sampler(sampler).release(device);
            released += 1;
        }
        if let Some(buffer) = self.material_data_buffer.take() {
            Releasable::Buffer(buffer.buffer).release(device);
            released += 1;
        }
        self.descriptors.destroy_pools(device);
        self.materials.clear();
        self.nodes.clear();
        self.graph.clear();

        crate::engine_debug!("lumen::LoadedScene", "Cleared scene ({} objects released)", released);
    }
}

impl Drawable for LoadedScene {
    fn draw(&self, top: &Mat4, ctx: &mut DrawContext) {
        self.graph.draw_all(top, ctx);
    }
}

#[cfg(test)]
#[path = "loaded_scene_tests.rs"]
mod tests;
