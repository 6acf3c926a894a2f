//! Scoped resource ledger
//!
//! Records GPU objects whose destruction must wait until the GPU no longer
//! uses them. Each frame slot owns one ledger, flushed once that slot's fence
//! has signaled; the renderer owns a global one, flushed at shutdown.
//! Records are released in strict reverse insertion order so that dependents
//! (views, pipelines) go before what they depend on.

use crate::device::*;

/// One GPU object awaiting release
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Releasable {
    Buffer(BufferHandle),
    /// View, image and backing memory
    Image(AllocatedImage),
    Sampler(SamplerHandle),
    Pipeline(PipelineHandle),
    PipelineLayout(PipelineLayoutHandle),
    DescriptorSetLayout(DescriptorSetLayoutHandle),
    DescriptorPool(DescriptorPoolHandle),
    ShaderModule(ShaderModuleHandle),
    CommandPool(CommandPoolHandle),
    Fence(FenceHandle),
    Semaphore(SemaphoreHandle),
    /// Index buffer, then vertex buffer
    MeshBuffers(GpuMeshBuffers),
}

impl Releasable {
    /// Destroy the object on `device`
    pub fn release(self, device: &dyn GraphicsDevice) {
        match self {
            Releasable::Buffer(buffer) => device.destroy_buffer(buffer),
            Releasable::Image(image) => device.destroy_image(&image),
            Releasable::Sampler(sampler) => device.destroy_sampler(sampler),
            Releasable::Pipeline(pipeline) => device.destroy_pipeline(pipeline),
            Releasable::PipelineLayout(layout) => device.destroy_pipeline_layout(layout),
            Releasable::DescriptorSetLayout(layout) => device.destroy_descriptor_set_layout(layout),
            Releasable::DescriptorPool(pool) => device.destroy_descriptor_pool(pool),
            Releasable::ShaderModule(module) => device.destroy_shader_module(module),
            Releasable::CommandPool(pool) => device.destroy_command_pool(pool),
            Releasable::Fence(fence) => device.destroy_fence(fence),
            Releasable::Semaphore(semaphore) => device.destroy_semaphore(semaphore),
            Releasable::MeshBuffers(mesh) => {
                device.destroy_buffer(mesh.index_buffer.buffer);
                device.destroy_buffer(mesh.vertex_buffer.buffer);
            }
        }
    }
}

/// LIFO list of pending releases
#[derive(Debug, Default)]
pub struct DeletionLedger {
    records: Vec<Releasable>,
}

impl DeletionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record; it will be released before every earlier one
    pub fn push(&mut self, releasable: Releasable) {
        self.records.push(releasable);
    }

    /// Release every record, newest first, and empty the ledger
    pub fn flush(&mut self, device: &dyn GraphicsDevice) {
        if self.records.is_empty() {
            return;
        }
        crate::engine_trace!("lumen::DeletionLedger", "Releasing {} records", self.records.len());
        while let Some(record) = self.records.pop() {
            record.release(device);
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
#[path = "ledger_tests.rs"]
mod tests;
