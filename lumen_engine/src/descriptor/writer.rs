/// Batched descriptor set writes

use crate::device::*;

/// Collects image and buffer writes, then applies them to a set in one call
#[derive(Debug, Default, Clone)]
pub struct DescriptorWriter {
    writes: Vec<DescriptorWrite>,
}

impl DescriptorWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_image(
        &mut self,
        binding: u32,
        view: ImageViewHandle,
        sampler: SamplerHandle,
        layout: ImageLayout,
        descriptor_type: DescriptorType,
    ) -> &mut Self {
        self.writes.push(DescriptorWrite::Image {
            binding,
            descriptor_type,
            view,
            sampler,
            layout,
        });
        self
    }

    pub fn write_buffer(
        &mut self,
        binding: u32,
        buffer: BufferHandle,
        size: u64,
        offset: u64,
        descriptor_type: DescriptorType,
    ) -> &mut Self {
        self.writes.push(DescriptorWrite::Buffer {
            binding,
            descriptor_type,
            buffer,
            offset,
            size,
        });
        self
    }

    pub fn clear(&mut self) {
        self.writes.clear();
    }

    pub fn writes(&self) -> &[DescriptorWrite] {
        &self.writes
    }

    /// Apply every pending write to `set`; the writer keeps its writes
    pub fn update_set(&self, device: &dyn GraphicsDevice, set: DescriptorSetHandle) {
        if self.writes.is_empty() {
            return;
        }
        device.update_descriptor_set(set, &self.writes);
    }
}

#[cfg(test)]
#[path = "writer_tests.rs"]
mod tests;
