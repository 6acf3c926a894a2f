/// Descriptor set layout builder

use crate::device::*;
use crate::error::Result;

/// Accumulates bindings, then creates a layout visible to the given stages
#[derive(Debug, Default, Clone)]
pub struct DescriptorLayoutBuilder {
    bindings: Vec<DescriptorBinding>,
}

impl DescriptorLayoutBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single-descriptor binding
    pub fn add_binding(&mut self, binding: u32, descriptor_type: DescriptorType) -> &mut Self {
        self.bindings.push(DescriptorBinding {
            binding,
            descriptor_type,
            count: 1,
            stages: ShaderStages::empty(),
        });
        self
    }

    pub fn clear(&mut self) {
        self.bindings.clear();
    }

    pub fn bindings(&self) -> &[DescriptorBinding] {
        &self.bindings
    }

    /// Create the layout; every binding becomes visible to `stages`
    pub fn build(
        &self,
        device: &dyn GraphicsDevice,
        stages: ShaderStages,
    ) -> Result<DescriptorSetLayoutHandle> {
        let bindings: Vec<DescriptorBinding> = self
            .bindings
            .iter()
            .map(|b| DescriptorBinding { stages: b.stages | stages, ..*b })
            .collect();
        device.create_descriptor_set_layout(&bindings)
    }
}
