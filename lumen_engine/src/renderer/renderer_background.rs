/// Compute background pass
///
/// A compute shader writes the draw image through a storage-image set before
/// geometry is rendered on top. Without an installed background the draw
/// image is cleared to the configured color instead.

use crate::descriptor::DescriptorWriter;
use crate::device::*;
use crate::ledger::Releasable;
use crate::renderer::Renderer;

/// Workgroup edge of the background shader (16x16 invocations)
pub const BACKGROUND_WORKGROUP_SIZE: u32 = 16;

/// Compute pipeline filling the draw image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BackgroundPipeline {
    pub pipeline: PipelineHandle,
    pub layout: PipelineLayoutHandle,
}

/// Workgroups covering `extent`, rounded up on both axes
pub fn background_group_counts(extent: Extent2D) -> (u32, u32) {
    (
        extent.width.div_ceil(BACKGROUND_WORKGROUP_SIZE),
        extent.height.div_ceil(BACKGROUND_WORKGROUP_SIZE),
    )
}

impl Renderer {
    /// Build a background pipeline from a compute shader and install it
    ///
    /// The shader reads the draw image as set 0, binding 0. The pipeline and
    /// its layout live until shutdown; the shader module stays owned by the
    /// caller. Returns `None` (with a warning) if the device rejects it, in
    /// which case the previous background stays installed.
    pub fn build_background_pipeline(&mut self, shader: ShaderModuleHandle) -> Option<BackgroundPipeline> {
        let device = self.device.clone();
        let layout_desc = PipelineLayoutDesc {
            set_layouts: vec![self.draw_image_layout],
            push_constants: Vec::new(),
        };
        let layout = match device.create_pipeline_layout(&layout_desc) {
            Ok(layout) => layout,
            Err(e) => {
                crate::engine_warn!("lumen::Renderer", "Background pipeline layout failed: {}", e);
                return None;
            }
        };

        let pipeline = match device.create_compute_pipeline(&ComputePipelineDesc { layout, shader }) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                crate::engine_warn!("lumen::Renderer", "Background pipeline failed: {}", e);
                device.destroy_pipeline_layout(layout);
                return None;
            }
        };

        self.global_ledger.push(Releasable::PipelineLayout(layout));
        self.global_ledger.push(Releasable::Pipeline(pipeline));
        let background = BackgroundPipeline { pipeline, layout };
        self.background = Some(background);
        crate::engine_debug!("lumen::Renderer", "Background pipeline {} installed", pipeline.as_raw());
        Some(background)
    }

    /// Install `background`, or fall back to the clear color with `None`
    pub fn set_background_pipeline(&mut self, background: Option<BackgroundPipeline>) {
        self.background = background;
    }

    pub fn background_pipeline(&self) -> Option<BackgroundPipeline> {
        self.background
    }

    /// Layout of the background's set 0: the draw image as a storage image
    pub fn draw_image_layout(&self) -> DescriptorSetLayoutHandle {
        self.draw_image_layout
    }

    pub fn draw_image_set(&self) -> DescriptorSetHandle {
        self.draw_image_set
    }

    /// Point the storage-image set at the current draw image
    pub(crate) fn write_draw_image_set(&self) {
        let Some(draw_image) = self.draw_image else {
            return;
        };
        if self.draw_image_set.is_null() {
            return;
        }
        let mut writer = DescriptorWriter::new();
        writer.write_image(
            0,
            draw_image.view,
            SamplerHandle::NULL,
            ImageLayout::General,
            DescriptorType::StorageImage,
        );
        writer.update_set(self.device.as_ref(), self.draw_image_set);
    }
}

#[cfg(test)]
#[path = "renderer_background_tests.rs"]
mod tests;
