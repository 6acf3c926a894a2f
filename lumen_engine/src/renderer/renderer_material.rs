/// Shader modules and material pipelines

use std::path::Path;
use std::sync::Arc;
use crate::device::*;
use crate::error::{Error, Result};
use crate::ledger::Releasable;
use crate::renderer::Renderer;
use crate::scene::{GpuDrawPushConstants, MaterialInstance, MaterialPass, MaterialPipeline};

/// First word of every SPIR-V binary
pub const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Shaders and pass of a material pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterialPipelineDesc {
    pub vertex_shader: ShaderModuleHandle,
    pub fragment_shader: ShaderModuleHandle,
    /// `Transparent` gets additive blending without depth writes
    pub pass: MaterialPass,
}

/// Decode a SPIR-V binary into words
///
/// # Errors
///
/// `Error::InvalidResource` if the length is not a non-zero multiple of four
/// or the magic number is wrong.
pub fn parse_spirv(bytes: &[u8]) -> Result<Vec<u32>> {
    if bytes.is_empty() || bytes.len() % 4 != 0 {
        return Err(Error::InvalidResource(format!(
            "SPIR-V size {} is not a non-zero multiple of 4",
            bytes.len()
        )));
    }
    let words: Vec<u32> = bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();
    if words[0] != SPIRV_MAGIC {
        return Err(Error::InvalidResource(format!("bad SPIR-V magic 0x{:08x}", words[0])));
    }
    Ok(words)
}

impl Renderer {
    /// Load a compiled shader from disk
    ///
    /// Returns `None` (with a warning) if the file is missing, unreadable or
    /// not SPIR-V.
    pub fn load_shader_module(&self, path: impl AsRef<Path>) -> Option<ShaderModuleHandle> {
        let path = path.as_ref();
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                crate::engine_warn!("lumen::Renderer", "Cannot read shader '{}': {}", path.display(), e);
                return None;
            }
        };
        let words = match parse_spirv(&bytes) {
            Ok(words) => words,
            Err(e) => {
                crate::engine_warn!("lumen::Renderer", "Shader '{}' rejected: {}", path.display(), e);
                return None;
            }
        };
        match self.device.create_shader_module(&words) {
            Ok(module) => {
                crate::engine_debug!("lumen::Renderer", "Loaded shader '{}' ({} words)", path.display(), words.len());
                Some(module)
            }
            Err(e) => {
                crate::engine_warn!("lumen::Renderer", "Shader module creation failed for '{}': {}", path.display(), e);
                None
            }
        }
    }

    pub fn destroy_shader_module(&self, module: ShaderModuleHandle) {
        self.device.destroy_shader_module(module);
    }

    /// Build a mesh pipeline reading set 0 (scene data) and set 1 (material)
    ///
    /// The pipeline and its layout live until shutdown. Returns `None` (with
    /// a warning) if the device rejects it.
    pub fn build_material_pipeline(&mut self, desc: &MaterialPipelineDesc) -> Option<MaterialPipeline> {
        let device = self.device.clone();
        let layout_desc = PipelineLayoutDesc {
            set_layouts: vec![self.scene_data_layout, self.material_layout],
            push_constants: vec![PushConstantRange {
                stages: ShaderStages::VERTEX,
                offset: 0,
                size: std::mem::size_of::<GpuDrawPushConstants>() as u32,
            }],
        };
        let layout = match device.create_pipeline_layout(&layout_desc) {
            Ok(layout) => layout,
            Err(e) => {
                crate::engine_warn!("lumen::Renderer", "Material pipeline layout failed: {}", e);
                return None;
            }
        };

        let transparent = desc.pass == MaterialPass::Transparent;
        let pipeline_desc = GraphicsPipelineDesc::new(
            layout,
            desc.vertex_shader,
            desc.fragment_shader,
            self.config.draw_image_format,
        )
        .with_blend(if transparent { BlendMode::Additive } else { BlendMode::Disabled })
        .with_depth_test(self.config.depth_format, !transparent);
        let pipeline = match device.create_graphics_pipeline(&pipeline_desc) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                crate::engine_warn!("lumen::Renderer", "Material pipeline ({:?}) failed: {}", desc.pass, e);
                device.destroy_pipeline_layout(layout);
                return None;
            }
        };

        self.global_ledger.push(Releasable::PipelineLayout(layout));
        self.global_ledger.push(Releasable::Pipeline(pipeline));
        Some(MaterialPipeline { pipeline, layout })
    }

    /// Give the default material a pipeline so it is drawn
    pub fn set_default_pipeline(&mut self, pipeline: MaterialPipeline) {
        let current = &self.defaults.default_material;
        self.defaults.default_material = Arc::new(MaterialInstance {
            pipeline,
            ..(**current).clone()
        });
    }
}

#[cfg(test)]
#[path = "renderer_material_tests.rs"]
mod tests;
