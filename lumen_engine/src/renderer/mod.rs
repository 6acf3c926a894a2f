/// Renderer module - engine context, configuration and default resources

pub mod config;
pub mod defaults;
pub mod renderer;
pub mod renderer_background;
pub mod renderer_draw;
pub mod renderer_material;
pub mod renderer_upload;

pub use config::{RendererConfig, DEFAULT_FENCE_TIMEOUT_NS, FRAME_OVERLAP};
pub use defaults::{checkerboard_pixels, DefaultResources, MaterialResources, CHECKERBOARD_SIZE};
pub use renderer::{Renderer, RendererStats};
pub use renderer_background::{background_group_counts, BackgroundPipeline, BACKGROUND_WORKGROUP_SIZE};
pub use renderer_draw::DrawCounts;
pub use renderer_material::{parse_spirv, MaterialPipelineDesc, SPIRV_MAGIC};
