/// Geometry pass recording

use crate::device::*;
use crate::scene::{DrawContext, GpuDrawPushConstants, RenderObject};

/// Draws recorded by one geometry pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawCounts {
    pub opaque: u32,
    pub transparent: u32,
    /// Draws whose material has no pipeline yet
    pub skipped: u32,
}

/// Redundant-bind filter across the draws of one pass
#[derive(Default)]
struct BindState {
    pipeline: PipelineHandle,
    material_set: DescriptorSetHandle,
    index_buffer: BufferHandle,
}

/// Record every draw of `ctx`, opaque surfaces first
///
/// Pipeline, material set and index buffer are only rebound when they change.
pub(crate) fn record_geometry(
    device: &dyn GraphicsDevice,
    cmd: CommandBufferHandle,
    ctx: &DrawContext,
    scene_set: DescriptorSetHandle,
) -> DrawCounts {
    let mut counts = DrawCounts::default();
    let mut state = BindState::default();

    for object in &ctx.opaque_surfaces {
        if record_object(device, cmd, object, scene_set, &mut state) {
            counts.opaque += 1;
        } else {
            counts.skipped += 1;
        }
    }
    for object in &ctx.transparent_surfaces {
        if record_object(device, cmd, object, scene_set, &mut state) {
            counts.transparent += 1;
        } else {
            counts.skipped += 1;
        }
    }

    if counts.skipped > 0 {
        crate::engine_trace!("lumen::Renderer", "{} draws skipped (no pipeline)", counts.skipped);
    }
    counts
}

fn record_object(
    device: &dyn GraphicsDevice,
    cmd: CommandBufferHandle,
    object: &RenderObject,
    scene_set: DescriptorSetHandle,
    state: &mut BindState,
) -> bool {
    let material = &object.material;
    if material.pipeline.is_null() {
        return false;
    }
    let layout = material.pipeline.layout;

    if material.pipeline.pipeline != state.pipeline {
        state.pipeline = material.pipeline.pipeline;
        device.cmd_bind_pipeline(cmd, PipelineBindPoint::Graphics, state.pipeline);
        device.cmd_bind_descriptor_set(cmd, PipelineBindPoint::Graphics, layout, 0, scene_set);
        // New layout: set 1 must be bound again
        state.material_set = DescriptorSetHandle::NULL;
    }
    if material.material_set != state.material_set {
        state.material_set = material.material_set;
        device.cmd_bind_descriptor_set(cmd, PipelineBindPoint::Graphics, layout, 1, state.material_set);
    }
    if object.index_buffer != state.index_buffer {
        state.index_buffer = object.index_buffer;
        device.cmd_bind_index_buffer(cmd, state.index_buffer);
    }

    let push = GpuDrawPushConstants {
        world_matrix: object.transform,
        vertex_buffer_address: object.vertex_buffer_address,
        _padding: 0,
    };
    device.cmd_push_constants(cmd, layout, ShaderStages::VERTEX, 0, bytemuck::bytes_of(&push));
    device.cmd_draw_indexed(cmd, object.index_count, object.first_index);
    true
}
