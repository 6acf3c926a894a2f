//! Unit tests for renderer_background.rs

use std::sync::Arc;
use serial_test::serial;
use crate::device::mock_device::{MockDevice, MockObject, MockSurface};
use crate::device::*;
use crate::renderer::renderer_background::background_group_counts;
use crate::renderer::{Renderer, RendererConfig, SPIRV_MAGIC};
use crate::scene::{SceneData, SceneGraph};

fn setup() -> (Arc<MockDevice>, Renderer) {
    let device = MockDevice::shared();
    let config = RendererConfig {
        descriptor_capacity_hint: 4,
        ..Default::default()
    };
    let renderer = Renderer::new(device.clone(), Box::new(MockSurface::new(800, 600, 2)), config).unwrap();
    (device, renderer)
}

fn compute_shader(device: &MockDevice) -> ShaderModuleHandle {
    device.create_shader_module(&[SPIRV_MAGIC, 0]).unwrap()
}

fn position(device: &MockDevice, prefix: &str) -> usize {
    device.calls().iter().position(|call| call.starts_with(prefix)).unwrap()
}

#[test]
fn test_group_counts_round_up() {
    assert_eq!(background_group_counts(Extent2D::new(1, 1)), (1, 1));
    assert_eq!(background_group_counts(Extent2D::new(16, 16)), (1, 1));
    assert_eq!(background_group_counts(Extent2D::new(17, 33)), (2, 3));
    assert_eq!(background_group_counts(Extent2D::new(800, 600)), (50, 38));
}

#[test]
#[serial]
fn test_draw_image_set_is_storage_view_of_draw_image() {
    let (device, renderer) = setup();
    let draw = *renderer.draw_image().unwrap();

    assert!(!renderer.draw_image_layout().is_null());
    assert!(!renderer.draw_image_set().is_null());
    assert_eq!(
        device.set_writes(renderer.draw_image_set()).unwrap(),
        vec![DescriptorWrite::Image {
            binding: 0,
            descriptor_type: DescriptorType::StorageImage,
            view: draw.view,
            sampler: SamplerHandle::NULL,
            layout: ImageLayout::General,
        }]
    );
}

#[test]
#[serial]
fn test_draw_image_set_follows_resize() {
    let (device, mut renderer) = setup();
    let old = *renderer.draw_image().unwrap();

    renderer.rebuild_swapchain(1024, 768).unwrap();

    let new = *renderer.draw_image().unwrap();
    assert_ne!(old.view, new.view);
    let writes = device.set_writes(renderer.draw_image_set()).unwrap();
    assert!(matches!(writes[0], DescriptorWrite::Image { view, .. } if view == new.view));
    assert!(device.misuse().is_empty());
}

#[test]
#[serial]
fn test_background_dispatch_replaces_clear() {
    let (device, mut renderer) = setup();
    let shader = compute_shader(&device);
    let background = renderer.build_background_pipeline(shader).unwrap();
    device.destroy_shader_module(shader);
    assert_eq!(renderer.background_pipeline(), Some(background));
    assert!(device
        .call_index(&format!("create_compute_pipeline:{}:{}", background.pipeline.as_raw(), background.layout.as_raw()))
        .is_some());
    assert!(device
        .call_index(&format!("create_pipeline_layout:{}:1", background.layout.as_raw()))
        .is_some());
    device.clear_calls();

    renderer.draw_frame(&SceneGraph::new(), &SceneData::default()).unwrap();

    assert_eq!(
        device.calls_matching("bind_compute_pipeline"),
        vec![format!("bind_compute_pipeline:{}", background.pipeline.as_raw())]
    );
    assert_eq!(
        device.calls_matching("bind_compute_set"),
        vec![format!("bind_compute_set:0:{}", renderer.draw_image_set().as_raw())]
    );
    assert_eq!(device.calls_matching("dispatch"), vec!["dispatch:50x38x1"]);
    assert!(device.calls_matching("clear:").is_empty());
    assert!(position(&device, "dispatch") < position(&device, "begin_rendering"));
}

#[test]
#[serial]
fn test_no_background_clears_draw_image() {
    let (device, mut renderer) = setup();
    let shader = compute_shader(&device);
    renderer.build_background_pipeline(shader).unwrap();
    device.destroy_shader_module(shader);
    renderer.set_background_pipeline(None);
    device.clear_calls();

    renderer.draw_frame(&SceneGraph::new(), &SceneData::default()).unwrap();

    let draw = renderer.draw_image().unwrap();
    assert!(device.call_index(&format!("clear:{}", draw.image.as_raw())).is_some());
    assert!(device.calls_matching("dispatch").is_empty());
}

#[test]
#[serial]
fn test_rejected_background_keeps_previous() {
    let (device, mut renderer) = setup();
    let shader = compute_shader(&device);
    let first = renderer.build_background_pipeline(shader).unwrap();
    let layouts = device.live_count_of(MockObject::PipelineLayout);

    device.set_fail_pipelines(true);
    assert!(renderer.build_background_pipeline(shader).is_none());

    assert_eq!(renderer.background_pipeline(), Some(first));
    assert_eq!(device.live_count_of(MockObject::PipelineLayout), layouts);
    device.destroy_shader_module(shader);
}

#[test]
#[serial]
fn test_shutdown_releases_background() {
    let (device, mut renderer) = setup();
    let shader = compute_shader(&device);
    renderer.build_background_pipeline(shader).unwrap();
    device.destroy_shader_module(shader);
    renderer.draw_frame(&SceneGraph::new(), &SceneData::default()).unwrap();

    renderer.shutdown();

    assert_eq!(device.live_count(), 0);
    assert!(device.misuse().is_empty());
    assert_eq!(renderer.background_pipeline(), None);
}
