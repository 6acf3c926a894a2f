//! Unit tests for writer.rs and layout_builder.rs

use crate::descriptor::{DescriptorLayoutBuilder, DescriptorWriter};
use crate::device::mock_device::MockDevice;
use crate::device::*;

#[test]
fn test_layout_builder_applies_stages() {
    let mut builder = DescriptorLayoutBuilder::new();
    builder
        .add_binding(0, DescriptorType::UniformBuffer)
        .add_binding(1, DescriptorType::CombinedImageSampler);

    assert_eq!(builder.bindings().len(), 2);
    assert!(builder.bindings().iter().all(|b| b.stages.is_empty()));

    let device = MockDevice::new();
    let layout = builder.build(&device, ShaderStages::VERTEX | ShaderStages::FRAGMENT).unwrap();
    assert!(!layout.is_null());
    assert_eq!(
        device.calls_matching("create_descriptor_set_layout"),
        vec![format!("create_descriptor_set_layout:{}:2", layout.as_raw())]
    );
}

#[test]
fn test_layout_builder_clear() {
    let mut builder = DescriptorLayoutBuilder::new();
    builder.add_binding(0, DescriptorType::StorageImage);
    builder.clear();
    assert!(builder.bindings().is_empty());
}

#[test]
fn test_writer_collects_writes() {
    let mut writer = DescriptorWriter::new();
    writer
        .write_buffer(0, BufferHandle::from_raw(5), 256, 0, DescriptorType::UniformBuffer)
        .write_image(
            1,
            ImageViewHandle::from_raw(6),
            SamplerHandle::from_raw(7),
            ImageLayout::ShaderReadOnlyOptimal,
            DescriptorType::CombinedImageSampler,
        );

    assert_eq!(writer.writes().len(), 2);
    assert_eq!(writer.writes()[0].binding(), 0);
    assert!(matches!(
        writer.writes()[1],
        DescriptorWrite::Image { sampler, .. } if sampler == SamplerHandle::from_raw(7)
    ));
}

#[test]
fn test_writer_update_set() {
    let device = MockDevice::new();
    let mut writer = DescriptorWriter::new();
    writer.write_buffer(0, BufferHandle::from_raw(5), 64, 0, DescriptorType::UniformBuffer);
    writer.write_buffer(2, BufferHandle::from_raw(8), 64, 0, DescriptorType::StorageBuffer);

    writer.update_set(&device, DescriptorSetHandle::from_raw(42));

    assert_eq!(device.calls(), vec!["update_descriptor_set:42:[0,2]".to_string()]);
}

#[test]
fn test_writer_clear_skips_update() {
    let device = MockDevice::new();
    let mut writer = DescriptorWriter::new();
    writer.write_buffer(0, BufferHandle::from_raw(5), 64, 0, DescriptorType::UniformBuffer);
    writer.clear();

    writer.update_set(&device, DescriptorSetHandle::from_raw(42));

    assert!(device.calls().is_empty());
}
