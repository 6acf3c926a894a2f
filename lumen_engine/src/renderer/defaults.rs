/// Default resources: fallback textures, samplers and material

use std::sync::Arc;
use crate::descriptor::DescriptorWriter;
use crate::device::*;
use crate::error::{Error, Result};
use crate::ledger::Releasable;
use crate::renderer::Renderer;
use crate::scene::{MaterialConstants, MaterialInstance, MaterialPass, MaterialPipeline};

/// Side of the error checkerboard, in texels
pub const CHECKERBOARD_SIZE: u32 = 16;

const WHITE: [u8; 4] = [255, 255, 255, 255];
const GREY: [u8; 4] = [170, 170, 170, 255];
const BLACK: [u8; 4] = [0, 0, 0, 0];
const MAGENTA: [u8; 4] = [255, 0, 255, 255];
const OPAQUE_BLACK: [u8; 4] = [0, 0, 0, 255];

/// Resources every scene can fall back to
///
/// Owned by the renderer's global ledger; released at shutdown.
#[derive(Debug, Clone)]
pub struct DefaultResources {
    pub white_image: AllocatedImage,
    pub grey_image: AllocatedImage,
    pub black_image: AllocatedImage,
    /// Magenta/black checkerboard shown in place of missing textures
    pub error_checkerboard_image: AllocatedImage,
    pub linear_sampler: SamplerHandle,
    pub nearest_sampler: SamplerHandle,
    /// Constants of the default material
    pub material_constants: AllocatedBuffer,
    /// White, untextured material; drawn only once a pipeline is set
    pub default_material: Arc<MaterialInstance>,
}

impl DefaultResources {
    /// Placeholder with null handles, before the renderer created the real ones
    pub(crate) fn unset() -> Self {
        let null_image = AllocatedImage {
            image: ImageHandle::NULL,
            view: ImageViewHandle::NULL,
            extent: Extent3D::new(0, 0, 0),
            format: Format::Undefined,
            mip_levels: 0,
        };
        Self {
            white_image: null_image,
            grey_image: null_image,
            black_image: null_image,
            error_checkerboard_image: null_image,
            linear_sampler: SamplerHandle::NULL,
            nearest_sampler: SamplerHandle::NULL,
            material_constants: AllocatedBuffer {
                buffer: BufferHandle::NULL,
                size: 0,
                usage: BufferUsage::empty(),
                location: MemoryLocation::CpuToGpu,
            },
            default_material: Arc::new(MaterialInstance {
                pipeline: MaterialPipeline::default(),
                material_set: DescriptorSetHandle::NULL,
                pass_type: MaterialPass::MainColor,
            }),
        }
    }
}

/// RGBA8 texels of the error checkerboard
pub fn checkerboard_pixels() -> Vec<u8> {
    let mut pixels = Vec::with_capacity((CHECKERBOARD_SIZE * CHECKERBOARD_SIZE * 4) as usize);
    for y in 0..CHECKERBOARD_SIZE {
        for x in 0..CHECKERBOARD_SIZE {
            let texel = if (x % 2) ^ (y % 2) == 1 { MAGENTA } else { OPAQUE_BLACK };
            pixels.extend_from_slice(&texel);
        }
    }
    pixels
}

impl Renderer {
    /// Create the default textures, samplers and material
    ///
    /// Everything is pushed to the global ledger as soon as it exists, so a
    /// failure part way leaves nothing behind after shutdown.
    pub(crate) fn create_defaults(&mut self) -> Result<DefaultResources> {
        let one = Extent3D::new(1, 1, 1);
        let sampled = ImageUsage::SAMPLED;

        let white_image = self.create_image(&WHITE, one, Format::R8G8B8A8_UNORM, sampled, false)?;
        self.global_ledger.push(Releasable::Image(white_image));
        let grey_image = self.create_image(&GREY, one, Format::R8G8B8A8_UNORM, sampled, false)?;
        self.global_ledger.push(Releasable::Image(grey_image));
        let black_image = self.create_image(&BLACK, one, Format::R8G8B8A8_UNORM, sampled, false)?;
        self.global_ledger.push(Releasable::Image(black_image));

        let checker_extent = Extent3D::new(CHECKERBOARD_SIZE, CHECKERBOARD_SIZE, 1);
        let error_checkerboard_image = self.create_image(
            &checkerboard_pixels(),
            checker_extent,
            Format::R8G8B8A8_UNORM,
            sampled,
            false,
        )?;
        self.global_ledger.push(Releasable::Image(error_checkerboard_image));

        let device = self.device.clone();
        let nearest_sampler = device.create_sampler(&SamplerDesc::uniform(Filter::Nearest))?;
        self.global_ledger.push(Releasable::Sampler(nearest_sampler));
        let linear_sampler = device.create_sampler(&SamplerDesc::uniform(Filter::Linear))?;
        self.global_ledger.push(Releasable::Sampler(linear_sampler));

        let constants = MaterialConstants::default();
        let material_constants = device.create_buffer(
            std::mem::size_of::<MaterialConstants>() as u64,
            BufferUsage::UNIFORM,
            MemoryLocation::CpuToGpu,
        )?;
        self.global_ledger.push(Releasable::Buffer(material_constants.buffer));
        device.write_buffer(material_constants.buffer, 0, bytemuck::bytes_of(&constants))?;

        let material_set = self
            .global_descriptors
            .as_mut()
            .ok_or_else(|| Error::InvalidResource("global descriptor allocator not created".to_string()))?
            .allocate(device.as_ref(), self.material_layout)?;

        let resources = MaterialResources {
            color_image: white_image,
            color_sampler: linear_sampler,
            metal_rough_image: white_image,
            metal_rough_sampler: linear_sampler,
            data_buffer: material_constants.buffer,
            data_offset: 0,
        };
        let default_material = self.write_material(MaterialPipeline::default(), MaterialPass::MainColor, &resources, material_set);

        crate::engine_debug!("lumen::Renderer", "Default resources created");
        Ok(DefaultResources {
            white_image,
            grey_image,
            black_image,
            error_checkerboard_image,
            linear_sampler,
            nearest_sampler,
            material_constants,
            default_material,
        })
    }
}

/// Images, samplers and constants bound by one material set
#[derive(Debug, Clone, Copy)]
pub struct MaterialResources {
    pub color_image: AllocatedImage,
    pub color_sampler: SamplerHandle,
    pub metal_rough_image: AllocatedImage,
    pub metal_rough_sampler: SamplerHandle,
    /// Buffer holding a [`MaterialConstants`] block
    pub data_buffer: BufferHandle,
    pub data_offset: u64,
}

impl Renderer {
    /// Fill `set` with `resources` and wrap it into a material instance
    ///
    /// `set` must have been allocated with [`Renderer::material_layout`].
    pub fn write_material(
        &self,
        pipeline: MaterialPipeline,
        pass: MaterialPass,
        resources: &MaterialResources,
        set: DescriptorSetHandle,
    ) -> Arc<MaterialInstance> {
        let mut writer = DescriptorWriter::new();
        writer
            .write_buffer(
                0,
                resources.data_buffer,
                std::mem::size_of::<MaterialConstants>() as u64,
                resources.data_offset,
                DescriptorType::UniformBuffer,
            )
            .write_image(
                1,
                resources.color_image.view,
                resources.color_sampler,
                ImageLayout::ShaderReadOnlyOptimal,
                DescriptorType::CombinedImageSampler,
            )
            .write_image(
                2,
                resources.metal_rough_image.view,
                resources.metal_rough_sampler,
                ImageLayout::ShaderReadOnlyOptimal,
                DescriptorType::CombinedImageSampler,
            );
        writer.update_set(self.device.as_ref(), set);

        Arc::new(MaterialInstance {
            pipeline,
            material_set: set,
            pass_type: pass,
        })
    }
}

#[cfg(test)]
#[path = "defaults_tests.rs"]
mod tests;
