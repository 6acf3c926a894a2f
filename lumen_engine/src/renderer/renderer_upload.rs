/// Uploads through immediate submission: meshes and images

use crate::device::*;
use crate::error::{Error, Result};
use crate::ledger::{DeletionLedger, Releasable};
use crate::renderer::Renderer;
use crate::scene::Vertex;

impl Renderer {
    /// Record `record` into the immediate command buffer and wait for it
    pub fn immediate_submit<F>(&mut self, record: F) -> Result<()>
    where
        F: FnOnce(&dyn GraphicsDevice, CommandBufferHandle) -> Result<()>,
    {
        let device = self.device.clone();
        let immediate = self
            .immediate
            .as_mut()
            .ok_or_else(|| Error::InvalidResource("immediate submission not available".to_string()))?;
        immediate.submit(device.as_ref(), |cmd| record(device.as_ref(), cmd))
    }

    /// Upload a mesh into GPU-only index and vertex buffers
    ///
    /// The vertex buffer is addressed from the shader through its device
    /// address. Blocks until the copy is done.
    ///
    /// # Errors
    ///
    /// `Error::InvalidResource` for an empty mesh; device errors otherwise.
    pub fn upload_mesh(&mut self, indices: &[u32], vertices: &[Vertex]) -> Result<GpuMeshBuffers> {
        if indices.is_empty() || vertices.is_empty() {
            return Err(Error::InvalidResource(format!(
                "upload_mesh: empty mesh ({} indices, {} vertices)",
                indices.len(),
                vertices.len()
            )));
        }

        let vertex_bytes: &[u8] = bytemuck::cast_slice(vertices);
        let index_bytes: &[u8] = bytemuck::cast_slice(indices);
        let vertex_size = vertex_bytes.len() as u64;
        let index_size = index_bytes.len() as u64;

        let device = self.device.clone();
        let mut created = DeletionLedger::new();

        let vertex_buffer = device.create_buffer(
            vertex_size,
            BufferUsage::STORAGE | BufferUsage::TRANSFER_DST | BufferUsage::SHADER_DEVICE_ADDRESS,
            MemoryLocation::GpuOnly,
        )?;
        created.push(Releasable::Buffer(vertex_buffer.buffer));

        let index_buffer = undo_on_err(
            device.as_ref(),
            &mut created,
            device.create_buffer(
                index_size,
                BufferUsage::INDEX | BufferUsage::TRANSFER_DST,
                MemoryLocation::GpuOnly,
            ),
        )?;
        created.push(Releasable::Buffer(index_buffer.buffer));

        let staging = undo_on_err(
            device.as_ref(),
            &mut created,
            device.create_buffer(vertex_size + index_size, BufferUsage::TRANSFER_SRC, MemoryLocation::CpuToGpu),
        )?;
        let mut staging_ledger = DeletionLedger::new();
        staging_ledger.push(Releasable::Buffer(staging.buffer));

        let uploaded = device
            .write_buffer(staging.buffer, 0, vertex_bytes)
            .and_then(|_| device.write_buffer(staging.buffer, vertex_size, index_bytes))
            .and_then(|_| {
                self.immediate_submit(|device, cmd| {
                    device.cmd_copy_buffer(cmd, staging.buffer, vertex_buffer.buffer, 0, 0, vertex_size);
                    device.cmd_copy_buffer(cmd, staging.buffer, index_buffer.buffer, vertex_size, 0, index_size);
                    Ok(())
                })
            });
        staging_ledger.flush(device.as_ref());
        undo_on_err(device.as_ref(), &mut created, uploaded)?;

        let mesh = GpuMeshBuffers {
            index_buffer,
            vertex_buffer,
            vertex_buffer_address: device.buffer_device_address(vertex_buffer.buffer),
        };
        crate::engine_trace!(
            "lumen::Renderer",
            "Uploaded mesh: {} indices, {} vertices",
            indices.len(),
            vertices.len()
        );
        Ok(mesh)
    }

    /// Release the buffers of a mesh; the GPU must no longer use them
    pub fn destroy_mesh(&self, mesh: GpuMeshBuffers) {
        Releasable::MeshBuffers(mesh).release(self.device.as_ref());
    }

    /// Create an image without contents
    ///
    /// With `mipmapped` the full chain down to 1x1 is allocated.
    pub fn create_empty_image(
        &self,
        extent: Extent3D,
        format: Format,
        usage: ImageUsage,
        mipmapped: bool,
    ) -> Result<AllocatedImage> {
        let mip_levels = if mipmapped { extent.mip_levels() } else { 1 };
        self.device.create_image(&ImageDesc {
            extent,
            format,
            usage,
            mip_levels,
        })
    }

    /// Create an image and upload `pixels` into it
    ///
    /// The image ends in `ShaderReadOnlyOptimal`. With `mipmapped` every
    /// level is generated from the uploaded one.
    ///
    /// # Errors
    ///
    /// `Error::InvalidResource` if `pixels` is shorter than the image.
    pub fn create_image(
        &mut self,
        pixels: &[u8],
        extent: Extent3D,
        format: Format,
        usage: ImageUsage,
        mipmapped: bool,
    ) -> Result<AllocatedImage> {
        let size = extent.texel_count() * format.bytes_per_pixel() as u64;
        if size == 0 || (pixels.len() as u64) < size {
            crate::engine_warn!(
                "lumen::Renderer",
                "create_image: {} bytes given, {}x{}x{} {:?} needs {}",
                pixels.len(), extent.width, extent.height, extent.depth, format, size
            );
            return Err(Error::InvalidResource(format!(
                "image data too small: {} bytes for {} required",
                pixels.len(),
                size
            )));
        }

        let device = self.device.clone();
        let mut upload_usage = usage | ImageUsage::TRANSFER_DST;
        if mipmapped {
            upload_usage |= ImageUsage::TRANSFER_SRC;
        }
        let image = self.create_empty_image(extent, format, upload_usage, mipmapped)?;
        let mut created = DeletionLedger::new();
        created.push(Releasable::Image(image));

        let staging = undo_on_err(
            device.as_ref(),
            &mut created,
            device.create_buffer(size, BufferUsage::TRANSFER_SRC, MemoryLocation::CpuToGpu),
        )?;
        let mut staging_ledger = DeletionLedger::new();
        staging_ledger.push(Releasable::Buffer(staging.buffer));

        let uploaded = device
            .write_buffer(staging.buffer, 0, &pixels[..size as usize])
            .and_then(|_| {
                self.immediate_submit(|device, cmd| {
                    device.cmd_transition_image(cmd, image.image, ImageLayout::Undefined, ImageLayout::TransferDstOptimal);
                    device.cmd_copy_buffer_to_image(cmd, staging.buffer, image.image, extent);
                    if mipmapped {
                        device.cmd_generate_mipmaps(cmd, image.image, extent.to_2d(), image.mip_levels);
                    } else {
                        device.cmd_transition_image(
                            cmd,
                            image.image,
                            ImageLayout::TransferDstOptimal,
                            ImageLayout::ShaderReadOnlyOptimal,
                        );
                    }
                    Ok(())
                })
            });
        staging_ledger.flush(device.as_ref());
        undo_on_err(device.as_ref(), &mut created, uploaded)?;

        Ok(image)
    }

    /// Release an image and its view; the GPU must no longer use it
    pub fn destroy_image(&self, image: AllocatedImage) {
        Releasable::Image(image).release(self.device.as_ref());
    }
}

fn undo_on_err<T>(device: &dyn GraphicsDevice, created: &mut DeletionLedger, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        crate::engine_warn!("lumen::Renderer", "Upload failed: {}", e);
        created.flush(device);
    }
    result
}

#[cfg(test)]
#[path = "renderer_upload_tests.rs"]
mod tests;
