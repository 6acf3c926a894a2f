/// Renderer - the engine context
///
/// Owns the frame ring, the immediate submitter, the global ledger and
/// descriptor allocator, the offscreen draw and depth images, the optional
/// compute background and the default resources. Only one renderer may be alive at a time; the instance guard is
/// taken in `new` and released by `shutdown` (or drop).
///
/// # Example
///
/// ```no_run
/// # use std::sync::Arc;
/// # use lumen_engine::lumen::{Renderer, RendererConfig, scene::{SceneGraph, SceneData}};
/// # fn run(device: Arc<dyn lumen_engine::lumen::device::GraphicsDevice>,
/// #        surface: Box<dyn lumen_engine::lumen::device::PresentSurface>) -> lumen_engine::lumen::Result<()> {
/// let mut renderer = Renderer::new(device, surface, RendererConfig::default())?;
/// let scene = SceneGraph::new();
/// renderer.draw_frame(&scene, &SceneData::default())?;
/// if renderer.frame_resize_requested() {
///     renderer.rebuild_swapchain(1280, 720)?;
/// }
/// renderer.shutdown();
/// # Ok(())
/// # }
/// ```

use std::sync::Arc;
use glam::Mat4;
use crate::descriptor::{DescriptorAllocator, DescriptorLayoutBuilder, DescriptorWriter};
use crate::device::*;
use crate::engine::{Engine, RendererGuard};
use crate::error::{Error, Result};
use crate::frame::{FrameOutcome, FrameRing};
use crate::immediate::ImmediateSubmit;
use crate::ledger::{DeletionLedger, Releasable};
use crate::renderer::config::RendererConfig;
use crate::renderer::defaults::DefaultResources;
use crate::renderer::renderer_background::{background_group_counts, BackgroundPipeline};
use crate::renderer::renderer_draw::{record_geometry, DrawCounts};
use crate::scene::{DrawContext, Drawable, SceneData};

/// Sets in the first pool of the global descriptor allocator
const GLOBAL_DESCRIPTOR_SETS: u32 = 10;

/// Renderer statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RendererStats {
    /// Ticks run so far, skipped ones included
    pub frame_number: u64,
    pub frames_presented: u64,
    pub frames_skipped: u64,
    /// Opaque draws recorded in the last presented frame
    pub opaque_draws: u32,
    /// Transparent draws recorded in the last presented frame
    pub transparent_draws: u32,
}

pub struct Renderer {
    pub(crate) device: Arc<dyn GraphicsDevice>,
    surface: Box<dyn PresentSurface>,
    pub(crate) config: RendererConfig,
    ring: FrameRing,
    pub(crate) immediate: Option<ImmediateSubmit>,
    pub(crate) global_ledger: DeletionLedger,
    pub(crate) global_descriptors: Option<DescriptorAllocator>,
    pub(crate) draw_image: Option<AllocatedImage>,
    depth_image: Option<AllocatedImage>,
    /// Storage-image view of the draw image, read by the background pass
    pub(crate) draw_image_layout: DescriptorSetLayoutHandle,
    pub(crate) draw_image_set: DescriptorSetHandle,
    pub(crate) background: Option<BackgroundPipeline>,
    pub(crate) scene_data_layout: DescriptorSetLayoutHandle,
    pub(crate) material_layout: DescriptorSetLayoutHandle,
    pub(crate) defaults: DefaultResources,
    draw_context: DrawContext,
    stats: RendererStats,
    shut_down: bool,
    guard: Option<RendererGuard>,
}

impl Renderer {
    /// Create the renderer on `device`, presenting to `surface`
    ///
    /// # Errors
    ///
    /// `Error::InitializationFailed` if another renderer is alive or the
    /// configuration is unusable; device errors from resource creation.
    /// Whatever was created before a failure is released again.
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        surface: Box<dyn PresentSurface>,
        config: RendererConfig,
    ) -> Result<Self> {
        let guard = Engine::claim_renderer()?;
        let ring = FrameRing::new(device.as_ref(), &config)?;

        let mut renderer = Self {
            device,
            surface,
            config,
            ring,
            immediate: None,
            global_ledger: DeletionLedger::new(),
            global_descriptors: None,
            draw_image: None,
            depth_image: None,
            draw_image_layout: DescriptorSetLayoutHandle::NULL,
            draw_image_set: DescriptorSetHandle::NULL,
            background: None,
            scene_data_layout: DescriptorSetLayoutHandle::NULL,
            material_layout: DescriptorSetLayoutHandle::NULL,
            defaults: DefaultResources::unset(),
            draw_context: DrawContext::new(),
            stats: RendererStats::default(),
            shut_down: false,
            guard: Some(guard),
        };
        // On error `renderer` drops here and shutdown releases what exists
        renderer.init_resources()?;

        let extent = renderer.surface.extent();
        crate::engine_info!(
            "lumen::Renderer",
            "Renderer ready: {} frames in flight, {}x{} surface, {} swapchain images",
            renderer.config.frame_overlap,
            extent.width,
            extent.height,
            renderer.surface.image_count()
        );
        Ok(renderer)
    }

    fn init_resources(&mut self) -> Result<()> {
        let device = self.device.clone();

        self.immediate = Some(ImmediateSubmit::new(device.as_ref())?);
        self.global_descriptors = Some(DescriptorAllocator::with_max_sets(
            device.as_ref(),
            GLOBAL_DESCRIPTOR_SETS,
            &self.config.global_descriptor_ratios,
            self.config.max_sets_per_pool,
        )?);

        let mut builder = DescriptorLayoutBuilder::new();
        builder.add_binding(0, DescriptorType::StorageImage);
        self.draw_image_layout = builder.build(device.as_ref(), ShaderStages::COMPUTE)?;
        self.global_ledger.push(Releasable::DescriptorSetLayout(self.draw_image_layout));
        if let Some(descriptors) = self.global_descriptors.as_mut() {
            self.draw_image_set = descriptors.allocate(device.as_ref(), self.draw_image_layout)?;
        }

        self.create_draw_images(self.surface.extent())?;

        builder.clear();
        builder.add_binding(0, DescriptorType::UniformBuffer);
        self.scene_data_layout = builder.build(device.as_ref(), ShaderStages::VERTEX | ShaderStages::FRAGMENT)?;
        self.global_ledger.push(Releasable::DescriptorSetLayout(self.scene_data_layout));

        builder.clear();
        builder
            .add_binding(0, DescriptorType::UniformBuffer)
            .add_binding(1, DescriptorType::CombinedImageSampler)
            .add_binding(2, DescriptorType::CombinedImageSampler);
        self.material_layout = builder.build(device.as_ref(), ShaderStages::VERTEX | ShaderStages::FRAGMENT)?;
        self.global_ledger.push(Releasable::DescriptorSetLayout(self.material_layout));

        self.defaults = self.create_defaults()?;
        Ok(())
    }

    /// (Re)create the offscreen color and depth images at `extent`
    ///
    /// The storage-image set is rewritten to the new draw image.
    fn create_draw_images(&mut self, extent: Extent2D) -> Result<()> {
        let extent = Extent3D::new(extent.width.max(1), extent.height.max(1), 1);

        let draw_image = self.create_empty_image(
            extent,
            self.config.draw_image_format,
            ImageUsage::TRANSFER_SRC | ImageUsage::TRANSFER_DST | ImageUsage::STORAGE | ImageUsage::COLOR_ATTACHMENT,
            false,
        )?;
        if let Some(old) = self.draw_image.replace(draw_image) {
            self.destroy_image(old);
        }

        let depth_image = self.create_empty_image(
            extent,
            self.config.depth_format,
            ImageUsage::DEPTH_STENCIL_ATTACHMENT,
            false,
        )?;
        if let Some(old) = self.depth_image.replace(depth_image) {
            self.destroy_image(old);
        }
        self.write_draw_image_set();

        crate::engine_debug!("lumen::Renderer", "Draw images created at {}x{}", extent.width, extent.height);
        Ok(())
    }

    // ===== FRAME LOOP =====

    /// Draw `scene` and present it
    ///
    /// Flattens the scene into the draw context, then runs one tick of the
    /// frame ring: fill the draw image (background compute pass, or the
    /// clear color when none is installed), render opaque then transparent
    /// surfaces into it, and blit it to the swapchain image.
    ///
    /// # Errors
    ///
    /// Fatal device errors (fence timeout, device loss, ...) for the caller
    /// to escalate with [`crate::error::fatal`]. Out-of-date surfaces are
    /// reported as [`FrameOutcome::Skipped`] / [`FrameOutcome::PresentedNeedsResize`].
    pub fn draw_frame(&mut self, scene: &dyn Drawable, scene_data: &SceneData) -> Result<FrameOutcome> {
        if self.shut_down {
            return Err(Error::InvalidResource("renderer is shut down".to_string()));
        }
        let (Some(draw_image), Some(depth_image)) = (self.draw_image, self.depth_image) else {
            return Err(Error::InvalidResource("draw images missing".to_string()));
        };

        self.draw_context.clear();
        scene.draw(&Mat4::IDENTITY, &mut self.draw_context);

        let device = self.device.clone();
        let scene_data_layout = self.scene_data_layout;
        let clear_color = self.config.clear_color;
        let background = self.background;
        let draw_image_set = self.draw_image_set;
        let draw_context = &self.draw_context;
        let mut counts = DrawCounts::default();

        let outcome = self.ring.run_frame(device.as_ref(), self.surface.as_mut(), |ctx| {
            let device = ctx.device;
            let cmd = ctx.cmd;
            let draw_extent = Extent2D::new(
                draw_image.extent.width.min(ctx.swapchain_extent.width),
                draw_image.extent.height.min(ctx.swapchain_extent.height),
            );

            device.cmd_transition_image(cmd, draw_image.image, ImageLayout::Undefined, ImageLayout::General);
            match background {
                Some(background) => {
                    let (groups_x, groups_y) = background_group_counts(draw_extent);
                    device.cmd_bind_pipeline(cmd, PipelineBindPoint::Compute, background.pipeline);
                    device.cmd_bind_descriptor_set(
                        cmd,
                        PipelineBindPoint::Compute,
                        background.layout,
                        0,
                        draw_image_set,
                    );
                    device.cmd_dispatch(cmd, groups_x, groups_y, 1);
                }
                None => device.cmd_clear_color_image(cmd, draw_image.image, clear_color),
            }
            device.cmd_transition_image(cmd, draw_image.image, ImageLayout::General, ImageLayout::ColorAttachmentOptimal);
            device.cmd_transition_image(cmd, depth_image.image, ImageLayout::Undefined, ImageLayout::DepthAttachmentOptimal);

            // Scene uniforms live exactly as long as this frame
            let scene_size = std::mem::size_of::<SceneData>() as u64;
            let scene_buffer = device.create_buffer(scene_size, BufferUsage::UNIFORM, MemoryLocation::CpuToGpu)?;
            ctx.ledger.push(Releasable::Buffer(scene_buffer.buffer));
            device.write_buffer(scene_buffer.buffer, 0, bytemuck::bytes_of(scene_data))?;

            let scene_set = ctx.descriptors.allocate(device, scene_data_layout)?;
            let mut writer = DescriptorWriter::new();
            writer.write_buffer(0, scene_buffer.buffer, scene_size, 0, DescriptorType::UniformBuffer);
            writer.update_set(device, scene_set);

            device.cmd_begin_rendering(cmd, &RenderingInfo {
                extent: draw_extent,
                color_view: draw_image.view,
                color_clear: None,
                depth_view: Some(depth_image.view),
                depth_clear: Some(0.0),
            });
            device.cmd_set_viewport_scissor(cmd, draw_extent);
            counts = record_geometry(device, cmd, draw_context, scene_set);
            device.cmd_end_rendering(cmd);

            device.cmd_transition_image(
                cmd,
                draw_image.image,
                ImageLayout::ColorAttachmentOptimal,
                ImageLayout::TransferSrcOptimal,
            );
            device.cmd_transition_image(cmd, ctx.swapchain_image, ImageLayout::Undefined, ImageLayout::TransferDstOptimal);
            device.cmd_blit_image(cmd, draw_image.image, ctx.swapchain_image, draw_extent, ctx.swapchain_extent);
            device.cmd_transition_image(cmd, ctx.swapchain_image, ImageLayout::TransferDstOptimal, ImageLayout::PresentSrc);
            Ok(())
        });

        self.stats.frame_number = self.ring.frame_number();
        match outcome {
            Ok(FrameOutcome::Skipped) => self.stats.frames_skipped += 1,
            Ok(_) => {
                self.stats.frames_presented += 1;
                self.stats.opaque_draws = counts.opaque;
                self.stats.transparent_draws = counts.transparent;
            }
            Err(ref e) => {
                crate::engine_error!("lumen::Renderer", "Frame {} failed: {}", self.stats.frame_number, e);
            }
        }
        outcome
    }

    /// Whether the swapchain must be rebuilt before the next frame
    pub fn frame_resize_requested(&self) -> bool {
        self.ring.resize_requested()
    }

    /// Rebuild the swapchain at `width` x `height`
    ///
    /// A zero size (minimized window) does nothing and keeps the request
    /// pending. The draw images grow when the new surface is larger.
    pub fn rebuild_swapchain(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            crate::engine_debug!("lumen::Renderer", "Ignoring swapchain rebuild to {}x{}", width, height);
            return Ok(());
        }

        self.device.wait_idle()?;
        self.surface.recreate(width, height)?;

        let extent = self.surface.extent();
        let too_small = self
            .draw_image
            .map(|image| image.extent.width < extent.width || image.extent.height < extent.height)
            .unwrap_or(true);
        if too_small {
            let current = self.draw_image.map(|image| image.extent.to_2d()).unwrap_or_default();
            self.create_draw_images(Extent2D::new(
                current.width.max(extent.width),
                current.height.max(extent.height),
            ))?;
        }

        self.ring.clear_resize_request();
        crate::engine_info!("lumen::Renderer", "Swapchain rebuilt at {}x{}", extent.width, extent.height);
        Ok(())
    }

    // ===== ACCESSORS =====

    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn stats(&self) -> RendererStats {
        self.stats
    }

    pub fn defaults(&self) -> &DefaultResources {
        &self.defaults
    }

    /// Layout of set 0: the per-frame scene uniforms
    pub fn scene_data_layout(&self) -> DescriptorSetLayoutHandle {
        self.scene_data_layout
    }

    /// Layout of set 1: material constants, color and metal-rough textures
    pub fn material_layout(&self) -> DescriptorSetLayoutHandle {
        self.material_layout
    }

    pub fn draw_image(&self) -> Option<&AllocatedImage> {
        self.draw_image.as_ref()
    }

    pub fn surface_extent(&self) -> Extent2D {
        self.surface.extent()
    }

    /// Draws collected by the last `draw_frame`
    pub fn draw_context(&self) -> &DrawContext {
        &self.draw_context
    }

    pub fn frame_ring(&self) -> &FrameRing {
        &self.ring
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    // ===== TEARDOWN =====

    /// Release every GPU object and the instance guard
    ///
    /// Waits for the device to go idle first. Idempotent; also run on drop.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        let device = self.device.clone();
        if let Err(e) = device.wait_idle() {
            crate::engine_error!("lumen::Renderer", "wait_idle failed during shutdown: {}", e);
        }

        self.ring.destroy(device.as_ref());
        if let Some(immediate) = self.immediate.take() {
            immediate.destroy(device.as_ref());
        }
        if let Some(image) = self.draw_image.take() {
            device.destroy_image(&image);
        }
        if let Some(image) = self.depth_image.take() {
            device.destroy_image(&image);
        }
        self.global_ledger.flush(device.as_ref());
        if let Some(mut descriptors) = self.global_descriptors.take() {
            descriptors.destroy_pools(device.as_ref());
        }
        self.defaults = DefaultResources::unset();
        self.background = None;
        self.draw_image_set = DescriptorSetHandle::NULL;
        self.draw_context.clear();
        self.guard = None;

        crate::engine_info!("lumen::Renderer", "Renderer shut down after {} frames", self.stats.frame_number);
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
#[path = "renderer_tests.rs"]
mod tests;
