/// GraphicsDevice trait - the GPU capability interface
///
/// Everything the renderer core needs from a graphics API. Backends
/// (`lumen_engine_renderer_vulkan::VulkanDevice`) implement it; the core is
/// tested against an in-crate mock.
///
/// All methods take `&self`: backends keep their handle tables behind
/// internal locks. Creation and wait calls are fallible; destruction and
/// recording calls are not (invalid usage there is a programming error
/// reported by validation layers, not a runtime condition).

use crate::error::Result;
use crate::device::handle::*;
use crate::device::types::*;

pub trait GraphicsDevice: Send + Sync {
    // ===== SYNCHRONIZATION =====

    /// Create a fence, optionally already signaled
    fn create_fence(&self, signaled: bool) -> Result<FenceHandle>;

    fn destroy_fence(&self, fence: FenceHandle);

    /// Block until `fence` is signaled
    ///
    /// # Errors
    ///
    /// `Error::Timeout` when `timeout_ns` expires, `Error::DeviceLost` on device loss.
    fn wait_for_fence(&self, fence: FenceHandle, timeout_ns: u64) -> Result<()>;

    fn reset_fence(&self, fence: FenceHandle) -> Result<()>;

    fn create_semaphore(&self) -> Result<SemaphoreHandle>;

    fn destroy_semaphore(&self, semaphore: SemaphoreHandle);

    /// Block until the device has no pending work
    fn wait_idle(&self) -> Result<()>;

    // ===== COMMAND BUFFERS =====

    /// Create a resettable command pool on the graphics queue family
    fn create_command_pool(&self) -> Result<CommandPoolHandle>;

    /// Destroy a pool and every command buffer allocated from it
    fn destroy_command_pool(&self, pool: CommandPoolHandle);

    fn allocate_command_buffer(&self, pool: CommandPoolHandle) -> Result<CommandBufferHandle>;

    fn reset_command_buffer(&self, cmd: CommandBufferHandle) -> Result<()>;

    /// Begin recording for a single submission
    fn begin_command_buffer(&self, cmd: CommandBufferHandle) -> Result<()>;

    fn end_command_buffer(&self, cmd: CommandBufferHandle) -> Result<()>;

    /// Submit one command buffer to the graphics queue
    ///
    /// Waits on `wait` at the color-attachment-output stage, signals `signal`
    /// when done, and signals `fence` on completion.
    fn submit(
        &self,
        cmd: CommandBufferHandle,
        wait: Option<SemaphoreHandle>,
        signal: Option<SemaphoreHandle>,
        fence: FenceHandle,
    ) -> Result<()>;

    // ===== DESCRIPTORS =====

    fn create_descriptor_pool(
        &self,
        max_sets: u32,
        sizes: &[DescriptorPoolSize],
    ) -> Result<DescriptorPoolHandle>;

    /// Return every set of `pool` to it; the pool keeps its capacity
    fn reset_descriptor_pool(&self, pool: DescriptorPoolHandle) -> Result<()>;

    fn destroy_descriptor_pool(&self, pool: DescriptorPoolHandle);

    /// Allocate one set
    ///
    /// # Errors
    ///
    /// `Error::OutOfPoolMemory` or `Error::FragmentedPool` when `pool` cannot
    /// serve `layout`; callers grow and retry.
    fn allocate_descriptor_set(
        &self,
        pool: DescriptorPoolHandle,
        layout: DescriptorSetLayoutHandle,
    ) -> Result<DescriptorSetHandle>;

    fn create_descriptor_set_layout(
        &self,
        bindings: &[DescriptorBinding],
    ) -> Result<DescriptorSetLayoutHandle>;

    fn destroy_descriptor_set_layout(&self, layout: DescriptorSetLayoutHandle);

    fn update_descriptor_set(&self, set: DescriptorSetHandle, writes: &[DescriptorWrite]);

    // ===== BUFFERS =====

    fn create_buffer(
        &self,
        size: u64,
        usage: BufferUsage,
        location: MemoryLocation,
    ) -> Result<AllocatedBuffer>;

    /// Destroy a buffer and free its memory
    fn destroy_buffer(&self, buffer: BufferHandle);

    /// Copy `data` into a host-visible buffer at `offset`
    fn write_buffer(&self, buffer: BufferHandle, offset: u64, data: &[u8]) -> Result<()>;

    /// GPU virtual address of a buffer created with `SHADER_DEVICE_ADDRESS`
    fn buffer_device_address(&self, buffer: BufferHandle) -> u64;

    // ===== IMAGES =====

    /// Create a device-local image with a default view
    fn create_image(&self, desc: &ImageDesc) -> Result<AllocatedImage>;

    /// Destroy view, image and memory
    fn destroy_image(&self, image: &AllocatedImage);

    fn create_sampler(&self, desc: &SamplerDesc) -> Result<SamplerHandle>;

    fn destroy_sampler(&self, sampler: SamplerHandle);

    // ===== SHADERS AND PIPELINES =====

    fn create_shader_module(&self, spirv: &[u32]) -> Result<ShaderModuleHandle>;

    fn destroy_shader_module(&self, module: ShaderModuleHandle);

    fn create_pipeline_layout(&self, desc: &PipelineLayoutDesc) -> Result<PipelineLayoutHandle>;

    fn destroy_pipeline_layout(&self, layout: PipelineLayoutHandle);

    fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc) -> Result<PipelineHandle>;

    fn create_compute_pipeline(&self, desc: &ComputePipelineDesc) -> Result<PipelineHandle>;

    fn destroy_pipeline(&self, pipeline: PipelineHandle);

    // ===== RECORDING =====

    /// Full-pipeline barrier moving `image` from `from` to `to`
    fn cmd_transition_image(
        &self,
        cmd: CommandBufferHandle,
        image: ImageHandle,
        from: ImageLayout,
        to: ImageLayout,
    );

    fn cmd_copy_buffer(
        &self,
        cmd: CommandBufferHandle,
        src: BufferHandle,
        dst: BufferHandle,
        src_offset: u64,
        dst_offset: u64,
        size: u64,
    );

    /// Copy tightly packed texels into mip 0 of an image in `TransferDstOptimal`
    fn cmd_copy_buffer_to_image(
        &self,
        cmd: CommandBufferHandle,
        src: BufferHandle,
        dst: ImageHandle,
        extent: Extent3D,
    );

    /// Linear blit of the whole of `src` (TransferSrcOptimal) onto `dst` (TransferDstOptimal)
    fn cmd_blit_image(
        &self,
        cmd: CommandBufferHandle,
        src: ImageHandle,
        dst: ImageHandle,
        src_extent: Extent2D,
        dst_extent: Extent2D,
    );

    /// Fill the mip chain from mip 0; leaves the image in `ShaderReadOnlyOptimal`
    fn cmd_generate_mipmaps(
        &self,
        cmd: CommandBufferHandle,
        image: ImageHandle,
        extent: Extent2D,
        mip_levels: u32,
    );

    /// Clear an image in `General` layout
    fn cmd_clear_color_image(&self, cmd: CommandBufferHandle, image: ImageHandle, color: [f32; 4]);

    fn cmd_begin_rendering(&self, cmd: CommandBufferHandle, info: &RenderingInfo);

    fn cmd_end_rendering(&self, cmd: CommandBufferHandle);

    /// Set a full-extent viewport and scissor
    fn cmd_set_viewport_scissor(&self, cmd: CommandBufferHandle, extent: Extent2D);

    fn cmd_bind_pipeline(&self, cmd: CommandBufferHandle, bind_point: PipelineBindPoint, pipeline: PipelineHandle);

    fn cmd_bind_descriptor_set(
        &self,
        cmd: CommandBufferHandle,
        bind_point: PipelineBindPoint,
        layout: PipelineLayoutHandle,
        set_index: u32,
        set: DescriptorSetHandle,
    );

    /// Bind a `u32` index buffer
    fn cmd_bind_index_buffer(&self, cmd: CommandBufferHandle, buffer: BufferHandle);

    fn cmd_push_constants(
        &self,
        cmd: CommandBufferHandle,
        layout: PipelineLayoutHandle,
        stages: ShaderStages,
        offset: u32,
        data: &[u8],
    );

    fn cmd_draw_indexed(&self, cmd: CommandBufferHandle, index_count: u32, first_index: u32);

    /// Run the bound compute pipeline over `x` * `y` * `z` workgroups
    fn cmd_dispatch(&self, cmd: CommandBufferHandle, x: u32, y: u32, z: u32);
}
