/// Mock GraphicsDevice and PresentSurface for unit tests (no GPU required)
///
/// The mock keeps a call log, tracks every live object so leaks and double
/// frees are visible, enforces descriptor pool capacity, and simulates fence
/// completion (automatic, or manual through `complete_submissions`).

use std::sync::{Arc, Mutex, MutexGuard};
use rustc_hash::FxHashMap;
use crate::device::graphics_device::GraphicsDevice;
use crate::device::surface::PresentSurface;
use crate::device::handle::*;
use crate::device::types::*;
use crate::error::{Error, Result};

// ============================================================================
// Mock device state
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockObject {
    Fence,
    Semaphore,
    CommandPool,
    CommandBuffer,
    DescriptorPool,
    DescriptorSetLayout,
    Buffer,
    Image,
    ImageView,
    Sampler,
    ShaderModule,
    PipelineLayout,
    Pipeline,
}

#[derive(Debug, Clone)]
pub struct MockPool {
    pub max_sets: u32,
    pub allocated_sets: u32,
    pub capacity: FxHashMap<DescriptorType, u32>,
    pub used: FxHashMap<DescriptorType, u32>,
    pub reset_count: u32,
}

#[derive(Debug, Default)]
struct MockState {
    next_handle: u64,
    calls: Vec<String>,
    live: FxHashMap<u64, MockObject>,
    misuse: Vec<String>,
    fences: FxHashMap<u64, bool>,
    pending: Vec<u64>,
    pools: FxHashMap<u64, MockPool>,
    layouts: FxHashMap<u64, Vec<DescriptorBinding>>,
    set_owner: FxHashMap<u64, u64>,
    buffers: FxHashMap<u64, Vec<u8>>,
    set_writes: FxHashMap<u64, Vec<DescriptorWrite>>,
    manual_completion: bool,
    device_lost: bool,
    fail_shader_modules: bool,
    fail_pipelines: bool,
    submissions: u32,
}

impl MockState {
    fn create(&mut self, kind: MockObject) -> u64 {
        self.next_handle += 1;
        let raw = self.next_handle;
        self.live.insert(raw, kind);
        raw
    }

    fn destroy(&mut self, raw: u64, kind: MockObject) {
        match self.live.remove(&raw) {
            Some(found) if found == kind => {}
            Some(found) => {
                self.misuse.push(format!("destroy {:?} {} but it is a {:?}", kind, raw, found));
            }
            None => self.misuse.push(format!("destroy {:?} {} not alive", kind, raw)),
        }
    }

    fn log(&mut self, call: String) {
        self.calls.push(call);
    }
}

/// In-memory GraphicsDevice
#[derive(Debug, Default)]
pub struct MockDevice {
    state: Mutex<MockState>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared device, as the renderer takes it
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// Submitted fences stay unsignaled until `complete_submissions`
    pub fn set_manual_completion(&self, manual: bool) {
        self.state().manual_completion = manual;
    }

    /// Signal every pending fence
    pub fn complete_submissions(&self) {
        let mut state = self.state();
        let pending = std::mem::take(&mut state.pending);
        for fence in pending {
            state.fences.insert(fence, true);
        }
    }

    /// Make every subsequent fence wait fail with DeviceLost
    pub fn set_device_lost(&self, lost: bool) {
        self.state().device_lost = lost;
    }

    /// Make shader module creation fail
    pub fn set_fail_shader_modules(&self, fail: bool) {
        self.state().fail_shader_modules = fail;
    }

    /// Make every graphics and compute pipeline creation fail
    pub fn set_fail_pipelines(&self, fail: bool) {
        self.state().fail_pipelines = fail;
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Calls whose name starts with `prefix`
    pub fn calls_matching(&self, prefix: &str) -> Vec<String> {
        self.state().calls.iter().filter(|c| c.starts_with(prefix)).cloned().collect()
    }

    /// Position of the first call equal to `call`
    pub fn call_index(&self, call: &str) -> Option<usize> {
        self.state().calls.iter().position(|c| c == call)
    }

    pub fn live_count(&self) -> usize {
        self.state().live.len()
    }

    pub fn live_count_of(&self, kind: MockObject) -> usize {
        self.state().live.values().filter(|k| **k == kind).count()
    }

    pub fn is_alive(&self, raw: u64) -> bool {
        self.state().live.contains_key(&raw)
    }

    /// Destroys of dead or mistyped handles
    pub fn misuse(&self) -> Vec<String> {
        self.state().misuse.clone()
    }

    pub fn pool(&self, pool: DescriptorPoolHandle) -> Option<MockPool> {
        self.state().pools.get(&pool.as_raw()).cloned()
    }

    /// Pool a set was allocated from
    pub fn set_pool(&self, set: DescriptorSetHandle) -> Option<DescriptorPoolHandle> {
        self.state().set_owner.get(&set.as_raw()).map(|raw| DescriptorPoolHandle::from_raw(*raw))
    }

    pub fn is_fence_signaled(&self, fence: FenceHandle) -> bool {
        self.state().fences.get(&fence.as_raw()).copied().unwrap_or(false)
    }

    /// Writes of the last update applied to `set`
    pub fn set_writes(&self, set: DescriptorSetHandle) -> Option<Vec<DescriptorWrite>> {
        self.state().set_writes.get(&set.as_raw()).cloned()
    }

    pub fn buffer_contents(&self, buffer: BufferHandle) -> Option<Vec<u8>> {
        self.state().buffers.get(&buffer.as_raw()).cloned()
    }

    pub fn submission_count(&self) -> u32 {
        self.state().submissions
    }
}

impl GraphicsDevice for MockDevice {
    // ===== SYNCHRONIZATION =====

    fn create_fence(&self, signaled: bool) -> Result<FenceHandle> {
        let mut state = self.state();
        let raw = state.create(MockObject::Fence);
        state.fences.insert(raw, signaled);
        state.log(format!("create_fence:{}", raw));
        Ok(FenceHandle::from_raw(raw))
    }

    fn destroy_fence(&self, fence: FenceHandle) {
        let mut state = self.state();
        state.destroy(fence.as_raw(), MockObject::Fence);
        state.fences.remove(&fence.as_raw());
        state.log(format!("destroy_fence:{}", fence.as_raw()));
    }

    fn wait_for_fence(&self, fence: FenceHandle, _timeout_ns: u64) -> Result<()> {
        let mut state = self.state();
        state.log(format!("wait_fence:{}", fence.as_raw()));
        if state.device_lost {
            return Err(Error::DeviceLost);
        }
        match state.fences.get(&fence.as_raw()) {
            Some(true) => Ok(()),
            Some(false) => Err(Error::Timeout),
            None => Err(Error::InvalidResource(format!("fence {} not alive", fence.as_raw()))),
        }
    }

    fn reset_fence(&self, fence: FenceHandle) -> Result<()> {
        let mut state = self.state();
        state.fences.insert(fence.as_raw(), false);
        state.log(format!("reset_fence:{}", fence.as_raw()));
        Ok(())
    }

    fn create_semaphore(&self) -> Result<SemaphoreHandle> {
        let mut state = self.state();
        let raw = state.create(MockObject::Semaphore);
        state.log(format!("create_semaphore:{}", raw));
        Ok(SemaphoreHandle::from_raw(raw))
    }

    fn destroy_semaphore(&self, semaphore: SemaphoreHandle) {
        let mut state = self.state();
        state.destroy(semaphore.as_raw(), MockObject::Semaphore);
        state.log(format!("destroy_semaphore:{}", semaphore.as_raw()));
    }

    fn wait_idle(&self) -> Result<()> {
        let mut state = self.state();
        let pending = std::mem::take(&mut state.pending);
        for fence in pending {
            state.fences.insert(fence, true);
        }
        state.log("wait_idle".to_string());
        Ok(())
    }

    // ===== COMMAND BUFFERS =====

    fn create_command_pool(&self) -> Result<CommandPoolHandle> {
        let mut state = self.state();
        let raw = state.create(MockObject::CommandPool);
        state.log(format!("create_command_pool:{}", raw));
        Ok(CommandPoolHandle::from_raw(raw))
    }

    fn destroy_command_pool(&self, pool: CommandPoolHandle) {
        let mut state = self.state();
        state.destroy(pool.as_raw(), MockObject::CommandPool);
        state.log(format!("destroy_command_pool:{}", pool.as_raw()));
    }

    fn allocate_command_buffer(&self, pool: CommandPoolHandle) -> Result<CommandBufferHandle> {
        let mut state = self.state();
        // Freed with the pool, not tracked individually
        state.next_handle += 1;
        let raw = state.next_handle;
        state.log(format!("allocate_command_buffer:{}:{}", pool.as_raw(), raw));
        Ok(CommandBufferHandle::from_raw(raw))
    }

    fn reset_command_buffer(&self, cmd: CommandBufferHandle) -> Result<()> {
        self.state().log(format!("reset_cmd:{}", cmd.as_raw()));
        Ok(())
    }

    fn begin_command_buffer(&self, cmd: CommandBufferHandle) -> Result<()> {
        self.state().log(format!("begin_cmd:{}", cmd.as_raw()));
        Ok(())
    }

    fn end_command_buffer(&self, cmd: CommandBufferHandle) -> Result<()> {
        self.state().log(format!("end_cmd:{}", cmd.as_raw()));
        Ok(())
    }

    fn submit(
        &self,
        cmd: CommandBufferHandle,
        wait: Option<SemaphoreHandle>,
        signal: Option<SemaphoreHandle>,
        fence: FenceHandle,
    ) -> Result<()> {
        let mut state = self.state();
        if state.fences.get(&fence.as_raw()) == Some(&true) {
            let message = format!("submit with signaled fence {}", fence.as_raw());
            state.misuse.push(message.clone());
            return Err(Error::BackendError(message));
        }
        state.submissions += 1;
        state.log(format!(
            "submit:{}:wait={}:signal={}:fence={}",
            cmd.as_raw(),
            wait.map_or(0, |s| s.as_raw()),
            signal.map_or(0, |s| s.as_raw()),
            fence.as_raw()
        ));
        if state.manual_completion {
            state.pending.push(fence.as_raw());
        } else {
            state.fences.insert(fence.as_raw(), true);
        }
        Ok(())
    }

    // ===== DESCRIPTORS =====

    fn create_descriptor_pool(
        &self,
        max_sets: u32,
        sizes: &[DescriptorPoolSize],
    ) -> Result<DescriptorPoolHandle> {
        let mut state = self.state();
        let raw = state.create(MockObject::DescriptorPool);
        let mut capacity = FxHashMap::default();
        for size in sizes {
            *capacity.entry(size.descriptor_type).or_insert(0) += size.count;
        }
        state.pools.insert(raw, MockPool {
            max_sets,
            allocated_sets: 0,
            capacity,
            used: FxHashMap::default(),
            reset_count: 0,
        });
        state.log(format!("create_descriptor_pool:{}:{}", raw, max_sets));
        Ok(DescriptorPoolHandle::from_raw(raw))
    }

    fn reset_descriptor_pool(&self, pool: DescriptorPoolHandle) -> Result<()> {
        let mut state = self.state();
        let raw = pool.as_raw();
        let Some(entry) = state.pools.get_mut(&raw) else {
            return Err(Error::InvalidResource(format!("descriptor pool {} not alive", raw)));
        };
        entry.allocated_sets = 0;
        entry.used.clear();
        entry.reset_count += 1;
        state.set_owner.retain(|_, owner| *owner != raw);
        state.log(format!("reset_descriptor_pool:{}", raw));
        Ok(())
    }

    fn destroy_descriptor_pool(&self, pool: DescriptorPoolHandle) {
        let mut state = self.state();
        let raw = pool.as_raw();
        state.destroy(raw, MockObject::DescriptorPool);
        state.pools.remove(&raw);
        state.set_owner.retain(|_, owner| *owner != raw);
        state.log(format!("destroy_descriptor_pool:{}", raw));
    }

    fn allocate_descriptor_set(
        &self,
        pool: DescriptorPoolHandle,
        layout: DescriptorSetLayoutHandle,
    ) -> Result<DescriptorSetHandle> {
        let mut state = self.state();
        let bindings = state.layouts.get(&layout.as_raw()).cloned().unwrap_or_default();
        let Some(entry) = state.pools.get_mut(&pool.as_raw()) else {
            return Err(Error::InvalidResource(format!("descriptor pool {} not alive", pool.as_raw())));
        };

        if entry.allocated_sets >= entry.max_sets {
            return Err(Error::OutOfPoolMemory);
        }
        for binding in &bindings {
            let capacity = entry.capacity.get(&binding.descriptor_type).copied().unwrap_or(0);
            let used = entry.used.get(&binding.descriptor_type).copied().unwrap_or(0);
            if used + binding.count > capacity {
                return Err(Error::OutOfPoolMemory);
            }
        }

        entry.allocated_sets += 1;
        for binding in &bindings {
            *entry.used.entry(binding.descriptor_type).or_insert(0) += binding.count;
        }

        state.next_handle += 1;
        let raw = state.next_handle;
        state.set_owner.insert(raw, pool.as_raw());
        state.log(format!("allocate_descriptor_set:{}:{}", pool.as_raw(), raw));
        Ok(DescriptorSetHandle::from_raw(raw))
    }

    fn create_descriptor_set_layout(
        &self,
        bindings: &[DescriptorBinding],
    ) -> Result<DescriptorSetLayoutHandle> {
        let mut state = self.state();
        let raw = state.create(MockObject::DescriptorSetLayout);
        state.layouts.insert(raw, bindings.to_vec());
        state.log(format!("create_descriptor_set_layout:{}:{}", raw, bindings.len()));
        Ok(DescriptorSetLayoutHandle::from_raw(raw))
    }

    fn destroy_descriptor_set_layout(&self, layout: DescriptorSetLayoutHandle) {
        let mut state = self.state();
        state.destroy(layout.as_raw(), MockObject::DescriptorSetLayout);
        state.layouts.remove(&layout.as_raw());
        state.log(format!("destroy_descriptor_set_layout:{}", layout.as_raw()));
    }

    fn update_descriptor_set(&self, set: DescriptorSetHandle, writes: &[DescriptorWrite]) {
        let bindings: Vec<String> = writes.iter().map(|w| w.binding().to_string()).collect();
        let mut state = self.state();
        state.set_writes.insert(set.as_raw(), writes.to_vec());
        state.log(format!("update_descriptor_set:{}:[{}]", set.as_raw(), bindings.join(",")));
    }

    // ===== BUFFERS =====

    fn create_buffer(
        &self,
        size: u64,
        usage: BufferUsage,
        location: MemoryLocation,
    ) -> Result<AllocatedBuffer> {
        let mut state = self.state();
        let raw = state.create(MockObject::Buffer);
        state.buffers.insert(raw, vec![0; size as usize]);
        state.log(format!("create_buffer:{}:{}", raw, size));
        Ok(AllocatedBuffer {
            buffer: BufferHandle::from_raw(raw),
            size,
            usage,
            location,
        })
    }

    fn destroy_buffer(&self, buffer: BufferHandle) {
        let mut state = self.state();
        state.destroy(buffer.as_raw(), MockObject::Buffer);
        state.buffers.remove(&buffer.as_raw());
        state.log(format!("destroy_buffer:{}", buffer.as_raw()));
    }

    fn write_buffer(&self, buffer: BufferHandle, offset: u64, data: &[u8]) -> Result<()> {
        let mut state = self.state();
        let Some(contents) = state.buffers.get_mut(&buffer.as_raw()) else {
            return Err(Error::InvalidResource(format!("buffer {} not alive", buffer.as_raw())));
        };
        let start = offset as usize;
        let end = start + data.len();
        if end > contents.len() {
            return Err(Error::BackendError(format!(
                "write of {} bytes at {} overflows buffer of {} bytes",
                data.len(), offset, contents.len()
            )));
        }
        contents[start..end].copy_from_slice(data);
        state.log(format!("write_buffer:{}:{}", buffer.as_raw(), data.len()));
        Ok(())
    }

    fn buffer_device_address(&self, buffer: BufferHandle) -> u64 {
        0x1000_0000 + buffer.as_raw() * 0x1000
    }

    // ===== IMAGES =====

    fn create_image(&self, desc: &ImageDesc) -> Result<AllocatedImage> {
        let mut state = self.state();
        let image = state.create(MockObject::Image);
        let view = state.create(MockObject::ImageView);
        state.log(format!(
            "create_image:{}:{}x{}:{:?}",
            image, desc.extent.width, desc.extent.height, desc.format
        ));
        Ok(AllocatedImage {
            image: ImageHandle::from_raw(image),
            view: ImageViewHandle::from_raw(view),
            extent: desc.extent,
            format: desc.format,
            mip_levels: desc.mip_levels,
        })
    }

    fn destroy_image(&self, image: &AllocatedImage) {
        let mut state = self.state();
        state.destroy(image.view.as_raw(), MockObject::ImageView);
        state.destroy(image.image.as_raw(), MockObject::Image);
        state.log(format!("destroy_image:{}", image.image.as_raw()));
    }

    fn create_sampler(&self, desc: &SamplerDesc) -> Result<SamplerHandle> {
        let mut state = self.state();
        let raw = state.create(MockObject::Sampler);
        state.log(format!("create_sampler:{}:{:?}", raw, desc.mag_filter));
        Ok(SamplerHandle::from_raw(raw))
    }

    fn destroy_sampler(&self, sampler: SamplerHandle) {
        let mut state = self.state();
        state.destroy(sampler.as_raw(), MockObject::Sampler);
        state.log(format!("destroy_sampler:{}", sampler.as_raw()));
    }

    // ===== SHADERS AND PIPELINES =====

    fn create_shader_module(&self, spirv: &[u32]) -> Result<ShaderModuleHandle> {
        let mut state = self.state();
        if state.fail_shader_modules {
            return Err(Error::BackendError("vkCreateShaderModule failed".to_string()));
        }
        let raw = state.create(MockObject::ShaderModule);
        state.log(format!("create_shader_module:{}:{}", raw, spirv.len()));
        Ok(ShaderModuleHandle::from_raw(raw))
    }

    fn destroy_shader_module(&self, module: ShaderModuleHandle) {
        let mut state = self.state();
        state.destroy(module.as_raw(), MockObject::ShaderModule);
        state.log(format!("destroy_shader_module:{}", module.as_raw()));
    }

    fn create_pipeline_layout(&self, desc: &PipelineLayoutDesc) -> Result<PipelineLayoutHandle> {
        let mut state = self.state();
        let raw = state.create(MockObject::PipelineLayout);
        state.log(format!("create_pipeline_layout:{}:{}", raw, desc.set_layouts.len()));
        Ok(PipelineLayoutHandle::from_raw(raw))
    }

    fn destroy_pipeline_layout(&self, layout: PipelineLayoutHandle) {
        let mut state = self.state();
        state.destroy(layout.as_raw(), MockObject::PipelineLayout);
        state.log(format!("destroy_pipeline_layout:{}", layout.as_raw()));
    }

    fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc) -> Result<PipelineHandle> {
        let mut state = self.state();
        if state.fail_pipelines {
            return Err(Error::BackendError("vkCreateGraphicsPipelines failed".to_string()));
        }
        let raw = state.create(MockObject::Pipeline);
        state.log(format!("create_graphics_pipeline:{}:{:?}", raw, desc.blend));
        Ok(PipelineHandle::from_raw(raw))
    }

    fn create_compute_pipeline(&self, desc: &ComputePipelineDesc) -> Result<PipelineHandle> {
        let mut state = self.state();
        if state.fail_pipelines {
            return Err(Error::BackendError("vkCreateComputePipelines failed".to_string()));
        }
        let raw = state.create(MockObject::Pipeline);
        state.log(format!("create_compute_pipeline:{}:{}", raw, desc.layout.as_raw()));
        Ok(PipelineHandle::from_raw(raw))
    }

    fn destroy_pipeline(&self, pipeline: PipelineHandle) {
        let mut state = self.state();
        state.destroy(pipeline.as_raw(), MockObject::Pipeline);
        state.log(format!("destroy_pipeline:{}", pipeline.as_raw()));
    }

    // ===== RECORDING =====

    fn cmd_transition_image(
        &self,
        _cmd: CommandBufferHandle,
        image: ImageHandle,
        from: ImageLayout,
        to: ImageLayout,
    ) {
        self.state().log(format!("transition:{}:{:?}->{:?}", image.as_raw(), from, to));
    }

    fn cmd_copy_buffer(
        &self,
        _cmd: CommandBufferHandle,
        src: BufferHandle,
        dst: BufferHandle,
        src_offset: u64,
        dst_offset: u64,
        size: u64,
    ) {
        let mut state = self.state();
        let chunk = state
            .buffers
            .get(&src.as_raw())
            .and_then(|b| b.get(src_offset as usize..(src_offset + size) as usize))
            .map(|s| s.to_vec());
        if let (Some(chunk), Some(target)) = (chunk, state.buffers.get_mut(&dst.as_raw())) {
            let start = dst_offset as usize;
            if let Some(slot) = target.get_mut(start..start + chunk.len()) {
                slot.copy_from_slice(&chunk);
            }
        }
        state.log(format!("copy_buffer:{}->{}:{}", src.as_raw(), dst.as_raw(), size));
    }

    fn cmd_copy_buffer_to_image(
        &self,
        _cmd: CommandBufferHandle,
        src: BufferHandle,
        dst: ImageHandle,
        extent: Extent3D,
    ) {
        self.state().log(format!(
            "copy_buffer_to_image:{}->{}:{}x{}",
            src.as_raw(), dst.as_raw(), extent.width, extent.height
        ));
    }

    fn cmd_blit_image(
        &self,
        _cmd: CommandBufferHandle,
        src: ImageHandle,
        dst: ImageHandle,
        src_extent: Extent2D,
        dst_extent: Extent2D,
    ) {
        self.state().log(format!(
            "blit:{}->{}:{}x{}->{}x{}",
            src.as_raw(), dst.as_raw(),
            src_extent.width, src_extent.height, dst_extent.width, dst_extent.height
        ));
    }

    fn cmd_generate_mipmaps(
        &self,
        _cmd: CommandBufferHandle,
        image: ImageHandle,
        _extent: Extent2D,
        mip_levels: u32,
    ) {
        self.state().log(format!("generate_mipmaps:{}:{}", image.as_raw(), mip_levels));
    }

    fn cmd_clear_color_image(&self, _cmd: CommandBufferHandle, image: ImageHandle, _color: [f32; 4]) {
        self.state().log(format!("clear:{}", image.as_raw()));
    }

    fn cmd_begin_rendering(&self, _cmd: CommandBufferHandle, info: &RenderingInfo) {
        self.state().log(format!("begin_rendering:{}", info.color_view.as_raw()));
    }

    fn cmd_end_rendering(&self, _cmd: CommandBufferHandle) {
        self.state().log("end_rendering".to_string());
    }

    fn cmd_set_viewport_scissor(&self, _cmd: CommandBufferHandle, extent: Extent2D) {
        self.state().log(format!("viewport:{}x{}", extent.width, extent.height));
    }

    fn cmd_bind_pipeline(&self, _cmd: CommandBufferHandle, bind_point: PipelineBindPoint, pipeline: PipelineHandle) {
        let call = match bind_point {
            PipelineBindPoint::Graphics => format!("bind_pipeline:{}", pipeline.as_raw()),
            PipelineBindPoint::Compute => format!("bind_compute_pipeline:{}", pipeline.as_raw()),
        };
        self.state().log(call);
    }

    fn cmd_bind_descriptor_set(
        &self,
        _cmd: CommandBufferHandle,
        bind_point: PipelineBindPoint,
        _layout: PipelineLayoutHandle,
        set_index: u32,
        set: DescriptorSetHandle,
    ) {
        let call = match bind_point {
            PipelineBindPoint::Graphics => format!("bind_set:{}:{}", set_index, set.as_raw()),
            PipelineBindPoint::Compute => format!("bind_compute_set:{}:{}", set_index, set.as_raw()),
        };
        self.state().log(call);
    }

    fn cmd_bind_index_buffer(&self, _cmd: CommandBufferHandle, buffer: BufferHandle) {
        self.state().log(format!("bind_index_buffer:{}", buffer.as_raw()));
    }

    fn cmd_push_constants(
        &self,
        _cmd: CommandBufferHandle,
        _layout: PipelineLayoutHandle,
        _stages: ShaderStages,
        offset: u32,
        data: &[u8],
    ) {
        self.state().log(format!("push_constants:{}:{}", offset, data.len()));
    }

    fn cmd_draw_indexed(&self, _cmd: CommandBufferHandle, index_count: u32, first_index: u32) {
        self.state().log(format!("draw_indexed:{}:{}", index_count, first_index));
    }

    fn cmd_dispatch(&self, _cmd: CommandBufferHandle, x: u32, y: u32, z: u32) {
        self.state().log(format!("dispatch:{}x{}x{}", x, y, z));
    }
}

// ============================================================================
// Mock surface
// ============================================================================

/// Inspectable state of a [`MockSurface`]
#[derive(Debug, Default)]
pub struct MockSurfaceState {
    pub images: Vec<ImageHandle>,
    pub extent: Extent2D,
    pub next_image: u32,
    /// Upcoming acquires that report out-of-date
    pub out_of_date_acquires: u32,
    /// Upcoming acquires that report suboptimal
    pub suboptimal_acquires: u32,
    /// Upcoming presents that report out-of-date
    pub out_of_date_presents: u32,
    /// Upcoming presents that report suboptimal
    pub suboptimal_presents: u32,
    pub acquires: u32,
    pub presents: Vec<(u32, SemaphoreHandle)>,
    pub recreations: Vec<(u32, u32)>,
}

/// In-memory PresentSurface sharing its state with the test
pub struct MockSurface {
    state: Arc<Mutex<MockSurfaceState>>,
}

impl MockSurface {
    /// Surface with `image_count` images; image handles start at 0x9000
    pub fn new(width: u32, height: u32, image_count: u32) -> Self {
        let images = (0..image_count)
            .map(|i| ImageHandle::from_raw(0x9000 + i as u64))
            .collect();
        Self {
            state: Arc::new(Mutex::new(MockSurfaceState {
                images,
                extent: Extent2D::new(width, height),
                ..Default::default()
            })),
        }
    }

    /// Handle to the state, usable after the surface moved into a renderer
    pub fn state(&self) -> Arc<Mutex<MockSurfaceState>> {
        self.state.clone()
    }
}

impl PresentSurface for MockSurface {
    fn acquire_next_image(&mut self, _signal: SemaphoreHandle, _timeout_ns: u64) -> Result<AcquiredImage> {
        let mut state = self.state.lock().unwrap();
        state.acquires += 1;
        if state.out_of_date_acquires > 0 {
            state.out_of_date_acquires -= 1;
            return Err(Error::SurfaceOutOfDate);
        }
        let suboptimal = if state.suboptimal_acquires > 0 {
            state.suboptimal_acquires -= 1;
            true
        } else {
            false
        };
        let index = state.next_image;
        let count = state.images.len().max(1) as u32;
        state.next_image = (index + 1) % count;
        Ok(AcquiredImage { index, suboptimal })
    }

    fn present(&mut self, image_index: u32, wait: SemaphoreHandle) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        state.presents.push((image_index, wait));
        if state.out_of_date_presents > 0 {
            state.out_of_date_presents -= 1;
            return Err(Error::SurfaceOutOfDate);
        }
        if state.suboptimal_presents > 0 {
            state.suboptimal_presents -= 1;
            return Ok(true);
        }
        Ok(false)
    }

    fn recreate(&mut self, width: u32, height: u32) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.extent = Extent2D::new(width, height);
        state.next_image = 0;
        state.recreations.push((width, height));
        Ok(())
    }

    fn image(&self, index: u32) -> Option<ImageHandle> {
        self.state.lock().unwrap().images.get(index as usize).copied()
    }

    fn image_count(&self) -> usize {
        self.state.lock().unwrap().images.len()
    }

    fn extent(&self) -> Extent2D {
        self.state.lock().unwrap().extent
    }

    fn format(&self) -> Format {
        Format::B8G8R8A8_UNORM
    }
}

#[cfg(test)]
#[path = "mock_device_tests.rs"]
mod tests;
