/// Per-frame resources of the frame ring

use crate::descriptor::DescriptorAllocator;
use crate::device::*;
use crate::error::Result;
use crate::ledger::{DeletionLedger, Releasable};
use crate::renderer::RendererConfig;

/// Lifecycle of a frame slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Fence signaled, resources reclaimable
    Idle,
    /// Command buffer open
    Recording,
    /// Work handed to the GPU, fence pending
    Submitted,
}

/// One of the N frames in flight
///
/// The fence is created signaled so the first wait on a fresh slot returns
/// immediately.
pub struct FrameSlot {
    pub(crate) command_pool: CommandPoolHandle,
    pub(crate) command_buffer: CommandBufferHandle,
    pub(crate) render_fence: FenceHandle,
    pub(crate) acquire_semaphore: SemaphoreHandle,
    pub(crate) render_semaphore: SemaphoreHandle,
    pub(crate) ledger: DeletionLedger,
    pub(crate) descriptors: DescriptorAllocator,
    pub(crate) state: SlotState,
    pub(crate) last_frame: Option<u64>,
}

impl FrameSlot {
    /// Create every per-slot object; on failure the ones already created are released
    pub fn new(device: &dyn GraphicsDevice, config: &RendererConfig) -> Result<Self> {
        let mut created = DeletionLedger::new();

        let command_pool = device.create_command_pool()?;
        created.push(Releasable::CommandPool(command_pool));
        let command_buffer = undo_on_err(device, &mut created, device.allocate_command_buffer(command_pool))?;

        let render_fence = undo_on_err(device, &mut created, device.create_fence(true))?;
        created.push(Releasable::Fence(render_fence));
        let acquire_semaphore = undo_on_err(device, &mut created, device.create_semaphore())?;
        created.push(Releasable::Semaphore(acquire_semaphore));
        let render_semaphore = undo_on_err(device, &mut created, device.create_semaphore())?;
        created.push(Releasable::Semaphore(render_semaphore));

        let descriptors = undo_on_err(
            device,
            &mut created,
            DescriptorAllocator::with_max_sets(
                device,
                config.descriptor_capacity_hint,
                &config.frame_descriptor_ratios,
                config.max_sets_per_pool,
            ),
        )?;

        Ok(Self {
            command_pool,
            command_buffer,
            render_fence,
            acquire_semaphore,
            render_semaphore,
            ledger: DeletionLedger::new(),
            descriptors,
            state: SlotState::Idle,
            last_frame: None,
        })
    }

    pub fn state(&self) -> SlotState {
        self.state
    }

    /// Frame number of the last submission from this slot
    pub fn last_frame(&self) -> Option<u64> {
        self.last_frame
    }

    pub fn ledger(&self) -> &DeletionLedger {
        &self.ledger
    }

    pub fn descriptors(&self) -> &DescriptorAllocator {
        &self.descriptors
    }

    pub fn render_fence(&self) -> FenceHandle {
        self.render_fence
    }

    pub fn command_buffer(&self) -> CommandBufferHandle {
        self.command_buffer
    }

    /// Release everything the slot owns; the device must be idle
    pub fn destroy(mut self, device: &dyn GraphicsDevice) {
        self.ledger.flush(device);
        self.descriptors.destroy_pools(device);
        device.destroy_command_pool(self.command_pool);
        device.destroy_fence(self.render_fence);
        device.destroy_semaphore(self.acquire_semaphore);
        device.destroy_semaphore(self.render_semaphore);
    }
}

fn undo_on_err<T>(device: &dyn GraphicsDevice, created: &mut DeletionLedger, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        crate::engine_error!("lumen::FrameSlot", "Frame slot creation failed: {}", e);
        created.flush(device);
    }
    result
}
