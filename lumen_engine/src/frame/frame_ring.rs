//! Frame synchronization ring
//!
//! N frame slots used round-robin. A slot is only touched again after its
//! fence has signaled, so everything recorded into its ledger or allocated
//! from its descriptor pools outlives the GPU work that used it.
//!
//! One tick:
//!
//! ```text
//! wait fence (bounded) -> flush ledger, reset pools -> acquire image
//!   -> reset fence + cmd, begin -> record -> end, submit -> present
//!   -> advance to next slot (always)
//! ```
//!
//! An acquired image is always presented, even when recording fails.

use crate::descriptor::DescriptorAllocator;
use crate::device::*;
use crate::error::{Error, Result};
use crate::frame::frame_slot::{FrameSlot, SlotState};
use crate::ledger::DeletionLedger;
use crate::renderer::RendererConfig;

/// What a tick achieved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Submitted and presented
    Presented,
    /// Surface out of date at acquire; nothing recorded or submitted
    Skipped,
    /// Submitted, but the swapchain must be rebuilt
    PresentedNeedsResize,
}

/// Everything a frame recorder may use
pub struct FrameContext<'a> {
    pub device: &'a dyn GraphicsDevice,
    pub cmd: CommandBufferHandle,
    pub swapchain_image: ImageHandle,
    pub swapchain_image_index: u32,
    pub swapchain_extent: Extent2D,
    /// Released once this slot's fence signals again
    pub ledger: &'a mut DeletionLedger,
    /// Reset once this slot's fence signals again
    pub descriptors: &'a mut DescriptorAllocator,
    pub frame_number: u64,
    pub slot_index: usize,
}

pub struct FrameRing {
    slots: Vec<FrameSlot>,
    current: usize,
    frame_number: u64,
    fence_timeout_ns: u64,
    resize_requested: bool,
}

impl FrameRing {
    /// Create `config.frame_overlap` slots
    pub fn new(device: &dyn GraphicsDevice, config: &RendererConfig) -> Result<Self> {
        if config.frame_overlap == 0 {
            crate::engine_error!("lumen::FrameRing", "frame_overlap must be at least 1");
            return Err(Error::InitializationFailed("frame_overlap is zero".to_string()));
        }

        let mut slots = Vec::with_capacity(config.frame_overlap);
        for _ in 0..config.frame_overlap {
            match FrameSlot::new(device, config) {
                Ok(slot) => slots.push(slot),
                Err(e) => {
                    for slot in slots {
                        slot.destroy(device);
                    }
                    return Err(e);
                }
            }
        }

        crate::engine_debug!("lumen::FrameRing", "Created {} frame slots", slots.len());
        Ok(Self {
            slots,
            current: 0,
            frame_number: 0,
            fence_timeout_ns: config.fence_timeout_ns,
            resize_requested: false,
        })
    }

    /// Run one frame on the current slot, then advance to the next one
    ///
    /// # Errors
    ///
    /// Fence timeout or device loss (fatal), errors from `record`, and
    /// non-presentation device errors. Out-of-date surfaces are not errors:
    /// they set the resize flag and are reported through [`FrameOutcome`].
    pub fn run_frame<F>(
        &mut self,
        device: &dyn GraphicsDevice,
        surface: &mut dyn PresentSurface,
        record: F,
    ) -> Result<FrameOutcome>
    where
        F: FnOnce(&mut FrameContext<'_>) -> Result<()>,
    {
        if self.slots.is_empty() {
            return Err(Error::InvalidResource("frame ring already destroyed".to_string()));
        }
        let index = self.current;
        let outcome = self.tick(device, surface, index, record);
        self.current = (self.current + 1) % self.slots.len();
        self.frame_number += 1;
        outcome
    }

    fn tick<F>(
        &mut self,
        device: &dyn GraphicsDevice,
        surface: &mut dyn PresentSurface,
        index: usize,
        record: F,
    ) -> Result<FrameOutcome>
    where
        F: FnOnce(&mut FrameContext<'_>) -> Result<()>,
    {
        let timeout = self.fence_timeout_ns;
        let frame_number = self.frame_number;
        let slot = &mut self.slots[index];

        // 1. The GPU is done with this slot's previous frame
        if let Err(e) = device.wait_for_fence(slot.render_fence, timeout) {
            crate::engine_error!("lumen::FrameRing", "Slot {} fence wait failed: {}", index, e);
            return Err(e);
        }
        slot.state = SlotState::Idle;

        // 2. Reclaim what that frame used
        slot.ledger.flush(device);
        slot.descriptors.clear_pools(device)?;

        // 3. Acquire; the fence stays signaled if we bail out here
        let acquired = match surface.acquire_next_image(slot.acquire_semaphore, timeout) {
            Ok(acquired) => acquired,
            Err(Error::SurfaceOutOfDate) => {
                crate::engine_debug!("lumen::FrameRing", "Surface out of date at acquire, skipping frame {}", frame_number);
                self.resize_requested = true;
                return Ok(FrameOutcome::Skipped);
            }
            Err(e) => {
                crate::engine_error!("lumen::FrameRing", "Swapchain acquire failed: {}", e);
                return Err(e);
            }
        };
        if acquired.suboptimal {
            self.resize_requested = true;
        }
        let swapchain_image = surface.image(acquired.index).ok_or_else(|| {
            crate::engine_err!("lumen::FrameRing", "Swapchain returned unknown image index {}", acquired.index)
        })?;

        // 4. Open the command buffer
        let cmd = slot.command_buffer;
        device.reset_fence(slot.render_fence)?;
        device.reset_command_buffer(cmd)?;
        device.begin_command_buffer(cmd)?;
        slot.state = SlotState::Recording;

        // 5. Record
        let recorded = {
            let mut ctx = FrameContext {
                device,
                cmd,
                swapchain_image,
                swapchain_image_index: acquired.index,
                swapchain_extent: surface.extent(),
                ledger: &mut slot.ledger,
                descriptors: &mut slot.descriptors,
                frame_number,
                slot_index: index,
            };
            record(&mut ctx)
        };
        device.end_command_buffer(cmd)?;

        if let Err(e) = recorded {
            // Replace the partial recording with a bare layout transition so
            // the acquired image is still handed back through present, the
            // acquire semaphore is consumed and the fence signals again.
            crate::engine_warn!("lumen::FrameRing", "Frame {} recording failed: {}", frame_number, e);
            device.reset_command_buffer(cmd)?;
            device.begin_command_buffer(cmd)?;
            device.cmd_transition_image(cmd, swapchain_image, ImageLayout::Undefined, ImageLayout::PresentSrc);
            device.end_command_buffer(cmd)?;
            device.submit(cmd, Some(slot.acquire_semaphore), Some(slot.render_semaphore), slot.render_fence)?;
            slot.state = SlotState::Submitted;
            match surface.present(acquired.index, slot.render_semaphore) {
                Ok(false) => {}
                Ok(true) | Err(Error::SurfaceOutOfDate) => self.resize_requested = true,
                Err(present_error) => {
                    crate::engine_error!("lumen::FrameRing", "Present after failed recording failed: {}", present_error);
                }
            }
            return Err(e);
        }

        // 6. Submit
        device.submit(cmd, Some(slot.acquire_semaphore), Some(slot.render_semaphore), slot.render_fence)?;
        slot.state = SlotState::Submitted;
        slot.last_frame = Some(frame_number);

        // 7. Present
        match surface.present(acquired.index, slot.render_semaphore) {
            Ok(suboptimal) if suboptimal || acquired.suboptimal => {
                self.resize_requested = true;
                Ok(FrameOutcome::PresentedNeedsResize)
            }
            Ok(_) => Ok(FrameOutcome::Presented),
            Err(Error::SurfaceOutOfDate) => {
                crate::engine_debug!("lumen::FrameRing", "Surface out of date at present");
                self.resize_requested = true;
                Ok(FrameOutcome::PresentedNeedsResize)
            }
            Err(e) => {
                crate::engine_error!("lumen::FrameRing", "Present failed: {}", e);
                Err(e)
            }
        }
    }

    /// Slot the next tick will use
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Ticks run so far (including skipped ones)
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn slot(&self, index: usize) -> Option<&FrameSlot> {
        self.slots.get(index)
    }

    pub fn resize_requested(&self) -> bool {
        self.resize_requested
    }

    pub fn request_resize(&mut self) {
        self.resize_requested = true;
    }

    pub fn clear_resize_request(&mut self) {
        self.resize_requested = false;
    }

    /// Release every slot; the device must be idle
    pub fn destroy(&mut self, device: &dyn GraphicsDevice) {
        for slot in self.slots.drain(..) {
            slot.destroy(device);
        }
        self.current = 0;
    }

    pub fn is_destroyed(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
#[path = "frame_ring_tests.rs"]
mod tests;
