//! Immediate command submission
//!
//! One-off GPU work outside the frame loop (uploads, mip generation): record
//! into a dedicated command buffer, submit, and block until the GPU is done.
//! `submit` takes `&mut self`, so two submissions can never share the fence.

use crate::device::*;
use crate::error::Result;

pub struct ImmediateSubmit {
    command_pool: CommandPoolHandle,
    command_buffer: CommandBufferHandle,
    fence: FenceHandle,
    submissions: u64,
}

impl ImmediateSubmit {
    /// Create the dedicated command pool, command buffer and fence
    pub fn new(device: &dyn GraphicsDevice) -> Result<Self> {
        let command_pool = device.create_command_pool()?;
        let command_buffer = match device.allocate_command_buffer(command_pool) {
            Ok(cmd) => cmd,
            Err(e) => {
                device.destroy_command_pool(command_pool);
                return Err(e);
            }
        };
        let fence = match device.create_fence(true) {
            Ok(fence) => fence,
            Err(e) => {
                device.destroy_command_pool(command_pool);
                return Err(e);
            }
        };
        Ok(Self {
            command_pool,
            command_buffer,
            fence,
            submissions: 0,
        })
    }

    /// Record with `record`, submit, and wait without timeout for completion
    ///
    /// If `record` fails nothing is submitted and its error is returned.
    pub fn submit<F>(&mut self, device: &dyn GraphicsDevice, record: F) -> Result<()>
    where
        F: FnOnce(CommandBufferHandle) -> Result<()>,
    {
        let cmd = self.command_buffer;
        device.reset_fence(self.fence)?;
        device.reset_command_buffer(cmd)?;
        device.begin_command_buffer(cmd)?;

        let recorded = record(cmd);
        device.end_command_buffer(cmd)?;
        if let Err(e) = recorded {
            crate::engine_warn!("lumen::ImmediateSubmit", "Recording failed, nothing submitted: {}", e);
            return Err(e);
        }

        device.submit(cmd, None, None, self.fence)?;
        device.wait_for_fence(self.fence, u64::MAX)?;
        self.submissions += 1;
        Ok(())
    }

    /// Completed submissions so far
    pub fn submission_count(&self) -> u64 {
        self.submissions
    }

    /// Release the command pool (and its buffer) and the fence
    pub fn destroy(self, device: &dyn GraphicsDevice) {
        device.destroy_command_pool(self.command_pool);
        device.destroy_fence(self.fence);
    }
}

#[cfg(test)]
#[path = "immediate_tests.rs"]
mod tests;
