/// PresentSurface trait - swapchain presentation

use crate::error::Result;
use crate::device::handle::{ImageHandle, SemaphoreHandle};
use crate::device::types::{AcquiredImage, Extent2D, Format};

/// Swapchain bound to a window surface
///
/// Out-of-date conditions are reported as `Error::SurfaceOutOfDate`, which
/// the frame loop treats as a resize request rather than a failure.
pub trait PresentSurface: Send + Sync {
    /// Acquire the next image, signaling `signal` when it is ready for writing
    fn acquire_next_image(&mut self, signal: SemaphoreHandle, timeout_ns: u64) -> Result<AcquiredImage>;

    /// Present `image_index` once `wait` is signaled
    ///
    /// Returns `true` when the swapchain is suboptimal.
    fn present(&mut self, image_index: u32, wait: SemaphoreHandle) -> Result<bool>;

    /// Rebuild the swapchain for a new window size
    fn recreate(&mut self, width: u32, height: u32) -> Result<()>;

    /// Swapchain image at `index`
    fn image(&self, index: u32) -> Option<ImageHandle>;

    fn image_count(&self) -> usize;

    fn extent(&self) -> Extent2D;

    fn format(&self) -> Format;
}
