/*!
# Lumen Engine - Vulkan Backend

Vulkan implementation of the `lumen_engine` device capability traits,
using `ash` for the API bindings, `ash-window` for surface creation and
`gpu-allocator` for memory.

Requires Vulkan 1.3 (dynamic rendering, synchronization2) and buffer device
addresses.

```no_run
use std::sync::Arc;
use lumen_engine::lumen::{Renderer, RendererConfig};
use lumen_engine_renderer_vulkan::{create_vulkan_device, VulkanConfig};
# fn run(window: &winit::window::Window) -> lumen_engine::lumen::Result<()> {
let (device, surface) = create_vulkan_device(window, &VulkanConfig::default())?;
let renderer = Renderer::new(device, Box::new(surface), RendererConfig::default())?;
# Ok(())
# }
```
*/

mod vulkan_config;
mod vulkan_conversions;
mod vulkan_device;
mod vulkan_surface;

#[cfg(feature = "vulkan-validation")]
mod vulkan_debug;

use std::sync::Arc;
use lumen_engine::lumen::Result;
use winit::window::Window;

pub use vulkan_config::VulkanConfig;
pub use vulkan_device::VulkanDevice;
pub use vulkan_surface::VulkanSurface;

#[cfg(feature = "vulkan-validation")]
pub use vulkan_debug::{print_validation_stats_report, validation_stats, ValidationStats};

/// Create a device and a presentation surface for `window`
///
/// The surface holds a reference to the device, so it is always destroyed
/// first regardless of drop order.
///
/// # Errors
///
/// `Error::InitializationFailed` when no Vulkan 1.3 GPU can present to the window.
pub fn create_vulkan_device(window: &Window, config: &VulkanConfig) -> Result<(Arc<VulkanDevice>, VulkanSurface)> {
    let size = window.inner_size();
    let (device, surface) = VulkanDevice::new(window, config)?;
    let device = Arc::new(device);
    let surface = VulkanSurface::new(Arc::clone(&device), surface, size.width, size.height)?;
    Ok((device, surface))
}
