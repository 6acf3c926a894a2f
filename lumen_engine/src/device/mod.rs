/// Device module - GPU capability traits and their data types

pub mod handle;
pub mod types;
pub mod graphics_device;
pub mod surface;

pub use handle::*;
pub use types::*;
pub use graphics_device::GraphicsDevice;
pub use surface::PresentSurface;

// Mock device and surface for tests (no GPU required)
#[cfg(test)]
pub mod mock_device;
