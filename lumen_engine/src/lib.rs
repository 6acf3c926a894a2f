/*!
# Lumen Engine

Core of the Lumen real-time renderer.

This crate is platform-agnostic: it drives the GPU through the
[`GraphicsDevice`](lumen::device::GraphicsDevice) and
[`PresentSurface`](lumen::device::PresentSurface) traits, implemented by a
backend crate (`lumen_engine_renderer_vulkan`).

## Architecture

- **Renderer**: engine context; frame loop, uploads, materials, defaults
- **FrameRing**: frames in flight, one fence and two semaphores per slot
- **DeletionLedger**: deferred, LIFO release of GPU objects
- **DescriptorAllocator**: growable descriptor pools
- **ImmediateSubmit**: blocking one-off GPU work
- **SceneGraph**: node arena flattened into a draw context every frame
*/

// Internal modules
mod error;
mod engine;
pub mod log;
pub mod device;
pub mod ledger;
pub mod descriptor;
pub mod immediate;
pub mod frame;
pub mod renderer;
pub mod scene;

// Main lumen namespace module
pub mod lumen {
    // Error types
    pub use crate::error::{fatal, Error, ErrorKind, OrFatal, Result};

    // Engine services
    pub use crate::engine::{Engine, RendererGuard};

    // Engine context
    pub use crate::renderer::{Renderer, RendererConfig, RendererStats};

    // Logging sub-module (the engine_* macros are exported at the crate root)
    pub mod log {
        pub use crate::log::{DefaultLogger, LogEntry, LogSeverity, Logger};
    }

    // Device capability traits and their types
    pub mod device {
        pub use crate::device::*;
    }

    pub mod ledger {
        pub use crate::ledger::*;
    }

    pub mod descriptor {
        pub use crate::descriptor::*;
    }

    pub mod immediate {
        pub use crate::immediate::*;
    }

    pub mod frame {
        pub use crate::frame::*;
    }

    pub mod render {
        pub use crate::renderer::*;
    }

    pub mod scene {
        pub use crate::scene::*;
    }
}

// Re-export math library at crate root
pub use glam;
