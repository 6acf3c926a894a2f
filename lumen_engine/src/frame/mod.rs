/// Frame module - frames in flight and their synchronization

pub mod frame_slot;
pub mod frame_ring;

pub use frame_slot::{FrameSlot, SlotState};
pub use frame_ring::{FrameContext, FrameOutcome, FrameRing};
