/// Descriptor module - growable set allocator, layout builder and writer

pub mod allocator;
pub mod layout_builder;
pub mod writer;

pub use allocator::{DescriptorAllocator, MAX_SETS_PER_POOL};
pub use layout_builder::DescriptorLayoutBuilder;
pub use writer::DescriptorWriter;
