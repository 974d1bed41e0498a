// Adapters layer: concrete TourStore implementations.

pub mod json_store;
pub mod memory;

pub use json_store::JsonFileTourStore;
pub use memory::MemoryTourStore;
