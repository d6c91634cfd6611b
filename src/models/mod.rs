// Re-export all model types for ease of use

pub mod entry;

pub use entry::*;
