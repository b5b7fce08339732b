//! Core data types shared by the chunking, storage and retrieval layers.

pub mod chunk;
pub mod hit;

pub use chunk::{Chunk, Metadata};
pub use hit::Hit;
