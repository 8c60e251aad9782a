//! Core geometry types, buffering and the geometry build/mesh pipeline.

pub mod affine;
pub mod buffer;
pub mod mesh;
pub mod solid;
pub mod types;

pub use affine::*;
pub use buffer::*;
pub use mesh::*;
pub use solid::*;
pub use types::*;
