//! Core type definitions

mod ids;
mod transform;

pub use ids::*;
pub use transform::*;
