//! Placement Core
//!
//! Synchronous domain logic for placing, dragging, tracking and annotating a
//! virtual object against detected planes:
//! - Geometry: rays, planes, gravity alignment and anchor-matrix decomposition
//! - PlacementState: selection, placed instance, drag session and derived UI flags
//! - PlacementResolver: ray-plane resolution of the placement pose
//! - DragEngine: free-plane and mode-constrained drags
//! - AnnotationBinder: annotations bound to an instance's local frame
//! - Tracking: reference-object fusion and snapping
//! - Inspection: per-object inspection points and recorded results

pub mod annotation;
pub mod drag;
pub mod error;
pub mod geometry;
pub mod inspection;
pub mod modes;
pub mod placeable;
pub mod policy;
pub mod resolution;
pub mod state;
pub mod tracking;
pub mod types;

pub use annotation::*;
pub use drag::*;
pub use error::*;
pub use geometry::*;
pub use inspection::*;
pub use modes::*;
pub use placeable::*;
pub use policy::*;
pub use resolution::*;
pub use state::*;
pub use tracking::*;
pub use types::*;
