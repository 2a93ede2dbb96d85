//! User-selected interaction and view modes

use serde::{Deserialize, Serialize};

/// How mode-constrained drags manipulate the placed instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InteractionMode {
    /// Yaw around the vertical axis
    Rotation,
    /// Move along world Z
    ForwardBack,
    /// Move along world X
    LeftRight,
    /// No manual movement; the pose follows the tracked reference object
    ObjectTracking,
}

impl InteractionMode {
    pub fn label(&self) -> &'static str {
        match self {
            InteractionMode::Rotation => "Rotation",
            InteractionMode::ForwardBack => "Forward/Back",
            InteractionMode::LeftRight => "Left/Right",
            InteractionMode::ObjectTracking => "Object Tracking",
        }
    }
}

/// What the user is currently doing with annotations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViewMode {
    AddAnnotation,
    ViewAnnotations,
    #[default]
    Other,
}
