//! Engine configuration module
//!
//! Groups the placement, drag and annotation policies together with the
//! maintenance loop frequencies.

mod manager;

pub use manager::{ConfigError, ConfigManager};

use placement_core::{AnnotationPolicy, DragPolicy, PlacementPolicy};
use serde::{Deserialize, Serialize};

/// Frequencies of the paced maintenance loops
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Device pose sampling, placement resolution and highlight checks
    pub device_pose_hz: u32,
    /// Detaching moved objects from their world anchors
    pub detach_check_hz: u32,
    /// Re-anchoring objects that came to rest
    pub reattach_check_hz: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            device_pose_hz: 90,
            detach_check_hz: 10,
            reattach_check_hz: 2,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct EngineConfig {
    /// Configuration format version
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub placement: PlacementPolicy,
    #[serde(default)]
    pub drag: DragPolicy,
    #[serde(default)]
    pub annotation: AnnotationPolicy,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl EngineConfig {
    /// Current configuration version
    pub const CURRENT_VERSION: u32 = 1;

    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            ..Default::default()
        }
    }
}
