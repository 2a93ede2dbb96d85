//! Orchestration layer of the placement engine
//!
//! Wires the synchronous placement core to its collaborators:
//! - [`manager`]: single-writer [`PlacementManager`] owning all placement state
//! - [`engine`]: tokio tasks for the paced maintenance loops and anchor streams
//! - [`scheduler`]: paced loops with cooperative shutdown
//! - [`collaborators`]: persistence, plane, asset, device and scene contracts
//! - [`memory`]: in-memory collaborators for simulation and tests
//! - [`config`]: RON configuration persisted in the OS config directory

pub mod collaborators;
pub mod config;
pub mod engine;
pub mod error;
pub mod fusion;
pub mod manager;
pub mod memory;
pub mod scheduler;
pub mod snapshot;

pub use collaborators::*;
pub use config::{ConfigError, ConfigManager, EngineConfig, SchedulerConfig};
pub use engine::Engine;
pub use error::PersistenceError;
pub use fusion::consume_stream;
pub use manager::{
    Collaborators, DEFAULT_PREVIEW_DESCRIPTION, DEFAULT_PREVIEW_TITLE, PlacementManager,
    SharedManager,
};
pub use memory::*;
pub use scheduler::{Shutdown, run_at_frequency, spawn_paced};
pub use snapshot::SceneSnapshot;
