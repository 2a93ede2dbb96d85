//! Configuration manager for loading, saving, and resetting engine configuration

use std::path::{Path, PathBuf};
use thiserror::Error;

use super::EngineConfig;

/// Configuration error types
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// IO error during file operations
    #[error("IO error: {0}")]
    Io(String),
    /// Error during serialization
    #[error("Serialization error: {0}")]
    Serialize(String),
    /// Error during deserialization
    #[error("Deserialization error: {0}")]
    Deserialize(String),
}

/// Handles loading, saving, and accessing the engine configuration
pub struct ConfigManager {
    config: EngineConfig,
    config_path: PathBuf,
    dirty: bool,
}

impl ConfigManager {
    /// Create a new configuration manager, loading from the OS config directory if available
    pub fn new() -> Self {
        Self::with_path(Self::default_config_path())
    }

    /// Create a configuration manager backed by an explicit file
    pub fn with_path(config_path: impl Into<PathBuf>) -> Self {
        let config_path = config_path.into();
        let config = Self::load_from_path(&config_path).unwrap_or_else(|| {
            tracing::info!("No usable config file found, using defaults");
            EngineConfig::new()
        });

        Self {
            config,
            config_path,
            dirty: false,
        }
    }

    /// Get the OS-standard configuration directory
    fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("placement-engine")
    }

    fn default_config_path() -> PathBuf {
        Self::config_dir().join("config.ron")
    }

    /// Load configuration from a file path
    fn load_from_path(path: &Path) -> Option<EngineConfig> {
        let content = std::fs::read_to_string(path).ok()?;
        match Self::parse(&content) {
            Ok(config) => {
                tracing::info!("Loaded config from {:?}", path);
                Some(config)
            }
            Err(e) => {
                tracing::warn!("Failed to parse config file: {}", e);
                None
            }
        }
    }

    /// Parse a RON configuration document
    pub fn parse(content: &str) -> Result<EngineConfig, ConfigError> {
        ron::from_str(content).map_err(|e| ConfigError::Deserialize(e.to_string()))
    }

    /// Get a reference to the current configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Get a mutable reference to the configuration (marks as dirty)
    pub fn config_mut(&mut self) -> &mut EngineConfig {
        self.dirty = true;
        &mut self.config
    }

    /// Check if the configuration has unsaved changes
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Save the configuration to disk
    pub fn save(&mut self) -> Result<(), ConfigError> {
        if !self.dirty {
            return Ok(());
        }

        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }

        let content = ron::ser::to_string_pretty(&self.config, ron::ser::PrettyConfig::default())
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        std::fs::write(&self.config_path, &content).map_err(|e| ConfigError::Io(e.to_string()))?;

        tracing::info!("Saved config to {:?}", self.config_path);
        self.dirty = false;
        Ok(())
    }

    /// Reset configuration to defaults
    pub fn reset_to_defaults(&mut self) {
        self.config = EngineConfig::new();
        self.dirty = true;
    }

    /// Get the config file path (for display purposes)
    pub fn config_file_path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ConfigManager::with_path(dir.path().join("config.ron"));

        assert_eq!(manager.config(), &EngineConfig::new());
        assert_eq!(manager.config().scheduler.device_pose_hz, 90);
        assert!(!manager.is_dirty());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.ron");

        let mut manager = ConfigManager::with_path(&path);
        manager.config_mut().annotation.numbered_titles = true;
        manager.config_mut().scheduler.reattach_check_hz = 4;
        assert!(manager.is_dirty());
        manager.save().unwrap();
        assert!(!manager.is_dirty());

        let reloaded = ConfigManager::with_path(&path);
        assert!(reloaded.config().annotation.numbered_titles);
        assert_eq!(reloaded.config().scheduler.reattach_check_hz, 4);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config = ConfigManager::parse("(version: 1, drag: (snap_to_planes: true))").unwrap();
        assert!(config.drag.snap_to_planes);
        assert_eq!(config.drag.rotation_speed, 0.006);
        assert_eq!(config.placement.max_distance, 3.0);
    }

    #[test]
    fn test_unparsable_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ron");
        std::fs::write(&path, "not ron at all (").unwrap();

        let manager = ConfigManager::with_path(&path);
        assert_eq!(manager.config(), &EngineConfig::new());
        assert!(matches!(ConfigManager::parse("not ron ("), Err(ConfigError::Deserialize(_))));
    }

    #[test]
    fn test_reset_marks_dirty() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = ConfigManager::with_path(dir.path().join("config.ron"));
        manager.config_mut().placement.plane_offset = 0.5;
        manager.save().unwrap();

        manager.reset_to_defaults();
        assert!(manager.is_dirty());
        assert_eq!(manager.config().placement.plane_offset, 0.01);
    }
}
