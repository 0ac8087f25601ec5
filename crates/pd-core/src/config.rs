//! User settings
//!
//! Settings are plain serde structures stored as RON. Missing fields fall
//! back to their defaults, so older settings files keep loading.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Interchange (STEP) settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InterchangeConfig {
    /// Author written into exported file headers
    pub author: String,
    /// Organization written into exported file headers
    pub organization: String,
    /// Emit a grouping record for each exported container
    pub keep_assembly_structure: bool,
    /// Turn grouping records into containers on import
    pub create_containers: bool,
}

impl Default for InterchangeConfig {
    fn default() -> Self {
        Self {
            author: String::new(),
            organization: String::new(),
            keep_assembly_structure: true,
            create_containers: true,
        }
    }
}

impl InterchangeConfig {
    /// Flat export and import without assembly grouping
    pub fn flat() -> Self {
        Self {
            keep_assembly_structure: false,
            create_containers: false,
            ..Self::default()
        }
    }
}

/// Document file settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Write indented RON
    pub pretty: bool,
    /// Keep the previous file as `<file>.bak` when overwriting
    pub create_backup: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            pretty: true,
            create_backup: false,
        }
    }
}

/// Settings errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Invalid settings: {0}")]
    Parse(String),
}

/// All user settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub interchange: InterchangeConfig,
    pub persistence: PersistenceConfig,
}

impl Settings {
    /// Load settings from a RON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;
        ron::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load settings, falling back to defaults when the file is missing or invalid
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Using default settings ({}): {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Save settings to a RON file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let content = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Io(e.to_string()))
    }
}
