//! Error types for project loading and saving.

use std::path::PathBuf;

use cadenza_synth::SynthError;
use thiserror::Error;

/// Errors that can occur while loading, saving or building a project.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    ReadFile {
        /// Path of the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a file
    #[error("failed to write file '{path}': {source}")]
    WriteFile {
        /// Path of the file that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to create directory
    #[error("failed to create directory '{path}': {source}")]
    CreateDir {
        /// Path of the directory that could not be created.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Failed to serialize TOML
    #[error("failed to serialize TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// A wave table definition cannot be built
    #[error("invalid wave table '{name}': {reason}")]
    InvalidWaveTable {
        /// Name of the wave table.
        name: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A sample definition cannot be built
    #[error("invalid sample '{name}': {reason}")]
    InvalidSample {
        /// Name of the sample.
        name: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A project-level setting is out of range
    #[error("invalid setting '{key}': {reason}")]
    InvalidSetting {
        /// Name of the setting.
        key: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A score entry is out of range
    #[error("invalid score entry {index}: {reason}")]
    InvalidScore {
        /// Zero-based position of the entry in its list.
        index: usize,
        /// What is wrong with it.
        reason: String,
    },

    /// The engine rejected part of the project
    #[error(transparent)]
    Synth(#[from] SynthError),
}

impl ConfigError {
    /// Create a read file error.
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::ReadFile {
            path: path.into(),
            source,
        }
    }

    /// Create a write file error.
    pub fn write_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::WriteFile {
            path: path.into(),
            source,
        }
    }

    /// Create a create directory error.
    pub fn create_dir(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::CreateDir {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn wave_table(name: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidWaveTable {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn sample(name: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidSample {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}
