use crate::session_contracts::DEFAULT_ENTITIES_FIELD;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const PROFILE_PATH_ENV: &str = "REPLAYLENS_PROFILE";

/// Marker texts that announce a finished compaction. The wording changed
/// once; both spellings mean the same event.
pub const DEFAULT_COMPLETION_MARKERS: [&str; 2] = [
    "Summarized conversation history",
    "Compacted conversation",
];

pub const DEFAULT_SUMMARY_PATH: [&str; 4] = ["result", "metadata", "summary", "text"];

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("failed to read profile {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid profile {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("profile field {field} must not be empty")]
    EmptyField { field: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayProfile {
    pub entities_field: String,
    pub completion_markers: Vec<String>,
    pub summary_path: Vec<String>,
}

impl Default for ReplayProfile {
    fn default() -> Self {
        Self {
            entities_field: DEFAULT_ENTITIES_FIELD.to_string(),
            completion_markers: DEFAULT_COMPLETION_MARKERS
                .iter()
                .map(ToString::to_string)
                .collect(),
            summary_path: DEFAULT_SUMMARY_PATH.iter().map(ToString::to_string).collect(),
        }
    }
}

impl ReplayProfile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProfileError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ProfileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let profile: ReplayProfile =
            toml::from_str(&contents).map_err(|source| ProfileError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        profile.validate()?;
        Ok(profile)
    }

    /// Explicit path first, then `REPLAYLENS_PROFILE`, then built-in defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ProfileError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match std::env::var_os(PROFILE_PATH_ENV) {
            Some(path) if !path.is_empty() => Self::load(PathBuf::from(path)),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.entities_field.trim().is_empty() {
            return Err(ProfileError::EmptyField {
                field: "entities_field",
            });
        }
        if self.completion_markers.is_empty() {
            return Err(ProfileError::EmptyField {
                field: "completion_markers",
            });
        }
        if self.summary_path.is_empty() {
            return Err(ProfileError::EmptyField {
                field: "summary_path",
            });
        }
        Ok(())
    }
}
