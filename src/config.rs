use anyhow::{Context, Result};
use dcwc_vision::{MatchConfig, MergeConfig, SliceConfig, SliceConfigError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// Everything tunable about a recognition run. Sections left out of the
/// config file take their defaults; a `slicer` section must be complete.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    pub slicer: SliceConfig,
    pub matching: MatchConfig,
    pub merge: MergeConfig,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid slicer config: {0}")]
    Slicer(#[from] SliceConfigError),
    #[error("{name} must be within [0, 1], got {value}")]
    Threshold { name: &'static str, value: f64 },
    #[error("hash_prefilter must keep at least one template")]
    EmptyPrefilter,
}

impl RecognitionConfig {
    /// Read a JSON config file. A missing file gives the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config = Self::from_json(&content)
            .with_context(|| format!("Invalid config in {}", path.display()))?;

        info!("Loaded recognition config from {}", path.display());
        Ok(config)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content).context("Failed to parse config JSON")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.slicer.validate()?;

        let thresholds = [
            ("matching.early_exit", self.matching.early_exit),
            ("merge.reliable_similarity", self.merge.reliable_similarity),
            ("merge.min_text_confidence", self.merge.min_text_confidence),
        ];
        for (name, value) in thresholds {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Threshold { name, value });
            }
        }

        if self.matching.hash_prefilter == Some(0) {
            return Err(ConfigError::EmptyPrefilter);
        }
        Ok(())
    }
}
