//! JSON configuration for the labeling camera.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::aspect_ratio::AspectRatio;
use crate::traits::{LensFacing, Rotation};

/// Error loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not valid configuration JSON.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// V4L2 device index used for each lens facing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeviceIndices {
    /// Device for [`LensFacing::Front`].
    pub front: u32,
    /// Device for [`LensFacing::Back`].
    pub back: u32,
}

impl DeviceIndices {
    /// Device index for `facing`.
    #[must_use]
    pub const fn index_for(self, facing: LensFacing) -> u32 {
        match facing {
            LensFacing::Front => self.front,
            LensFacing::Back => self.back,
        }
    }
}

/// Requested size and shape of one use-case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StreamSettings {
    /// Target width.
    pub width: u32,
    /// Target height.
    pub height: u32,
    /// Target aspect ratio, written as `"W:H"`.
    pub aspect_ratio: AspectRatio,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            width: crate::use_case::DEFAULT_WIDTH,
            height: crate::use_case::DEFAULT_HEIGHT,
            aspect_ratio: AspectRatio::RATIO_4_3,
        }
    }
}

/// Label request pacing and presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LabelingSettings {
    /// Minimum time between two labeling requests, in milliseconds.
    pub interval_ms: u64,
    /// Labels shown per result.
    pub max_labels: usize,
}

impl Default for LabelingSettings {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            max_labels: 3,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Device per lens facing.
    pub devices: DeviceIndices,
    /// Camera the session runs on.
    pub facing: LensFacing,
    /// Capture buffers requested from the driver.
    pub buffer_count: u32,
    /// Rotation passed to the analyzer with every frame.
    pub rotation: Rotation,
    /// Preview stream settings.
    pub preview: StreamSettings,
    /// Analysis stream settings.
    pub analysis: StreamSettings,
    /// Labeling settings.
    pub labeling: LabelingSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            devices: DeviceIndices::default(),
            facing: LensFacing::Back,
            buffer_count: 4,
            rotation: Rotation::Deg0,
            preview: StreamSettings {
                width: 1280,
                height: 720,
                aspect_ratio: AspectRatio::RATIO_16_9,
            },
            analysis: StreamSettings::default(),
            labeling: LabelingSettings::default(),
        }
    }
}

impl AppConfig {
    /// Read configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parse configuration from JSON text. Missing fields take defaults.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Minimum time between labeling requests.
    #[must_use]
    pub const fn label_interval(&self) -> Duration {
        Duration::from_millis(self.labeling.interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_gives_defaults() {
        let config = AppConfig::from_json("{}").expect("parse");
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.facing, LensFacing::Back);
        assert_eq!(config.preview.aspect_ratio, AspectRatio::RATIO_16_9);
        assert_eq!(config.analysis.width, 640);
        assert_eq!(config.label_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_partial_config() {
        let config = AppConfig::from_json(
            r#"{
                "devices": { "front": 2 },
                "facing": "front",
                "rotation": 90,
                "analysis": { "width": 320, "height": 240 },
                "labeling": { "max_labels": 5 }
            }"#,
        )
        .expect("parse");

        assert_eq!(config.devices.index_for(LensFacing::Front), 2);
        assert_eq!(config.devices.index_for(LensFacing::Back), 0);
        assert_eq!(config.facing, LensFacing::Front);
        assert_eq!(config.rotation, Rotation::Deg90);
        assert_eq!(config.analysis.width, 320);
        assert_eq!(config.analysis.aspect_ratio, AspectRatio::RATIO_4_3);
        assert_eq!(config.labeling.max_labels, 5);
        assert_eq!(config.labeling.interval_ms, 1000);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            AppConfig::from_json(r#"{ "rotation": 45 }"#),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            AppConfig::from_json(r#"{ "preview": { "aspect_ratio": "16:0" } }"#),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            AppConfig::from_json(r#"{ "facing": "sideways" }"#),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            AppConfig::from_json(r#"{ "unknown": 1 }"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let result = AppConfig::load(Path::new("/nonexistent/cam-labeler.json"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
