//! Pipeline configuration
//!
//! Every section is optional in the JSON file; missing fields take their
//! defaults.

use crate::cameras::CameraConfig;
use crate::error::InitError;
use crate::params::ParamsConfig;
use crate::quality::QualityConfig;
use crate::scale::ScaleConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitConfig {
    pub scale: ScaleConfig,
    pub params: ParamsConfig,
    pub cameras: CameraConfig,
    pub quality: QualityConfig,
}

impl InitConfig {
    /// Load and validate a configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, InitError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(InitError::InputMissing(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| InitError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self, InitError> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| InitError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), InitError> {
        self.scale.validate()?;
        self.params.validate()?;
        self.cameras.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cameras::CameraSelection;
    use crate::scale::KnnBackend;
    use splatseed_data::CameraModel;

    #[test]
    fn test_empty_object_gives_defaults() {
        let config = InitConfig::from_json_str("{}").unwrap();
        assert_eq!(config, InitConfig::default());
        assert_eq!(config.scale.neighbors, 3);
        assert_eq!(config.params.initial_opacity, 0.1);
        assert_eq!(config.cameras.supported_models, vec![CameraModel::Pinhole]);
        assert_eq!(config.quality.min_points, 1000);
    }

    #[test]
    fn test_partial_sections() {
        let config = InitConfig::from_json_str(
            r#"{
                "scale": { "neighbors": 5, "backend": "kd-tree" },
                "params": { "default_color": [0.25, 0.25, 0.25] },
                "cameras": {
                    "selection": { "by_id": 2 },
                    "supported_models": ["PINHOLE", "SIMPLE_PINHOLE"]
                }
            }"#,
        )
        .unwrap();
        assert_eq!(config.scale.neighbors, 5);
        assert_eq!(config.scale.backend, KnnBackend::KdTree);
        assert_eq!(config.scale.outlier_ratio, 100.0);
        assert_eq!(config.params.default_color, [0.25; 3]);
        assert_eq!(config.params.initial_opacity, 0.1);
        assert_eq!(config.cameras.selection, CameraSelection::ById(2));
        assert_eq!(
            config.cameras.supported_models,
            vec![CameraModel::Pinhole, CameraModel::SimplePinhole]
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        for json in [
            r#"{ "scale": { "neighbors": 0 } }"#,
            r#"{ "params": { "initial_opacity": 1.5 } }"#,
            r#"{ "cameras": { "supported_models": ["OPENCV"] } }"#,
            r#"{ "scale": { "backend": "octree" } }"#,
            "not json",
        ] {
            assert!(
                matches!(InitConfig::from_json_str(json), Err(InitError::Config(_))),
                "accepted {json}"
            );
        }
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("init.json");
        std::fs::write(&path, r#"{ "quality": { "min_points": 10 } }"#).unwrap();
        assert_eq!(InitConfig::from_json_file(&path).unwrap().quality.min_points, 10);

        assert!(matches!(
            InitConfig::from_json_file(dir.path().join("absent.json")),
            Err(InitError::InputMissing(_))
        ));
    }

    #[test]
    fn test_serialized_defaults_round_trip() {
        let json = serde_json::to_string_pretty(&InitConfig::default()).unwrap();
        assert_eq!(InitConfig::from_json_str(&json).unwrap(), InitConfig::default());
    }
}
