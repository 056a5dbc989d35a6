use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use crate::error::ModelError;
use crate::forecast::{
    GradientBoostedModel, LstmArtifact, LstmModel, ModelUnavailable, FEATURE_NAMES,
};

pub const BOOSTED_ARTIFACT: &str = "xgb_vol_model.json";
pub const SEQUENCE_ARTIFACT: &str = "lstm_vol_model.json";

/// Reads pretrained model artifacts from one directory.
///
/// Artifacts are loaded once when the engine is built and shared read-only
/// across requests.
#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn load_boosted(&self) -> Result<GradientBoostedModel, ModelUnavailable> {
        let (path, model) = self.read_json::<GradientBoostedModel>(BOOSTED_ARTIFACT)?;
        if model.n_features != FEATURE_NAMES.len() {
            return Err(ModelUnavailable::ArtifactInvalid(ModelError::Malformed {
                path,
                message: format!(
                    "expected {} features ({}), artifact declares {}",
                    FEATURE_NAMES.len(),
                    FEATURE_NAMES.join(", "),
                    model.n_features
                ),
            }));
        }
        Ok(model)
    }

    pub fn load_sequence(&self) -> Result<LstmModel, ModelUnavailable> {
        let (path, artifact) = self.read_json::<LstmArtifact>(SEQUENCE_ARTIFACT)?;
        LstmModel::from_artifact(&artifact, &path).map_err(ModelUnavailable::ArtifactInvalid)
    }

    fn read_json<T: DeserializeOwned>(&self, name: &str) -> Result<(String, T), ModelUnavailable> {
        let path = self.dir.join(name);
        let display = path.display().to_string();
        if !path.is_file() {
            return Err(ModelUnavailable::ArtifactMissing { path: display });
        }

        let raw = std::fs::read_to_string(&path).map_err(|error| {
            ModelUnavailable::ArtifactInvalid(ModelError::Io {
                path: display.clone(),
                message: error.to_string(),
            })
        })?;

        let parsed = serde_json::from_str(&raw).map_err(|error| {
            ModelUnavailable::ArtifactInvalid(ModelError::Malformed {
                path: display.clone(),
                message: error.to_string(),
            })
        })?;
        Ok((display, parsed))
    }
}
