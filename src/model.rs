use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::calibration::{calibrate_thresholds, ThresholdMap};
use crate::config::MatcherParams;
use crate::error::{MatchError, MatchResult};
use crate::fusion::ScoreMode;
use crate::pool::ReferencePool;
use crate::types::LabeledSequence;

pub const MODEL_VERSION: u32 = 1;

/// Artefacto de modelo: parámetros, umbrales calibrados y referencias ya
/// preparadas, para arrancar sin recalibrar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub version: u32,
    #[serde(default)]
    pub built_utc: Option<String>,
    pub params: MatcherParams,
    pub thresholds: ThresholdMap,
    pub labels: BTreeSet<String>,
    pub references: Vec<LabeledSequence>,
}

impl ModelArtifact {
    /// Calibra una vez sobre el pool y empaqueta todo.
    /// Con `reject = false` no se calibra y el mapa de umbrales queda vacío.
    pub fn build(pool: &ReferencePool, params: &MatcherParams, reject: bool) -> MatchResult<Self> {
        params.validate()?;
        let thresholds = if reject {
            calibrate_thresholds(pool, params)?
        } else {
            ThresholdMap::new()
        };

        Ok(Self {
            version: MODEL_VERSION,
            built_utc: Some(chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S+00:00").to_string()),
            params: params.clone(),
            thresholds,
            labels: pool.labels(),
            references: pool.items().to_vec(),
        })
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decodifica un artefacto. El modo de puntuación se interpreta con las
    /// mismas reglas que en la línea de órdenes.
    pub fn from_json_bytes(data: &[u8]) -> MatchResult<Self> {
        let value: serde_json::Value = serde_json::from_slice(data)?;
        if let Some(mode) = value
            .pointer("/params/score_mode")
            .and_then(serde_json::Value::as_str)
        {
            mode.parse::<ScoreMode>()?;
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Coherencia interna: versión, parámetros, referencias no vacías y
    /// lista de etiquetas igual a la de las referencias.
    pub fn validate(&self) -> MatchResult<()> {
        if self.version != MODEL_VERSION {
            return Err(MatchError::UnsupportedModelVersion(self.version));
        }
        self.params.validate()?;
        if let Some(empty) = self.references.iter().find(|r| r.is_empty()) {
            return Err(MatchError::EmptySequence {
                source_id: Some(empty.source.clone()),
            });
        }
        let from_refs: BTreeSet<String> = self.references.iter().map(|r| r.label.clone()).collect();
        if from_refs != self.labels {
            return Err(MatchError::invalid(
                "labels",
                format!("{:?}", self.labels),
                "las etiquetas de las referencias",
            ));
        }
        Ok(())
    }

    /// Escribe el artefacto creando los directorios padre
    pub fn save(&self, path: impl AsRef<Path>) -> MatchResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, self.to_json_bytes()?)?;
        info!(
            "Modelo guardado en {:?}: {} referencias, {} umbrales",
            path,
            self.references.len(),
            self.thresholds.len()
        );
        Ok(())
    }

    /// Carga y valida un artefacto; no recalcula nada
    pub fn load(path: impl AsRef<Path>) -> MatchResult<Self> {
        let data = fs::read(path.as_ref())?;
        let artifact = Self::from_json_bytes(&data)?;
        artifact.validate()?;
        Ok(artifact)
    }

    /// Pool de referencias tal como se guardó
    pub fn reference_pool(&self) -> MatchResult<ReferencePool> {
        ReferencePool::new(self.references.clone())
    }

    pub fn thresholds(&self) -> &ThresholdMap {
        &self.thresholds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> ReferencePool {
        let items = vec![
            LabeledSequence::new("tap", "tap_r01.csv", vec![[1.0; 6]; 8]),
            LabeledSequence::new("tap", "tap_r02.csv", vec![[1.2; 6]; 8]),
            LabeledSequence::new("wave", "wave_r01.csv", vec![[4.0; 6]; 8]),
            LabeledSequence::new("wave", "wave_r02.csv", vec![[4.5; 6]; 8]),
        ];
        ReferencePool::new(items).unwrap()
    }

    #[test]
    fn test_json_round_trip() {
        let params = MatcherParams {
            score_mode: ScoreMode::Dtw,
            use_znorm: false,
            ..Default::default()
        };
        let artifact = ModelArtifact::build(&pool(), &params, true).unwrap();
        let bytes = artifact.to_json_bytes().unwrap();
        let back = ModelArtifact::from_json_bytes(&bytes).unwrap();
        assert_eq!(back, artifact);
        assert_eq!(back.labels.len(), 2);
        assert_eq!(back.thresholds.len(), 2);
    }

    #[test]
    fn test_json_layout() {
        let artifact = ModelArtifact::build(&pool(), &MatcherParams::default(), false).unwrap();
        let json: serde_json::Value =
            serde_json::from_slice(&artifact.to_json_bytes().unwrap()).unwrap();
        assert_eq!(json["version"], 1);
        assert_eq!(json["labels"], serde_json::json!(["tap", "wave"]));
        assert_eq!(json["references"][0]["path"], "tap_r01.csv");
        assert_eq!(json["references"][0]["seq"][0].as_array().unwrap().len(), 6);
        assert!(json["thresholds"].as_object().unwrap().is_empty());
    }

    #[test]
    fn test_unsupported_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let mut artifact = ModelArtifact::build(&pool(), &MatcherParams::default(), false).unwrap();
        artifact.version = 99;
        artifact.save(&path).unwrap();
        assert!(matches!(
            ModelArtifact::load(&path),
            Err(MatchError::UnsupportedModelVersion(99))
        ));
    }

    fn saved_json(artifact: &ModelArtifact) -> serde_json::Value {
        serde_json::from_slice(&artifact.to_json_bytes().unwrap()).unwrap()
    }

    #[test]
    fn test_unknown_score_mode_is_typed() {
        let artifact = ModelArtifact::build(&pool(), &MatcherParams::default(), false).unwrap();
        let mut json = saved_json(&artifact);
        json["params"]["score_mode"] = serde_json::json!("cosine");
        let bytes = serde_json::to_vec(&json).unwrap();
        assert!(matches!(
            ModelArtifact::from_json_bytes(&bytes),
            Err(MatchError::UnknownScoreMode(mode)) if mode == "cosine"
        ));

        json["params"]["score_mode"] = serde_json::json!("Hybrid");
        let back = ModelArtifact::from_json_bytes(&serde_json::to_vec(&json).unwrap()).unwrap();
        assert_eq!(back.params.score_mode, ScoreMode::Hybrid);
    }

    #[test]
    fn test_load_rejects_empty_reference() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let mut artifact = ModelArtifact::build(&pool(), &MatcherParams::default(), false).unwrap();
        artifact.references[1].sequence.clear();
        artifact.save(&path).unwrap();
        match ModelArtifact::load(&path) {
            Err(MatchError::EmptySequence { source_id }) => {
                assert_eq!(source_id, Some(std::path::PathBuf::from("tap_r02.csv")));
            }
            other => panic!("se esperaba EmptySequence, obtenido {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_load_rejects_mismatched_labels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let mut artifact = ModelArtifact::build(&pool(), &MatcherParams::default(), false).unwrap();
        artifact.labels.insert("swipe".to_string());
        artifact.save(&path).unwrap();
        assert!(matches!(
            ModelArtifact::load(&path),
            Err(MatchError::InvalidParameter { name: "labels", .. })
        ));
    }
}
