use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::calibration::{calibrate_thresholds, ThresholdMap};
use crate::config::MatcherParams;
use crate::csv_loader::load_sequence_from_csv;
use crate::error::{MatchError, MatchResult};
use crate::fusion::LabelScores;
use crate::model::ModelArtifact;
use crate::pool::ReferencePool;
use crate::preprocess::prepare;
use crate::rejection::{ClassificationResult, RejectionGate};
use crate::types::{FeatureVector, PairMetric};

/// Resultado completo de una clasificación: decisión, puntuaciones por
/// etiqueta (para diagnóstico) y referencias ordenadas por DTW.
#[derive(Debug, Clone)]
pub struct Classification {
    pub result: ClassificationResult,
    pub scores: LabelScores,
    pub neighbours: Vec<PairMetric>,
}

pub struct GestureClassifier {
    pool: ReferencePool,
    /// `None`: rechazo por umbral desactivado
    thresholds: Option<ThresholdMap>,
    params: MatcherParams,
}

impl GestureClassifier {
    pub fn new(
        pool: ReferencePool,
        thresholds: Option<ThresholdMap>,
        params: MatcherParams,
    ) -> MatchResult<Self> {
        params.validate()?;
        Ok(Self {
            pool,
            thresholds,
            params,
        })
    }

    /// Calibra los umbrales sobre el propio pool (si `reject`)
    pub fn calibrated(pool: ReferencePool, params: MatcherParams, reject: bool) -> MatchResult<Self> {
        let thresholds = if reject {
            Some(calibrate_thresholds(&pool, &params)?)
        } else {
            None
        };
        Self::new(pool, thresholds, params)
    }

    /// Reconstruye el clasificador desde un artefacto sin recalcular nada.
    /// Un mapa de umbrales vacío equivale a rechazo desactivado.
    pub fn from_artifact(artifact: &ModelArtifact) -> MatchResult<Self> {
        let thresholds = if artifact.thresholds.is_empty() {
            None
        } else {
            Some(artifact.thresholds.clone())
        };
        Self::new(artifact.reference_pool()?, thresholds, artifact.params.clone())
    }

    pub fn params(&self) -> &MatcherParams {
        &self.params
    }

    pub fn pool(&self) -> &ReferencePool {
        &self.pool
    }

    pub fn thresholds(&self) -> Option<&ThresholdMap> {
        self.thresholds.as_ref()
    }

    /// Clasifica una secuencia ya preparada con los mismos parámetros.
    /// `exclude` retira del pool la referencia con ese origen.
    pub fn classify(
        &self,
        query: &[FeatureVector],
        exclude: Option<&Path>,
    ) -> MatchResult<Classification> {
        if query.is_empty() {
            return Err(MatchError::EmptySequence {
                source_id: exclude.map(Path::to_path_buf),
            });
        }

        let view = match exclude {
            Some(source) => self.pool.excluding(source),
            None => self.pool.view(),
        };
        if view.is_empty() {
            return Err(MatchError::EmptySelection {
                reason: "no quedan referencias tras excluir la consulta".to_string(),
            });
        }

        let (scores, neighbours) = view.score(query, &self.params);
        let gate = RejectionGate {
            thresholds: self.thresholds.as_ref(),
            margin: self.params.reject_margin,
            threshold_grace: self.params.reject_threshold_grace,
            unknown_label: &self.params.unknown_label,
        };
        let result = gate.decide(&scores.final_scores);
        if let Some(reason) = &result.reject_reason {
            debug!("Consulta rechazada: {}", reason);
        }

        Ok(Classification {
            result,
            scores,
            neighbours,
        })
    }

    /// Prepara una secuencia cruda (remuestreo + z-normalización) y la clasifica
    pub fn classify_raw(
        &self,
        raw: &[FeatureVector],
        exclude: Option<&Path>,
    ) -> MatchResult<Classification> {
        let query = prepare(raw, self.params.max_points, self.params.use_znorm)?;
        self.classify(&query, exclude)
    }

    /// Carga un CSV y lo clasifica, excluyendo la referencia que apunte al
    /// mismo fichero.
    pub fn classify_csv(&self, path: impl AsRef<Path>) -> anyhow::Result<Classification> {
        let path = path.as_ref();
        let raw = load_sequence_from_csv(path)?;
        let own_source = self.find_reference(path);
        Ok(self.classify_raw(&raw, own_source.as_deref())?)
    }

    /// Origen de la referencia que resuelve al mismo fichero que `path`
    fn find_reference(&self, path: &Path) -> Option<PathBuf> {
        let target = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        self.pool
            .items()
            .iter()
            .find(|item| {
                let src = fs::canonicalize(&item.source).unwrap_or_else(|_| item.source.clone());
                src == target
            })
            .map(|item| item.source.clone())
    }
}
